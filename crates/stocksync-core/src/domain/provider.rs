//! 시세 데이터 Provider 추상화.
//!
//! 외부 데이터 소스(Alpha Vantage, Yahoo Finance 등)로부터 일별 시세를
//! 조회하기 위한 소스 중립적인 인터페이스를 제공합니다. 응답 파싱 등
//! 소스별 세부 사항은 각 구현체 안에 머무르고, 오케스트레이터는 이
//! trait만 바라봅니다.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use super::price::PricePoint;

// =============================================================================
// 에러 타입
// =============================================================================

/// PriceProvider 에러.
///
/// 재시도 가능 여부 분류를 포함합니다. 오케스트레이터는 이 분류를
/// Failure Ledger에 기록하고, 같은 패스 안에서는 재시도하지 않습니다.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Rate limit 초과 (재시도 가능)
    #[error("Rate limit 초과: {0}")]
    RateLimited(String),

    /// 종목을 찾을 수 없음
    #[error("종목을 찾을 수 없음: {0}")]
    NotFound(String),

    /// 네트워크/일시적 에러 (재시도 가능)
    #[error("네트워크 에러: {0}")]
    Network(String),

    /// 응답 파싱 에러
    #[error("파싱 에러: {0}")]
    Parse(String),

    /// 복구 불가능한 에러
    #[error("복구 불가능한 에러: {0}")]
    Fatal(String),
}

impl ProviderError {
    /// 이후 호출에서 재시도할 가치가 있는 에러인지 여부.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited(_) | Self::Network(_))
    }

    /// Failure Ledger 기록용 에러 분류 문자열.
    pub fn class(&self) -> &'static str {
        match self {
            Self::RateLimited(_) => "rate_limited",
            Self::NotFound(_) => "not_found",
            Self::Network(_) => "transient",
            Self::Parse(_) => "parse",
            Self::Fatal(_) => "fatal",
        }
    }
}

// =============================================================================
// PriceProvider Trait
// =============================================================================

/// 시세 데이터 제공자 trait.
///
/// 각 외부 소스별로 이 trait를 구현하여 소스 중립적인 fallback 체인을
/// 구성할 수 있습니다. 체인에 Provider를 추가해도 오케스트레이션 로직은
/// 바뀌지 않습니다.
#[async_trait]
pub trait PriceProvider: Send + Sync {
    /// Provider 이름 (로그 및 성공 출처 태깅용).
    fn name(&self) -> &'static str;

    /// 이 Provider 호출 *전에* 확보해야 하는 최소 간격.
    ///
    /// 체인이 매 호출 전에 이 시간만큼 대기합니다. Provider 전역 기준이므로
    /// 병렬 호출을 전제하지 않습니다.
    fn rate_limit(&self) -> Duration;

    /// 지정한 기간의 일별 시세 조회.
    ///
    /// # Returns
    /// 날짜 오름차순으로 정렬된 시세 목록. 기간 내 데이터가 없으면 빈 벡터.
    ///
    /// # Errors
    /// - `ProviderError::RateLimited`: 소스 rate limit 초과
    /// - `ProviderError::NotFound`: 소스에 없는 종목
    /// - `ProviderError::Network`: 네트워크/일시적 실패
    async fn fetch_historical_data(
        &self,
        stock_code: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PricePoint>, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(ProviderError::RateLimited("5/min".into()).is_retryable());
        assert!(ProviderError::Network("timeout".into()).is_retryable());
        assert!(!ProviderError::NotFound("XXXX".into()).is_retryable());
        assert!(!ProviderError::Fatal("key revoked".into()).is_retryable());
    }

    #[test]
    fn test_error_class_strings() {
        assert_eq!(ProviderError::RateLimited(String::new()).class(), "rate_limited");
        assert_eq!(ProviderError::NotFound(String::new()).class(), "not_found");
        assert_eq!(ProviderError::Network(String::new()).class(), "transient");
    }
}
