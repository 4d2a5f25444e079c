//! 시세 데이터 Provider 모듈.
//!
//! 외부 소스에서 일별 시세를 가져오는 Provider 구현체와, 우선순위
//! fallback 체인을 제공합니다.
//!
//! ## Alpha Vantage
//! - `AlphaVantageProvider`: 유료/문서화된 1차 소스 (JSON, API 키 필요)
//! - TIME_SERIES_DAILY_ADJUSTED, 분당 5회 rate limit
//!
//! ## Yahoo Finance
//! - `YahooProvider`: 무료 fallback 소스 (`yahoo_finance_api` 사용)
//!
//! ## 체인 동작
//!
//! 선언된 우선순위 순서대로 각 Provider의 rate limit만큼 대기 후 호출하고,
//! 비어 있지 않은 첫 성공 결과를 반환합니다. 모든 Provider가 소진되면
//! 해당 종목은 이번 사이클 실패입니다.

pub mod alpha_vantage;
pub mod yahoo;

use std::sync::Arc;

use chrono::NaiveDate;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use stocksync_core::{PricePoint, PriceProvider};

use crate::error::{DataError, Result};

pub use alpha_vantage::AlphaVantageProvider;
pub use yahoo::YahooProvider;

/// 체인 조회 성공 결과.
///
/// 관측성을 위해 실제로 데이터를 공급한 Provider 이름을 함께 태깅합니다.
#[derive(Debug)]
pub struct FetchOutcome {
    /// 데이터를 공급한 Provider 이름
    pub provider: &'static str,
    /// 날짜 오름차순 시세 레코드 (항상 1건 이상)
    pub records: Vec<PricePoint>,
}

/// 우선순위 기반 Provider fallback 체인.
///
/// 체인은 한 번 선언되고 모든 종목에 동일하게 반복 적용되므로 fallback
/// 동작이 결정적입니다. Provider 추가는 체인 구성만 바꾸면 됩니다.
#[derive(Default)]
pub struct ProviderChain {
    providers: Vec<Arc<dyn PriceProvider>>,
}

impl ProviderChain {
    /// 빈 체인 생성.
    pub fn new() -> Self {
        Self::default()
    }

    /// 체인 끝에 Provider 추가 (선언 순서 = 우선순위).
    pub fn with_provider(mut self, provider: Arc<dyn PriceProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    /// 구성된 Provider 수.
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Provider가 하나도 없는지 여부.
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// 우선순위 순서대로 fallback하며 기간 시세 조회.
    ///
    /// 각 Provider 호출 전 해당 Provider의 rate limit만큼 대기하며, 대기와
    /// 네트워크 왕복 모두 취소 신호로 즉시 중단됩니다.
    ///
    /// # Errors
    /// - `DataError::Cancelled`: 취소 신호 관측
    /// - `DataError::ProvidersExhausted`: 모든 Provider가 에러 또는 빈 결과
    pub async fn fetch_with_fallback(
        &self,
        stock_code: &str,
        start: NaiveDate,
        end: NaiveDate,
        shutdown: &CancellationToken,
    ) -> Result<FetchOutcome> {
        let mut last_error = "no providers configured".to_string();

        for provider in &self.providers {
            if shutdown.is_cancelled() {
                return Err(DataError::Cancelled);
            }

            // Provider 전역 rate limit 준수 (취소 가능 대기)
            let delay = provider.rate_limit();
            if !delay.is_zero() {
                tokio::select! {
                    _ = shutdown.cancelled() => return Err(DataError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            let fetched = tokio::select! {
                _ = shutdown.cancelled() => return Err(DataError::Cancelled),
                result = provider.fetch_historical_data(stock_code, start, end) => result,
            };

            match fetched {
                Ok(records) if !records.is_empty() => {
                    debug!(
                        stock_code = stock_code,
                        provider = provider.name(),
                        records = records.len(),
                        "Provider 조회 성공"
                    );
                    return Ok(FetchOutcome {
                        provider: provider.name(),
                        records,
                    });
                }
                Ok(_) => {
                    debug!(
                        stock_code = stock_code,
                        provider = provider.name(),
                        "데이터 없음, 다음 Provider로 fallback"
                    );
                    last_error = format!("{}: empty result", provider.name());
                }
                Err(e) => {
                    warn!(
                        stock_code = stock_code,
                        provider = provider.name(),
                        error = %e,
                        "Provider 조회 실패, 다음 Provider로 fallback"
                    );
                    last_error = format!("{}: {}", provider.name(), e);
                }
            }
        }

        Err(DataError::ProvidersExhausted {
            stock_code: stock_code.to_string(),
            last_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::time::Duration;
    use stocksync_core::ProviderError;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn point(code: &str, date: &str) -> PricePoint {
        PricePoint {
            stock_code: code.to_string(),
            date: d(date),
            open: dec!(100),
            high: dec!(110),
            low: dec!(95),
            close: dec!(105),
            adjusted_close: dec!(105),
            volume: 1_000,
        }
    }

    /// 항상 실패하는 Provider.
    struct FailingProvider;

    #[async_trait]
    impl PriceProvider for FailingProvider {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn rate_limit(&self) -> Duration {
            Duration::ZERO
        }

        async fn fetch_historical_data(
            &self,
            _stock_code: &str,
            _start: NaiveDate,
            _end: NaiveDate,
        ) -> std::result::Result<Vec<PricePoint>, ProviderError> {
            Err(ProviderError::Network("connection refused".into()))
        }
    }

    /// 항상 고정 데이터를 반환하는 Provider.
    struct StaticProvider;

    #[async_trait]
    impl PriceProvider for StaticProvider {
        fn name(&self) -> &'static str {
            "static"
        }

        fn rate_limit(&self) -> Duration {
            Duration::ZERO
        }

        async fn fetch_historical_data(
            &self,
            stock_code: &str,
            _start: NaiveDate,
            _end: NaiveDate,
        ) -> std::result::Result<Vec<PricePoint>, ProviderError> {
            Ok(vec![point(stock_code, "2024-01-05")])
        }
    }

    /// 항상 빈 결과를 반환하는 Provider.
    struct EmptyProvider;

    #[async_trait]
    impl PriceProvider for EmptyProvider {
        fn name(&self) -> &'static str {
            "empty"
        }

        fn rate_limit(&self) -> Duration {
            Duration::ZERO
        }

        async fn fetch_historical_data(
            &self,
            _stock_code: &str,
            _start: NaiveDate,
            _end: NaiveDate,
        ) -> std::result::Result<Vec<PricePoint>, ProviderError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_fallback_to_second_provider() {
        let chain = ProviderChain::new()
            .with_provider(Arc::new(FailingProvider))
            .with_provider(Arc::new(StaticProvider));

        let outcome = chain
            .fetch_with_fallback("7203", d("2024-01-01"), d("2024-01-31"), &CancellationToken::new())
            .await
            .unwrap();

        // 1차가 항상 실패하면 성공은 항상 2차에 귀속
        assert_eq!(outcome.provider, "static");
        assert_eq!(outcome.records.len(), 1);
    }

    #[tokio::test]
    async fn test_first_provider_wins_when_healthy() {
        let chain = ProviderChain::new()
            .with_provider(Arc::new(StaticProvider))
            .with_provider(Arc::new(FailingProvider));

        let outcome = chain
            .fetch_with_fallback("7203", d("2024-01-01"), d("2024-01-31"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.provider, "static");
    }

    #[tokio::test]
    async fn test_empty_result_falls_through() {
        let chain = ProviderChain::new()
            .with_provider(Arc::new(EmptyProvider))
            .with_provider(Arc::new(StaticProvider));

        let outcome = chain
            .fetch_with_fallback("7203", d("2024-01-01"), d("2024-01-31"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.provider, "static");
    }

    #[tokio::test]
    async fn test_all_providers_exhausted() {
        let chain = ProviderChain::new()
            .with_provider(Arc::new(FailingProvider))
            .with_provider(Arc::new(EmptyProvider));

        let err = chain
            .fetch_with_fallback("7203", d("2024-01-01"), d("2024-01-31"), &CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            DataError::ProvidersExhausted { stock_code, last_error } => {
                assert_eq!(stock_code, "7203");
                assert!(last_error.contains("empty"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cancelled_before_fetch() {
        let chain = ProviderChain::new().with_provider(Arc::new(StaticProvider));
        let token = CancellationToken::new();
        token.cancel();

        let err = chain
            .fetch_with_fallback("7203", d("2024-01-01"), d("2024-01-31"), &token)
            .await
            .unwrap_err();

        assert!(matches!(err, DataError::Cancelled));
    }
}
