//! 환경변수 기반 설정 모듈.

use crate::Result;
use std::time::Duration;

/// Collector 전체 설정
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// 데이터베이스 URL
    pub database_url: String,
    /// 시세 동기화 설정
    pub price_sync: PriceSyncConfig,
    /// Provider 설정
    pub providers: ProviderConfig,
    /// 유니버스 소스 설정
    pub universe: UniverseConfig,
}

/// 시세 동기화 설정
#[derive(Debug, Clone)]
pub struct PriceSyncConfig {
    /// 기본 수집 기간 (년)
    pub lookback_years: u32,
    /// 스킵 판정 시 허용하는 상장 시점 여유 (일)
    pub span_tolerance_days: i64,
    /// 갭 판정 기준 (인접 저장일 간 달력일 초과분)
    pub gap_threshold_days: i32,
    /// 갭별 개별 수집을 선택하는 최대 갭 수 (초과 시 전체 재수집)
    pub max_gap_fill_ranges: usize,
}

/// Provider 설정
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Alpha Vantage API 키 (없으면 체인에서 제외)
    pub alpha_vantage_api_key: Option<String>,
    /// Alpha Vantage 호출 간 최소 간격 (밀리초, 무료 플랜 분당 5회)
    pub alpha_vantage_delay_ms: u64,
    /// Yahoo Finance 호출 간 최소 간격 (밀리초)
    pub yahoo_delay_ms: u64,
}

/// 유니버스 소스 설정
#[derive(Debug, Clone)]
pub struct UniverseConfig {
    /// 종목 목록 파일 경로 (없으면 DB에서 조회)
    pub file: Option<String>,
}

impl CollectorConfig {
    /// 환경변수에서 설정 로드
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = std::env::var("DATABASE_URL").map_err(|_| {
            crate::error::CollectorError::Config(
                "DATABASE_URL 환경변수가 설정되지 않았습니다".to_string(),
            )
        })?;

        Ok(Self {
            database_url,
            price_sync: PriceSyncConfig {
                lookback_years: env_var_parse("PRICE_SYNC_LOOKBACK_YEARS", 10),
                span_tolerance_days: env_var_parse("PRICE_SYNC_SPAN_TOLERANCE_DAYS", 30),
                gap_threshold_days: env_var_parse("PRICE_SYNC_GAP_THRESHOLD_DAYS", 4),
                max_gap_fill_ranges: env_var_parse("PRICE_SYNC_MAX_GAP_FILL_RANGES", 10),
            },
            providers: ProviderConfig {
                alpha_vantage_api_key: std::env::var("ALPHA_VANTAGE_API_KEY").ok(),
                alpha_vantage_delay_ms: env_var_parse("ALPHA_VANTAGE_DELAY_MS", 12_000),
                yahoo_delay_ms: env_var_parse("YAHOO_DELAY_MS", 500),
            },
            universe: UniverseConfig {
                file: std::env::var("UNIVERSE_FILE").ok(),
            },
        })
    }
}

impl ProviderConfig {
    /// Alpha Vantage 호출 간 최소 간격을 Duration으로 반환
    pub fn alpha_vantage_delay(&self) -> Duration {
        Duration::from_millis(self.alpha_vantage_delay_ms)
    }

    /// Yahoo 호출 간 최소 간격을 Duration으로 반환
    pub fn yahoo_delay(&self) -> Duration {
        Duration::from_millis(self.yahoo_delay_ms)
    }
}

/// 환경변수에서 값을 파싱 (실패 시 기본값 사용)
fn env_var_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_var_parse_default() {
        assert_eq!(env_var_parse("STOCKSYNC_TEST_MISSING_KEY", 42u32), 42);
    }
}
