//! Alpha Vantage 일별 시세 클라이언트.
//!
//! TIME_SERIES_DAILY_ADJUSTED 엔드포인트에서 수정종가 포함 일봉을
//! 수집합니다. 무료 플랜 기준 분당 5회 rate limit이 있어 체인의 기본
//! 간격은 12초입니다.
//!
//! # API 키 관리
//!
//! 환경변수 `ALPHA_VANTAGE_API_KEY`로 전달합니다. 키가 없으면 체인 구성에서
//! 제외됩니다 (Yahoo fallback만 사용).
//!
//! # 사용 예제
//!
//! ```rust,ignore
//! use stocksync_data::provider::AlphaVantageProvider;
//!
//! let provider = AlphaVantageProvider::new("YOUR_API_KEY", Duration::from_secs(12));
//! let points = provider.fetch_historical_data("7203.T", start, end).await?;
//! ```

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;

use stocksync_core::{PricePoint, PriceProvider, ProviderError};

const DEFAULT_BASE_URL: &str = "https://www.alphavantage.co";

/// Alpha Vantage API 클라이언트.
#[derive(Clone)]
pub struct AlphaVantageProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    delay: Duration,
}

/// TIME_SERIES_DAILY_ADJUSTED 응답.
#[derive(Debug, Deserialize)]
struct DailyResponse {
    #[serde(rename = "Time Series (Daily)")]
    series: Option<HashMap<String, RawBar>>,
    /// rate limit 초과 시 본문 (무료 플랜)
    #[serde(rename = "Note")]
    note: Option<String>,
    /// rate limit/플랜 안내 (프리미엄 유도 포함)
    #[serde(rename = "Information")]
    information: Option<String>,
    /// 잘못된 심볼 등
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawBar {
    #[serde(rename = "1. open")]
    open: String,
    #[serde(rename = "2. high")]
    high: String,
    #[serde(rename = "3. low")]
    low: String,
    #[serde(rename = "4. close")]
    close: String,
    #[serde(rename = "5. adjusted close")]
    adjusted_close: String,
    #[serde(rename = "6. volume")]
    volume: String,
}

impl AlphaVantageProvider {
    /// 새로운 클라이언트 생성.
    ///
    /// # Arguments
    /// * `api_key` - Alpha Vantage API 키
    /// * `delay` - 호출 전 확보할 최소 간격 (무료 플랜: 12초)
    pub fn new(api_key: impl Into<String>, delay: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            delay,
        }
    }

    /// Base URL 교체 (테스트용).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl PriceProvider for AlphaVantageProvider {
    fn name(&self) -> &'static str {
        "alpha_vantage"
    }

    fn rate_limit(&self) -> Duration {
        self.delay
    }

    async fn fetch_historical_data(
        &self,
        stock_code: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PricePoint>, ProviderError> {
        let url = format!("{}/query", self.base_url);

        tracing::debug!(
            stock_code = stock_code,
            start = %start,
            end = %end,
            "Alpha Vantage API 호출"
        );

        let response = self
            .client
            .get(&url)
            .query(&[
                ("function", "TIME_SERIES_DAILY_ADJUSTED"),
                ("symbol", stock_code),
                ("outputsize", "full"),
                ("apikey", &self.api_key),
            ])
            .send()
            .await
            .map_err(|e| ProviderError::Network(format!("Alpha Vantage 요청 실패: {}", e)))?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(ProviderError::RateLimited(
                "Alpha Vantage HTTP 429".to_string(),
            ));
        }
        if !status.is_success() {
            return Err(ProviderError::Network(format!(
                "Alpha Vantage HTTP {}",
                status
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::Network(format!("응답 본문 읽기 실패: {}", e)))?;

        parse_daily_response(&body, stock_code, start, end)
    }
}

/// TIME_SERIES_DAILY_ADJUSTED 응답 본문 파싱.
///
/// 요청 기간 밖의 날짜는 버리고, 날짜 오름차순으로 정렬해 반환합니다.
/// rate limit 안내 본문(`Note`/`Information`)은 `RateLimited`로, 심볼 오류는
/// `NotFound`로 분류합니다.
fn parse_daily_response(
    body: &str,
    stock_code: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<PricePoint>, ProviderError> {
    let response: DailyResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::Parse(format!("Alpha Vantage JSON 파싱 실패: {}", e)))?;

    if let Some(note) = response.note.or(response.information) {
        return Err(ProviderError::RateLimited(note));
    }
    if let Some(message) = response.error_message {
        return Err(ProviderError::NotFound(format!(
            "{}: {}",
            stock_code, message
        )));
    }

    let series = response.series.ok_or_else(|| {
        ProviderError::Parse("응답에 Time Series (Daily) 필드가 없습니다".to_string())
    })?;

    let mut points = Vec::with_capacity(series.len());
    for (date_str, bar) in series {
        let date = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d")
            .map_err(|e| ProviderError::Parse(format!("날짜 파싱 실패 ({}): {}", date_str, e)))?;

        if date < start || date > end {
            continue;
        }

        points.push(PricePoint {
            stock_code: stock_code.to_string(),
            date,
            open: parse_decimal(&bar.open, "open")?,
            high: parse_decimal(&bar.high, "high")?,
            low: parse_decimal(&bar.low, "low")?,
            close: parse_decimal(&bar.close, "close")?,
            adjusted_close: parse_decimal(&bar.adjusted_close, "adjusted close")?,
            volume: bar
                .volume
                .parse::<i64>()
                .map_err(|e| ProviderError::Parse(format!("volume 파싱 실패: {}", e)))?,
        });
    }

    points.sort_by_key(|p| p.date);
    Ok(points)
}

fn parse_decimal(value: &str, field: &str) -> Result<Decimal, ProviderError> {
    Decimal::from_str(value)
        .map_err(|e| ProviderError::Parse(format!("{} 파싱 실패 ({}): {}", field, value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    const SAMPLE_BODY: &str = r#"{
        "Meta Data": {
            "1. Information": "Daily Time Series with Splits and Dividend Events",
            "2. Symbol": "7203.T"
        },
        "Time Series (Daily)": {
            "2024-01-05": {
                "1. open": "2500.0",
                "2. high": "2550.0",
                "3. low": "2480.0",
                "4. close": "2520.0",
                "5. adjusted close": "2518.5",
                "6. volume": "1200000"
            },
            "2024-01-04": {
                "1. open": "2450.0",
                "2. high": "2510.0",
                "3. low": "2440.0",
                "4. close": "2500.0",
                "5. adjusted close": "2498.5",
                "6. volume": "900000"
            },
            "2023-12-01": {
                "1. open": "2300.0",
                "2. high": "2340.0",
                "3. low": "2290.0",
                "4. close": "2320.0",
                "5. adjusted close": "2318.7",
                "6. volume": "800000"
            }
        }
    }"#;

    #[test]
    fn test_parse_success_sorted_ascending() {
        let points =
            parse_daily_response(SAMPLE_BODY, "7203.T", d("2023-01-01"), d("2024-12-31")).unwrap();

        assert_eq!(points.len(), 3);
        assert_eq!(points[0].date, d("2023-12-01"));
        assert_eq!(points[2].date, d("2024-01-05"));
        assert_eq!(points[2].adjusted_close, dec!(2518.5));
        assert_eq!(points[2].volume, 1_200_000);
    }

    #[test]
    fn test_parse_filters_requested_range() {
        let points =
            parse_daily_response(SAMPLE_BODY, "7203.T", d("2024-01-01"), d("2024-01-31")).unwrap();

        assert_eq!(points.len(), 2);
        assert!(points.iter().all(|p| p.date >= d("2024-01-01")));
    }

    #[test]
    fn test_parse_note_is_rate_limited() {
        let body = r#"{"Note": "Thank you for using Alpha Vantage! Our standard API rate limit is 5 requests per minute."}"#;
        let err =
            parse_daily_response(body, "7203.T", d("2024-01-01"), d("2024-01-31")).unwrap_err();
        assert!(matches!(err, ProviderError::RateLimited(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_parse_error_message_is_not_found() {
        let body = r#"{"Error Message": "Invalid API call. Please retry or visit the documentation."}"#;
        let err =
            parse_daily_response(body, "XXXX", d("2024-01-01"), d("2024-01-31")).unwrap_err();
        assert!(matches!(err, ProviderError::NotFound(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_fetch_against_mock_server() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/query")
            .match_query(mockito::Matcher::UrlEncoded(
                "symbol".into(),
                "7203.T".into(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(SAMPLE_BODY)
            .create_async()
            .await;

        let provider = AlphaVantageProvider::new("test-key", Duration::ZERO)
            .with_base_url(server.url());

        let points = provider
            .fetch_historical_data("7203.T", d("2024-01-01"), d("2024-01-31"))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].date, d("2024-01-04"));
    }
}
