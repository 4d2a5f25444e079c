//! Yahoo Finance 일별 시세 Provider.
//!
//! `yahoo_finance_api` 크레이트 기반의 무료 fallback 소스입니다. 인증이
//! 필요 없는 대신 응답 일관성이 낮아 체인에서 2순위로 사용합니다.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveDate};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use time::OffsetDateTime;

use stocksync_core::{PricePoint, PriceProvider, ProviderError};

/// Yahoo Finance Provider.
#[derive(Clone)]
pub struct YahooProvider {
    delay: Duration,
}

impl YahooProvider {
    /// 새로운 Provider 생성.
    ///
    /// # Arguments
    /// * `delay` - 호출 전 확보할 최소 간격
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl PriceProvider for YahooProvider {
    fn name(&self) -> &'static str {
        "yahoo_finance"
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
        let connector = yahoo_finance_api::YahooConnector::new()
            .map_err(|e| ProviderError::Network(format!("Yahoo Finance 연결 실패: {}", e)))?;

        tracing::debug!(
            stock_code = stock_code,
            start = %start,
            end = %end,
            "Yahoo Finance API 호출"
        );

        // end 당일을 포함하기 위해 하루 뒤 자정까지 요청
        let start_ts = naive_date_to_offset_datetime(start);
        let end_ts = naive_date_to_offset_datetime(end + chrono::Duration::days(1));

        let response = connector
            .get_quote_history_interval(stock_code, start_ts, end_ts, "1d")
            .await
            .map_err(|e| classify_yahoo_error(stock_code, e))?;

        let quotes = response
            .quotes()
            .map_err(|e| ProviderError::Parse(format!("Quote 파싱 오류: {}", e)))?;

        let mut points: Vec<PricePoint> = quotes
            .iter()
            .filter_map(|q| quote_to_point(stock_code, q, start, end))
            .collect();

        points.sort_by_key(|p| p.date);
        Ok(points)
    }
}

/// Quote 한 건을 시세 레코드로 변환.
///
/// 요청 기간 밖의 날짜와, OHLC/수정종가 중 하나라도 유한한 수가 아닌
/// quote는 버립니다. 0으로 대체해 저장하면 Upsert가 기존의 정상 행을
/// 덮어쓰게 되므로 해당 날짜는 수집하지 않는 쪽이 안전합니다.
fn quote_to_point(
    stock_code: &str,
    q: &yahoo_finance_api::Quote,
    start: NaiveDate,
    end: NaiveDate,
) -> Option<PricePoint> {
    let date = DateTime::from_timestamp(q.timestamp as i64, 0)?.date_naive();
    if date < start || date > end {
        return None;
    }

    Some(PricePoint {
        stock_code: stock_code.to_string(),
        date,
        open: Decimal::from_f64(q.open)?,
        high: Decimal::from_f64(q.high)?,
        low: Decimal::from_f64(q.low)?,
        close: Decimal::from_f64(q.close)?,
        adjusted_close: Decimal::from_f64(q.adjclose)?,
        volume: q.volume as i64,
    })
}

/// Yahoo API 에러를 재시도 분류로 변환.
fn classify_yahoo_error(stock_code: &str, err: yahoo_finance_api::YahooError) -> ProviderError {
    let message = format!("Yahoo Finance API 오류 ({}): {}", stock_code, err);
    match err {
        yahoo_finance_api::YahooError::FetchFailed(_)
        | yahoo_finance_api::YahooError::ConnectionFailed(_) => ProviderError::Network(message),
        yahoo_finance_api::YahooError::NoResult
        | yahoo_finance_api::YahooError::NoQuotes
        | yahoo_finance_api::YahooError::DataInconsistency => ProviderError::NotFound(message),
        _ => ProviderError::Parse(message),
    }
}

/// NaiveDate를 OffsetDateTime으로 변환.
fn naive_date_to_offset_datetime(date: NaiveDate) -> OffsetDateTime {
    let (year, month, day) = (date.year(), date.month() as u8, date.day() as u8);
    time::Date::from_calendar_date(year, time::Month::try_from(month).unwrap(), day)
        .unwrap()
        .midnight()
        .assume_utc()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn quote(timestamp: i64, open: f64) -> yahoo_finance_api::Quote {
        yahoo_finance_api::Quote {
            timestamp,
            open,
            high: 2550.0,
            low: 2480.0,
            volume: 1_200_000,
            close: 2520.0,
            adjclose: 2518.5,
        }
    }

    #[test]
    fn test_quote_to_point_converts_valid_quote() {
        // 2024-01-05 00:00 UTC
        let q = quote(1_704_412_800, 2500.0);
        let point = quote_to_point(
            "7203.T",
            &q,
            "2024-01-01".parse().unwrap(),
            "2024-01-31".parse().unwrap(),
        )
        .unwrap();

        assert_eq!(point.date, "2024-01-05".parse::<NaiveDate>().unwrap());
        assert_eq!(point.open, dec!(2500.0));
        assert_eq!(point.adjusted_close, dec!(2518.5));
    }

    #[test]
    fn test_quote_to_point_drops_non_finite_fields() {
        // NaN/무한대 필드를 0으로 대체해 저장하면 기존 정상 행을 덮어쓰므로
        // 해당 quote는 버려야 함
        let start = "2024-01-01".parse().unwrap();
        let end = "2024-01-31".parse().unwrap();

        let nan = quote(1_704_412_800, f64::NAN);
        assert!(quote_to_point("7203.T", &nan, start, end).is_none());

        let mut inf = quote(1_704_412_800, 2500.0);
        inf.adjclose = f64::INFINITY;
        assert!(quote_to_point("7203.T", &inf, start, end).is_none());
    }

    #[test]
    fn test_quote_to_point_filters_requested_range() {
        let q = quote(1_704_412_800, 2500.0); // 2024-01-05
        assert!(quote_to_point(
            "7203.T",
            &q,
            "2024-02-01".parse().unwrap(),
            "2024-02-29".parse().unwrap(),
        )
        .is_none());
    }

    #[test]
    fn test_naive_date_conversion() {
        let ts = naive_date_to_offset_datetime("2024-03-15".parse().unwrap());
        assert_eq!(ts.year(), 2024);
        assert_eq!(ts.month() as u8, 3);
        assert_eq!(ts.day(), 15);
        assert_eq!(ts.hour(), 0);
    }

    #[test]
    fn test_yahoo_error_classification() {
        let err = classify_yahoo_error(
            "7203.T",
            yahoo_finance_api::YahooError::FetchFailed("timeout".into()),
        );
        assert!(err.is_retryable());

        let err = classify_yahoo_error("XXXX", yahoo_finance_api::YahooError::NoResult);
        assert!(matches!(err, ProviderError::NotFound(_)));
    }
}
