//! 일별 시세 도메인 타입.
//!
//! 종목별 일봉(OHLCV + 수정종가) 데이터와, 저장된 시계열로부터 파생되는
//! 커버리지/갭 분석용 타입을 정의합니다.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 일별 시세 한 건.
///
/// (종목코드, 거래일)로 유일하게 식별됩니다. 저장 시에는 항상 Upsert로
/// 처리되므로 같은 (종목코드, 거래일)을 다시 쓰면 마지막 값이 남습니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    /// 종목코드
    pub stock_code: String,
    /// 거래일
    pub date: NaiveDate,
    /// 시가
    pub open: Decimal,
    /// 고가
    pub high: Decimal,
    /// 저가
    pub low: Decimal,
    /// 종가
    pub close: Decimal,
    /// 수정종가
    pub adjusted_close: Decimal,
    /// 거래량
    pub volume: i64,
}

/// 종목별 저장 데이터 커버리지.
///
/// 갭 분석기의 입력으로, `stock_prices` 집계 쿼리에서 파생됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Coverage {
    /// 가장 오래된 저장 거래일
    pub earliest: NaiveDate,
    /// 가장 최근 저장 거래일
    pub latest: NaiveDate,
    /// 저장된 행 수
    pub rows: i64,
}

impl Coverage {
    /// 저장된 기간의 달력일 수 (latest - earliest).
    pub fn span_days(&self) -> i64 {
        (self.latest - self.earliest).num_days()
    }
}

/// 시계열 갭 구간 (양 끝 포함).
///
/// 인접한 저장 거래일 간 간격이 기대 거래일 주기를 초과할 때, 그 사이의
/// 누락 구간을 나타냅니다. 저장되지 않고 필요할 때마다 재계산됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GapPeriod {
    /// 누락 구간 시작일
    pub start: NaiveDate,
    /// 누락 구간 종료일
    pub end: NaiveDate,
}

impl GapPeriod {
    /// 인접한 두 저장 거래일 사이의 누락 구간 생성.
    ///
    /// `prev`와 `next`는 저장된 날짜이므로 구간에서 제외됩니다.
    pub fn between(prev: NaiveDate, next: NaiveDate) -> Self {
        Self {
            start: prev + chrono::Duration::days(1),
            end: next - chrono::Duration::days(1),
        }
    }

    /// 구간 길이 (달력일 수).
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn test_gap_between_excludes_endpoints() {
        let gap = GapPeriod::between(d("2024-01-05"), d("2024-01-15"));
        assert_eq!(gap.start, d("2024-01-06"));
        assert_eq!(gap.end, d("2024-01-14"));
        assert_eq!(gap.days(), 9);
    }

    #[test]
    fn test_coverage_span_days() {
        let coverage = Coverage {
            earliest: d("2014-01-01"),
            latest: d("2024-01-01"),
            rows: 2500,
        };
        assert_eq!(coverage.span_days(), 3652);
    }
}
