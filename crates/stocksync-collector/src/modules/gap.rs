//! 갭 분석 기반 수집 계획 결정.
//!
//! 이미 저장된 데이터만 보고 종목별로 수집이 필요한지, 필요하다면 어느
//! 범위인지 결정합니다. 스킵 / 갭별 보수 / 전체 재수집의 3단계 정책이
//! 실행당 네트워크 비용을 좌우하는 핵심 장치입니다.
//!
//! # 정책
//!
//! - 저장 행 없음 → 전체 수집 (수집 지평 시작일 ~ 오늘)
//! - 저장 기간이 충분하고 갭 없음 → 스킵 (성공으로 집계)
//! - 기간 충분 + 갭이 소수(기본 10개 이하) → 갭 구간만 개별 수집
//! - 기간 충분 + 갭 다수 → 전체 재수집 (구간 나열 비용이 더 큼)
//! - 기간 부족 → 갭 수와 무관하게 전체 재수집
//!
//! 마지막 저장일 이후 오늘까지의 공백도 갭으로 취급하여, 매일 실행되는
//! 증분 수집이 스킵 판정에 막히지 않도록 합니다.

use chrono::NaiveDate;

use stocksync_core::{Coverage, GapPeriod};

/// 갭 분석 정책 파라미터.
#[derive(Debug, Clone, Copy)]
pub struct GapPolicy {
    /// 스킵 판정에 필요한 최소 저장 기간 (달력일)
    pub required_span_days: i64,
    /// 갭 판정 기준 (인접 저장일 간 달력일 초과분)
    pub gap_threshold_days: i64,
    /// 갭별 개별 수집을 선택하는 최대 갭 수
    pub max_gap_fill_ranges: usize,
}

/// 종목 하나에 대한 수집 계획.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchPlan {
    /// 기존 데이터가 충분함. Provider 호출 없음.
    Skip,
    /// 전체 범위 수집.
    Full { start: NaiveDate, end: NaiveDate },
    /// 갭 구간만 개별 수집.
    GapFill(Vec<GapPeriod>),
}

/// 커버리지와 갭 목록으로부터 수집 계획 결정.
///
/// # Arguments
/// * `coverage` - 저장 커버리지 (`None`이면 저장 행 없음)
/// * `gaps` - 저장 구간 내부의 갭 목록
/// * `horizon_start` - 수집 지평 시작일 (lookback 기준)
/// * `today` - 오늘 (수집 종료일)
pub fn plan_fetch(
    coverage: Option<&Coverage>,
    gaps: &[GapPeriod],
    horizon_start: NaiveDate,
    today: NaiveDate,
    policy: &GapPolicy,
) -> FetchPlan {
    let full = FetchPlan::Full {
        start: horizon_start,
        end: today,
    };

    let coverage = match coverage {
        Some(c) if c.rows > 0 => c,
        _ => return full,
    };

    if coverage.span_days() < policy.required_span_days {
        return full;
    }

    // 마지막 저장일 이후의 공백도 갭으로 취급 (증분 수집 경로)
    let mut effective: Vec<GapPeriod> = gaps.to_vec();
    if (today - coverage.latest).num_days() > policy.gap_threshold_days {
        effective.push(GapPeriod {
            start: coverage.latest + chrono::Duration::days(1),
            end: today,
        });
    }

    if effective.is_empty() {
        FetchPlan::Skip
    } else if effective.len() <= policy.max_gap_fill_ranges {
        FetchPlan::GapFill(effective)
    } else {
        full
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn policy() -> GapPolicy {
        GapPolicy {
            required_span_days: 3620, // 10년 - 30일 여유
            gap_threshold_days: 4,
            max_gap_fill_ranges: 10,
        }
    }

    fn full_coverage(today: NaiveDate) -> Coverage {
        Coverage {
            earliest: today - chrono::Duration::days(3650),
            latest: today - chrono::Duration::days(1),
            rows: 2500,
        }
    }

    #[test]
    fn test_empty_store_full_fetch() {
        let today = d("2024-06-03");
        let horizon = d("2014-06-03");

        let plan = plan_fetch(None, &[], horizon, today, &policy());
        assert_eq!(
            plan,
            FetchPlan::Full {
                start: horizon,
                end: today
            }
        );
    }

    #[test]
    fn test_sufficient_span_no_gaps_skips() {
        let today = d("2024-06-03");
        let coverage = full_coverage(today);

        let plan = plan_fetch(Some(&coverage), &[], d("2014-06-03"), today, &policy());
        assert_eq!(plan, FetchPlan::Skip);
    }

    #[test]
    fn test_single_gap_fetches_exactly_that_range() {
        let today = d("2024-06-03");
        let coverage = full_coverage(today);
        // 2024-03-01과 2024-03-11 사이가 비어 있음
        let gap = GapPeriod::between(d("2024-03-01"), d("2024-03-11"));

        let plan = plan_fetch(Some(&coverage), &[gap], d("2014-06-03"), today, &policy());
        match plan {
            FetchPlan::GapFill(ranges) => {
                assert_eq!(ranges.len(), 1);
                assert_eq!(ranges[0].start, d("2024-03-02"));
                assert_eq!(ranges[0].end, d("2024-03-10"));
            }
            other => panic!("unexpected plan: {other:?}"),
        }
    }

    #[test]
    fn test_many_gaps_fall_back_to_full_fetch() {
        let today = d("2024-06-03");
        let coverage = full_coverage(today);

        let gaps: Vec<GapPeriod> = (1..=11)
            .map(|i| {
                let base = d("2023-01-01") + chrono::Duration::days(i * 30);
                GapPeriod::between(base, base + chrono::Duration::days(10))
            })
            .collect();

        let plan = plan_fetch(Some(&coverage), &gaps, d("2014-06-03"), today, &policy());
        assert!(matches!(plan, FetchPlan::Full { .. }));
    }

    #[test]
    fn test_insufficient_span_full_fetch_despite_no_gaps() {
        let today = d("2024-06-03");
        let coverage = Coverage {
            earliest: today - chrono::Duration::days(400),
            latest: today - chrono::Duration::days(1),
            rows: 270,
        };

        let plan = plan_fetch(Some(&coverage), &[], d("2014-06-03"), today, &policy());
        assert!(matches!(plan, FetchPlan::Full { .. }));
    }

    #[test]
    fn test_stale_latest_becomes_trailing_gap() {
        let today = d("2024-06-03");
        let coverage = Coverage {
            earliest: today - chrono::Duration::days(3700),
            latest: today - chrono::Duration::days(20),
            rows: 2500,
        };

        let plan = plan_fetch(Some(&coverage), &[], d("2014-06-03"), today, &policy());
        match plan {
            FetchPlan::GapFill(ranges) => {
                assert_eq!(ranges.len(), 1);
                assert_eq!(ranges[0].start, coverage.latest + chrono::Duration::days(1));
                assert_eq!(ranges[0].end, today);
            }
            other => panic!("unexpected plan: {other:?}"),
        }
    }
}
