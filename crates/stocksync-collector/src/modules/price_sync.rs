//! 일별 시세 동기화 오케스트레이터.
//!
//! 유니버스의 각 종목에 대해 갭 분석 → Provider 체인 조회 → 멱등 Upsert를
//! 순차적으로 수행합니다. 단일 워커 순차 처리가 의도된 설계입니다:
//! 처리량 병목은 Provider rate limit이므로 동시성은 이득 없이 체크포인트
//! 의미론만 복잡하게 만듭니다.
//!
//! # 주요 기능
//!
//! - **체크포인트 재개**: 미완료 실행이 있으면 처리 완료 종목을 건너뛰고
//!   카운터를 복원하여 이어서 진행
//! - **갭 분석**: 스킵 / 갭별 보수 / 전체 재수집 3단계 정책
//! - **Failure Ledger**: 연속 실패 상한 도달 종목은 이번 사이클 제외
//! - **Graceful shutdown**: 취소 신호 관측 시 현재 종목까지 기록하고 중단,
//!   실행은 running 상태로 남겨 다음 호출이 재개
//!
//! 진행 기록 실패(체크포인트, Failure Ledger)는 비치명적입니다:
//! 경고 로그 후 계속 진행하며, 최악의 경우 재개 시 일부 종목을 다시
//! 처리하지만 Upsert 멱등성이 정합성을 보장합니다.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{Duration, NaiveDate, Utc};
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use stocksync_core::PricePoint;
use stocksync_data::{
    AlphaVantageProvider, CheckpointStore, DataError, FailureLedger, PriceStore, ProviderChain,
    StockOutcome, YahooProvider, MAX_CONSECUTIVE_FAILURES,
};

use crate::config::CollectorConfig;
use crate::modules::gap::{plan_fetch, FetchPlan, GapPolicy};
use crate::modules::universe::{resolve_universe, UniverseEntry};
use crate::stats::SyncStats;
use crate::Result;

/// 시세 동기화 실행 옵션 (CLI 플래그에서 구성).
#[derive(Debug, Clone, Default)]
pub struct PriceSyncOptions {
    /// 수집 기간 (년). 없으면 설정값 사용
    pub lookback_years: Option<u32>,
    /// 처리할 최대 종목 수 (0이면 무제한)
    pub limit: usize,
    /// 우선순위 종목만 처리
    pub priority_only: bool,
    /// 갭 분석을 무시하고 전체 범위 재수집
    pub force: bool,
    /// 미완료 실행을 재개하지 않고 failed 처리 후 새로 시작
    pub fresh: bool,
    /// 단일 종목만 처리 (체크포인트 없이)
    pub stock: Option<String>,
}

/// 시세 동기화 실행.
pub async fn sync_prices(
    pool: &PgPool,
    config: &CollectorConfig,
    options: &PriceSyncOptions,
    shutdown: CancellationToken,
) -> Result<SyncStats> {
    let prices = PriceStore::new(pool.clone());
    let ledger = FailureLedger::new(pool.clone());
    let chain = build_provider_chain(config);

    let years = options.lookback_years.unwrap_or(config.price_sync.lookback_years);
    let today = Utc::now().date_naive();
    let horizon_start = today - Duration::days(years as i64 * 365);
    let policy = GapPolicy {
        required_span_days: years as i64 * 365 - config.price_sync.span_tolerance_days,
        gap_threshold_days: config.price_sync.gap_threshold_days as i64,
        max_gap_fill_ranges: config.price_sync.max_gap_fill_ranges,
    };

    // 단일 종목 모드는 체크포인트 없이 대상만 보수 (갭 분석 없이 전체 재수집)
    if let Some(stock_code) = &options.stock {
        let mut repair_options = options.clone();
        repair_options.force = true;
        return sync_single_stock(
            &prices, &ledger, &chain, stock_code, horizon_start, today, &policy,
            &repair_options, &shutdown,
        )
        .await;
    }

    let checkpoints = CheckpointStore::new(pool.clone());

    let mut universe = resolve_universe(pool, &config.universe).await?;
    if options.priority_only {
        universe.retain(|e| e.is_priority);
    }
    if options.limit > 0 && universe.len() > options.limit {
        universe.truncate(options.limit);
    }

    let total = universe.len();
    let priority_total = universe.iter().filter(|e| e.is_priority).count();
    info!(
        total = total,
        priority_total = priority_total,
        lookback_years = years,
        force = options.force,
        "시세 동기화 시작"
    );

    // ====== 실행 생성 또는 재개 ======
    let mut stats = SyncStats::new();
    stats.total = total;
    let mut priority_processed = 0usize;
    let mut already_processed: HashMap<String, StockOutcome> = HashMap::new();

    let run_id = match checkpoints.get_incomplete_run().await? {
        Some(run) if options.fresh => {
            warn!(run_id = %run.run_id, "미완료 실행을 fresh 옵션으로 대체");
            if let Err(e) = checkpoints
                .fail_run(run.run_id, "superseded by fresh run")
                .await
            {
                warn!(error = %e, "stale 실행 failed 처리 실패 (계속 진행)");
            }
            checkpoints
                .start_run(total as i32, priority_total as i32)
                .await?
        }
        Some(run) => {
            // 재개: 처리 완료 종목과 카운터 복원
            already_processed = checkpoints.load_processed_stocks(run.run_id).await?;
            stats.processed = run.checkpoint_stocks_processed as usize;
            stats.successful = run.checkpoint_stocks_successful as usize;
            stats.failed = run.checkpoint_stocks_failed as usize;
            stats.skipped = already_processed
                .values()
                .filter(|o| matches!(o, StockOutcome::Skipped))
                .count();
            stats.records_written = run.prices_records_updated as usize;
            priority_processed = run.checkpoint_priority_processed as usize;

            // 유니버스 크기가 실행 생성 시점과 달라졌으면 (예: --limit 변경)
            // total을 갱신해 processed <= total 불변식을 유지
            let resumed = resumed_total(run.checkpoint_stocks_total, total);
            let resumed_priority =
                resumed_total(run.checkpoint_priority_total, priority_total);
            if resumed != run.checkpoint_stocks_total
                || resumed_priority != run.checkpoint_priority_total
            {
                checkpoints
                    .update_totals(run.run_id, resumed, resumed_priority)
                    .await?;
            }
            stats.total = resumed as usize;

            info!(
                run_id = %run.run_id,
                processed = stats.processed,
                total = stats.total,
                "미완료 실행 재개"
            );
            run.run_id
        }
        None => {
            checkpoints
                .start_run(total as i32, priority_total as i32)
                .await?
        }
    };

    let started = Instant::now();

    // ====== 종목 순차 처리 ======
    for entry in &universe {
        if shutdown.is_cancelled() {
            stats.interrupted = true;
            break;
        }

        if already_processed.contains_key(&entry.stock_code) {
            debug!(stock_code = %entry.stock_code, "이전 실행에서 처리됨, 건너뜀");
            continue;
        }

        let records_before = stats.records_written;
        let outcome = match process_stock(
            &prices, &ledger, &chain, entry, horizon_start, today, &policy, options, &shutdown,
        )
        .await
        {
            Ok(StockResult::Fetched(records)) => {
                stats.records_written += records;
                stats.successful += 1;
                StockOutcome::Succeeded
            }
            Ok(StockResult::Skipped) => {
                stats.successful += 1;
                stats.skipped += 1;
                StockOutcome::Skipped
            }
            Err(DataError::Cancelled) => {
                // 현재 종목은 미완료로 남겨 재개 시 다시 처리
                stats.interrupted = true;
                break;
            }
            Err(e) => {
                error!(stock_code = %entry.stock_code, error = %e, "종목 동기화 실패");
                stats.failed += 1;
                match ledger.record_failure(&entry.stock_code, error_class(&e)).await {
                    Ok(count) if count >= MAX_CONSECUTIVE_FAILURES => {
                        warn!(
                            stock_code = %entry.stock_code,
                            failure_count = count,
                            "연속 실패 상한 도달, 이번 사이클 제외"
                        );
                    }
                    Ok(_) => {}
                    Err(ledger_err) => {
                        warn!(
                            stock_code = %entry.stock_code,
                            error = %ledger_err,
                            "실패 기록 저장 실패 (계속 진행)"
                        );
                    }
                }
                StockOutcome::Failed
            }
        };

        stats.processed += 1;
        if entry.is_priority {
            priority_processed += 1;
        }

        // ====== 진행 기록 (비치명적) ======
        if let Err(e) = checkpoints
            .mark_stock_processed(run_id, &entry.stock_code, outcome)
            .await
        {
            warn!(stock_code = %entry.stock_code, error = %e, "종목 처리 기록 실패 (계속 진행)");
        }
        if let Err(e) = checkpoints
            .update_progress(
                run_id,
                stats.processed as i32,
                stats.successful as i32,
                stats.failed as i32,
                priority_processed as i32,
            )
            .await
        {
            warn!(error = %e, "진행 카운터 갱신 실패 (계속 진행)");
        }
        // 레코드 카운터는 실제 쓰기가 있었던 종목에서만 갱신
        if stats.records_written > records_before {
            if let Err(e) = checkpoints
                .update_prices_count(run_id, stats.records_written as i64)
                .await
            {
                warn!(error = %e, "레코드 카운터 갱신 실패 (계속 진행)");
            }
        }
    }

    stats.elapsed = started.elapsed();

    // ====== 실행 종결 ======
    if stats.interrupted {
        // running으로 남겨 다음 호출이 재개하도록 함
        info!(
            run_id = %run_id,
            processed = stats.processed,
            total = stats.total,
            "취소 신호로 중단, 실행을 재개 가능 상태로 유지"
        );
    } else if let Err(e) = checkpoints.complete_run(run_id).await {
        warn!(run_id = %run_id, error = %e, "실행 완료 처리 실패");
    }

    stats.log_summary("price_sync");
    Ok(stats)
}

/// 종목 하나의 처리 결과.
enum StockResult {
    /// Provider 조회 후 저장된 레코드 수
    Fetched(usize),
    /// 기존 데이터 충분
    Skipped,
}

/// 종목 하나 처리: 계획 수립 → 범위별 조회 → 일괄 Upsert.
#[allow(clippy::too_many_arguments)]
async fn process_stock(
    prices: &PriceStore,
    ledger: &FailureLedger,
    chain: &ProviderChain,
    entry: &UniverseEntry,
    horizon_start: NaiveDate,
    today: NaiveDate,
    policy: &GapPolicy,
    options: &PriceSyncOptions,
    shutdown: &CancellationToken,
) -> std::result::Result<StockResult, DataError> {
    let plan = if options.force {
        FetchPlan::Full {
            start: horizon_start,
            end: today,
        }
    } else {
        let coverage = prices.get_coverage(&entry.stock_code).await?;
        let gaps = prices
            .get_gaps(&entry.stock_code, policy.gap_threshold_days as i32)
            .await?;
        plan_fetch(coverage.as_ref(), &gaps, horizon_start, today, policy)
    };

    let ranges: Vec<(NaiveDate, NaiveDate)> = match plan {
        FetchPlan::Skip => {
            debug!(stock_code = %entry.stock_code, "기존 데이터 충분, 건너뜀");
            return Ok(StockResult::Skipped);
        }
        FetchPlan::Full { start, end } => vec![(start, end)],
        FetchPlan::GapFill(gaps) => {
            info!(
                stock_code = %entry.stock_code,
                gap_count = gaps.len(),
                "갭 구간 보수 수집"
            );
            gaps.into_iter().map(|g| (g.start, g.end)).collect()
        }
    };

    let mut records: Vec<PricePoint> = Vec::new();
    for (start, end) in ranges {
        let outcome = chain
            .fetch_with_fallback(&entry.stock_code, start, end, shutdown)
            .await?;
        debug!(
            stock_code = %entry.stock_code,
            provider = outcome.provider,
            records = outcome.records.len(),
            "범위 수집 완료"
        );
        records.extend(outcome.records);
    }

    let written = prices.upsert_prices(&records).await?;

    if let Err(e) = ledger.reset(&entry.stock_code).await {
        warn!(stock_code = %entry.stock_code, error = %e, "실패 카운터 리셋 실패 (계속 진행)");
    }

    Ok(StockResult::Fetched(written))
}

/// 단일 종목 보수 모드.
///
/// 체크포인트를 만들지 않아 미완료 실행과 경합하지 않습니다.
#[allow(clippy::too_many_arguments)]
async fn sync_single_stock(
    prices: &PriceStore,
    ledger: &FailureLedger,
    chain: &ProviderChain,
    stock_code: &str,
    horizon_start: NaiveDate,
    today: NaiveDate,
    policy: &GapPolicy,
    options: &PriceSyncOptions,
    shutdown: &CancellationToken,
) -> Result<SyncStats> {
    info!(stock_code = stock_code, "단일 종목 동기화 시작");

    let entry = UniverseEntry {
        stock_code: stock_code.to_string(),
        is_priority: false,
    };

    let started = Instant::now();
    let mut stats = SyncStats::new();
    stats.total = 1;
    stats.processed = 1;

    match process_stock(
        prices, ledger, chain, &entry, horizon_start, today, policy, options, shutdown,
    )
    .await
    {
        Ok(StockResult::Fetched(records)) => {
            stats.records_written = records;
            stats.successful = 1;
        }
        Ok(StockResult::Skipped) => {
            stats.successful = 1;
            stats.skipped = 1;
        }
        Err(DataError::Cancelled) => {
            stats.processed = 0;
            stats.interrupted = true;
        }
        Err(e) => {
            error!(stock_code = stock_code, error = %e, "종목 동기화 실패");
            stats.failed = 1;
            if let Err(ledger_err) = ledger.record_failure(stock_code, error_class(&e)).await {
                warn!(error = %ledger_err, "실패 기록 저장 실패");
            }
        }
    }

    stats.elapsed = started.elapsed();
    stats.log_summary("price_sync_single");
    Ok(stats)
}

/// 설정에 따라 Provider 체인 구성.
///
/// Alpha Vantage는 API 키가 있을 때만 1차 소스로 추가되고, Yahoo Finance는
/// 항상 fallback으로 포함됩니다.
pub fn build_provider_chain(config: &CollectorConfig) -> ProviderChain {
    let mut chain = ProviderChain::new();

    if let Some(api_key) = &config.providers.alpha_vantage_api_key {
        chain = chain.with_provider(Arc::new(AlphaVantageProvider::new(
            api_key.clone(),
            config.providers.alpha_vantage_delay(),
        )));
    } else {
        warn!("ALPHA_VANTAGE_API_KEY 미설정, Yahoo Finance만 사용");
    }

    chain.with_provider(Arc::new(YahooProvider::new(config.providers.yahoo_delay())))
}

/// 재개 시 유효 전체 종목 수.
///
/// 재개 호출의 유니버스가 실행 생성 시점과 다를 수 있으므로 (예: `--limit`
/// 없이 재개), 기록된 total과 현재 유니버스 크기 중 큰 쪽을 택해
/// processed가 total을 넘지 않도록 합니다.
fn resumed_total(recorded: i32, universe_len: usize) -> i32 {
    recorded.max(universe_len as i32)
}

/// Failure Ledger에 기록할 에러 분류 문자열.
fn error_class(err: &DataError) -> &'static str {
    match err {
        DataError::ProvidersExhausted { .. } => "providers_exhausted",
        DataError::Provider(e) => e.class(),
        DataError::InsertError(_) => "storage",
        _ => "internal",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PriceSyncConfig, ProviderConfig, UniverseConfig};

    fn config_without_key() -> CollectorConfig {
        CollectorConfig {
            database_url: "postgres://localhost/test".to_string(),
            price_sync: PriceSyncConfig {
                lookback_years: 10,
                span_tolerance_days: 30,
                gap_threshold_days: 4,
                max_gap_fill_ranges: 10,
            },
            providers: ProviderConfig {
                alpha_vantage_api_key: None,
                alpha_vantage_delay_ms: 12_000,
                yahoo_delay_ms: 500,
            },
            universe: UniverseConfig { file: None },
        }
    }

    #[test]
    fn test_chain_without_api_key_has_only_yahoo() {
        let chain = build_provider_chain(&config_without_key());
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn test_chain_with_api_key_has_both_providers() {
        let mut config = config_without_key();
        config.providers.alpha_vantage_api_key = Some("demo".to_string());

        let chain = build_provider_chain(&config);
        assert_eq!(chain.len(), 2);
    }

    #[test]
    fn test_resumed_total_grows_with_larger_universe() {
        // --limit 10으로 시작한 실행을 제한 없이 재개하는 경우:
        // total이 유니버스 크기로 갱신되어 processed가 total을 넘지 않음
        assert_eq!(resumed_total(10, 500), 500);
    }

    #[test]
    fn test_resumed_total_keeps_recorded_when_universe_shrinks() {
        // 반대로 더 작은 유니버스로 재개해도 기록된 total을 줄이지 않음
        // (이미 processed가 그만큼 진행되었을 수 있음)
        assert_eq!(resumed_total(500, 10), 500);
        assert_eq!(resumed_total(100, 100), 100);
    }

    #[test]
    fn test_error_class_mapping() {
        let err = DataError::ProvidersExhausted {
            stock_code: "7203".to_string(),
            last_error: "yahoo: empty result".to_string(),
        };
        assert_eq!(error_class(&err), "providers_exhausted");
        assert_eq!(error_class(&DataError::InsertError("boom".into())), "storage");
    }
}
