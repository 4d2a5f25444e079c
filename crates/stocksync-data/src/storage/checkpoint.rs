//! 동기화 실행(run) 체크포인트 저장소.
//!
//! 장시간 실행되는 backfill의 중단/재개를 지원합니다.
//!
//! # 주요 기능
//!
//! - **실행 단위 기록**: `sync_runs` 행 하나가 한 번의 실행을 나타냄
//! - **종목 단위 진행 기록**: 매 종목 처리 후 카운터 갱신
//! - **식별자 기반 재개**: 처리 완료 종목을 `sync_run_stocks`에 종목코드로
//!   기록하여, 유니버스 순서가 바뀌어도 재개가 어긋나지 않음
//!
//! # 사용 예
//!
//! ```rust,ignore
//! // 실행 시작 시
//! let run_id = match store.get_incomplete_run().await? {
//!     Some(run) => run.run_id, // 재개
//!     None => store.start_run(total, priority_total).await?,
//! };
//!
//! // 종목 처리 후
//! store.mark_stock_processed(run_id, "7203", StockOutcome::Succeeded).await?;
//! store.update_progress(run_id, processed, successful, failed, prio).await?;
//!
//! // 완료 시
//! store.complete_run(run_id).await?;
//! ```

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use sqlx::FromRow;
use tracing::info;
use uuid::Uuid;

use crate::error::{DataError, Result};

/// 실행 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// 실행 중 (중단 시 재개 대상)
    Running,
    /// 정상 완료
    Completed,
    /// 실패 (또는 fresh 실행으로 대체됨)
    Failed,
    /// 부분 완료
    Partial,
}

impl RunStatus {
    /// 문자열로 변환.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Partial => "partial",
        }
    }

    /// DB 문자열에서 파싱.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "partial" => Some(Self::Partial),
            _ => None,
        }
    }
}

/// 종목 단위 처리 결과.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockOutcome {
    /// 데이터 수집 및 저장 성공
    Succeeded,
    /// 기존 데이터가 충분하여 건너뜀 (성공으로 집계)
    Skipped,
    /// 이번 사이클에서 실패
    Failed,
}

impl StockOutcome {
    /// 문자열로 변환.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        }
    }

    /// DB 문자열에서 파싱.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "succeeded" => Some(Self::Succeeded),
            "skipped" => Some(Self::Skipped),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// 동기화 실행 레코드.
#[derive(Debug, Clone, FromRow)]
pub struct SyncRun {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: String,
    pub error_message: Option<String>,
    pub checkpoint_stocks_total: i32,
    pub checkpoint_stocks_processed: i32,
    pub checkpoint_stocks_successful: i32,
    pub checkpoint_stocks_failed: i32,
    pub checkpoint_priority_total: i32,
    pub checkpoint_priority_processed: i32,
    pub prices_records_updated: i64,
}

const RUN_COLUMNS: &str = r#"
    run_id, started_at, completed_at, status, error_message,
    checkpoint_stocks_total, checkpoint_stocks_processed,
    checkpoint_stocks_successful, checkpoint_stocks_failed,
    checkpoint_priority_total, checkpoint_priority_processed,
    prices_records_updated
"#;

/// 체크포인트 저장소.
#[derive(Clone)]
pub struct CheckpointStore {
    pool: PgPool,
}

impl CheckpointStore {
    /// 새로운 체크포인트 저장소 생성.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 새 실행 생성 (running 상태).
    ///
    /// 실패는 치명적 에러로 취급되어 전체 실행을 중단시킵니다.
    pub async fn start_run(&self, total: i32, priority_total: i32) -> Result<Uuid> {
        let run_id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO sync_runs (
                run_id, started_at, status,
                checkpoint_stocks_total, checkpoint_priority_total
            )
            VALUES ($1, NOW(), 'running', $2, $3)
            "#,
        )
        .bind(run_id)
        .bind(total)
        .bind(priority_total)
        .execute(&self.pool)
        .await?;

        info!(run_id = %run_id, total = total, priority_total = priority_total, "새 동기화 실행 생성");
        Ok(run_id)
    }

    /// 가장 최근의 미완료 실행 조회.
    ///
    /// 시작 시 재개 여부 결정에 사용합니다.
    pub async fn get_incomplete_run(&self) -> Result<Option<SyncRun>> {
        let query = format!(
            "SELECT {RUN_COLUMNS} FROM sync_runs WHERE status = 'running' ORDER BY started_at DESC LIMIT 1"
        );

        let run: Option<SyncRun> = sqlx::query_as(&query).fetch_optional(&self.pool).await?;
        Ok(run)
    }

    /// 실행 단건 조회.
    pub async fn get_run(&self, run_id: Uuid) -> Result<SyncRun> {
        let query = format!("SELECT {RUN_COLUMNS} FROM sync_runs WHERE run_id = $1");

        let run: Option<SyncRun> = sqlx::query_as(&query)
            .bind(run_id)
            .fetch_optional(&self.pool)
            .await?;

        run.ok_or_else(|| DataError::NotFound(format!("sync run {}", run_id)))
    }

    /// 최근 실행 목록 조회 (status CLI용).
    pub async fn list_runs(&self, limit: i64) -> Result<Vec<SyncRun>> {
        let query =
            format!("SELECT {RUN_COLUMNS} FROM sync_runs ORDER BY started_at DESC LIMIT $1");

        let runs: Vec<SyncRun> = sqlx::query_as(&query)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(runs)
    }

    /// 진행 카운터 갱신.
    ///
    /// 단조 증가하는 값으로 반복 호출해도 안전합니다. 호출 실패는 전체
    /// 실행을 중단시키지 않습니다 (호출 측에서 로그 후 계속).
    pub async fn update_progress(
        &self,
        run_id: Uuid,
        processed: i32,
        successful: i32,
        failed: i32,
        priority_processed: i32,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE sync_runs
            SET checkpoint_stocks_processed = $2,
                checkpoint_stocks_successful = $3,
                checkpoint_stocks_failed = $4,
                checkpoint_priority_processed = $5
            WHERE run_id = $1
            "#,
        )
        .bind(run_id)
        .bind(processed)
        .bind(successful)
        .bind(failed)
        .bind(priority_processed)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// 전체 종목 수 갱신 (재개 시 유니버스 크기가 달라진 경우).
    ///
    /// processed가 total을 넘지 않는다는 불변식을 유지하기 위해 사용합니다.
    pub async fn update_totals(
        &self,
        run_id: Uuid,
        total: i32,
        priority_total: i32,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE sync_runs
            SET checkpoint_stocks_total = $2,
                checkpoint_priority_total = $3
            WHERE run_id = $1
            "#,
        )
        .bind(run_id)
        .bind(total)
        .bind(priority_total)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// 누적 저장 레코드 수 갱신.
    ///
    /// 종목 카운터와 분리되어 있습니다 (레코드 수는 종목 수와 주기가 다름).
    pub async fn update_prices_count(&self, run_id: Uuid, total_records: i64) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE sync_runs
            SET prices_records_updated = $2
            WHERE run_id = $1
            "#,
        )
        .bind(run_id)
        .bind(total_records)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// 실행을 completed로 종결.
    ///
    /// running 상태가 아니면 `InvalidTransition` 에러를 반환합니다.
    pub async fn complete_run(&self, run_id: Uuid) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE sync_runs
            SET status = 'completed', completed_at = NOW()
            WHERE run_id = $1 AND status = 'running'
            "#,
        )
        .bind(run_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DataError::InvalidTransition(format!(
                "run {} is not in running state",
                run_id
            )));
        }

        info!(run_id = %run_id, "동기화 실행 완료");
        Ok(())
    }

    /// 실행을 failed로 종결 (사유 기록).
    ///
    /// 치명적 에러뿐 아니라, fresh 실행이 stale한 미완료 실행을 명시적으로
    /// 대체할 때도 사용합니다.
    pub async fn fail_run(&self, run_id: Uuid, reason: &str) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE sync_runs
            SET status = 'failed', completed_at = NOW(), error_message = $2
            WHERE run_id = $1 AND status = 'running'
            "#,
        )
        .bind(run_id)
        .bind(reason)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DataError::InvalidTransition(format!(
                "run {} is not in running state",
                run_id
            )));
        }

        info!(run_id = %run_id, reason = reason, "동기화 실행 실패 처리");
        Ok(())
    }

    /// 종목 처리 결과를 현재 실행에 기록.
    ///
    /// (run_id, stock_code) 키 Upsert이므로 재처리에도 멱등합니다.
    pub async fn mark_stock_processed(
        &self,
        run_id: Uuid,
        stock_code: &str,
        outcome: StockOutcome,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sync_run_stocks (run_id, stock_code, outcome, processed_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (run_id, stock_code)
            DO UPDATE SET outcome = EXCLUDED.outcome, processed_at = NOW()
            "#,
        )
        .bind(run_id)
        .bind(stock_code)
        .bind(outcome.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// 현재 실행에서 이미 처리된 종목 집합 로드 (재개 경로).
    pub async fn load_processed_stocks(
        &self,
        run_id: Uuid,
    ) -> Result<HashMap<String, StockOutcome>> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            r#"
            SELECT stock_code, outcome
            FROM sync_run_stocks
            WHERE run_id = $1
            "#,
        )
        .bind(run_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(code, outcome)| StockOutcome::parse(&outcome).map(|o| (code, o)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_status_roundtrip() {
        for status in [
            RunStatus::Running,
            RunStatus::Completed,
            RunStatus::Failed,
            RunStatus::Partial,
        ] {
            assert_eq!(RunStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(RunStatus::parse("interrupted"), None);
    }

    #[test]
    fn test_stock_outcome_roundtrip() {
        for outcome in [
            StockOutcome::Succeeded,
            StockOutcome::Skipped,
            StockOutcome::Failed,
        ] {
            assert_eq!(StockOutcome::parse(outcome.as_str()), Some(outcome));
        }
        assert_eq!(StockOutcome::parse("pending"), None);
    }
}
