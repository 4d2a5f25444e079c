//! 종목별 연속 실패 원장 (Failure Ledger).
//!
//! 재시도 정책을 한 곳에 모읍니다: 연속 실패 횟수가
//! `MAX_CONSECUTIVE_FAILURES`에 도달한 종목은 현재 사이클에서 제외되고,
//! 다음 실행에서는 다시 시도 대상이 됩니다 (영구 블랙리스트가 아님).
//!
//! 카운터는 성공이 리셋할 때까지 단조 증가합니다.

use sqlx::postgres::PgPool;
use tracing::debug;

use crate::error::Result;

/// 사이클 내 제외 기준이 되는 연속 실패 횟수.
pub const MAX_CONSECUTIVE_FAILURES: i32 = 3;

/// 연속 실패 원장.
#[derive(Clone)]
pub struct FailureLedger {
    pool: PgPool,
}

impl FailureLedger {
    /// 새로운 원장 생성.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 실패 기록 및 갱신된 연속 실패 횟수 반환.
    ///
    /// # Arguments
    /// * `stock_code` - 종목코드
    /// * `error_class` - 에러 분류 (`ProviderError::class()` 참고)
    pub async fn record_failure(&self, stock_code: &str, error_class: &str) -> Result<i32> {
        let (count,): (i32,) = sqlx::query_as(
            r#"
            INSERT INTO sync_failures (stock_code, failure_count, last_error, updated_at)
            VALUES ($1, 1, $2, NOW())
            ON CONFLICT (stock_code)
            DO UPDATE SET
                failure_count = sync_failures.failure_count + 1,
                last_error = EXCLUDED.last_error,
                updated_at = NOW()
            RETURNING failure_count
            "#,
        )
        .bind(stock_code)
        .bind(error_class)
        .fetch_one(&self.pool)
        .await?;

        debug!(
            stock_code = stock_code,
            failure_count = count,
            error_class = error_class,
            "실패 기록"
        );

        Ok(count)
    }

    /// 성공 시 카운터 리셋.
    pub async fn reset(&self, stock_code: &str) -> Result<()> {
        sqlx::query("DELETE FROM sync_failures WHERE stock_code = $1")
            .bind(stock_code)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// 현재 연속 실패 횟수 조회 (기록 없으면 0).
    pub async fn failure_count(&self, stock_code: &str) -> Result<i32> {
        let row: Option<(i32,)> =
            sqlx::query_as("SELECT failure_count FROM sync_failures WHERE stock_code = $1")
                .bind(stock_code)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(c,)| c).unwrap_or(0))
    }
}
