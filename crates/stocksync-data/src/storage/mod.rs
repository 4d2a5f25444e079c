//! PostgreSQL 저장소 모듈.

use sqlx::postgres::PgPool;

use crate::error::{DataError, Result};

pub mod checkpoint;
pub mod failures;
pub mod prices;

pub use checkpoint::{CheckpointStore, RunStatus, StockOutcome, SyncRun};
pub use failures::{FailureLedger, MAX_CONSECUTIVE_FAILURES};
pub use prices::PriceStore;

/// PostgreSQL 연결 풀 생성.
///
/// 시작 시점의 연결 실패는 치명적 에러이며 `ConnectionError`로 구분됩니다.
pub async fn connect_pool(database_url: &str) -> Result<PgPool> {
    PgPool::connect(database_url)
        .await
        .map_err(|e| DataError::ConnectionError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_pool_invalid_url_is_connection_error() {
        let err = connect_pool("not-a-database-url").await.unwrap_err();
        assert!(matches!(err, DataError::ConnectionError(_)));
    }
}
