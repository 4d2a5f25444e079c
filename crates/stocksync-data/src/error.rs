//! 데이터 모듈 오류 타입.

use thiserror::Error;

use stocksync_core::ProviderError;

/// 데이터 관련 오류.
#[derive(Debug, Error)]
pub enum DataError {
    /// 데이터베이스 연결 오류
    #[error("Database connection error: {0}")]
    ConnectionError(String),

    /// 쿼리 실행 오류
    #[error("Query error: {0}")]
    QueryError(String),

    /// 레코드를 찾을 수 없음
    #[error("Record not found: {0}")]
    NotFound(String),

    /// 데이터 삽입 오류
    #[error("Insert error: {0}")]
    InsertError(String),

    /// 잘못된 상태 전이 (예: running이 아닌 run 완료 시도)
    #[error("Invalid state transition: {0}")]
    InvalidTransition(String),

    /// 모든 Provider에서 데이터 조회 실패
    #[error("All providers exhausted for {stock_code}: {last_error}")]
    ProvidersExhausted {
        /// 대상 종목코드
        stock_code: String,
        /// 마지막 Provider의 에러 (데이터 없음 포함)
        last_error: String,
    },

    /// 외부 소스 조회 오류
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// 취소 신호로 중단됨
    #[error("Operation cancelled")]
    Cancelled,

    /// 연결 풀 소진
    #[error("Connection pool exhausted")]
    PoolExhausted,
}

impl From<sqlx::Error> for DataError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DataError::NotFound("Row not found".to_string()),
            sqlx::Error::PoolTimedOut => DataError::PoolExhausted,
            sqlx::Error::Database(db_err) => DataError::QueryError(db_err.message().to_string()),
            _ => DataError::QueryError(err.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, DataError>;
