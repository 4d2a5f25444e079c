//! Resumable daily price synchronization engine.
//!
//! 이 crate는 다수의 불안정한 외부 소스로부터 대규모 종목 유니버스의
//! 일별 시세를 수집하는 바이너리를 제공합니다:
//! - 체크포인트 기반 중단/재개 (crash-safe)
//! - 우선순위 Provider fallback 체인 (소스별 rate limit 준수)
//! - 갭 분석 기반 불필요한 재수집 회피
//! - 연속 실패 상한 (사이클당 3회)

pub mod config;
pub mod error;
pub mod modules;
pub mod stats;

pub use config::CollectorConfig;
pub use error::{CollectorError, Result};
pub use stats::SyncStats;
