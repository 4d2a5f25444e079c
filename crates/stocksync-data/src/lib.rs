//! # StockSync Data
//!
//! 시세 동기화 엔진의 저장소 및 외부 데이터 소스 계층입니다.
//!
//! - **storage**: PostgreSQL 기반 시세 저장(Upsert), 체크포인트, Failure Ledger
//! - **provider**: 외부 소스(Alpha Vantage, Yahoo Finance) 클라이언트와
//!   우선순위 fallback 체인

pub mod error;
pub mod provider;
pub mod storage;

pub use error::{DataError, Result};
pub use provider::{AlphaVantageProvider, FetchOutcome, ProviderChain, YahooProvider};
pub use storage::checkpoint::{CheckpointStore, RunStatus, StockOutcome, SyncRun};
pub use storage::connect_pool;
pub use storage::failures::{FailureLedger, MAX_CONSECUTIVE_FAILURES};
pub use storage::prices::PriceStore;
