//! 동기화 모듈.

pub mod gap;
pub mod price_sync;
pub mod universe;

pub use gap::{plan_fetch, FetchPlan, GapPolicy};
pub use price_sync::{sync_prices, PriceSyncOptions};
pub use universe::{resolve_universe, UniverseEntry};
