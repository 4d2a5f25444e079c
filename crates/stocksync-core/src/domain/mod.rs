//! 도메인 모델 모듈.

pub mod price;
pub mod provider;

pub use price::{Coverage, GapPeriod, PricePoint};
pub use provider::{PriceProvider, ProviderError};
