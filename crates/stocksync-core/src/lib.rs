//! # StockSync Core
//!
//! 시세 동기화 엔진의 핵심 도메인 모델 및 타입을 제공합니다.
//!
//! 이 크레이트는 동기화 시스템 전반에서 사용되는 기본 타입을 제공합니다:
//! - 일별 시세 데이터 구조체 (PricePoint)
//! - 커버리지/갭 분석용 파생 타입 (Coverage, GapPeriod)
//! - 데이터 Provider 추상화 (PriceProvider, ProviderError)

pub mod domain;

pub use domain::*;
