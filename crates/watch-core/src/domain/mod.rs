//! 도메인 모델.
//!
//! - `position`: 개별 포지션
//! - `balance`: 계좌 및 자산별 잔고
//! - `snapshot`: 한 번의 성공한 폴링 사이클 결과

pub mod balance;
pub mod position;
pub mod snapshot;

pub use balance::*;
pub use position::*;
pub use snapshot::*;
