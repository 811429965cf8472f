//! # Watch Core
//!
//! Bybit 계좌 감시기의 핵심 도메인 모델 및 타입을 제공합니다.
//!
//! 이 크레이트는 워크스페이스 전반에서 사용되는 기본 타입을 제공합니다:
//! - 포지션, 잔고, 스냅샷 도메인 타입
//! - 폴링 사이클 에러 분류 체계
//! - 설정 관리
//! - 로깅 인프라
//! - API 자격증명 보관

pub mod config;
pub mod credentials;
pub mod domain;
pub mod error;
pub mod logging;
pub mod types;

pub use config::*;
pub use credentials::Credentials;
pub use domain::*;
pub use error::*;
pub use logging::*;
pub use types::*;
