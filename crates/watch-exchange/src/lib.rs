//! 거래소 연결 및 응답 분류.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - AccountApi trait: 포지션/지갑 잔고 조회 인터페이스
//! - Bybit V5 REST 커넥터 (HMAC-SHA256 서명)
//! - 원시 응답 타입과 rate limit 헤더
//! - Rate limit 판정 (정상 / 한도 근접 / 한도 초과)
//! - 초기 자격증명 검증

pub mod connector;
pub mod error;
pub mod rate_limit;
pub mod response;
pub mod traits;
pub mod validation;

pub use connector::BybitClient;
pub use error::*;
pub use rate_limit::{classify, RateLimitVerdict};
pub use response::*;
pub use traits::*;
pub use validation::validate_credentials;
