//! 계좌 감시기의 에러 타입.
//!
//! 폴링 사이클과 초기 검증에서 발생할 수 있는 모든 실패는
//! 아래 다섯 가지 종류 중 하나로 분류됩니다.

use serde::Serialize;
use thiserror::Error;

use crate::domain::DegradedResponse;

/// 계좌 감시 에러.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WatchError {
    /// 잘못된 자격증명 (초기 검증 단계에서만 발생)
    #[error("인증 실패: {message}")]
    InvalidAuth { message: String },

    /// 네트워크/전송 계층 실패
    #[error("연결 실패: {message}")]
    CannotConnect { message: String },

    /// 요청 한도 초과 (하드 스로틀링)
    #[error("요청 한도 초과 (code {code}): {message}")]
    RateLimitExceeded { code: i64, message: String },

    /// 한쪽 호출이 애플리케이션 에러 코드를 반환함 (빈 데이터로 대체)
    #[error("응답 품질 저하: {0}")]
    DegradedResponse(DegradedResponse),

    /// 그 밖의 예기치 못한 실패
    #[error("예기치 못한 실패: {message}")]
    UnexpectedFailure { message: String },
}

/// 계좌 감시 작업을 위한 Result 타입.
pub type WatchResult<T> = Result<T, WatchError>;

impl WatchError {
    /// 인증 실패 에러를 생성합니다.
    pub fn invalid_auth(message: impl Into<String>) -> Self {
        Self::InvalidAuth {
            message: message.into(),
        }
    }

    /// 연결 실패 에러를 생성합니다.
    pub fn cannot_connect(message: impl Into<String>) -> Self {
        Self::CannotConnect {
            message: message.into(),
        }
    }

    /// 예기치 못한 실패 에러를 생성합니다.
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::UnexpectedFailure {
            message: message.into(),
        }
    }

    /// 초기 검증 단계에서 활성화를 막는 에러인지 확인합니다.
    pub fn blocks_activation(&self) -> bool {
        matches!(
            self,
            WatchError::InvalidAuth { .. } | WatchError::CannotConnect { .. }
        )
    }

    /// 요청 한도 초과 에러인지 확인합니다.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, WatchError::RateLimitExceeded { .. })
    }

    /// 로그 필드용 짧은 종류 이름.
    pub fn kind(&self) -> &'static str {
        match self {
            WatchError::InvalidAuth { .. } => "invalid_auth",
            WatchError::CannotConnect { .. } => "cannot_connect",
            WatchError::RateLimitExceeded { .. } => "rate_limit_exceeded",
            WatchError::DegradedResponse(_) => "degraded_response",
            WatchError::UnexpectedFailure { .. } => "unexpected_failure",
        }
    }
}

impl From<DegradedResponse> for WatchError {
    fn from(degraded: DegradedResponse) -> Self {
        WatchError::DegradedResponse(degraded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Endpoint;

    #[test]
    fn test_setup_errors_block_activation() {
        assert!(WatchError::invalid_auth("bad key").blocks_activation());
        assert!(WatchError::cannot_connect("dns").blocks_activation());

        let limited = WatchError::RateLimitExceeded {
            code: 10006,
            message: "Too many visits!".to_string(),
        };
        assert!(!limited.blocks_activation());
        assert!(limited.is_rate_limited());
    }

    #[test]
    fn test_degraded_conversion() {
        let degraded = DegradedResponse::new(Endpoint::WalletBalance, 10001, "params error");
        let err: WatchError = degraded.into();

        assert_eq!(err.kind(), "degraded_response");
        assert!(err.to_string().contains("wallet_balance"));
    }
}
