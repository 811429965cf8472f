//! 거래소 에러 타입.
//!
//! 전송 계층 실패만 표현합니다. 2xx 응답 본문에 담긴 retCode는 에러가 아니라
//! `RawResponse`의 일부로 전달됩니다.

use thiserror::Error;
use watch_core::WatchError;

/// 거래소 관련 에러.
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// 네트워크/연결 에러 (DNS, TLS, 연결 거부)
    #[error("Network error: {0}")]
    NetworkError(String),

    /// 타임아웃
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// 인증/권한 에러 (HTTP 401/403)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// HTTP 수준 요청 한도 초과 (429 또는 IP 빈도 제한)
    #[error("Rate limited (HTTP {status}): {message}")]
    RateLimited { status: u16, message: String },

    /// 그 밖의 2xx가 아닌 HTTP 상태
    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// 파싱/역직렬화 에러
    #[error("Parse error: {0}")]
    ParseError(String),

    /// 잘못된 연결 설정
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// 알 수 없는 에러
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl ExchangeError {
    /// 인증 에러인지 확인.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, ExchangeError::Unauthorized(_))
    }
}

impl From<reqwest::Error> for ExchangeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ExchangeError::Timeout(err.to_string())
        } else if err.is_connect() || err.is_request() || err.is_body() {
            ExchangeError::NetworkError(err.to_string())
        } else if err.is_decode() {
            ExchangeError::ParseError(err.to_string())
        } else {
            ExchangeError::Unknown(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ExchangeError {
    fn from(err: serde_json::Error) -> Self {
        ExchangeError::ParseError(err.to_string())
    }
}

impl From<ExchangeError> for WatchError {
    fn from(err: ExchangeError) -> Self {
        match err {
            ExchangeError::NetworkError(_)
            | ExchangeError::Timeout(_)
            | ExchangeError::HttpStatus { .. } => WatchError::cannot_connect(err.to_string()),
            ExchangeError::Unauthorized(_) => WatchError::invalid_auth(err.to_string()),
            ExchangeError::RateLimited { status, message } => WatchError::RateLimitExceeded {
                code: i64::from(status),
                message,
            },
            ExchangeError::ParseError(_)
            | ExchangeError::InvalidConfig(_)
            | ExchangeError::Unknown(_) => {
                WatchError::unexpected(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_watch_error() {
        let err: WatchError = ExchangeError::Timeout("30s".to_string()).into();
        assert!(matches!(err, WatchError::CannotConnect { .. }));

        let err: WatchError = ExchangeError::Unauthorized("401".to_string()).into();
        assert!(matches!(err, WatchError::InvalidAuth { .. }));

        let err: WatchError = ExchangeError::RateLimited {
            status: 429,
            message: "slow down".to_string(),
        }
        .into();
        assert_eq!(
            err,
            WatchError::RateLimitExceeded {
                code: 429,
                message: "slow down".to_string()
            }
        );

        let err: WatchError = ExchangeError::ParseError("eof".to_string()).into();
        assert!(matches!(err, WatchError::UnexpectedFailure { .. }));
    }

    #[test]
    fn test_http_status_is_connectivity() {
        let err: WatchError = ExchangeError::HttpStatus {
            status: 502,
            body: String::new(),
        }
        .into();
        assert!(matches!(err, WatchError::CannotConnect { .. }));

        let err: WatchError = ExchangeError::NetworkError("dns".to_string()).into();
        assert!(matches!(err, WatchError::CannotConnect { .. }));

        assert!(ExchangeError::Unauthorized("x".to_string()).is_auth_error());
        assert!(!ExchangeError::Timeout("x".to_string()).is_auth_error());
    }
}
