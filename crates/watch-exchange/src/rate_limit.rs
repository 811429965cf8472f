//! Rate limit 판정.
//!
//! 모든 응답(성공 여부와 무관)을 검사해 세 가지 판정 중 하나를 내립니다.
//! 한도 초과 판정이 한도 근접 판정보다 우선합니다.

use watch_core::WatchError;

use crate::{RateLimitHeaders, RawResponse};

/// 한도 초과를 나타내는 Bybit retCode.
pub const RATE_LIMIT_EXCEEDED_CODE: i64 = 10006;

/// 한도 초과를 나타내는 메시지 문구 (대소문자 무시).
pub const RATE_LIMIT_PHRASE: &str = "too many visits";

/// 남은 요청 수가 이 값 미만이면 한도 근접으로 판정합니다.
pub const APPROACHING_THRESHOLD: u32 = 10;

/// 응답 하나에 대한 rate limit 판정.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitVerdict {
    /// 제한 없음
    Normal,
    /// 남은 요청 수가 임계값 미만
    Approaching {
        /// 남은 요청 수
        remaining: u32,
        /// 창의 요청 한도 (헤더에 있을 때)
        limit: Option<u32>,
    },
    /// 한도 초과
    Exceeded {
        /// 거래소 retCode (HTTP 수준 제한이면 HTTP 상태)
        code: i64,
        /// 거래소 메시지
        message: String,
    },
}

impl RateLimitVerdict {
    /// 한도 초과 판정인지 확인.
    pub fn is_exceeded(&self) -> bool {
        matches!(self, RateLimitVerdict::Exceeded { .. })
    }

    /// 두 판정 중 더 심각한 쪽을 반환합니다.
    ///
    /// 한도 초과 > 한도 근접 (남은 요청 수가 적은 쪽) > 정상.
    pub fn most_severe(self, other: RateLimitVerdict) -> RateLimitVerdict {
        if other.severity() > self.severity() {
            other
        } else {
            self
        }
    }

    fn severity(&self) -> (u8, u32) {
        match self {
            RateLimitVerdict::Normal => (0, 0),
            RateLimitVerdict::Approaching { remaining, .. } => (1, u32::MAX - remaining),
            RateLimitVerdict::Exceeded { .. } => (2, 0),
        }
    }

    /// 한도 초과 판정이면 사이클 에러로 변환합니다.
    pub fn to_error(&self) -> Option<WatchError> {
        match self {
            RateLimitVerdict::Exceeded { code, message } => Some(WatchError::RateLimitExceeded {
                code: *code,
                message: message.clone(),
            }),
            _ => None,
        }
    }
}

/// 응답의 retCode, retMsg, 헤더로 판정합니다.
pub fn classify(ret_code: i64, ret_msg: &str, headers: &RateLimitHeaders) -> RateLimitVerdict {
    if ret_code == RATE_LIMIT_EXCEEDED_CODE
        || ret_msg.to_lowercase().contains(RATE_LIMIT_PHRASE)
    {
        return RateLimitVerdict::Exceeded {
            code: ret_code,
            message: ret_msg.to_string(),
        };
    }

    match headers.remaining {
        Some(remaining) if remaining < APPROACHING_THRESHOLD => RateLimitVerdict::Approaching {
            remaining,
            limit: headers.limit,
        },
        _ => RateLimitVerdict::Normal,
    }
}

impl<T> RawResponse<T> {
    /// 이 응답에 대한 rate limit 판정.
    pub fn rate_limit_verdict(&self) -> RateLimitVerdict {
        classify(self.ret_code, &self.ret_msg, &self.headers)
    }
}
