//! 초기 자격증명 검증.
//!
//! 감시기 활성화 전에 계좌 정보를 한 번 조회해 인증 실패와 연결 실패를 구분합니다.

use tracing::{info, warn};
use watch_core::{DegradedResponse, Endpoint, WatchError, WatchResult};

use crate::{AccountApi, ExchangeError};

/// 인증 실패를 나타내는 Bybit retCode.
///
/// 10003: 잘못된 API 키, 10004: 서명 오류, 10005: 권한 없음, 33004: 만료된 키
pub const AUTH_FAILURE_CODES: [i64; 4] = [10003, 10004, 10005, 33004];

/// 메시지에 포함되면 인증 실패로 보는 문구 (소문자).
const AUTH_FAILURE_PHRASES: [&str; 3] = ["invalid api key", "api key is invalid", "signature"];

/// retCode와 메시지로 인증 실패인지 판정합니다.
fn is_auth_failure(ret_code: i64, message: &str) -> bool {
    let lower = message.to_lowercase();
    AUTH_FAILURE_CODES.contains(&ret_code)
        || AUTH_FAILURE_PHRASES.iter().any(|p| lower.contains(p))
}

/// 계좌 정보 조회로 자격증명을 검증합니다.
///
/// 반환 에러는 `InvalidAuth` 또는 `CannotConnect` 둘 중 하나입니다.
pub async fn validate_credentials(api: &dyn AccountApi) -> WatchResult<()> {
    match api.fetch_account_info().await {
        Ok(response) if response.is_success() => {
            info!(exchange = api.name(), "자격증명 검증 성공");
            Ok(())
        }
        Ok(response) => {
            warn!(
                exchange = api.name(),
                ret_code = response.ret_code,
                ret_msg = %response.ret_msg,
                "자격증명 검증 실패"
            );
            let message = DegradedResponse::new(
                Endpoint::AccountInfo,
                response.ret_code,
                response.ret_msg.clone(),
            )
            .to_string();
            if is_auth_failure(response.ret_code, &response.ret_msg) {
                Err(WatchError::invalid_auth(message))
            } else {
                Err(WatchError::cannot_connect(message))
            }
        }
        Err(err) => {
            warn!(exchange = api.name(), error = %err, "자격증명 검증 요청 실패");
            Err(classify_transport_error(err))
        }
    }
}

fn classify_transport_error(err: ExchangeError) -> WatchError {
    let message = err.to_string();
    if err.is_auth_error() || is_auth_failure(0, &message) {
        WatchError::invalid_auth(message)
    } else {
        WatchError::cannot_connect(message)
    }
}
