//! Bybit V5 원시 응답 타입.
//!
//! 모든 레코드 필드는 관대하게 역직렬화됩니다: 누락, null, 문자열, 숫자 모두
//! `Option<String>`으로 받아 두고, 실제 해석은 집계 단계에서 수행합니다.

use reqwest::header::HeaderMap;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// 남은 요청 수 헤더.
pub const HEADER_LIMIT_STATUS: &str = "X-Bapi-Limit-Status";

/// 요청 한도 헤더.
pub const HEADER_LIMIT: &str = "X-Bapi-Limit";

/// 한도 초기화 시각 헤더 (밀리초).
pub const HEADER_LIMIT_RESET: &str = "X-Bapi-Limit-Reset-Timestamp";

// ============================================================================
// 역직렬화 헬퍼
// ============================================================================

/// 문자열/숫자/불리언/null 어떤 값이든 `Option<String>`으로 받습니다.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        Some(other) => Some(other.to_string()),
    })
}

/// null을 기본값으로 취급합니다.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// ============================================================================
// 공통 응답
// ============================================================================

/// 응답 헤더에서 읽은 rate limit 정보.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateLimitHeaders {
    /// 현재 창에서 남은 요청 수
    pub remaining: Option<u32>,
    /// 현재 창의 요청 한도
    pub limit: Option<u32>,
    /// 한도 초기화 시각 (밀리초)
    pub reset_at_ms: Option<i64>,
}

impl RateLimitHeaders {
    /// 헤더 맵에서 추출. 해석할 수 없는 값은 없는 것으로 취급합니다.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        fn read<T: std::str::FromStr>(headers: &HeaderMap, name: &str) -> Option<T> {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse().ok())
        }

        Self {
            remaining: read(headers, HEADER_LIMIT_STATUS),
            limit: read(headers, HEADER_LIMIT),
            reset_at_ms: read(headers, HEADER_LIMIT_RESET),
        }
    }

    /// 남은 요청 수만 지정한 헤더 (테스트 및 시뮬레이션용).
    pub fn with_remaining(remaining: u32, limit: u32) -> Self {
        Self {
            remaining: Some(remaining),
            limit: Some(limit),
            reset_at_ms: None,
        }
    }
}

/// 거래소 응답 본문 공통 래퍼.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(bound(deserialize = "T: Deserialize<'de> + Default"))]
pub(crate) struct Envelope<T> {
    pub ret_code: i64,
    #[serde(default)]
    pub ret_msg: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub result: T,
    #[serde(default)]
    pub time: Option<i64>,
}

/// 상태 코드, 메시지, 결과, 헤더를 담은 원시 응답.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse<T> {
    /// 애플리케이션 상태 코드 (0 = 성공)
    pub ret_code: i64,
    /// 상태 메시지
    pub ret_msg: String,
    /// 결과 페이로드
    pub result: T,
    /// rate limit 헤더
    pub headers: RateLimitHeaders,
    /// 서버 시각 (밀리초)
    pub server_time: Option<i64>,
}

impl<T> RawResponse<T> {
    /// 새 응답 생성.
    pub fn new(ret_code: i64, ret_msg: impl Into<String>, result: T) -> Self {
        Self {
            ret_code,
            ret_msg: ret_msg.into(),
            result,
            headers: RateLimitHeaders::default(),
            server_time: None,
        }
    }

    /// 헤더 지정.
    pub fn with_headers(mut self, headers: RateLimitHeaders) -> Self {
        self.headers = headers;
        self
    }

    /// retCode가 성공(0)인지 확인.
    pub fn is_success(&self) -> bool {
        self.ret_code == 0
    }

    pub(crate) fn from_envelope(envelope: Envelope<T>, headers: RateLimitHeaders) -> Self {
        Self {
            ret_code: envelope.ret_code,
            ret_msg: envelope.ret_msg,
            result: envelope.result,
            headers,
            server_time: envelope.time,
        }
    }
}

impl<T: Default> RawResponse<T> {
    /// 성공 응답 생성.
    pub fn ok(result: T) -> Self {
        Self::new(0, "OK", result)
    }

    /// 결과가 비어 있는 실패 응답 생성.
    pub fn failure(ret_code: i64, ret_msg: impl Into<String>) -> Self {
        Self::new(ret_code, ret_msg, T::default())
    }
}

// ============================================================================
// 포지션
// ============================================================================

/// `/v5/position/list` 결과.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionList {
    #[serde(default, deserialize_with = "lenient_string")]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub list: Vec<RawPosition>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub next_page_cursor: Option<String>,
}

/// 거래소가 보낸 포지션 레코드.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPosition {
    #[serde(default, deserialize_with = "lenient_string")]
    pub symbol: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub side: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub position_idx: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub size: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub leverage: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub avg_price: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub mark_price: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub liq_price: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub position_value: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub unrealised_pnl: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub cur_realised_pnl: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub cum_realised_pnl: Option<String>,
    #[serde(default, rename = "positionIM", deserialize_with = "lenient_string")]
    pub position_im: Option<String>,
    #[serde(default, rename = "positionMM", deserialize_with = "lenient_string")]
    pub position_mm: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub take_profit: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub stop_loss: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub trailing_stop: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub position_status: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub trade_mode: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub auto_add_margin: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub created_time: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub updated_time: Option<String>,
}

// ============================================================================
// 지갑 잔고
// ============================================================================

/// `/v5/account/wallet-balance` 결과.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct WalletBalanceList {
    #[serde(default, deserialize_with = "null_as_default")]
    pub list: Vec<RawWalletEntry>,
}

/// 지갑 잔고 목록의 `coin` 필드.
///
/// V5 통합 계좌는 자산 배열을, 단순화된 응답은 자산 심볼 문자열을 보냅니다.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum CoinField {
    /// 자산 심볼 (항목 자체가 자산 하나)
    Symbol(String),
    /// 계좌에 속한 자산 배열
    Assets(Vec<RawCoinBalance>),
    /// 해석할 수 없는 형태
    Other(Value),
}

/// 지갑 잔고 목록 항목.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawWalletEntry {
    #[serde(default)]
    pub coin: Option<CoinField>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub account_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub total_equity: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub total_wallet_balance: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub total_margin_balance: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub total_available_balance: Option<String>,
    #[serde(default, rename = "totalPerpUPL", deserialize_with = "lenient_string")]
    pub total_perp_upl: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub total_initial_margin: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub total_maintenance_margin: Option<String>,
    #[serde(default, rename = "accountIMRate", deserialize_with = "lenient_string")]
    pub account_im_rate: Option<String>,
    #[serde(default, rename = "accountMMRate", deserialize_with = "lenient_string")]
    pub account_mm_rate: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub equity: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub available_to_withdraw: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub wallet_balance: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub unrealised_pnl: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub cum_realised_pnl: Option<String>,
}

/// 통합 계좌 내 자산별 잔고.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCoinBalance {
    #[serde(default, deserialize_with = "lenient_string")]
    pub coin: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub equity: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub wallet_balance: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub available_to_withdraw: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub unrealised_pnl: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub cum_realised_pnl: Option<String>,
    #[serde(default, rename = "totalPositionIM", deserialize_with = "lenient_string")]
    pub total_position_im: Option<String>,
    #[serde(default, rename = "totalPositionMM", deserialize_with = "lenient_string")]
    pub total_position_mm: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub usd_value: Option<String>,
}
