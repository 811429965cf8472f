//! Bybit V5 REST 커넥터.
//!
//! 읽기 전용 계좌 엔드포인트만 호출합니다. 서명 방식:
//! `HMAC-SHA256(secret, timestamp + api_key + recv_window + query)`를 소문자 hex로 인코딩해
//! `X-BAPI-SIGN` 헤더에 담습니다.

use std::fmt;
use std::net::IpAddr;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use tracing::{debug, error, warn};
use watch_core::{Credentials, ExchangeConfig};

use crate::response::Envelope;
use crate::{
    AccountApi, ExchangeError, ExchangeResult, PositionList, RateLimitHeaders, RawResponse,
    WalletBalanceList,
};

type HmacSha256 = Hmac<Sha256>;

/// 포지션 목록 엔드포인트.
pub const POSITION_LIST_PATH: &str = "/v5/position/list";

/// 지갑 잔고 엔드포인트.
pub const WALLET_BALANCE_PATH: &str = "/v5/account/wallet-balance";

/// 계좌 정보 엔드포인트.
pub const ACCOUNT_INFO_PATH: &str = "/v5/account/info";

/// 포지션 목록 한 페이지의 최대 항목 수.
const POSITION_PAGE_LIMIT: u32 = 200;

/// 허용되는 거래소 호스트 (메인넷 전용).
const MAINNET_HOST: &str = "api.bybit.com";

/// IP 빈도 제한 시 403 본문에 포함되는 문구.
const IP_RATE_LIMIT_PHRASE: &str = "too frequent";

/// Bybit V5 REST 클라이언트.
pub struct BybitClient {
    credentials: Credentials,
    base_url: String,
    recv_window_ms: u64,
    client: Client,
}

impl fmt::Debug for BybitClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BybitClient")
            .field("credentials", &self.credentials)
            .field("base_url", &self.base_url)
            .field("recv_window_ms", &self.recv_window_ms)
            .finish()
    }
}

impl BybitClient {
    /// 새 클라이언트 생성.
    ///
    /// 기본 URL은 메인넷 호스트이거나 로컬 루프백(프록시/테스트용)이어야 합니다.
    pub fn new(credentials: Credentials, config: &ExchangeConfig) -> ExchangeResult<Self> {
        Self::check_base_url(&config.rest_base_url)?;

        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| {
                ExchangeError::NetworkError(format!("HTTP 클라이언트 생성 실패: {}", e))
            })?;

        Ok(Self {
            credentials,
            base_url: config.rest_base_url.trim_end_matches('/').to_string(),
            recv_window_ms: config.recv_window_ms,
            client,
        })
    }

    fn check_base_url(raw: &str) -> ExchangeResult<()> {
        let url = Url::parse(raw)
            .map_err(|e| ExchangeError::InvalidConfig(format!("잘못된 URL {}: {}", raw, e)))?;
        let host = url.host_str().unwrap_or_default();

        let loopback = host.eq_ignore_ascii_case("localhost")
            || host
                .trim_start_matches('[')
                .trim_end_matches(']')
                .parse::<IpAddr>()
                .is_ok_and(|ip| ip.is_loopback());

        if host.eq_ignore_ascii_case(MAINNET_HOST) || loopback {
            Ok(())
        } else {
            Err(ExchangeError::InvalidConfig(format!(
                "메인넷 이외의 호스트는 지원하지 않음: {}",
                host
            )))
        }
    }

    /// 현재 타임스탬프 (밀리초).
    fn timestamp_ms() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    /// 요청 서명 생성.
    fn sign(&self, timestamp: i64, query: &str) -> ExchangeResult<String> {
        let payload = format!(
            "{}{}{}{}",
            timestamp,
            self.credentials.api_key(),
            self.recv_window_ms,
            query
        );

        let mut mac = HmacSha256::new_from_slice(self.credentials.expose_secret().as_bytes())
            .map_err(|e| ExchangeError::Unknown(format!("서명 키 오류: {}", e)))?;
        mac.update(payload.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// 파라미터에서 쿼리 문자열 생성.
    fn build_query(params: &[(&str, String)]) -> String {
        params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// 서명된 GET 요청.
    async fn signed_get<T>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> ExchangeResult<RawResponse<T>>
    where
        T: for<'de> Deserialize<'de> + Default,
    {
        let query = Self::build_query(params);
        let timestamp = Self::timestamp_ms();
        let signature = self.sign(timestamp, &query)?;

        let url = if query.is_empty() {
            format!("{}{}", self.base_url, endpoint)
        } else {
            format!("{}{}?{}", self.base_url, endpoint, query)
        };

        debug!("GET (signed) {}", endpoint);

        let response = self
            .client
            .get(&url)
            .header("X-BAPI-API-KEY", self.credentials.api_key())
            .header("X-BAPI-TIMESTAMP", timestamp.to_string())
            .header("X-BAPI-SIGN", signature)
            .header("X-BAPI-RECV-WINDOW", self.recv_window_ms.to_string())
            .send()
            .await?;

        self.handle_response(endpoint, response).await
    }

    /// 응답 처리.
    async fn handle_response<T>(
        &self,
        endpoint: &str,
        response: reqwest::Response,
    ) -> ExchangeResult<RawResponse<T>>
    where
        T: for<'de> Deserialize<'de> + Default,
    {
        let status = response.status();
        let headers = RateLimitHeaders::from_headers(response.headers());
        let body = response.text().await?;

        if !status.is_success() {
            return Err(Self::map_http_status(status, body));
        }

        let envelope: Envelope<T> = serde_json::from_str(&body).map_err(|e| {
            error!(endpoint, "응답 파싱 실패: {} - Body: {}", e, body);
            ExchangeError::ParseError(e.to_string())
        })?;

        if envelope.ret_code != 0 {
            debug!(
                endpoint,
                ret_code = envelope.ret_code,
                ret_msg = %envelope.ret_msg,
                "거래소가 0이 아닌 retCode 반환"
            );
        }

        Ok(RawResponse::from_envelope(envelope, headers))
    }

    /// 2xx가 아닌 HTTP 상태를 에러로 변환합니다.
    fn map_http_status(status: StatusCode, body: String) -> ExchangeError {
        let code = status.as_u16();
        let rate_limited = status == StatusCode::TOO_MANY_REQUESTS
            || (status == StatusCode::FORBIDDEN
                && body.to_lowercase().contains(IP_RATE_LIMIT_PHRASE));

        if rate_limited {
            warn!(status = code, "HTTP 수준 요청 한도 초과");
            return ExchangeError::RateLimited {
                status: code,
                message: body,
            };
        }

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ExchangeError::Unauthorized(
                format!("HTTP {}: {}", code, body),
            ),
            _ => ExchangeError::HttpStatus { status: code, body },
        }
    }
}

#[async_trait]
impl AccountApi for BybitClient {
    fn name(&self) -> &str {
        "bybit"
    }

    async fn fetch_positions(
        &self,
        category: &str,
        settle_coin: &str,
    ) -> ExchangeResult<RawResponse<PositionList>> {
        let params = [
            ("category", category.to_string()),
            ("settleCoin", settle_coin.to_string()),
            ("limit", POSITION_PAGE_LIMIT.to_string()),
        ];
        self.signed_get(POSITION_LIST_PATH, &params).await
    }

    async fn fetch_wallet_balance(
        &self,
        account_type: &str,
    ) -> ExchangeResult<RawResponse<WalletBalanceList>> {
        let params = [("accountType", account_type.to_string())];
        self.signed_get(WALLET_BALANCE_PATH, &params).await
    }

    async fn fetch_account_info(&self) -> ExchangeResult<RawResponse<Value>> {
        self.signed_get(ACCOUNT_INFO_PATH, &[]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(api_key: &str, api_secret: &str) -> BybitClient {
        BybitClient::new(
            Credentials::new(api_key, api_secret),
            &ExchangeConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_base_url_restricted_to_mainnet_or_loopback() {
        assert!(BybitClient::check_base_url("https://api.bybit.com").is_ok());
        assert!(BybitClient::check_base_url("https://API.BYBIT.COM/").is_ok());
        assert!(BybitClient::check_base_url("http://127.0.0.1:8080").is_ok());
        assert!(BybitClient::check_base_url("http://localhost:9000").is_ok());
        assert!(BybitClient::check_base_url("http://[::1]:9000").is_ok());

        let err = BybitClient::new(
            Credentials::new("key", "secret"),
            &ExchangeConfig {
                rest_base_url: "https://api-testnet.bybit.com".to_string(),
                ..ExchangeConfig::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, ExchangeError::InvalidConfig(_)));
        assert!(BybitClient::check_base_url("not a url").is_err());
    }

    #[test]
    fn test_sign_known_vector() {
        let client = client("XXXXXXXXXX", "YYYYYYYYYY");
        let signature = client
            .sign(1658384314791, "category=linear&settleCoin=USDT")
            .unwrap();
        assert_eq!(
            signature,
            "62d1e4866e0c03cc458a98869b310f8e6871ca5fb64d65f6bbd24af4319b18a5"
        );
    }

    #[test]
    fn test_build_query_preserves_order() {
        let query = BybitClient::build_query(&[
            ("category", "linear".to_string()),
            ("settleCoin", "USDT".to_string()),
            ("limit", "200".to_string()),
        ]);
        assert_eq!(query, "category=linear&settleCoin=USDT&limit=200");
        assert_eq!(BybitClient::build_query(&[]), "");
    }

    #[test]
    fn test_map_http_status() {
        let err = BybitClient::map_http_status(StatusCode::TOO_MANY_REQUESTS, "slow".to_string());
        assert!(matches!(err, ExchangeError::RateLimited { status: 429, .. }));

        let err = BybitClient::map_http_status(
            StatusCode::FORBIDDEN,
            "access too frequent. Please try again in 5 minutes.".to_string(),
        );
        assert!(matches!(err, ExchangeError::RateLimited { status: 403, .. }));

        let err = BybitClient::map_http_status(StatusCode::UNAUTHORIZED, String::new());
        assert!(err.is_auth_error());

        let err = BybitClient::map_http_status(StatusCode::BAD_GATEWAY, "upstream".to_string());
        assert!(matches!(err, ExchangeError::HttpStatus { status: 502, .. }));
    }

    #[test]
    fn test_debug_masks_secret() {
        let client = client("abcd1234efgh5678", "super-secret-value");
        let debug = format!("{:?}", client);
        assert!(!debug.contains("super-secret-value"));
        assert!(!debug.contains("abcd1234efgh5678"));
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let config = ExchangeConfig {
            rest_base_url: "http://127.0.0.1:1234/".to_string(),
            ..Default::default()
        };
        let client = BybitClient::new(Credentials::new("k", "s"), &config).unwrap();
        assert_eq!(client.base_url, "http://127.0.0.1:1234");
    }
}
