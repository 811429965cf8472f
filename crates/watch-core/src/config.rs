//! 설정 관리.
//!
//! 설정은 다음 순서로 병합됩니다 (뒤가 우선):
//! 1. 내장 기본값
//! 2. TOML 설정 파일 (`config/default.toml` 또는 `--config`)
//! 3. `BYBIT_WATCH__` 접두사 환경 변수 (예: `BYBIT_WATCH__POLLING__SCAN_INTERVAL_SECS`)
//! 4. `BYBIT_API_KEY` / `BYBIT_API_SECRET` 단축 환경 변수

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::credentials::Credentials;

/// 최소 폴링 주기 (초).
pub const MIN_SCAN_INTERVAL_SECS: u64 = 5;

/// 최대 폴링 주기 (초).
pub const MAX_SCAN_INTERVAL_SECS: u64 = 3600;

/// 기본 폴링 주기 (초).
pub const DEFAULT_SCAN_INTERVAL_SECS: u64 = 60;

/// Bybit 메인넷 REST URL.
pub const BYBIT_MAINNET_URL: &str = "https://api.bybit.com";

/// 기본 설정 파일 경로.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// 요청된 폴링 주기를 허용 범위로 제한합니다.
pub fn clamp_scan_interval(secs: u64) -> u64 {
    let clamped = secs.clamp(MIN_SCAN_INTERVAL_SECS, MAX_SCAN_INTERVAL_SECS);
    if clamped != secs {
        tracing::warn!(
            requested = secs,
            applied = clamped,
            "폴링 주기가 허용 범위를 벗어나 조정됨"
        );
    }
    clamped
}

/// 애플리케이션 설정.
#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// API 자격증명 (없으면 빈 값, 시작 시 `ensure_present`에서 거부)
    #[serde(default)]
    pub credentials: Credentials,
    /// 폴링 설정
    #[serde(default)]
    pub polling: PollingConfig,
    /// 거래소 연결 설정
    #[serde(default)]
    pub exchange: ExchangeConfig,
    /// 로깅 설정
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// 폴링 설정.
#[derive(Debug, Clone, Deserialize)]
pub struct PollingConfig {
    /// 사용자가 요청한 폴링 주기 (초)
    #[serde(default = "default_scan_interval")]
    pub scan_interval_secs: u64,
    /// 포지션 조회 카테고리
    #[serde(default = "default_category")]
    pub category: String,
    /// 정산 코인 (포지션 필터 및 잔고 선택에 사용)
    #[serde(default = "default_settle_coin")]
    pub settle_coin: String,
    /// 지갑 계좌 유형
    #[serde(default = "default_account_type")]
    pub account_type: String,
}

fn default_scan_interval() -> u64 {
    DEFAULT_SCAN_INTERVAL_SECS
}
fn default_category() -> String {
    "linear".to_string()
}
fn default_settle_coin() -> String {
    "USDT".to_string()
}
fn default_account_type() -> String {
    "UNIFIED".to_string()
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            scan_interval_secs: default_scan_interval(),
            category: default_category(),
            settle_coin: default_settle_coin(),
            account_type: default_account_type(),
        }
    }
}

impl PollingConfig {
    /// 허용 범위로 제한된 폴링 주기 (초).
    pub fn interval_secs(&self) -> u64 {
        clamp_scan_interval(self.scan_interval_secs)
    }
}

/// 거래소 연결 설정.
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeConfig {
    /// REST API 기본 URL. 메인넷(`api.bybit.com`) 또는 로컬 루프백 프록시만 허용되며
    /// 다른 호스트는 클라이언트 생성 시 거부됩니다.
    #[serde(default = "default_rest_base_url")]
    pub rest_base_url: String,
    /// 요청 타임아웃 (초)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// 수신 윈도우 (밀리초)
    #[serde(default = "default_recv_window_ms")]
    pub recv_window_ms: u64,
}

fn default_rest_base_url() -> String {
    BYBIT_MAINNET_URL.to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_recv_window_ms() -> u64 {
    5000
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            rest_base_url: default_rest_base_url(),
            timeout_secs: default_timeout_secs(),
            recv_window_ms: default_recv_window_ms(),
        }
    }
}

impl ExchangeConfig {
    /// 요청 타임아웃을 Duration으로 반환
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// 로그 레벨 필터
    #[serde(default = "default_log_level")]
    pub level: String,
    /// 로그 형식 (pretty, json, compact)
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl AppConfig {
    /// 파일과 환경 변수에서 설정을 로드합니다.
    ///
    /// `path`가 주어지면 해당 파일이 반드시 존재해야 하고,
    /// 없으면 기본 경로를 선택적으로 읽습니다.
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        let file_source = match path {
            Some(p) => config::File::from(p).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_PATH).required(false),
        };

        let builder = config::Config::builder()
            .add_source(file_source)
            .add_source(
                config::Environment::with_prefix("BYBIT_WATCH")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("credentials.api_key", std::env::var("BYBIT_API_KEY").ok())?
            .set_override_option(
                "credentials.api_secret",
                std::env::var("BYBIT_API_SECRET").ok(),
            )?;

        builder.build()?.try_deserialize()
    }
}
