//! API 자격증명.
//!
//! 시크릿은 `secrecy::SecretString`으로 보관하며 `Debug` 출력과 로그에는
//! 마스킹된 값만 노출됩니다.

use std::fmt;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};

use crate::error::{WatchError, WatchResult};

/// Bybit API 키/시크릿 쌍.
///
/// 감시기 수명 동안 변경되지 않으며, 감시기 인스턴스가 단독으로 소유합니다.
#[derive(Deserialize)]
pub struct Credentials {
    #[serde(default)]
    api_key: String,
    #[serde(default = "empty_secret", deserialize_with = "deserialize_secret")]
    api_secret: SecretString,
}

fn empty_secret() -> SecretString {
    SecretString::from(String::new())
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(SecretString::from)
}

impl Credentials {
    /// 새 자격증명 생성.
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: SecretString::from(api_secret.into()),
        }
    }

    /// API 키 반환 (요청 헤더용).
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// 서명 계산용 시크릿 노출.
    pub fn expose_secret(&self) -> &str {
        self.api_secret.expose_secret()
    }

    /// 로그에 남겨도 되는 마스킹된 키.
    pub fn masked_key(&self) -> String {
        let chars: Vec<char> = self.api_key.chars().collect();
        if chars.len() > 8 {
            let head: String = chars[..4].iter().collect();
            let tail: String = chars[chars.len() - 4..].iter().collect();
            format!("{}...{}", head, tail)
        } else {
            "***REDACTED***".to_string()
        }
    }

    /// 빈 키/시크릿은 인증 실패로 처리합니다.
    pub fn ensure_present(&self) -> WatchResult<()> {
        if self.api_key.trim().is_empty() {
            return Err(WatchError::invalid_auth("API 키가 비어 있습니다"));
        }
        if self.api_secret.expose_secret().trim().is_empty() {
            return Err(WatchError::invalid_auth("API 시크릿이 비어 있습니다"));
        }
        Ok(())
    }
}

impl Default for Credentials {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_secret: empty_secret(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.masked_key())
            .field("api_secret", &"***REDACTED***")
            .finish()
    }
}
