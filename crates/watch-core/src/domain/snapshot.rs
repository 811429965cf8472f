//! 스냅샷 타입.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{BalanceSummary, Position};

/// 호출 대상 엔드포인트.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Endpoint {
    /// 포지션 목록
    Positions,
    /// 지갑 잔고
    WalletBalance,
    /// 계좌 정보 (초기 검증용)
    AccountInfo,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Positions => write!(f, "positions"),
            Endpoint::WalletBalance => write!(f, "wallet_balance"),
            Endpoint::AccountInfo => write!(f, "account_info"),
        }
    }
}

/// 0이 아닌 애플리케이션 코드를 받아 빈 데이터로 대체된 호출.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DegradedResponse {
    /// 실패한 엔드포인트
    pub endpoint: Endpoint,
    /// 거래소 retCode
    pub code: i64,
    /// 거래소 retMsg
    pub message: String,
}

impl DegradedResponse {
    /// 새 항목 생성.
    pub fn new(endpoint: Endpoint, code: i64, message: impl Into<String>) -> Self {
        Self {
            endpoint,
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for DegradedResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} code {}: {}", self.endpoint, self.code, self.message)
    }
}

/// 한 번의 성공한 폴링 사이클 결과.
///
/// 생성 후에는 변경되지 않으며, 다음 스냅샷이 통째로 대체합니다.
/// 이전 스냅샷의 포지션과 병합하지 않습니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// 거래소가 반환한 순서 그대로의 포지션
    pub positions: Vec<Position>,
    /// 지갑 잔고 요약
    pub balance: BalanceSummary,
    /// 포지션 미실현 손익 합계 (해석 불가 항목 제외)
    pub total_unrealized_pnl: Decimal,
    /// 사이클 시각
    pub polled_at: DateTime<Utc>,
    /// 사이클 당시의 폴링 주기 (초)
    pub interval_secs: u64,
    /// 빈 데이터로 대체된 호출 목록
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub degraded: Vec<DegradedResponse>,
}

impl Snapshot {
    /// 심볼로 포지션 조회 (첫 번째 일치 항목).
    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.iter().find(|p| p.symbol == symbol)
    }

    /// 포지션 심볼 목록.
    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.positions.iter().map(|p| p.symbol.as_str())
    }

    /// 열린 포지션 수.
    pub fn open_position_count(&self) -> usize {
        self.positions.iter().filter(|p| p.is_open()).count()
    }

    /// 일부 데이터가 빈 값으로 대체되었는지 확인합니다.
    pub fn is_degraded(&self) -> bool {
        !self.degraded.is_empty()
    }
}
