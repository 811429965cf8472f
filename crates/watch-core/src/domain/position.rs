//! 포지션 타입.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 포지션 방향.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PositionSide {
    /// 롱
    Buy,
    /// 숏
    Sell,
    /// 포지션 없음 (단방향 모드의 빈 슬롯)
    None,
}

impl PositionSide {
    /// 거래소 문자열에서 변환. 알 수 없는 값은 `None`.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some(s) if s.eq_ignore_ascii_case("buy") => PositionSide::Buy,
            Some(s) if s.eq_ignore_ascii_case("sell") => PositionSide::Sell,
            _ => PositionSide::None,
        }
    }
}

impl std::fmt::Display for PositionSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PositionSide::Buy => write!(f, "Buy"),
            PositionSide::Sell => write!(f, "Sell"),
            PositionSide::None => write!(f, "None"),
        }
    }
}

/// 거래소가 보고한 단일 포지션.
///
/// 모든 숫자 필드는 `Option`이며, `None`은 값이 비어 있거나 해석할 수 없었음을 뜻합니다
/// (0과 구분됩니다).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// 심볼 (예: "BTCUSDT")
    pub symbol: String,
    /// 포지션 방향
    pub side: PositionSide,
    /// 포지션 인덱스 (0: 단방향, 1/2: 헤지 모드)
    pub position_idx: Option<i64>,
    /// 포지션 수량
    pub size: Option<Decimal>,
    /// 레버리지
    pub leverage: Option<Decimal>,
    /// 평균 진입 가격
    pub avg_price: Option<Decimal>,
    /// 마크 가격
    pub mark_price: Option<Decimal>,
    /// 청산 가격 (`None`이면 청산 위험 데이터 없음)
    pub liq_price: Option<Decimal>,
    /// 포지션 가치
    pub position_value: Option<Decimal>,
    /// 미실현 손익
    pub unrealised_pnl: Option<Decimal>,
    /// 현재 실현 손익
    pub cur_realised_pnl: Option<Decimal>,
    /// 누적 실현 손익
    pub cum_realised_pnl: Option<Decimal>,
    /// 개시 증거금
    pub position_im: Option<Decimal>,
    /// 유지 증거금
    pub position_mm: Option<Decimal>,
    /// 익절 가격
    pub take_profit: Option<Decimal>,
    /// 손절 가격
    pub stop_loss: Option<Decimal>,
    /// 트레일링 스탑 거리
    pub trailing_stop: Option<Decimal>,
    /// 포지션 상태 (Normal, Liq, Adl)
    pub position_status: Option<String>,
    /// 거래 모드 (0: 교차, 1: 격리)
    pub trade_mode: Option<i64>,
    /// 자동 증거금 추가 여부
    pub auto_add_margin: Option<bool>,
    /// 생성 시각
    pub created_at: Option<DateTime<Utc>>,
    /// 마지막 갱신 시각
    pub updated_at: Option<DateTime<Utc>>,
}

impl Position {
    /// 수량이 0보다 큰 열린 포지션인지 확인합니다.
    pub fn is_open(&self) -> bool {
        self.size.is_some_and(|s| s > Decimal::ZERO)
    }

    /// 합계 계산용 미실현 손익 (알 수 없으면 0).
    pub fn unrealised_pnl_or_zero(&self) -> Decimal {
        self.unrealised_pnl.unwrap_or(Decimal::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_side_parse() {
        assert_eq!(PositionSide::parse(Some("Buy")), PositionSide::Buy);
        assert_eq!(PositionSide::parse(Some("sell")), PositionSide::Sell);
        assert_eq!(PositionSide::parse(Some("")), PositionSide::None);
        assert_eq!(PositionSide::parse(None), PositionSide::None);
    }

    #[test]
    fn test_unknown_values_stay_unknown() {
        let position: Position =
            serde_json::from_str(r#"{"symbol": "ETHUSDT", "side": "None"}"#).unwrap();
        assert!(!position.is_open());
        assert_eq!(position.unrealised_pnl, None);
        assert_eq!(position.unrealised_pnl_or_zero(), Decimal::ZERO);

        let position: Position = serde_json::from_str(
            r#"{"symbol": "ETHUSDT", "side": "Sell", "size": "0.5", "unrealised_pnl": null}"#,
        )
        .unwrap();
        assert!(position.is_open());
        assert_eq!(position.size, Some(dec!(0.5)));
    }
}
