//! 계좌 잔고 타입.
//!
//! 계좌 전체 합계(`AccountTotals`)와 자산별 수치(`AssetBalance`)를 분리해서 보관합니다.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::rate_to_percent;

/// 통합 계좌 전체 합계.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountTotals {
    /// 계좌 유형 (예: "UNIFIED")
    pub account_type: Option<String>,
    /// 총 자산
    pub total_equity: Option<Decimal>,
    /// 총 지갑 잔고
    pub total_wallet_balance: Option<Decimal>,
    /// 총 증거금 잔고
    pub total_margin_balance: Option<Decimal>,
    /// 총 사용 가능 잔고
    pub total_available_balance: Option<Decimal>,
    /// 무기한 계약 미실현 손익 합계
    pub total_perp_upl: Option<Decimal>,
    /// 총 개시 증거금
    pub total_initial_margin: Option<Decimal>,
    /// 총 유지 증거금
    pub total_maintenance_margin: Option<Decimal>,
    /// 개시 증거금 비율 (0.01 = 1%)
    pub account_im_rate: Option<Decimal>,
    /// 유지 증거금 비율 (0.01 = 1%)
    pub account_mm_rate: Option<Decimal>,
}

impl AccountTotals {
    /// 개시 증거금 비율을 퍼센트로 반환합니다.
    pub fn im_rate_percent(&self) -> Option<Decimal> {
        rate_to_percent(self.account_im_rate)
    }

    /// 유지 증거금 비율을 퍼센트로 반환합니다.
    pub fn mm_rate_percent(&self) -> Option<Decimal> {
        rate_to_percent(self.account_mm_rate)
    }
}

/// 단일 자산의 잔고.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetBalance {
    /// 자산 심볼 (예: "USDT")
    pub coin: String,
    /// 자산 평가액
    pub equity: Option<Decimal>,
    /// 출금 가능 금액
    pub available_to_withdraw: Option<Decimal>,
    /// 지갑 잔고
    pub wallet_balance: Option<Decimal>,
    /// 미실현 손익
    pub unrealised_pnl: Option<Decimal>,
    /// 누적 실현 손익
    pub cum_realised_pnl: Option<Decimal>,
    /// 포지션 개시 증거금
    pub total_position_im: Option<Decimal>,
    /// 포지션 유지 증거금
    pub total_position_mm: Option<Decimal>,
    /// USD 환산 가치
    pub usd_value: Option<Decimal>,
}

impl AssetBalance {
    /// 값이 비어 있는 자산 잔고.
    pub fn empty(coin: impl Into<String>) -> Self {
        Self {
            coin: coin.into(),
            ..Default::default()
        }
    }

    /// 어떤 수치도 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.equity.is_none()
            && self.available_to_withdraw.is_none()
            && self.wallet_balance.is_none()
            && self.unrealised_pnl.is_none()
    }
}

/// 지갑 잔고 요약.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BalanceSummary {
    /// 계좌 전체 합계
    pub account: AccountTotals,
    /// 자산 심볼별 잔고
    pub assets: BTreeMap<String, AssetBalance>,
    /// 정산 자산 잔고 (응답에 없으면 빈 값)
    pub settlement: AssetBalance,
}

impl BalanceSummary {
    /// 응답이 없거나 실패했을 때의 빈 요약.
    pub fn empty(settle_coin: &str) -> Self {
        Self {
            account: AccountTotals::default(),
            assets: BTreeMap::new(),
            settlement: AssetBalance::empty(settle_coin),
        }
    }

    /// 자산 잔고 조회.
    pub fn asset(&self, coin: &str) -> Option<&AssetBalance> {
        self.assets.get(coin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_rate_percent() {
        let totals = AccountTotals {
            account_im_rate: Some(dec!(0.0312)),
            account_mm_rate: None,
            ..Default::default()
        };

        assert_eq!(totals.im_rate_percent(), Some(dec!(3.12)));
        assert_eq!(totals.mm_rate_percent(), None);
    }

    #[test]
    fn test_empty_summary() {
        let summary = BalanceSummary::empty("USDT");
        assert_eq!(summary.settlement.coin, "USDT");
        assert!(summary.settlement.is_empty());
        assert!(summary.asset("USDT").is_none());
    }
}
