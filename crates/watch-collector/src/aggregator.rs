//! 원시 응답을 스냅샷으로 집계합니다.
//!
//! 모든 파싱은 실패하지 않습니다. 해석할 수 없는 필드는 `None`이 되고,
//! 0이 아닌 retCode는 빈 데이터와 `DegradedResponse` 기록으로 대체됩니다.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, warn};
use watch_core::{
    parse_decimal, parse_flag, parse_integer, parse_timestamp_ms, AccountTotals, AssetBalance,
    BalanceSummary, DegradedResponse, Endpoint, Position, PositionSide, Snapshot,
};
use watch_exchange::{
    CoinField, PositionList, RawCoinBalance, RawPosition, RawResponse, RawWalletEntry,
    WalletBalanceList,
};

/// 한 사이클의 두 응답으로 스냅샷을 만듭니다.
pub fn aggregate(
    positions: &RawResponse<PositionList>,
    balance: &RawResponse<WalletBalanceList>,
    settle_coin: &str,
    interval_secs: u64,
    polled_at: DateTime<Utc>,
) -> Snapshot {
    let mut degraded = Vec::new();

    let positions = if positions.is_success() {
        let parsed: Vec<Position> = positions
            .result
            .list
            .iter()
            .filter_map(parse_position)
            .collect();
        debug!(count = parsed.len(), "포지션 조회 완료");
        parsed
    } else {
        warn!(
            ret_code = positions.ret_code,
            ret_msg = %positions.ret_msg,
            "포지션 조회 실패, 빈 목록으로 대체"
        );
        degraded.push(DegradedResponse::new(
            Endpoint::Positions,
            positions.ret_code,
            positions.ret_msg.clone(),
        ));
        Vec::new()
    };

    let balance = if balance.is_success() {
        summarize_balance(&balance.result, settle_coin)
    } else {
        warn!(
            ret_code = balance.ret_code,
            ret_msg = %balance.ret_msg,
            "잔고 조회 실패, 빈 잔고로 대체"
        );
        degraded.push(DegradedResponse::new(
            Endpoint::WalletBalance,
            balance.ret_code,
            balance.ret_msg.clone(),
        ));
        BalanceSummary::empty(settle_coin)
    };

    let total_unrealized_pnl = total_unrealized_pnl(&positions);

    Snapshot {
        positions,
        balance,
        total_unrealized_pnl,
        polled_at,
        interval_secs,
        degraded,
    }
}

/// 해석 가능한 미실현 손익의 합계.
///
/// 합계가 `Decimal` 범위를 넘게 만드는 항목은 건너뜁니다.
pub fn total_unrealized_pnl(positions: &[Position]) -> Decimal {
    positions.iter().fold(Decimal::ZERO, |total, position| {
        match total.checked_add(position.unrealised_pnl_or_zero()) {
            Some(sum) => sum,
            None => {
                warn!(
                    symbol = %position.symbol,
                    "미실현 손익 합계 범위 초과, 해당 포지션 제외"
                );
                total
            }
        }
    })
}

/// 원시 포지션 변환. 심볼이 비어 있으면 버립니다.
pub fn parse_position(raw: &RawPosition) -> Option<Position> {
    let symbol = raw.symbol.as_deref().map(str::trim).unwrap_or_default();
    if symbol.is_empty() {
        return None;
    }

    Some(Position {
        symbol: symbol.to_string(),
        side: PositionSide::parse(raw.side.as_deref()),
        position_idx: parse_integer(raw.position_idx.as_deref()),
        size: parse_decimal(raw.size.as_deref()),
        leverage: parse_decimal(raw.leverage.as_deref()),
        avg_price: parse_decimal(raw.avg_price.as_deref()),
        mark_price: parse_decimal(raw.mark_price.as_deref()),
        liq_price: parse_decimal(raw.liq_price.as_deref()),
        position_value: parse_decimal(raw.position_value.as_deref()),
        unrealised_pnl: parse_decimal(raw.unrealised_pnl.as_deref()),
        cur_realised_pnl: parse_decimal(raw.cur_realised_pnl.as_deref()),
        cum_realised_pnl: parse_decimal(raw.cum_realised_pnl.as_deref()),
        position_im: parse_decimal(raw.position_im.as_deref()),
        position_mm: parse_decimal(raw.position_mm.as_deref()),
        take_profit: parse_decimal(raw.take_profit.as_deref()),
        stop_loss: parse_decimal(raw.stop_loss.as_deref()),
        trailing_stop: parse_decimal(raw.trailing_stop.as_deref()),
        position_status: raw
            .position_status
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        trade_mode: parse_integer(raw.trade_mode.as_deref()),
        auto_add_margin: parse_flag(raw.auto_add_margin.as_deref()),
        created_at: parse_timestamp_ms(raw.created_time.as_deref()),
        updated_at: parse_timestamp_ms(raw.updated_time.as_deref()),
    })
}

/// 지갑 잔고 목록을 요약합니다.
///
/// 계좌 항목(`coin` 배열)은 합계와 자산별 잔고를, 평탄한 항목(`coin` 문자열)은
/// 자산 하나의 잔고를 제공합니다. 같은 자산이 여러 번 나오면 먼저 나온 항목을 사용합니다.
pub fn summarize_balance(result: &WalletBalanceList, settle_coin: &str) -> BalanceSummary {
    let mut account: Option<AccountTotals> = None;
    let mut assets: BTreeMap<String, AssetBalance> = BTreeMap::new();

    for entry in &result.list {
        match &entry.coin {
            Some(CoinField::Assets(coins)) => {
                if account.is_none() {
                    account = Some(account_totals(entry));
                }
                for coin in coins {
                    if let Some(asset) = coin_balance(coin) {
                        assets.entry(asset.coin.clone()).or_insert(asset);
                    }
                }
            }
            Some(CoinField::Symbol(symbol)) => {
                if let Some(asset) = flat_balance(symbol, entry) {
                    assets.entry(asset.coin.clone()).or_insert(asset);
                }
            }
            Some(CoinField::Other(_)) | None => {
                if entry.account_type.is_some() && account.is_none() {
                    account = Some(account_totals(entry));
                }
            }
        }
    }

    let settlement = assets
        .get(settle_coin)
        .cloned()
        .unwrap_or_else(|| AssetBalance::empty(settle_coin));

    if settlement.is_empty() {
        debug!(settle_coin, "정산 자산 잔고 없음");
    }

    BalanceSummary {
        account: account.unwrap_or_default(),
        assets,
        settlement,
    }
}

fn account_totals(entry: &RawWalletEntry) -> AccountTotals {
    AccountTotals {
        account_type: entry.account_type.clone(),
        total_equity: parse_decimal(entry.total_equity.as_deref()),
        total_wallet_balance: parse_decimal(entry.total_wallet_balance.as_deref()),
        total_margin_balance: parse_decimal(entry.total_margin_balance.as_deref()),
        total_available_balance: parse_decimal(entry.total_available_balance.as_deref()),
        total_perp_upl: parse_decimal(entry.total_perp_upl.as_deref()),
        total_initial_margin: parse_decimal(entry.total_initial_margin.as_deref()),
        total_maintenance_margin: parse_decimal(entry.total_maintenance_margin.as_deref()),
        account_im_rate: parse_decimal(entry.account_im_rate.as_deref()),
        account_mm_rate: parse_decimal(entry.account_mm_rate.as_deref()),
    }
}

fn coin_balance(raw: &RawCoinBalance) -> Option<AssetBalance> {
    let coin = raw.coin.as_deref().map(str::trim).unwrap_or_default();
    if coin.is_empty() {
        return None;
    }

    Some(AssetBalance {
        coin: coin.to_string(),
        equity: parse_decimal(raw.equity.as_deref()),
        available_to_withdraw: parse_decimal(raw.available_to_withdraw.as_deref()),
        wallet_balance: parse_decimal(raw.wallet_balance.as_deref()),
        unrealised_pnl: parse_decimal(raw.unrealised_pnl.as_deref()),
        cum_realised_pnl: parse_decimal(raw.cum_realised_pnl.as_deref()),
        total_position_im: parse_decimal(raw.total_position_im.as_deref()),
        total_position_mm: parse_decimal(raw.total_position_mm.as_deref()),
        usd_value: parse_decimal(raw.usd_value.as_deref()),
    })
}

fn flat_balance(symbol: &str, entry: &RawWalletEntry) -> Option<AssetBalance> {
    let coin = symbol.trim();
    if coin.is_empty() {
        return None;
    }

    // 평탄한 응답은 자산 평가액을 totalEquity로 보냄
    let equity = parse_decimal(entry.equity.as_deref())
        .or_else(|| parse_decimal(entry.total_equity.as_deref()));

    Some(AssetBalance {
        coin: coin.to_string(),
        equity,
        available_to_withdraw: parse_decimal(entry.available_to_withdraw.as_deref()),
        wallet_balance: parse_decimal(entry.wallet_balance.as_deref()),
        unrealised_pnl: parse_decimal(entry.unrealised_pnl.as_deref()),
        cum_realised_pnl: parse_decimal(entry.cum_realised_pnl.as_deref()),
        ..AssetBalance::empty(coin)
    })
}
