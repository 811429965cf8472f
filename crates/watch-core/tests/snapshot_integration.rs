//! 스냅샷 직렬화 및 에러 분류 통합 테스트

use chrono::{TimeZone, Utc};
use rust_decimal_macros::dec;
use watch_core::{
    AssetBalance, BalanceSummary, DegradedResponse, Endpoint, Position, PositionSide, Snapshot,
    WatchError,
};

fn position(json: &str) -> Position {
    serde_json::from_str(json).unwrap()
}

fn sample_snapshot() -> Snapshot {
    let btc = position(
        r#"{"symbol": "BTCUSDT", "side": "Buy", "size": "0.01",
            "unrealised_pnl": "12.5", "liq_price": "41000"}"#,
    );
    let eth = position(r#"{"symbol": "ETHUSDT", "side": "None"}"#);

    let mut balance = BalanceSummary::empty("USDT");
    balance.settlement = AssetBalance {
        coin: "USDT".to_string(),
        equity: Some(dec!(1000)),
        available_to_withdraw: Some(dec!(800)),
        wallet_balance: Some(dec!(900)),
        ..AssetBalance::empty("USDT")
    };
    balance
        .assets
        .insert("USDT".to_string(), balance.settlement.clone());

    Snapshot {
        positions: vec![btc, eth],
        balance,
        total_unrealized_pnl: dec!(12.5),
        polled_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        interval_secs: 60,
        degraded: Vec::new(),
    }
}

#[test]
fn test_snapshot_json_preserves_decimals_and_order() {
    let snapshot = sample_snapshot();
    let json = serde_json::to_string(&snapshot).unwrap();

    // 빈 degraded 목록은 출력하지 않음
    assert!(!json.contains("degraded"));

    let restored: Snapshot = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, snapshot);
    assert_eq!(
        restored.symbols().collect::<Vec<_>>(),
        vec!["BTCUSDT", "ETHUSDT"]
    );
    assert_eq!(restored.open_position_count(), 1);
    assert_eq!(restored.positions[0].side, PositionSide::Buy);
    assert_eq!(restored.positions[0].liq_price, Some(dec!(41000)));
    assert_eq!(
        restored.balance.settlement.available_to_withdraw,
        Some(dec!(800))
    );
}

#[test]
fn test_degraded_snapshot_reports_endpoint() {
    let mut snapshot = sample_snapshot();
    snapshot.degraded.push(DegradedResponse::new(
        Endpoint::WalletBalance,
        10001,
        "params error",
    ));

    assert!(snapshot.is_degraded());

    let value = serde_json::to_value(&snapshot).unwrap();
    assert_eq!(value["degraded"][0]["endpoint"], "wallet_balance");
    assert_eq!(value["degraded"][0]["code"], 10001);
    assert_eq!(
        snapshot.degraded[0].to_string(),
        "wallet_balance code 10001: params error"
    );
}

#[test]
fn test_error_kinds_serialize_with_tag() {
    let err = WatchError::RateLimitExceeded {
        code: 10006,
        message: "Too many visits!".to_string(),
    };
    assert!(err.is_rate_limited());
    assert!(!err.blocks_activation());

    let value = serde_json::to_value(&err).unwrap();
    assert_eq!(value["kind"], "rate_limit_exceeded");
    assert_eq!(value["code"], 10006);

    assert!(WatchError::invalid_auth("bad key").blocks_activation());
    assert!(WatchError::cannot_connect("timeout").blocks_activation());
    assert!(!WatchError::unexpected("boom").blocks_activation());
}
