//! 계좌 조회 trait 정의.

use async_trait::async_trait;
use serde_json::Value;

use crate::{ExchangeError, PositionList, RawResponse, WalletBalanceList};

/// 거래소 작업을 위한 Result 타입.
pub type ExchangeResult<T> = Result<T, ExchangeError>;

/// 읽기 전용 계좌 조회 인터페이스.
///
/// 전송 계층 실패만 `Err`로 반환합니다. 0이 아닌 retCode는 `RawResponse`에
/// 그대로 담겨 호출자가 분류합니다.
#[async_trait]
pub trait AccountApi: Send + Sync {
    /// 거래소 이름 반환.
    fn name(&self) -> &str;

    /// 정산 자산 기준 포지션 목록 조회.
    async fn fetch_positions(
        &self,
        category: &str,
        settle_coin: &str,
    ) -> ExchangeResult<RawResponse<PositionList>>;

    /// 계좌 유형의 지갑 잔고 조회.
    async fn fetch_wallet_balance(
        &self,
        account_type: &str,
    ) -> ExchangeResult<RawResponse<WalletBalanceList>>;

    /// 계좌 정보 조회 (자격증명 검증용).
    async fn fetch_account_info(&self) -> ExchangeResult<RawResponse<Value>>;
}
