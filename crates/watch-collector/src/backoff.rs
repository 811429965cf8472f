//! 백오프 컨트롤러.
//!
//! Rate limit 판정에 따라 폴링 주기와 1회성 지연을 조정합니다.
//!
//! - 한도 초과: 연속 실패 수를 늘리고 `min(2^n, 60)`초 지연 + 긴급 주기 확대
//! - 한도 근접: 경고 수를 늘리고, 남은 요청이 5 미만이면 주기를 두 배로 확대
//! - 정상: 경고 이후라면 원래 주기로 복구
//!
//! 상태는 스케줄러 태스크 하나가 단독으로 소유하며 잠금 없이 변경됩니다.

use std::time::Duration;

use serde::Serialize;
use tracing::{error, info, warn};
use watch_core::clamp_scan_interval;
use watch_exchange::RateLimitVerdict;

/// 지연 상한 (초).
pub const MAX_BACKOFF_DELAY_SECS: u64 = 60;

/// 긴급 확대 시 최소 주기 (초).
pub const EMERGENCY_MIN_INTERVAL_SECS: u64 = 300;

/// 한도 근접 확대 시 최대 주기 (초).
pub const PRESSURE_MAX_INTERVAL_SECS: u64 = 300;

/// 주기 확대가 시작되는 남은 요청 수.
pub const PRESSURE_WIDEN_REMAINING: u32 = 5;

/// 현재 주기가 원래 주기보다 넓어진 원인.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WideningCause {
    /// 한도 초과로 인한 긴급 확대
    Emergency,
    /// 한도 근접으로 인한 확대
    Pressure,
}

/// 스케줄링 상태.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchedulerState {
    /// 현재 적용 중인 폴링 주기 (초)
    pub current_interval_secs: u64,
    /// 사용자가 설정한 폴링 주기 (초)
    pub original_interval_secs: u64,
    /// 연속 한도 초과 횟수
    pub consecutive_failures: u32,
    /// 다음 사이클 전 1회성 지연 (초)
    pub pending_delay_secs: u64,
    /// 연속 한도 근접 경고 횟수
    pub warning_count: u32,
    /// 주기 확대 원인 (확대되지 않았으면 None)
    pub widening: Option<WideningCause>,
}

impl SchedulerState {
    /// 설정된 주기로 초기 상태 생성.
    pub fn new(interval_secs: u64) -> Self {
        let interval = clamp_scan_interval(interval_secs);
        Self {
            current_interval_secs: interval,
            original_interval_secs: interval,
            consecutive_failures: 0,
            pending_delay_secs: 0,
            warning_count: 0,
            widening: None,
        }
    }

    /// 주기가 확대되어 있는지 확인.
    pub fn is_widened(&self) -> bool {
        self.current_interval_secs != self.original_interval_secs
    }
}

/// 현재 주기 변경 기록.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalChange {
    /// 이전 주기 (초)
    pub from: u64,
    /// 새 주기 (초)
    pub to: u64,
}

/// 백오프 컨트롤러.
#[derive(Debug, Clone)]
pub struct BackoffController {
    state: SchedulerState,
}

impl BackoffController {
    /// 새 컨트롤러 생성. 주기는 허용 범위로 제한됩니다.
    pub fn new(interval_secs: u64) -> Self {
        Self {
            state: SchedulerState::new(interval_secs),
        }
    }

    /// 현재 상태 조회.
    pub fn state(&self) -> &SchedulerState {
        &self.state
    }

    /// 현재 폴링 주기.
    pub fn current_interval(&self) -> Duration {
        Duration::from_secs(self.state.current_interval_secs)
    }

    /// 대기 중인 지연을 꺼내고 0으로 초기화합니다.
    pub fn take_pending_delay(&mut self) -> Duration {
        Duration::from_secs(std::mem::take(&mut self.state.pending_delay_secs))
    }

    /// 판정 하나를 반영합니다. 현재 주기가 바뀌면 변경 내용을 반환합니다.
    pub fn on_verdict(&mut self, verdict: &RateLimitVerdict) -> Option<IntervalChange> {
        match verdict {
            RateLimitVerdict::Exceeded { code, message } => self.on_exceeded(*code, message),
            RateLimitVerdict::Approaching { remaining, limit } => {
                self.on_approaching(*remaining, *limit)
            }
            RateLimitVerdict::Normal => self.on_normal(),
        }
    }

    fn on_exceeded(&mut self, code: i64, message: &str) -> Option<IntervalChange> {
        let state = &mut self.state;
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);
        state.pending_delay_secs = 1u64
            .checked_shl(state.consecutive_failures)
            .unwrap_or(u64::MAX)
            .min(MAX_BACKOFF_DELAY_SECS);

        error!(
            code,
            ret_msg = message,
            failures = state.consecutive_failures,
            delay_secs = state.pending_delay_secs,
            "요청 한도 초과, 백오프 적용"
        );

        let emergency = state
            .original_interval_secs
            .saturating_mul(4)
            .max(EMERGENCY_MIN_INTERVAL_SECS);
        let change = self.set_current(emergency, Some(WideningCause::Emergency));
        if let Some(change) = change {
            warn!(interval_secs = change.to, "긴급 폴링 주기 적용");
        }
        change
    }

    fn on_approaching(&mut self, remaining: u32, limit: Option<u32>) -> Option<IntervalChange> {
        let state = &mut self.state;
        state.warning_count = state.warning_count.saturating_add(1);

        warn!(
            remaining,
            limit,
            warnings = state.warning_count,
            "요청 한도 근접"
        );

        let doubled = state.original_interval_secs.saturating_mul(2);
        if remaining >= PRESSURE_WIDEN_REMAINING || state.current_interval_secs >= doubled {
            return None;
        }

        // 원래 주기보다 짧아지지 않도록 하한을 둠
        let target = doubled
            .min(PRESSURE_MAX_INTERVAL_SECS)
            .max(state.original_interval_secs);
        if target <= state.current_interval_secs {
            return None;
        }

        let change = self.set_current(target, Some(WideningCause::Pressure));
        if let Some(change) = change {
            warn!(interval_secs = change.to, "한도 근접으로 폴링 주기 임시 확대");
        }
        change
    }

    fn on_normal(&mut self) -> Option<IntervalChange> {
        if self.state.warning_count == 0 {
            return None;
        }

        info!(
            warnings = self.state.warning_count,
            "요청 한도가 안전 수준으로 복귀"
        );
        self.state.warning_count = 0;
        self.restore_original()
    }

    /// 한도 초과 없이 사이클이 끝났을 때 호출합니다.
    pub fn on_cycle_success(&mut self) -> Option<IntervalChange> {
        if self.state.consecutive_failures == 0 {
            return None;
        }

        info!(
            failures = self.state.consecutive_failures,
            "요청 성공, 실패 카운터 초기화"
        );
        self.state.consecutive_failures = 0;
        self.state.pending_delay_secs = 0;

        if self.state.widening == Some(WideningCause::Emergency) {
            self.restore_original()
        } else {
            None
        }
    }

    /// 사용자가 요청한 새 주기를 적용합니다. 진행 중인 확대는 폐기됩니다.
    pub fn update_original_interval(&mut self, interval_secs: u64) -> Option<IntervalChange> {
        let interval = clamp_scan_interval(interval_secs);
        self.state.original_interval_secs = interval;
        let change = self.set_current(interval, None);
        info!(interval_secs = interval, "폴링 주기 변경");
        change
    }

    fn restore_original(&mut self) -> Option<IntervalChange> {
        let original = self.state.original_interval_secs;
        let change = self.set_current(original, None);
        if change.is_some() {
            info!(interval_secs = original, "원래 폴링 주기로 복구");
        }
        change
    }

    fn set_current(&mut self, secs: u64, cause: Option<WideningCause>) -> Option<IntervalChange> {
        let from = self.state.current_interval_secs;
        self.state.current_interval_secs = secs;
        self.state.widening = if secs == self.state.original_interval_secs {
            None
        } else {
            cause
        };

        (from != secs).then_some(IntervalChange { from, to: secs })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn exceeded() -> RateLimitVerdict {
        RateLimitVerdict::Exceeded {
            code: 10006,
            message: "Too many visits!".to_string(),
        }
    }

    fn approaching(remaining: u32) -> RateLimitVerdict {
        RateLimitVerdict::Approaching {
            remaining,
            limit: Some(50),
        }
    }

    #[test]
    fn test_exceeded_sequence() {
        let mut controller = BackoffController::new(60);

        let change = controller.on_verdict(&exceeded());
        assert_eq!(change, Some(IntervalChange { from: 60, to: 300 }));
        assert_eq!(controller.state().pending_delay_secs, 2);
        assert_eq!(controller.state().widening, Some(WideningCause::Emergency));

        assert_eq!(controller.on_verdict(&exceeded()), None);
        assert_eq!(controller.state().pending_delay_secs, 4);

        for _ in 0..10 {
            controller.on_verdict(&exceeded());
        }
        assert_eq!(controller.state().consecutive_failures, 12);
        assert_eq!(controller.state().pending_delay_secs, 60);
        assert_eq!(controller.state().current_interval_secs, 300);
    }

    #[test]
    fn test_emergency_interval_for_long_original() {
        let mut controller = BackoffController::new(600);
        controller.on_verdict(&exceeded());
        assert_eq!(controller.state().current_interval_secs, 2400);
    }

    #[test]
    fn test_take_pending_delay_is_one_shot() {
        let mut controller = BackoffController::new(60);
        controller.on_verdict(&exceeded());

        assert_eq!(controller.take_pending_delay(), Duration::from_secs(2));
        assert_eq!(controller.take_pending_delay(), Duration::ZERO);
        // 실패 카운터는 유지됨
        assert_eq!(controller.state().consecutive_failures, 1);
    }

    #[test]
    fn test_cycle_success_restores_emergency() {
        let mut controller = BackoffController::new(60);
        controller.on_verdict(&exceeded());

        let change = controller.on_cycle_success();
        assert_eq!(change, Some(IntervalChange { from: 300, to: 60 }));
        assert_eq!(controller.state().consecutive_failures, 0);
        assert_eq!(controller.state().pending_delay_secs, 0);
        assert_eq!(controller.state().widening, None);
    }

    #[test]
    fn test_cycle_success_keeps_pressure_widening() {
        let mut controller = BackoffController::new(60);
        controller.on_verdict(&exceeded());
        controller.on_cycle_success();

        controller.on_verdict(&approaching(2));
        assert_eq!(controller.state().current_interval_secs, 120);

        // 실패 카운터가 0이므로 아무것도 바뀌지 않음
        assert_eq!(controller.on_cycle_success(), None);
        assert_eq!(controller.state().current_interval_secs, 120);
        assert_eq!(controller.state().widening, Some(WideningCause::Pressure));
    }

    #[test]
    fn test_approaching_widens_only_below_five() {
        let mut controller = BackoffController::new(60);

        assert_eq!(controller.on_verdict(&approaching(7)), None);
        assert_eq!(controller.state().warning_count, 1);
        assert_eq!(controller.state().current_interval_secs, 60);

        let change = controller.on_verdict(&approaching(4));
        assert_eq!(change, Some(IntervalChange { from: 60, to: 120 }));
        assert_eq!(controller.state().warning_count, 2);

        // 이미 두 배이므로 추가 확대 없음
        assert_eq!(controller.on_verdict(&approaching(1)), None);
        assert_eq!(controller.state().current_interval_secs, 120);
    }

    #[test]
    fn test_approaching_caps_at_five_minutes() {
        let mut controller = BackoffController::new(200);
        controller.on_verdict(&approaching(0));
        assert_eq!(controller.state().current_interval_secs, 300);
    }

    #[test]
    fn test_approaching_never_goes_below_original() {
        let mut controller = BackoffController::new(400);
        assert_eq!(controller.on_verdict(&approaching(0)), None);
        assert_eq!(controller.state().current_interval_secs, 400);
    }

    #[test]
    fn test_normal_after_warning_restores() {
        let mut controller = BackoffController::new(60);
        controller.on_verdict(&approaching(3));

        let change = controller.on_verdict(&RateLimitVerdict::Normal);
        assert_eq!(change, Some(IntervalChange { from: 120, to: 60 }));
        assert_eq!(controller.state().warning_count, 0);

        // 경고가 없으면 정상 판정은 아무것도 하지 않음
        assert_eq!(controller.on_verdict(&RateLimitVerdict::Normal), None);
    }

    #[test]
    fn test_update_interval_discards_widening() {
        let mut controller = BackoffController::new(60);
        controller.on_verdict(&exceeded());
        assert_eq!(controller.state().current_interval_secs, 300);

        let change = controller.update_original_interval(120);
        assert_eq!(change, Some(IntervalChange { from: 300, to: 120 }));
        assert_eq!(controller.state().original_interval_secs, 120);
        assert_eq!(controller.state().current_interval_secs, 120);
        assert_eq!(controller.state().widening, None);
    }

    #[test]
    fn test_update_interval_clamps() {
        let mut controller = BackoffController::new(60);
        controller.update_original_interval(1);
        assert_eq!(controller.state().original_interval_secs, 5);
        controller.update_original_interval(100_000);
        assert_eq!(controller.state().current_interval_secs, 3600);
    }

    fn verdict_strategy() -> impl Strategy<Value = RateLimitVerdict> {
        prop_oneof![
            Just(RateLimitVerdict::Normal),
            (0u32..10).prop_map(approaching),
            Just(exceeded()),
        ]
    }

    proptest! {
        #[test]
        fn prop_consecutive_exceeded(original in 5u64..=3600, n in 1u32..40) {
            let mut controller = BackoffController::new(original);
            for _ in 0..n {
                controller.on_verdict(&exceeded());
            }

            let expected_delay = if n >= 6 { 60 } else { (1u64 << n).min(60) };
            prop_assert_eq!(controller.state().pending_delay_secs, expected_delay);
            prop_assert_eq!(
                controller.state().current_interval_secs,
                (original * 4).max(300)
            );
        }

        #[test]
        fn prop_normal_after_warnings_restores(
            original in 5u64..=3600,
            warnings in proptest::collection::vec(0u32..10, 1..20),
        ) {
            let mut controller = BackoffController::new(original);
            for remaining in warnings {
                controller.on_verdict(&approaching(remaining));
            }
            controller.on_verdict(&RateLimitVerdict::Normal);

            prop_assert_eq!(controller.state().warning_count, 0);
            prop_assert_eq!(controller.state().current_interval_secs, original);
        }

        #[test]
        fn prop_current_never_below_original(
            original in 5u64..=3600,
            steps in proptest::collection::vec((verdict_strategy(), any::<bool>()), 0..50),
        ) {
            let mut controller = BackoffController::new(original);
            for (verdict, cycle_done) in steps {
                let was_exceeded = verdict.is_exceeded();
                controller.on_verdict(&verdict);
                if cycle_done && !was_exceeded {
                    controller.on_cycle_success();
                }
                let state = controller.state();
                prop_assert!(state.current_interval_secs >= state.original_interval_secs);
                prop_assert!(state.pending_delay_secs <= MAX_BACKOFF_DELAY_SECS);
                prop_assert_eq!(state.widening.is_some(), state.is_widened());
            }
        }

        #[test]
        fn prop_update_interval_sets_both(
            original in 5u64..=3600,
            next in 5u64..=3600,
            failures in 0u32..5,
        ) {
            let mut controller = BackoffController::new(original);
            for _ in 0..failures {
                controller.on_verdict(&exceeded());
            }
            controller.update_original_interval(next);
            prop_assert_eq!(controller.state().original_interval_secs, next);
            prop_assert_eq!(controller.state().current_interval_secs, next);
        }
    }
}
