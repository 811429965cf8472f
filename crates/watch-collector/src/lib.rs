//! Bybit 계좌 폴링 서비스.
//!
//! 이 crate는 계좌 상태를 주기적으로 조회하는 구성 요소를 제공합니다:
//! - 백오프 컨트롤러 (요청 한도 판정에 따른 지연/주기 조정)
//! - 폴링 스케줄러 (단일 태스크 대기/조회/발행 루프)
//! - 데이터 집계 (원시 응답 → 스냅샷)
//! - 사이클 통계

pub mod aggregator;
pub mod backoff;
pub mod scheduler;
pub mod stats;

pub use aggregator::aggregate;
pub use backoff::{BackoffController, IntervalChange, SchedulerState, WideningCause};
pub use scheduler::{
    poll_once, PollingScheduler, SchedulerCommand, SchedulerEvent, SchedulerHandle,
    SchedulerPhase,
};
pub use stats::CycleStats;
