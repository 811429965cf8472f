//! 폴링 스케줄러.
//!
//! 하나의 tokio 태스크가 클라이언트와 백오프 상태를 단독으로 소유하고
//! `대기 → 조회 → 발행 → 대기` 루프를 돕니다.
//!
//! # 동작
//!
//! - 첫 사이클은 시작 직후 실행됩니다.
//! - 대기 시간은 사이클 완료 시점부터 `백오프 지연 + 현재 주기`입니다.
//! - 명령(`Refresh`, `UpdateInterval`)은 대기 중에만 처리되므로 사이클이 겹치지 않습니다.
//! - 종료 신호는 대기를 즉시 끝내지만, 진행 중인 조회는 끝까지 기다립니다.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use watch_core::{PollingConfig, Snapshot, WatchError, WatchResult};
use watch_exchange::{AccountApi, ExchangeError, RateLimitVerdict};

use crate::aggregator::aggregate;
use crate::backoff::{BackoffController, IntervalChange};
use crate::stats::CycleStats;

/// 이벤트 브로드캐스트 채널 용량.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// 스케줄러 단계.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerPhase {
    /// 시작 전
    Idle,
    /// 다음 사이클 대기 중
    Waiting,
    /// 조회 중
    Fetching,
    /// 마지막 사이클 성공
    Succeeded,
    /// 마지막 사이클 실패
    Failed,
    /// 종료됨
    Stopped,
}

/// 스케줄러 명령.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerCommand {
    /// 주기를 기다리지 않고 다음 사이클 실행 (백오프 지연은 유지)
    Refresh,
    /// 사용자 폴링 주기 변경 (초)
    UpdateInterval(u64),
}

/// 구독자에게 전달되는 이벤트.
#[derive(Debug, Clone)]
pub enum SchedulerEvent {
    /// 새 스냅샷 발행
    SnapshotUpdated(Arc<Snapshot>),
    /// 사이클 실패 (마지막 스냅샷은 유지됨)
    CycleFailed(WatchError),
    /// 현재 폴링 주기 변경
    IntervalChanged { seconds: u64 },
}

/// 실행 중인 스케줄러에 대한 핸들.
pub struct SchedulerHandle {
    commands: mpsc::UnboundedSender<SchedulerCommand>,
    snapshot: watch::Receiver<Option<Arc<Snapshot>>>,
    phase: watch::Receiver<SchedulerPhase>,
    events: broadcast::Sender<SchedulerEvent>,
    shutdown: CancellationToken,
    task: Option<JoinHandle<CycleStats>>,
}

impl SchedulerHandle {
    /// 마지막으로 성공한 스냅샷.
    pub fn latest_snapshot(&self) -> Option<Arc<Snapshot>> {
        self.snapshot.borrow().clone()
    }

    /// 이벤트 구독.
    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.events.subscribe()
    }

    /// 현재 단계.
    pub fn phase(&self) -> SchedulerPhase {
        *self.phase.borrow()
    }

    /// 단계 변경 감시용 수신기.
    pub fn watch_phase(&self) -> watch::Receiver<SchedulerPhase> {
        self.phase.clone()
    }

    /// 즉시 새로고침 요청.
    pub fn refresh(&self) {
        self.send(SchedulerCommand::Refresh);
    }

    /// 폴링 주기 변경 요청. 다음 대기부터 적용됩니다.
    pub fn update_interval(&self, seconds: u64) {
        self.send(SchedulerCommand::UpdateInterval(seconds));
    }

    fn send(&self, command: SchedulerCommand) {
        if self.commands.send(command).is_err() {
            warn!(?command, "스케줄러가 이미 종료되어 명령을 무시함");
        }
    }

    /// 스케줄러를 종료하고 누적 통계를 반환합니다.
    pub async fn shutdown(mut self) -> CycleStats {
        self.shutdown.cancel();
        self.join().await
    }

    /// 스케줄러 태스크가 끝날 때까지 기다립니다.
    pub async fn join(&mut self) -> CycleStats {
        let Some(task) = self.task.take() else {
            return CycleStats::default();
        };

        match task.await {
            Ok(stats) => stats,
            Err(e) => {
                error!("스케줄러 태스크 비정상 종료: {}", e);
                CycleStats::default()
            }
        }
    }
}

/// 폴링 스케줄러.
pub struct PollingScheduler {
    api: Arc<dyn AccountApi>,
    polling: PollingConfig,
    backoff: BackoffController,
    stats: CycleStats,
    commands: mpsc::UnboundedReceiver<SchedulerCommand>,
    commands_open: bool,
    snapshot: watch::Sender<Option<Arc<Snapshot>>>,
    phase: watch::Sender<SchedulerPhase>,
    events: broadcast::Sender<SchedulerEvent>,
    shutdown: CancellationToken,
}

impl PollingScheduler {
    /// 새 스케줄러와 핸들 생성. 실행은 `run` 또는 `spawn`으로 시작합니다.
    pub fn new(
        api: Arc<dyn AccountApi>,
        polling: PollingConfig,
        shutdown: CancellationToken,
    ) -> (Self, SchedulerHandle) {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(None);
        let (phase_tx, phase_rx) = watch::channel(SchedulerPhase::Idle);
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let backoff = BackoffController::new(polling.interval_secs());

        let scheduler = Self {
            api,
            polling,
            backoff,
            stats: CycleStats::new(),
            commands: commands_rx,
            commands_open: true,
            snapshot: snapshot_tx,
            phase: phase_tx,
            events: events_tx.clone(),
            shutdown: shutdown.clone(),
        };

        let handle = SchedulerHandle {
            commands: commands_tx,
            snapshot: snapshot_rx,
            phase: phase_rx,
            events: events_tx,
            shutdown,
            task: None,
        };

        (scheduler, handle)
    }

    /// 스케줄러를 별도 태스크로 실행합니다.
    pub fn spawn(
        api: Arc<dyn AccountApi>,
        polling: PollingConfig,
        shutdown: CancellationToken,
    ) -> SchedulerHandle {
        let (scheduler, mut handle) = Self::new(api, polling, shutdown);
        handle.task = Some(tokio::spawn(scheduler.run()));
        handle
    }

    /// 메인 루프. 종료 시 누적 통계를 반환합니다.
    pub async fn run(mut self) -> CycleStats {
        info!(
            exchange = self.api.name(),
            interval_secs = self.backoff.state().current_interval_secs,
            category = %self.polling.category,
            settle_coin = %self.polling.settle_coin,
            "폴링 스케줄러 시작"
        );

        let mut first_cycle = true;
        loop {
            if !self.wait(first_cycle).await {
                break;
            }
            first_cycle = false;

            self.run_cycle().await;

            if self.shutdown.is_cancelled() {
                break;
            }
        }

        self.phase.send_replace(SchedulerPhase::Stopped);
        self.stats.log_summary("폴링 스케줄러 종료");
        self.stats
    }

    /// 다음 사이클까지 대기합니다. 종료 신호를 받으면 `false`.
    async fn wait(&mut self, immediate: bool) -> bool {
        self.phase.send_replace(SchedulerPhase::Waiting);

        let delay = self.backoff.take_pending_delay();
        let backoff_until = Instant::now() + delay;
        if !delay.is_zero() {
            debug!(delay_secs = delay.as_secs(), "백오프 지연 적용");
        }

        let mut skip_interval = immediate;
        loop {
            let deadline = if skip_interval {
                backoff_until
            } else {
                backoff_until + self.backoff.current_interval()
            };

            tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => {
                    debug!("대기 중 종료 신호 수신");
                    return false;
                }

                command = self.commands.recv(), if self.commands_open => match command {
                    Some(SchedulerCommand::Refresh) => {
                        info!("수동 새로고침 요청");
                        skip_interval = true;
                    }
                    Some(SchedulerCommand::UpdateInterval(seconds)) => {
                        let change = self.backoff.update_original_interval(seconds);
                        self.publish_interval_change(change);
                    }
                    None => {
                        self.commands_open = false;
                    }
                },

                _ = tokio::time::sleep_until(deadline) => return true,
            }
        }
    }

    /// 조회 사이클 하나를 실행하고 결과를 발행합니다.
    async fn run_cycle(&mut self) {
        self.phase.send_replace(SchedulerPhase::Fetching);
        let started = Instant::now();

        match self.fetch_cycle().await {
            Ok(snapshot) => {
                let degraded = snapshot.is_degraded();
                info!(
                    positions = snapshot.positions.len(),
                    total_unrealized_pnl = %snapshot.total_unrealized_pnl,
                    degraded,
                    "스냅샷 갱신"
                );

                let snapshot = Arc::new(snapshot);
                self.snapshot.send_replace(Some(Arc::clone(&snapshot)));
                let _ = self.events.send(SchedulerEvent::SnapshotUpdated(snapshot));

                let change = self.backoff.on_cycle_success();
                self.publish_interval_change(change);

                self.stats.record_success(degraded, started.elapsed());
                self.phase.send_replace(SchedulerPhase::Succeeded);
            }
            Err(err) => {
                error!(kind = err.kind(), error = %err, "폴링 사이클 실패");
                self.stats.record_failure(&err, started.elapsed());
                let _ = self.events.send(SchedulerEvent::CycleFailed(err));
                self.phase.send_replace(SchedulerPhase::Failed);
            }
        }
    }

    /// 포지션 → 잔고 순서로 조회합니다. 한도 초과가 나오면 즉시 실패합니다.
    async fn fetch_cycle(&mut self) -> WatchResult<Snapshot> {
        let interval_secs = self.backoff.state().current_interval_secs;

        let positions = match self
            .api
            .fetch_positions(&self.polling.category, &self.polling.settle_coin)
            .await
        {
            Ok(response) => response,
            Err(e) => return Err(self.transport_failure(e)),
        };

        let positions_verdict = positions.rate_limit_verdict();
        if positions_verdict.is_exceeded() {
            return Err(self.fail_on_verdict(&positions_verdict));
        }

        let balance = match self
            .api
            .fetch_wallet_balance(&self.polling.account_type)
            .await
        {
            Ok(response) => response,
            Err(e) => {
                self.apply_verdict(&positions_verdict);
                return Err(self.transport_failure(e));
            }
        };

        let balance_verdict = balance.rate_limit_verdict();
        if balance_verdict.is_exceeded() {
            self.apply_verdict(&positions_verdict);
            return Err(self.fail_on_verdict(&balance_verdict));
        }

        self.apply_verdict(&positions_verdict.most_severe(balance_verdict));

        Ok(aggregate(
            &positions,
            &balance,
            &self.polling.settle_coin,
            interval_secs,
            chrono::Utc::now(),
        ))
    }

    fn apply_verdict(&mut self, verdict: &RateLimitVerdict) {
        let change = self.backoff.on_verdict(verdict);
        self.publish_interval_change(change);
    }

    /// 한도 초과 판정을 백오프에 반영하고 사이클 에러로 바꿉니다.
    fn fail_on_verdict(&mut self, verdict: &RateLimitVerdict) -> WatchError {
        self.apply_verdict(verdict);
        verdict
            .to_error()
            .unwrap_or_else(|| {
                WatchError::unexpected(format!("한도 초과가 아닌 판정: {:?}", verdict))
            })
    }

    /// 전송 계층 실패를 분류합니다.
    ///
    /// HTTP 수준 한도 초과는 백오프에 반영합니다. 인증 실패는 초기 검증에서만
    /// 보고하므로 사이클 중의 401/403은 연결 실패로 분류합니다.
    fn transport_failure(&mut self, err: ExchangeError) -> WatchError {
        match err {
            ExchangeError::RateLimited { status, message } => {
                self.fail_on_verdict(&RateLimitVerdict::Exceeded {
                    code: i64::from(status),
                    message,
                })
            }
            ExchangeError::Unauthorized(_) => {
                warn!(error = %err, "사이클 중 인증 거부, 연결 실패로 처리");
                WatchError::cannot_connect(err.to_string())
            }
            other => other.into(),
        }
    }

    fn publish_interval_change(&self, change: Option<IntervalChange>) {
        if let Some(change) = change {
            debug!(from = change.from, to = change.to, "현재 폴링 주기 변경");
            let _ = self
                .events
                .send(SchedulerEvent::IntervalChanged { seconds: change.to });
        }
    }
}

/// 대기 없이 한 사이클만 실행합니다 (`once` 명령용).
pub async fn poll_once(api: Arc<dyn AccountApi>, polling: PollingConfig) -> WatchResult<Snapshot> {
    let (mut scheduler, _handle) = PollingScheduler::new(api, polling, CancellationToken::new());
    scheduler.fetch_cycle().await
}
