//! Bybit 계좌 감시 CLI.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use watch_collector::{poll_once, PollingScheduler, SchedulerEvent};
use watch_core::{init_logging, AppConfig, LogConfig, Snapshot};
use watch_exchange::{validate_credentials, AccountApi, BybitClient};

#[derive(Parser)]
#[command(name = "bybit-watch")]
#[command(about = "Bybit account position and balance watcher", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 설정 파일 경로 (기본: config/default.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// 자격증명 검증 (계좌 정보 1회 조회)
    Validate,

    /// 한 사이클만 실행하고 스냅샷을 JSON으로 출력
    Once {
        /// 들여쓰기된 JSON 출력
        #[arg(long)]
        pretty: bool,
    },

    /// 데몬 모드: Ctrl-C까지 주기적으로 폴링
    Run {
        /// 설정 파일의 폴링 주기 대신 사용할 값 (초)
        #[arg(long)]
        interval: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 설정 로드
    let config = AppConfig::load(cli.config.as_deref()).context("설정 로드 실패")?;

    // 로깅 초기화
    let mut log_config = LogConfig::from_settings(&config.logging);
    if let Some(level) = cli.log_level {
        log_config.level = level;
    }
    init_logging(log_config).map_err(|e| anyhow!("로깅 초기화 실패: {}", e))?;

    tracing::info!(
        api_key = %config.credentials.masked_key(),
        base_url = %config.exchange.rest_base_url,
        "Bybit Watch 시작"
    );

    config.credentials.ensure_present()?;

    let mut polling = config.polling.clone();
    let client = BybitClient::new(config.credentials, &config.exchange)?;
    let api: Arc<dyn AccountApi> = Arc::new(client);

    match cli.command {
        Commands::Validate => {
            validate_credentials(api.as_ref()).await?;
            println!("credentials OK");
        }
        Commands::Once { pretty } => {
            let snapshot = poll_once(api, polling).await?;
            print_snapshot(&snapshot, pretty)?;
        }
        Commands::Run { interval } => {
            // 활성화 전 검증: 인증/연결 실패는 시작을 막음
            validate_credentials(api.as_ref()).await?;

            if let Some(seconds) = interval {
                polling.scan_interval_secs = seconds;
            }

            let shutdown = CancellationToken::new();
            let handle = PollingScheduler::spawn(api, polling, shutdown.clone());
            let mut events = handle.subscribe();

            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        tracing::info!("종료 신호 수신, 스케줄러 종료 중...");
                        break;
                    }
                    event = events.recv() => match event {
                        Ok(SchedulerEvent::SnapshotUpdated(snapshot)) => {
                            log_snapshot(&snapshot);
                        }
                        Ok(SchedulerEvent::CycleFailed(err)) => {
                            tracing::warn!(kind = err.kind(), "사이클 실패, 마지막 스냅샷 유지: {}", err);
                        }
                        Ok(SchedulerEvent::IntervalChanged { seconds }) => {
                            tracing::info!(interval_secs = seconds, "폴링 주기 변경됨");
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "이벤트 수신 지연");
                        }
                        Err(RecvError::Closed) => break,
                    },
                }
            }

            let stats = handle.shutdown().await;
            stats.log_summary("데몬");
        }
    }

    tracing::info!("Bybit Watch 종료");

    Ok(())
}

fn print_snapshot(snapshot: &Snapshot, pretty: bool) -> anyhow::Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(snapshot)?
    } else {
        serde_json::to_string(snapshot)?
    };
    println!("{}", json);
    Ok(())
}

fn log_snapshot(snapshot: &Snapshot) {
    let settlement = &snapshot.balance.settlement;
    tracing::info!(
        positions = snapshot.positions.len(),
        open = snapshot.open_position_count(),
        total_unrealized_pnl = %snapshot.total_unrealized_pnl,
        equity = ?settlement.equity,
        available = ?settlement.available_to_withdraw,
        im_rate_pct = ?snapshot.balance.account.im_rate_percent(),
        mm_rate_pct = ?snapshot.balance.account.mm_rate_percent(),
        "계좌 스냅샷"
    );

    for position in snapshot.positions.iter().filter(|p| p.is_open()) {
        tracing::debug!(
            symbol = %position.symbol,
            side = %position.side,
            size = ?position.size,
            unrealised_pnl = ?position.unrealised_pnl,
            liq_price = ?position.liq_price,
            "포지션"
        );
    }
}
