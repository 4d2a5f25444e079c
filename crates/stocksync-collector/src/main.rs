//! Standalone price synchronization CLI.

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stocksync_collector::modules::{sync_prices, PriceSyncOptions};
use stocksync_collector::CollectorConfig;
use stocksync_data::CheckpointStore;

#[derive(Parser)]
#[command(name = "stocksync-collector")]
#[command(about = "StockSync Daily Price Synchronizer", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// 일별 시세 동기화 (체크포인트 기반 재개 지원)
    SyncPrices {
        /// 수집 기간 (년, 미지정 시 설정값)
        #[arg(long)]
        years: Option<u32>,

        /// 처리할 최대 종목 수 (0이면 무제한)
        #[arg(long, default_value_t = 0)]
        limit: usize,

        /// 우선순위 종목만 처리
        #[arg(long)]
        priority_only: bool,

        /// 갭 분석을 무시하고 전체 범위 재수집
        #[arg(long)]
        force: bool,

        /// 미완료 실행을 재개하지 않고 새로 시작
        #[arg(long)]
        fresh: bool,

        /// 단일 종목만 보수 (예: "7203.T")
        #[arg(long)]
        stock: Option<String>,
    },

    /// 최근 동기화 실행 이력 조회
    Status,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // 로깅 초기화
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "stocksync_collector={level},stocksync_data={level}",
                    level = cli.log_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("StockSync Collector 시작");

    // 설정 로드
    let config = CollectorConfig::from_env()?;
    tracing::debug!(database_url = %config.database_url, "설정 로드 완료");

    // DB 연결
    let pool = stocksync_data::connect_pool(&config.database_url).await?;
    tracing::info!("데이터베이스 연결 성공");

    // 명령 실행
    match cli.command {
        Commands::SyncPrices {
            years,
            limit,
            priority_only,
            force,
            fresh,
            stock,
        } => {
            // Ctrl+C 수신 시 취소 신호 전파 (현재 종목까지 기록 후 중단)
            let shutdown = CancellationToken::new();
            let signal_token = shutdown.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("종료 신호 수신, 현재 종목 처리 후 중단합니다");
                    signal_token.cancel();
                }
            });

            let options = PriceSyncOptions {
                lookback_years: years,
                limit,
                priority_only,
                force,
                fresh,
                stock,
            };

            let stats = sync_prices(&pool, &config, &options, shutdown).await?;
            if stats.interrupted {
                tracing::info!("중단된 실행은 다음 호출에서 자동 재개됩니다");
            }
        }
        Commands::Status => {
            let checkpoints = CheckpointStore::new(pool.clone());
            let runs = checkpoints.list_runs(10).await?;

            if runs.is_empty() {
                println!("동기화 실행 이력이 없습니다");
            }
            for run in runs {
                println!(
                    "{} | {} | {}/{} 처리 (성공 {}, 실패 {}) | {} 레코드 | 시작 {}",
                    run.run_id,
                    run.status,
                    run.checkpoint_stocks_processed,
                    run.checkpoint_stocks_total,
                    run.checkpoint_stocks_successful,
                    run.checkpoint_stocks_failed,
                    run.prices_records_updated,
                    run.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
                );
            }
        }
    }

    pool.close().await;
    tracing::info!("StockSync Collector 종료");

    Ok(())
}
