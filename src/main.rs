use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use trendgrid::config::Config;
use trendgrid::services::{
    CombinationEvaluator, PercentChangeCache, SignalBoard, SignalWorker, TickerBoard,
};
use trendgrid::sources::{BinanceClient, IndicatorSignalSource};
use trendgrid::tui::{run_tui, LogBuffer, LogMakeWriter};

/// Log each evaluation until Ctrl+C.
async fn run_headless(board: Arc<SignalBoard>) {
    let mut snapshots = board.subscribe();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                let symbols = |rows: &[trendgrid::services::MatchRow]| {
                    rows.iter().map(|r| r.symbol.as_str()).collect::<Vec<_>>().join(",")
                };
                info!(
                    "rise={} [{}] fall={} [{}] tops={} dips={} interval={}",
                    snapshot.rise.len(),
                    symbols(&snapshot.rise),
                    snapshot.fall.len(),
                    symbols(&snapshot.fall),
                    snapshot.hints.tops.len(),
                    snapshot.hints.dips.len(),
                    snapshot.interval.as_deref().unwrap_or("-"),
                );
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Config::from_env();
    let logs = Arc::new(LogBuffer::new(500));

    // Initialize tracing; the dashboard owns the screen, so logs go to its buffer
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "trendgrid=info".into());
    if config.headless {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(LogMakeWriter::new(logs.clone())),
            )
            .init();
    }

    config.validate()?;
    info!(
        "Starting trendgrid: {} symbols x {} timeframes, indicator {:?}",
        config.symbols.len(),
        config.timeframes.len(),
        config.indicator
    );

    let client = Arc::new(BinanceClient::new(config.binance_url.clone()));

    let signal_source = Arc::new(IndicatorSignalSource::from_config(client.clone(), &config));
    let worker = SignalWorker::new(
        config.symbols.clone(),
        config.timeframes.clone(),
        signal_source,
        config.refresh.clone(),
    )
    .with_start_stagger(config.worker_start_stagger);
    worker.start();

    let percent = Arc::new(PercentChangeCache::new(
        client.clone(),
        config.ttl.clone(),
        config.prefetch_pool_size,
    ));
    let tickers = Arc::new(TickerBoard::new(&config.symbols));
    let evaluator = CombinationEvaluator::new(Arc::new(config.symbols.clone()), config.timeframes.clone())
        .with_pivot(config.reversal_pivot.clone());
    let board = Arc::new(SignalBoard::new(
        evaluator,
        worker.cache(),
        percent,
        tickers.clone(),
        config.initial_states.clone(),
    ));

    let (stop_tx, stop_rx) = watch::channel(false);
    let ticker_task = tokio::spawn(tickers.run(
        client.clone(),
        config.ticker_poll_interval,
        stop_rx.clone(),
    ));
    let board_task = tokio::spawn(board.clone().run(
        config.combination_refresh,
        config.prefetch_redraw_delay,
        stop_rx,
    ));

    let result = if config.headless {
        run_headless(board).await;
        Ok(())
    } else {
        run_tui(board, logs).await
    };

    info!("Shutting down");
    stop_tx.send_replace(true);
    worker.shutdown().await;
    let (ticker_result, board_result) = tokio::join!(ticker_task, board_task);
    if let Err(e) = ticker_result {
        warn!("Ticker task ended abnormally: {}", e);
    }
    if let Err(e) = board_result {
        warn!("Board task ended abnormally: {}", e);
    }

    Ok(result?)
}
