//! Background signal refresh.
//!
//! One task per timeframe sweeps the whole symbol universe, writes each
//! result into that timeframe's column of the [`SignalCache`], then sleeps for
//! the timeframe's refresh interval. Columns are created up front and each one
//! has exactly one writer, so the outer map is immutable and never locked.

use crate::config::RefreshSchedule;
use crate::sources::SignalSource;
use crate::types::{Signal, Timeframe};
use dashmap::DashMap;
use futures_util::FutureExt;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Read access to the latest signal of a (symbol, timeframe) pair.
pub trait SignalLookup {
    /// Never blocks; `Signal::Neutral` for pairs that were never written.
    fn get_signal(&self, symbol: &str, timeframe: &str) -> Signal;
}

/// Latest signal per (symbol, timeframe), one concurrent column per timeframe.
#[derive(Debug, Default)]
pub struct SignalCache {
    columns: HashMap<String, DashMap<String, Signal>>,
}

impl SignalCache {
    /// Create an empty cache with a column for every timeframe label.
    pub fn new<I, S>(timeframes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: timeframes
                .into_iter()
                .map(|label| (label.into(), DashMap::new()))
                .collect(),
        }
    }

    /// Replace the signal for a pair. Returns false if the timeframe has no column.
    pub fn store(&self, symbol: &str, timeframe: &str, signal: Signal) -> bool {
        match self.columns.get(timeframe) {
            Some(column) => {
                column.insert(symbol.to_string(), signal);
                true
            }
            None => false,
        }
    }

    /// Number of pairs written at least once.
    pub fn len(&self) -> usize {
        self.columns.values().map(|c| c.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SignalLookup for SignalCache {
    fn get_signal(&self, symbol: &str, timeframe: &str) -> Signal {
        self.columns
            .get(timeframe)
            .and_then(|column| column.get(symbol).map(|s| *s))
            .unwrap_or_default()
    }
}

/// Outcome of one sweep over the symbol universe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub updated: usize,
    pub failed: usize,
}

/// Everything a timeframe task needs, cheap to clone into each task.
#[derive(Clone)]
struct SweepContext {
    symbols: Arc<Vec<String>>,
    source: Arc<dyn SignalSource>,
    cache: Arc<SignalCache>,
}

impl SweepContext {
    /// Poll every symbol once for `timeframe`, stopping early if asked to.
    /// A failing or panicking call leaves that symbol's previous value in place.
    async fn sweep(&self, timeframe: &Timeframe, stop_rx: &watch::Receiver<bool>) -> SweepReport {
        let mut report = SweepReport::default();

        for symbol in self.symbols.iter() {
            if *stop_rx.borrow() {
                break;
            }

            let call = self
                .source
                .fetch_signal(symbol, &timeframe.interval, &timeframe.label);

            match AssertUnwindSafe(call).catch_unwind().await {
                Ok(Ok(signal)) => {
                    self.cache.store(symbol, &timeframe.label, signal);
                    report.updated += 1;
                }
                Ok(Err(e)) => {
                    report.failed += 1;
                    if e.is_transient() {
                        debug!("Signal fetch failed for {} {}: {}", symbol, timeframe.label, e);
                    } else {
                        warn!("Signal fetch failed for {} {}: {}", symbol, timeframe.label, e);
                    }
                }
                Err(_) => {
                    report.failed += 1;
                    warn!("Signal function panicked for {} {}", symbol, timeframe.label);
                }
            }
        }

        report
    }
}

/// Sleep for `duration` unless a stop arrives first. Returns true when stopping.
pub(crate) async fn wait_or_stop(stop_rx: &mut watch::Receiver<bool>, duration: Duration) -> bool {
    if *stop_rx.borrow() {
        return true;
    }
    let stopped = tokio::select! {
        _ = tokio::time::sleep(duration) => false,
        // Err means the worker was dropped, which also ends the task.
        _ = stop_rx.wait_for(|stop| *stop) => true,
    };
    stopped || *stop_rx.borrow()
}

async fn run_timeframe(
    ctx: SweepContext,
    timeframe: Timeframe,
    every: Duration,
    start_delay: Duration,
    mut stop_rx: watch::Receiver<bool>,
) {
    if !start_delay.is_zero() && wait_or_stop(&mut stop_rx, start_delay).await {
        return;
    }

    info!(
        "Signal worker started for {} ({}), refresh every {:?}",
        timeframe.label, timeframe.interval, every
    );

    loop {
        let report = ctx.sweep(&timeframe, &stop_rx).await;
        debug!(
            "Sweep {} done: {} updated, {} failed",
            timeframe.label, report.updated, report.failed
        );

        if wait_or_stop(&mut stop_rx, every).await {
            break;
        }
    }

    info!("Signal worker for {} stopped", timeframe.label);
}

/// Stop channel and task handles of one `start()`.
struct Running {
    stop_tx: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

/// Keeps a [`SignalCache`] approximately fresh with one task per timeframe.
pub struct SignalWorker {
    ctx: SweepContext,
    timeframes: Vec<Timeframe>,
    schedule: RefreshSchedule,
    start_stagger: Duration,
    running: Mutex<Option<Running>>,
}

impl SignalWorker {
    /// Create a worker and the cache it owns the columns of.
    pub fn new(
        symbols: Vec<String>,
        timeframes: Vec<Timeframe>,
        source: Arc<dyn SignalSource>,
        schedule: RefreshSchedule,
    ) -> Self {
        let cache = Arc::new(SignalCache::new(timeframes.iter().map(|tf| tf.label.clone())));

        Self {
            ctx: SweepContext {
                symbols: Arc::new(symbols),
                source,
                cache,
            },
            timeframes,
            schedule,
            start_stagger: Duration::ZERO,
            running: Mutex::new(None),
        }
    }

    /// Delay each timeframe's first sweep by `index * stagger` to spread load.
    pub fn with_start_stagger(mut self, stagger: Duration) -> Self {
        self.start_stagger = stagger;
        self
    }

    /// Shared handle to the cache this worker writes.
    pub fn cache(&self) -> Arc<SignalCache> {
        self.ctx.cache.clone()
    }

    /// Non-blocking read of the cached signal.
    pub fn get_signal(&self, symbol: &str, timeframe: &str) -> Signal {
        self.ctx.cache.get_signal(symbol, timeframe)
    }

    fn lock_running(&self) -> MutexGuard<'_, Option<Running>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Spawn one refresh task per timeframe. Must be called within a tokio runtime.
    pub fn start(&self) {
        let mut running = self.lock_running();
        if running.is_some() {
            warn!("Signal worker already running");
            return;
        }

        // A fresh channel per start, so tasks from an earlier run never see
        // the stop flag cleared again.
        let (stop_tx, _) = watch::channel(false);
        let handles: Vec<JoinHandle<()>> = self
            .timeframes
            .iter()
            .enumerate()
            .map(|(idx, timeframe)| {
                tokio::spawn(run_timeframe(
                    self.ctx.clone(),
                    timeframe.clone(),
                    self.schedule.for_interval(&timeframe.interval),
                    self.start_stagger.saturating_mul(idx as u32),
                    stop_tx.subscribe(),
                ))
            })
            .collect();

        info!(
            "Started {} signal workers for {} symbols",
            handles.len(),
            self.ctx.symbols.len()
        );
        *running = Some(Running { stop_tx, handles });
    }

    fn signal_stop(&self) -> Vec<JoinHandle<()>> {
        match self.lock_running().take() {
            Some(running) => {
                running.stop_tx.send_replace(true);
                running.handles
            }
            None => Vec::new(),
        }
    }

    /// Ask every task to exit. In-flight signal calls are allowed to finish.
    pub fn stop(&self) {
        let handles = self.signal_stop();
        if !handles.is_empty() {
            info!("Stopping {} signal workers", handles.len());
        }
    }

    /// Stop and wait until every task has exited.
    pub async fn shutdown(&self) {
        for handle in self.signal_stop() {
            if let Err(e) = handle.await {
                warn!("Signal worker task ended abnormally: {}", e);
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.lock_running().is_some()
    }

    /// Run one sweep for a timeframe immediately, outside the schedule.
    pub async fn sweep(&self, timeframe: &Timeframe) -> SweepReport {
        let (_tx, never_stop) = watch::channel(false);
        self.ctx.sweep(timeframe, &never_stop).await
    }
}
