//! Periodic evaluation of the filter combinations.
//!
//! The board owns the user's filter state, re-evaluates it against the signal
//! cache on its own timer and publishes the result as an immutable
//! [`BoardSnapshot`] over a watch channel.

use crate::services::combination::CombinationEvaluator;
use crate::services::percent_change::PercentChangeCache;
use crate::services::signal_cache::SignalCache;
use crate::services::ticker_board::TickerBoard;
use crate::types::{ReversalHints, Timeframe, TimeframeState, TimeframeStates};
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tracing::{debug, info};

/// Direction of one presentation sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    None,
    Descending,
    Ascending,
}

impl SortOrder {
    /// none -> descending -> ascending -> none
    pub fn next(self) -> Self {
        match self {
            Self::None => Self::Descending,
            Self::Descending => Self::Ascending,
            Self::Ascending => Self::None,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::None => "",
            Self::Descending => "▼",
            Self::Ascending => "▲",
        }
    }
}

/// Which combination panel a sort belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchSide {
    Rise,
    Fall,
}

/// Presentation ordering of one match list.
///
/// Percent keys on the 24h change. Volume is applied after percent, so when
/// both are set volume wins and percent breaks ties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MatchSort {
    pub percent: SortOrder,
    pub volume: SortOrder,
}

/// Missing values sort last in either direction.
fn compare_optional(a: Option<f64>, b: Option<f64>, order: SortOrder) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => {
            let ord = a.partial_cmp(&b).unwrap_or(Ordering::Equal);
            if order == SortOrder::Descending {
                ord.reverse()
            } else {
                ord
            }
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

impl MatchSort {
    /// Reorder rows in place. Stable, so unsorted rows keep universe order.
    pub fn apply(&self, rows: &mut [MatchRow]) {
        if self.percent != SortOrder::None {
            rows.sort_by(|a, b| compare_optional(a.change_24h, b.change_24h, self.percent));
        }
        if self.volume != SortOrder::None {
            rows.sort_by(|a, b| compare_optional(a.quote_volume, b.quote_volume, self.volume));
        }
    }
}

/// One matched symbol with the figures shown next to it.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchRow {
    pub symbol: String,
    /// Percent change at the highest active interval, when known.
    pub percent: Option<f64>,
    /// 24h percent change from the ticker board, when known.
    pub change_24h: Option<f64>,
    /// 24h quote volume, when known.
    pub quote_volume: Option<f64>,
}

/// Result of one evaluation.
#[derive(Debug, Clone, Default)]
pub struct BoardSnapshot {
    pub rise: Vec<MatchRow>,
    pub fall: Vec<MatchRow>,
    pub hints: ReversalHints,
    /// Interval the percent column refers to.
    pub interval: Option<String>,
    pub states: TimeframeStates,
    pub rise_sort: MatchSort,
    pub fall_sort: MatchSort,
    /// Prefetch tasks submitted by this evaluation.
    pub submitted: usize,
    pub evaluated_at: Option<DateTime<Utc>>,
}

impl BoardSnapshot {
    pub fn sort(&self, side: MatchSide) -> MatchSort {
        match side {
            MatchSide::Rise => self.rise_sort,
            MatchSide::Fall => self.fall_sort,
        }
    }
}

/// Filter state, evaluation and publication of the combination views.
pub struct SignalBoard {
    evaluator: CombinationEvaluator,
    signals: Arc<SignalCache>,
    percent: Arc<PercentChangeCache>,
    tickers: Arc<TickerBoard>,
    states: Mutex<TimeframeStates>,
    rise_sort: Mutex<MatchSort>,
    fall_sort: Mutex<MatchSort>,
    snapshot_tx: watch::Sender<Arc<BoardSnapshot>>,
    wake: Notify,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SignalBoard {
    pub fn new(
        evaluator: CombinationEvaluator,
        signals: Arc<SignalCache>,
        percent: Arc<PercentChangeCache>,
        tickers: Arc<TickerBoard>,
        initial_states: TimeframeStates,
    ) -> Self {
        let (snapshot_tx, _) = watch::channel(Arc::new(BoardSnapshot::default()));
        Self {
            evaluator,
            signals,
            percent,
            tickers,
            states: Mutex::new(initial_states),
            rise_sort: Mutex::new(MatchSort::default()),
            fall_sort: Mutex::new(MatchSort::default()),
            snapshot_tx,
            wake: Notify::new(),
        }
    }

    pub fn symbols(&self) -> &[String] {
        self.evaluator.symbols()
    }

    pub fn timeframes(&self) -> &[Timeframe] {
        self.evaluator.timeframes()
    }

    pub fn signals(&self) -> &Arc<SignalCache> {
        &self.signals
    }

    pub fn tickers(&self) -> &Arc<TickerBoard> {
        &self.tickers
    }

    pub fn states(&self) -> TimeframeStates {
        lock(&self.states).clone()
    }

    /// Latest published evaluation.
    pub fn snapshot(&self) -> Arc<BoardSnapshot> {
        self.snapshot_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<BoardSnapshot>> {
        self.snapshot_tx.subscribe()
    }

    /// Ask the refresh loop to evaluate now.
    pub fn request_refresh(&self) {
        self.wake.notify_one();
    }

    /// Rotate a timeframe through inactive -> green -> red. `None` for an
    /// unknown label.
    pub fn cycle_state(&self, label: &str) -> Option<TimeframeState> {
        if !self.timeframes().iter().any(|tf| tf.label == label) {
            return None;
        }
        let next = lock(&self.states).cycle(label);
        debug!("Timeframe {} -> {:?}", label, next);
        self.request_refresh();
        Some(next)
    }

    /// Same as [`cycle_state`](Self::cycle_state) for the n-th timeframe.
    pub fn cycle_state_at(&self, index: usize) -> Option<TimeframeState> {
        let label = self.timeframes().get(index)?.label.clone();
        self.cycle_state(&label)
    }

    pub fn set_state(&self, label: &str, state: TimeframeState) {
        lock(&self.states).set(label, state);
        self.request_refresh();
    }

    fn sort_slot(&self, side: MatchSide) -> &Mutex<MatchSort> {
        match side {
            MatchSide::Rise => &self.rise_sort,
            MatchSide::Fall => &self.fall_sort,
        }
    }

    pub fn sort(&self, side: MatchSide) -> MatchSort {
        *lock(self.sort_slot(side))
    }

    pub fn cycle_percent_sort(&self, side: MatchSide) -> SortOrder {
        let mut sort = lock(self.sort_slot(side));
        sort.percent = sort.percent.next();
        self.request_refresh();
        sort.percent
    }

    pub fn cycle_volume_sort(&self, side: MatchSide) -> SortOrder {
        let mut sort = lock(self.sort_slot(side));
        sort.volume = sort.volume.next();
        self.request_refresh();
        sort.volume
    }

    fn rows(&self, symbols: Vec<String>, interval: Option<&str>) -> Vec<MatchRow> {
        symbols
            .into_iter()
            .map(|symbol| {
                let ticker = self.tickers.get(&symbol);
                MatchRow {
                    percent: interval.and_then(|i| self.percent.peek(&symbol, i)),
                    change_24h: ticker.as_ref().map(|t| t.change_pct_24h),
                    quote_volume: ticker.as_ref().map(|t| t.quote_volume),
                    symbol,
                }
            })
            .collect()
    }

    /// Evaluate, queue percent-change fetches for the matches and publish.
    pub fn refresh(&self) -> Arc<BoardSnapshot> {
        let states = self.states();
        let rise_sort = self.sort(MatchSide::Rise);
        let fall_sort = self.sort(MatchSide::Fall);

        let result = self.evaluator.evaluate(self.signals.as_ref(), &states);
        let hints = self.evaluator.evaluate_reversals(self.signals.as_ref(), &states);
        let interval = self
            .evaluator
            .highest_active_interval(&states)
            .map(str::to_string);

        let submitted = match &interval {
            Some(interval) if !result.is_empty() => self
                .percent
                .prefetch_async(&result.matched_symbols(), interval),
            _ => 0,
        };

        let mut rise = self.rows(result.rise_matches, interval.as_deref());
        let mut fall = self.rows(result.fall_matches, interval.as_deref());
        rise_sort.apply(&mut rise);
        fall_sort.apply(&mut fall);

        let snapshot = Arc::new(BoardSnapshot {
            rise,
            fall,
            hints,
            interval,
            states,
            rise_sort,
            fall_sort,
            submitted,
            evaluated_at: Some(Utc::now()),
        });
        self.snapshot_tx.send_replace(snapshot.clone());
        snapshot
    }

    /// Evaluate every `every`, on request, and once more `redraw_delay` after
    /// an evaluation that queued prefetches.
    pub async fn run(
        self: Arc<Self>,
        every: Duration,
        redraw_delay: Duration,
        mut stop_rx: watch::Receiver<bool>,
    ) {
        info!("Signal board evaluating every {:?}", every);
        let mut followup = false;

        loop {
            if *stop_rx.borrow() {
                break;
            }

            let snapshot = self.refresh();
            let wait = if snapshot.submitted > 0 && !followup {
                followup = true;
                redraw_delay.min(every)
            } else {
                followup = false;
                every
            };

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = self.wake.notified() => {}
                _ = stop_rx.wait_for(|stop| *stop) => break,
            }
        }

        info!("Signal board stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(symbol: &str, change_24h: Option<f64>, volume: Option<f64>) -> MatchRow {
        MatchRow {
            symbol: symbol.to_string(),
            percent: None,
            change_24h,
            quote_volume: volume,
        }
    }

    fn symbols(rows: &[MatchRow]) -> Vec<&str> {
        rows.iter().map(|r| r.symbol.as_str()).collect()
    }

    #[test]
    fn test_sort_order_cycles() {
        assert_eq!(SortOrder::None.next(), SortOrder::Descending);
        assert_eq!(SortOrder::Descending.next(), SortOrder::Ascending);
        assert_eq!(SortOrder::Ascending.next(), SortOrder::None);
    }

    #[test]
    fn test_unsorted_keeps_order() {
        let mut rows = vec![row("B", Some(1.0), None), row("A", Some(5.0), None)];
        MatchSort::default().apply(&mut rows);
        assert_eq!(symbols(&rows), vec!["B", "A"]);
    }

    #[test]
    fn test_percent_sort_missing_last() {
        let mut rows = vec![
            row("A", None, None),
            row("B", Some(-2.0), None),
            row("C", Some(3.0), None),
        ];
        let sort = MatchSort {
            percent: SortOrder::Descending,
            volume: SortOrder::None,
        };
        sort.apply(&mut rows);
        assert_eq!(symbols(&rows), vec!["C", "B", "A"]);

        let sort = MatchSort {
            percent: SortOrder::Ascending,
            volume: SortOrder::None,
        };
        sort.apply(&mut rows);
        assert_eq!(symbols(&rows), vec!["B", "C", "A"]);
    }

    #[test]
    fn test_volume_overrides_percent() {
        let mut rows = vec![
            row("A", Some(9.0), Some(10.0)),
            row("B", Some(1.0), Some(30.0)),
            row("C", Some(5.0), Some(10.0)),
        ];
        let sort = MatchSort {
            percent: SortOrder::Descending,
            volume: SortOrder::Descending,
        };
        sort.apply(&mut rows);
        assert_eq!(symbols(&rows), vec!["B", "A", "C"]);
    }
}
