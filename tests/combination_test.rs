//! Integration tests for combination matching and the signal board

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use trendgrid::config::TtlTable;
use trendgrid::error::Result;
use trendgrid::services::{
    CombinationEvaluator, MatchRow, MatchSide, MatchSort, PercentChangeCache, SignalBoard,
    SignalCache, SignalLookup, SortOrder, TickerBoard,
};
use trendgrid::sources::KlineSource;
use trendgrid::types::{Candle, Signal, Ticker24h, Timeframe, TimeframeState, TimeframeStates};

/// Lookup backed by a map that counts every read.
struct CountingLookup {
    signals: HashMap<(String, String), Signal>,
    reads: AtomicUsize,
}

impl CountingLookup {
    fn new(entries: &[(&str, &str, Signal)]) -> Self {
        Self {
            signals: entries
                .iter()
                .map(|(s, t, sig)| ((s.to_string(), t.to_string()), *sig))
                .collect(),
            reads: AtomicUsize::new(0),
        }
    }
}

impl SignalLookup for CountingLookup {
    fn get_signal(&self, symbol: &str, timeframe: &str) -> Signal {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.signals
            .get(&(symbol.to_string(), timeframe.to_string()))
            .copied()
            .unwrap_or_default()
    }
}

fn universe() -> Vec<String> {
    vec!["BTCUSDT".into(), "ETHUSDT".into(), "SOLUSDT".into(), "XRPUSDT".into()]
}

fn timeframes() -> Vec<Timeframe> {
    vec![
        Timeframe::new("M15", "15m"),
        Timeframe::new("H1", "1h"),
        Timeframe::new("H4", "4h"),
        Timeframe::new("D1", "1d"),
    ]
}

fn evaluator() -> CombinationEvaluator {
    CombinationEvaluator::new(Arc::new(universe()), timeframes())
}

fn states(entries: &[(&str, TimeframeState)]) -> TimeframeStates {
    entries.iter().map(|(l, s)| (l.to_string(), *s)).collect()
}

#[test]
fn test_rise_requires_all_green_timeframes() {
    let lookup = CountingLookup::new(&[
        ("BTCUSDT", "H1", Signal::Up),
        ("ETHUSDT", "H1", Signal::Up),
        ("SOLUSDT", "H1", Signal::Up),
        ("XRPUSDT", "H1", Signal::Up),
        ("BTCUSDT", "H4", Signal::Up),
        ("ETHUSDT", "H4", Signal::Down),
    ]);
    let states = states(&[("H1", TimeframeState::Green), ("H4", TimeframeState::Green)]);

    let result = evaluator().evaluate(&lookup, &states);

    assert_eq!(result.rise_matches, vec!["BTCUSDT".to_string()]);
    assert!(result.fall_matches.is_empty());
}

#[test]
fn test_all_inactive_reads_nothing() {
    let lookup = CountingLookup::new(&[("BTCUSDT", "H1", Signal::Up)]);

    let result = evaluator().evaluate(&lookup, &TimeframeStates::new());

    assert!(result.rise_matches.is_empty());
    assert!(result.fall_matches.is_empty());
    assert_eq!(lookup.reads.load(Ordering::SeqCst), 0);
}

#[test]
fn test_mismatch_short_circuits() {
    // Nothing is up on M15, so H1..D1 are never read
    let lookup = CountingLookup::new(&[]);
    let states = states(&[
        ("M15", TimeframeState::Green),
        ("H1", TimeframeState::Green),
        ("D1", TimeframeState::Green),
    ]);

    evaluator().evaluate(&lookup, &states);
    assert_eq!(lookup.reads.load(Ordering::SeqCst), universe().len());
}

#[test]
fn test_matches_follow_universe_order() {
    let lookup = CountingLookup::new(&[
        ("XRPUSDT", "D1", Signal::Down),
        ("BTCUSDT", "D1", Signal::Down),
        ("SOLUSDT", "D1", Signal::Down),
    ]);
    let states = states(&[("D1", TimeframeState::Red)]);

    let result = evaluator().evaluate(&lookup, &states);
    assert_eq!(
        result.fall_matches,
        vec!["BTCUSDT".to_string(), "SOLUSDT".to_string(), "XRPUSDT".to_string()]
    );
}

/// Two closes per symbol: 100 then 100 + the symbol's index.
struct StepKlines {
    calls: AtomicUsize,
}

#[async_trait]
impl KlineSource for StepKlines {
    async fn klines(&self, symbol: &str, _interval: &str, _limit: usize) -> Result<Vec<Candle>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = universe().iter().position(|s| s == symbol).unwrap_or(0) as f64 + 1.0;
        Ok([100.0, 100.0 + step]
            .iter()
            .enumerate()
            .map(|(i, &close)| Candle {
                open_time: i as i64,
                open: close,
                high: close,
                low: close,
                close,
            })
            .collect())
    }
}

struct Fixture {
    signals: Arc<SignalCache>,
    klines: Arc<StepKlines>,
    tickers: Arc<TickerBoard>,
    board: Arc<SignalBoard>,
}

fn fixture() -> Fixture {
    let signals = Arc::new(SignalCache::new(timeframes().into_iter().map(|tf| tf.label)));
    let klines = Arc::new(StepKlines {
        calls: AtomicUsize::new(0),
    });
    let percent = Arc::new(PercentChangeCache::new(klines.clone(), TtlTable::default(), 4));
    let tickers = Arc::new(TickerBoard::new(&universe()));
    let board = Arc::new(SignalBoard::new(
        evaluator(),
        signals.clone(),
        percent,
        tickers.clone(),
        TimeframeStates::new(),
    ));
    Fixture {
        signals,
        klines,
        tickers,
        board,
    }
}

fn board() -> (Arc<SignalCache>, Arc<StepKlines>, Arc<SignalBoard>) {
    let f = fixture();
    (f.signals, f.klines, f.board)
}

fn ticker(symbol: &str, change_pct_24h: f64, quote_volume: f64) -> Ticker24h {
    Ticker24h {
        symbol: symbol.to_string(),
        last_price: 1.0,
        change_pct_24h,
        quote_volume,
    }
}

fn order(rows: &[MatchRow]) -> Vec<&str> {
    rows.iter().map(|r| r.symbol.as_str()).collect()
}

async fn wait_for_percent(board: &SignalBoard) {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let snapshot = board.refresh();
            if snapshot.rise.iter().all(|r| r.percent.is_some()) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("percent changes should arrive");
}

#[tokio::test]
async fn test_board_refresh_prefetches_matches() {
    let (signals, klines, board) = board();
    signals.store("BTCUSDT", "H4", Signal::Up);
    signals.store("SOLUSDT", "H4", Signal::Up);
    signals.store("ETHUSDT", "H4", Signal::Down);

    assert_eq!(board.cycle_state("H4"), Some(TimeframeState::Green));
    let snapshot = board.refresh();

    let rise: Vec<&str> = snapshot.rise.iter().map(|r| r.symbol.as_str()).collect();
    assert_eq!(rise, vec!["BTCUSDT", "SOLUSDT"]);
    assert_eq!(snapshot.interval.as_deref(), Some("4h"));
    assert_eq!(snapshot.submitted, 2);

    wait_for_percent(&board).await;
    assert_eq!(klines.calls.load(Ordering::SeqCst), 2);
    assert_eq!(board.refresh().submitted, 0);
}

#[tokio::test]
async fn test_board_percent_sort_uses_24h_change() {
    let Fixture {
        signals,
        tickers,
        board,
        ..
    } = fixture();
    for symbol in universe() {
        signals.store(&symbol, "H1", Signal::Up);
    }
    // 24h change runs opposite to the timeframe change (BTC lowest there)
    tickers.apply(vec![
        ticker("BTCUSDT", 8.0, 10.0),
        ticker("ETHUSDT", -1.0, 40.0),
        ticker("SOLUSDT", 3.0, 20.0),
    ]);
    board.set_state("H1", TimeframeState::Green);
    board.refresh();
    wait_for_percent(&board).await;

    assert_eq!(board.cycle_percent_sort(MatchSide::Rise), SortOrder::Descending);
    let snapshot = board.refresh();
    assert_eq!(snapshot.rise_sort.percent, SortOrder::Descending);
    // XRP has no ticker and goes last
    assert_eq!(
        order(&snapshot.rise),
        vec!["BTCUSDT", "SOLUSDT", "ETHUSDT", "XRPUSDT"]
    );
    assert_eq!(snapshot.rise[0].change_24h, Some(8.0));
    assert!(snapshot.rise[0].percent.is_some());
}

#[tokio::test]
async fn test_board_sorts_each_panel_independently() {
    let Fixture {
        signals,
        tickers,
        board,
        ..
    } = fixture();
    for symbol in ["BTCUSDT", "ETHUSDT", "SOLUSDT"] {
        signals.store(symbol, "H1", Signal::Up);
        signals.store(symbol, "D1", Signal::Down);
    }
    tickers.apply(vec![
        ticker("BTCUSDT", 1.0, 30.0),
        ticker("ETHUSDT", 5.0, 10.0),
        ticker("SOLUSDT", -2.0, 20.0),
    ]);
    board.set_state("H1", TimeframeState::Green);
    board.set_state("D1", TimeframeState::Red);

    assert_eq!(board.cycle_volume_sort(MatchSide::Fall), SortOrder::Descending);
    assert_eq!(board.cycle_volume_sort(MatchSide::Fall), SortOrder::Ascending);
    let snapshot = board.refresh();

    assert_eq!(snapshot.sort(MatchSide::Rise), MatchSort::default());
    assert_eq!(snapshot.fall_sort.volume, SortOrder::Ascending);
    assert_eq!(order(&snapshot.rise), vec!["BTCUSDT", "ETHUSDT", "SOLUSDT"]);
    assert_eq!(order(&snapshot.fall), vec!["ETHUSDT", "SOLUSDT", "BTCUSDT"]);

    assert_eq!(board.cycle_percent_sort(MatchSide::Rise), SortOrder::Descending);
    let snapshot = board.refresh();
    assert_eq!(order(&snapshot.rise), vec!["ETHUSDT", "BTCUSDT", "SOLUSDT"]);
    assert_eq!(order(&snapshot.fall), vec!["ETHUSDT", "SOLUSDT", "BTCUSDT"]);
    assert_eq!(board.sort(MatchSide::Fall).percent, SortOrder::None);
}

#[tokio::test]
async fn test_board_reversal_hints() {
    let (signals, _, board) = board();
    signals.store("ETHUSDT", "D1", Signal::Up);
    signals.store("ETHUSDT", "M15", Signal::Down);
    signals.store("ETHUSDT", "H1", Signal::Down);

    board.set_state("D1", TimeframeState::Green);
    board.set_state("M15", TimeframeState::Red);
    let snapshot = board.refresh();

    assert!(snapshot.hints.tops.contains("ETHUSDT"));
    assert_eq!(snapshot.interval.as_deref(), Some("1d"));
}

#[tokio::test]
async fn test_board_cycle_unknown_label() {
    let (_, _, board) = board();
    assert_eq!(board.cycle_state("W1"), None);
    assert_eq!(board.cycle_state_at(3), Some(TimeframeState::Green));
    assert_eq!(board.cycle_state_at(3), Some(TimeframeState::Red));
    assert_eq!(board.cycle_state_at(3), Some(TimeframeState::Inactive));
    assert_eq!(board.cycle_state_at(42), None);
}

#[tokio::test]
async fn test_board_loop_publishes_and_stops() {
    let (signals, _, board) = board();
    signals.store("BTCUSDT", "M15", Signal::Down);
    board.set_state("M15", TimeframeState::Red);

    let mut snapshots = board.subscribe();
    let (stop_tx, stop_rx) = tokio::sync::watch::channel(false);
    let task = tokio::spawn(board.clone().run(
        Duration::from_secs(60),
        Duration::from_millis(10),
        stop_rx,
    ));

    tokio::time::timeout(Duration::from_secs(2), snapshots.changed())
        .await
        .expect("first evaluation should be published")
        .unwrap();
    assert_eq!(snapshots.borrow().fall.len(), 1);

    stop_tx.send_replace(true);
    tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .expect("loop should stop")
        .unwrap();
}
