//! Cross-timeframe agreement sets.

use crate::services::signal_cache::SignalLookup;
use crate::types::{CombinationResult, ReversalHints, Signal, Timeframe, TimeframeState, TimeframeStates};
use std::sync::Arc;
use tracing::debug;

/// Which side of a reversal dominates, decided by the highest-ranked timeframe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MajorSide {
    Green,
    Red,
    Tie,
}

/// Derives rise/fall match sets from the signal cache and the filter state.
///
/// Symbols are visited in universe order and timeframes in configured order,
/// so results are deterministic for a given cache snapshot.
pub struct CombinationEvaluator {
    symbols: Arc<Vec<String>>,
    timeframes: Vec<Timeframe>,
    /// Timeframe consulted for reversal hints.
    pivot: String,
}

impl CombinationEvaluator {
    pub fn new(symbols: Arc<Vec<String>>, timeframes: Vec<Timeframe>) -> Self {
        Self {
            symbols,
            timeframes,
            pivot: "H1".to_string(),
        }
    }

    pub fn with_pivot(mut self, pivot: impl Into<String>) -> Self {
        self.pivot = pivot.into();
        self
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn timeframes(&self) -> &[Timeframe] {
        &self.timeframes
    }

    /// Labels in `state`, in configured order.
    fn labels_in(&self, states: &TimeframeStates, state: TimeframeState) -> Vec<&str> {
        self.timeframes
            .iter()
            .filter(|tf| states.get(&tf.label) == state)
            .map(|tf| tf.label.as_str())
            .collect()
    }

    /// Symbols whose signal equals `want` on every timeframe in `labels`.
    /// Empty when `labels` is empty.
    fn agreeing<L: SignalLookup + ?Sized>(&self, lookup: &L, labels: &[&str], want: Signal) -> Vec<String> {
        if labels.is_empty() {
            return Vec::new();
        }
        self.symbols
            .iter()
            .filter(|symbol| labels.iter().all(|tf| lookup.get_signal(symbol, tf) == want))
            .cloned()
            .collect()
    }

    /// Rise matches: `up` on every green timeframe. Fall matches: `down` on
    /// every red timeframe. The two are evaluated independently, so a symbol
    /// may appear in both.
    pub fn evaluate<L: SignalLookup + ?Sized>(&self, lookup: &L, states: &TimeframeStates) -> CombinationResult {
        let green = self.labels_in(states, TimeframeState::Green);
        let red = self.labels_in(states, TimeframeState::Red);

        if green.is_empty() && red.is_empty() {
            return CombinationResult::default();
        }

        let result = CombinationResult {
            rise_matches: self.agreeing(lookup, &green, Signal::Up),
            fall_matches: self.agreeing(lookup, &red, Signal::Down),
        };

        debug!(
            "Combination rise={} fall={} | green={:?} red={:?}",
            result.rise_matches.len(),
            result.fall_matches.len(),
            green,
            red
        );

        result
    }

    /// Position of a label in the configured timeframe list.
    fn rank(&self, label: &str) -> Option<usize> {
        self.timeframes.iter().position(|tf| tf.label == label)
    }

    /// Top/dip candidates when both a green and a red set are selected.
    ///
    /// The side owning the highest-ranked selected timeframe is the major
    /// side. With a green major, a symbol rising somewhere in green, falling
    /// somewhere in red and pointing down on the pivot is a top; the mirror
    /// case with a red major and the pivot pointing up is a dip.
    pub fn evaluate_reversals<L: SignalLookup + ?Sized>(&self, lookup: &L, states: &TimeframeStates) -> ReversalHints {
        let mut hints = ReversalHints::default();

        let green = self.labels_in(states, TimeframeState::Green);
        let red = self.labels_in(states, TimeframeState::Red);
        if green.is_empty() || red.is_empty() {
            return hints;
        }

        let max_green = green.iter().filter_map(|tf| self.rank(tf)).max();
        let max_red = red.iter().filter_map(|tf| self.rank(tf)).max();
        let major = match max_green.cmp(&max_red) {
            std::cmp::Ordering::Greater => MajorSide::Green,
            std::cmp::Ordering::Less => MajorSide::Red,
            std::cmp::Ordering::Equal => MajorSide::Tie,
        };
        if major == MajorSide::Tie {
            return hints;
        }

        for symbol in self.symbols.iter() {
            let green_up = green.iter().any(|tf| lookup.get_signal(symbol, tf) == Signal::Up);
            if !green_up {
                continue;
            }
            let red_down = red.iter().any(|tf| lookup.get_signal(symbol, tf) == Signal::Down);
            if !red_down {
                continue;
            }

            match (major, lookup.get_signal(symbol, &self.pivot)) {
                (MajorSide::Green, Signal::Down) => {
                    hints.tops.insert(symbol.clone());
                }
                (MajorSide::Red, Signal::Up) => {
                    hints.dips.insert(symbol.clone());
                }
                _ => {}
            }
        }

        hints
    }

    /// Exchange interval of the highest-ranked green or red timeframe.
    pub fn highest_active_interval(&self, states: &TimeframeStates) -> Option<&str> {
        self.timeframes
            .iter()
            .rev()
            .find(|tf| states.get(&tf.label).is_active())
            .map(|tf| tf.interval.as_str())
    }
}
