use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Trend classification for one symbol at one timeframe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    Up,
    Down,
    /// Also the value of every key that has never been written.
    #[default]
    Neutral,
}

impl Signal {
    /// Parse from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "up" | "bull" | "bullish" => Some(Self::Up),
            "down" | "bear" | "bearish" => Some(Self::Down),
            "neutral" | "flat" => Some(Self::Neutral),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Neutral => "neutral",
        }
    }

    /// True for `Up` and `Down`.
    pub fn is_directional(&self) -> bool {
        !matches!(self, Self::Neutral)
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named candle granularity paired with the exchange's interval code
/// (e.g. label `H1`, interval `1h`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Timeframe {
    pub label: String,
    pub interval: String,
}

impl Timeframe {
    pub fn new(label: impl Into<String>, interval: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            interval: interval.into(),
        }
    }

    /// Parse a `LABEL:code` pair, e.g. `H4:4h`.
    pub fn parse(pair: &str) -> Option<Self> {
        let (label, interval) = pair.trim().split_once(':')?;
        let (label, interval) = (label.trim(), interval.trim());
        if label.is_empty() || interval.is_empty() {
            return None;
        }
        Some(Self::new(label, interval))
    }
}

/// User-controlled filter state of a timeframe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TimeframeState {
    #[default]
    Inactive,
    /// Rise filter: matches require `Signal::Up`.
    Green,
    /// Fall filter: matches require `Signal::Down`.
    Red,
}

impl TimeframeState {
    /// Parse from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "inactive" | "off" | "0" => Some(Self::Inactive),
            "green" | "rise" | "1" => Some(Self::Green),
            "red" | "fall" | "2" => Some(Self::Red),
            _ => None,
        }
    }

    /// Next state in the inactive -> green -> red -> inactive cycle.
    pub fn next(self) -> Self {
        match self {
            Self::Inactive => Self::Green,
            Self::Green => Self::Red,
            Self::Red => Self::Inactive,
        }
    }

    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Inactive)
    }
}

/// Filter state of every timeframe. Labels without an entry are inactive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimeframeStates {
    states: HashMap<String, TimeframeState>,
}

impl TimeframeStates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, label: &str) -> TimeframeState {
        self.states.get(label).copied().unwrap_or_default()
    }

    pub fn set(&mut self, label: impl Into<String>, state: TimeframeState) {
        let label = label.into();
        if state.is_active() {
            self.states.insert(label, state);
        } else {
            self.states.remove(&label);
        }
    }

    /// Advance a timeframe to its next state and return it.
    pub fn cycle(&mut self, label: &str) -> TimeframeState {
        let next = self.get(label).next();
        self.set(label, next);
        next
    }

    /// True when no timeframe is green or red.
    pub fn all_inactive(&self) -> bool {
        self.states.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, TimeframeState)> for TimeframeStates {
    fn from_iter<I: IntoIterator<Item = (S, TimeframeState)>>(iter: I) -> Self {
        let mut states = Self::new();
        for (label, state) in iter {
            states.set(label, state);
        }
        states
    }
}

/// Symbols whose signals agree across every green (rise) or red (fall)
/// timeframe. Both lists keep the symbol universe's order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CombinationResult {
    pub rise_matches: Vec<String>,
    pub fall_matches: Vec<String>,
}

impl CombinationResult {
    pub fn is_empty(&self) -> bool {
        self.rise_matches.is_empty() && self.fall_matches.is_empty()
    }

    /// Rise then fall matches, without duplicates.
    pub fn matched_symbols(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.rise_matches
            .iter()
            .chain(self.fall_matches.iter())
            .filter(|s| seen.insert(s.as_str()))
            .cloned()
            .collect()
    }
}

/// Reversal candidates derived from opposing green/red selections.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReversalHints {
    /// Rising on the major side but turning down on the pivot timeframe.
    pub tops: HashSet<String>,
    /// Falling on the major side but turning up on the pivot timeframe.
    pub dips: HashSet<String>,
}
