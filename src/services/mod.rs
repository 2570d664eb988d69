pub mod board;
pub mod cache;
pub mod combination;
pub mod indicators;
pub mod percent_change;
pub mod signal_cache;
pub mod ticker_board;

pub use board::{BoardSnapshot, MatchRow, MatchSide, MatchSort, SignalBoard, SortOrder};
pub use cache::TtlCache;
pub use combination::CombinationEvaluator;
pub use indicators::{BollingerTrend, Supertrend, TrendIndicator};
pub use percent_change::{percent_change, PercentChangeCache};
pub use signal_cache::{SignalCache, SignalLookup, SignalWorker, SweepReport};
pub use ticker_board::TickerBoard;
