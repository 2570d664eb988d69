//! Terminal dashboard for the signal grid and combination panels.

mod app;
mod dashboard;
mod events;
mod state;
mod theme;

pub use app::{run_tui, App};
pub use state::{CellView, LogBuffer, LogMakeWriter, SignalDisplay, FLIP_HIGHLIGHT};
pub use theme::Theme;
