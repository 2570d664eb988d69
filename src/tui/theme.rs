//! Theme and color definitions for the TUI.

use crate::types::{Signal, TimeframeState};
use ratatui::style::{Color, Modifier, Style};

/// Theme for the TUI with consistent color scheme.
#[derive(Debug, Clone)]
pub struct Theme {
    pub primary: Color,
    pub secondary: Color,
    pub rise: Color,
    pub fall: Color,
    pub warning: Color,
    pub muted: Color,
    pub highlight: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            primary: Color::Cyan,
            secondary: Color::Magenta,
            rise: Color::Green,
            fall: Color::Red,
            warning: Color::Yellow,
            muted: Color::DarkGray,
            highlight: Color::Rgb(60, 60, 20),
        }
    }
}

impl Theme {
    pub fn title(&self) -> Style {
        Style::default()
            .fg(self.primary)
            .add_modifier(Modifier::BOLD)
    }

    pub fn header(&self) -> Style {
        Style::default()
            .fg(self.secondary)
            .add_modifier(Modifier::BOLD)
    }

    pub fn rise(&self) -> Style {
        Style::default().fg(self.rise)
    }

    pub fn fall(&self) -> Style {
        Style::default().fg(self.fall)
    }

    pub fn warning(&self) -> Style {
        Style::default().fg(self.warning)
    }

    pub fn muted(&self) -> Style {
        Style::default().fg(self.muted)
    }

    pub fn border(&self) -> Style {
        Style::default().fg(self.primary)
    }

    /// Green for positive, red for negative, muted for zero.
    pub fn change(&self, value: f64) -> Style {
        if value > 0.0 {
            self.rise()
        } else if value < 0.0 {
            self.fall()
        } else {
            self.muted()
        }
    }

    /// Grid dot for a displayed signal, with a background while highlighted.
    pub fn signal(&self, signal: Signal, highlighted: bool) -> Style {
        let style = match signal {
            Signal::Up => self.rise(),
            Signal::Down => self.fall(),
            Signal::Neutral => self.muted(),
        };
        if highlighted {
            style.bg(self.highlight).add_modifier(Modifier::BOLD)
        } else {
            style
        }
    }

    /// Filter chip for a timeframe state.
    pub fn chip(&self, state: TimeframeState) -> Style {
        match state {
            TimeframeState::Inactive => self.muted(),
            TimeframeState::Green => Style::default()
                .fg(Color::Black)
                .bg(self.rise)
                .add_modifier(Modifier::BOLD),
            TimeframeState::Red => Style::default()
                .fg(Color::Black)
                .bg(self.fall)
                .add_modifier(Modifier::BOLD),
        }
    }
}
