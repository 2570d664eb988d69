//! Main TUI application logic.

use super::{dashboard, events, LogBuffer, SignalDisplay, Theme};
use crate::services::{BoardSnapshot, MatchSide, SignalBoard};
use crate::types::Signal;
use crossterm::{
    event::KeyCode,
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame, Terminal,
};
use std::{
    io::{self, Stdout},
    sync::Arc,
    time::Duration,
};
use tokio::sync::watch;
use tracing::info;

/// Main TUI application.
pub struct App {
    board: Arc<SignalBoard>,
    snapshots: watch::Receiver<Arc<BoardSnapshot>>,
    logs: Arc<LogBuffer>,
    display: SignalDisplay,
    theme: Theme,
    should_quit: bool,
}

impl App {
    pub fn new(board: Arc<SignalBoard>, logs: Arc<LogBuffer>) -> Self {
        let snapshots = board.subscribe();
        Self {
            board,
            snapshots,
            logs,
            display: SignalDisplay::new(),
            theme: Theme::default(),
            should_quit: false,
        }
    }

    pub fn handle_event(&mut self, event: events::Event) {
        let events::Event::Key(key) = event else {
            return;
        };

        if events::is_quit(&key) {
            self.should_quit = true;
            return;
        }

        if let Some(index) = events::timeframe_index(&key) {
            if let Some(state) = self.board.cycle_state_at(index) {
                if let Some(tf) = self.board.timeframes().get(index) {
                    info!("Filter {} -> {:?}", tf.label, state);
                }
            }
        } else if events::is_key(&key, KeyCode::Char('r')) {
            self.board.request_refresh();
        } else if events::is_char(&key, 'p') {
            self.board.cycle_percent_sort(MatchSide::Rise);
        } else if events::is_char(&key, 'P') {
            self.board.cycle_percent_sort(MatchSide::Fall);
        } else if events::is_char(&key, 'v') {
            self.board.cycle_volume_sort(MatchSide::Rise);
        } else if events::is_char(&key, 'V') {
            self.board.cycle_volume_sort(MatchSide::Fall);
        }
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn render(&mut self, frame: &mut Frame) {
        let snapshot = self.snapshots.borrow_and_update().clone();

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Filters
                Constraint::Min(0),    // Grid and panels
                Constraint::Length(8), // Logs
                Constraint::Length(3), // Status bar
            ])
            .split(frame.size());

        dashboard::render_chips(
            frame,
            chunks[0],
            self.board.timeframes(),
            &self.board.states(),
            &self.theme,
        );

        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(chunks[1]);
        dashboard::render_grid(frame, body[0], &self.board, &mut self.display, &self.theme);

        let panels = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(body[1]);
        dashboard::render_matches(frame, panels[0], &snapshot, Signal::Up, &self.theme);
        dashboard::render_matches(frame, panels[1], &snapshot, Signal::Down, &self.theme);

        dashboard::render_logs(frame, chunks[2], &self.logs, &self.theme);
        self.render_status_bar(frame, chunks[3], &snapshot);
    }

    fn render_status_bar(&self, frame: &mut Frame, area: Rect, snapshot: &BoardSnapshot) {
        let evaluated = snapshot
            .evaluated_at
            .map(|t| t.format("%H:%M:%S").to_string())
            .unwrap_or_else(|| "--:--:--".to_string());

        let text = Line::from(vec![
            Span::styled("trendgrid", self.theme.title()),
            Span::raw(" | "),
            Span::styled("1-9", self.theme.muted()),
            Span::raw(" filter  "),
            Span::styled("r", self.theme.muted()),
            Span::raw(" refresh  "),
            Span::styled("p/P", self.theme.muted()),
            Span::raw(" 24h% sort  "),
            Span::styled("v/V", self.theme.muted()),
            Span::raw(" volume sort (rise/fall)  "),
            Span::styled("q", self.theme.muted()),
            Span::raw(" quit | evaluated "),
            Span::raw(evaluated),
        ]);

        let paragraph = Paragraph::new(text).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(self.theme.border()),
        );
        frame.render_widget(paragraph, area);
    }
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> io::Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()
}

/// Run the dashboard until the user quits.
pub async fn run_tui(board: Arc<SignalBoard>, logs: Arc<LogBuffer>) -> io::Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(board, logs);
    let mut event_handler = events::EventHandler::new(Duration::from_millis(250));

    let result = loop {
        if let Err(e) = terminal.draw(|f| app.render(f)) {
            break Err(e);
        }

        match event_handler.next().await {
            Some(event) => app.handle_event(event),
            None => break Ok(()),
        }

        if app.should_quit() {
            break Ok(());
        }
    };

    restore_terminal(&mut terminal)?;
    result
}
