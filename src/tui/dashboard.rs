//! Dashboard view: filter chips, signal grid, combination panels and logs.

use crate::services::{BoardSnapshot, MatchRow, MatchSide, SignalBoard, SignalLookup};
use crate::types::{ReversalHints, Signal, Timeframe, TimeframeStates};
use ratatui::{
    layout::{Constraint, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, List, ListItem, Paragraph, Row, Table},
    Frame,
};
use std::time::Instant;

use super::{LogBuffer, SignalDisplay, Theme};

fn format_price(price: f64) -> String {
    if price >= 1000.0 {
        format!("{:.1}", price)
    } else if price >= 1.0 {
        format!("{:.3}", price)
    } else {
        format!("{:.5}", price)
    }
}

fn format_percent(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:+.2}%", v))
        .unwrap_or_else(|| "-".to_string())
}

/// Header row of timeframe filter chips, numbered by their cycle key.
pub fn render_chips(
    frame: &mut Frame,
    area: Rect,
    timeframes: &[Timeframe],
    states: &TimeframeStates,
    theme: &Theme,
) {
    let mut spans = Vec::with_capacity(timeframes.len() * 2);
    for (idx, tf) in timeframes.iter().enumerate() {
        let label = if idx < 9 {
            format!(" {} {} ", idx + 1, tf.label)
        } else {
            format!(" {} ", tf.label)
        };
        spans.push(Span::styled(label, theme.chip(states.get(&tf.label))));
        spans.push(Span::raw(" "));
    }

    let block = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Filters")
            .border_style(theme.border()),
    );
    frame.render_widget(block, area);
}

/// Symbol grid with price, 24h change and one dot per timeframe.
pub fn render_grid(
    frame: &mut Frame,
    area: Rect,
    board: &SignalBoard,
    display: &mut SignalDisplay,
    theme: &Theme,
) {
    let now = Instant::now();
    let signals = board.signals();
    let timeframes = board.timeframes();

    let mut header = vec![
        Cell::from("Symbol"),
        Cell::from("Price"),
        Cell::from("24h"),
    ];
    header.extend(timeframes.iter().map(|tf| Cell::from(tf.label.clone())));

    let rows: Vec<Row> = board
        .symbols()
        .iter()
        .map(|symbol| {
            let ticker = board.tickers().get(symbol);
            let mut cells = vec![
                Cell::from(symbol.clone()),
                Cell::from(ticker.as_ref().map(|t| format_price(t.last_price)).unwrap_or_default()),
                match &ticker {
                    Some(t) => Cell::from(Span::styled(
                        format_percent(Some(t.change_pct_24h)),
                        theme.change(t.change_pct_24h),
                    )),
                    None => Cell::from("-"),
                },
            ];
            cells.extend(timeframes.iter().map(|tf| {
                let raw = signals.get_signal(symbol, &tf.label);
                let view = display.resolve(symbol, &tf.label, raw, now);
                Cell::from(Span::styled("●", theme.signal(view.signal, view.highlighted)))
            }));
            Row::new(cells)
        })
        .collect();

    let mut widths = vec![
        Constraint::Length(12),
        Constraint::Length(11),
        Constraint::Length(8),
    ];
    widths.extend(timeframes.iter().map(|tf| Constraint::Length(tf.label.len().max(2) as u16)));

    let table = Table::new(rows, widths)
        .header(Row::new(header).style(theme.header()))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Signals")
                .border_style(theme.border()),
        );
    frame.render_widget(table, area);
}

fn match_item<'a>(row: &MatchRow, hints: &ReversalHints, theme: &Theme) -> ListItem<'a> {
    let hint = if hints.tops.contains(&row.symbol) {
        Span::styled("↘ ", theme.fall())
    } else if hints.dips.contains(&row.symbol) {
        Span::styled("↗ ", theme.rise())
    } else {
        Span::raw("  ")
    };
    let percent_style = row.percent.map(|p| theme.change(p)).unwrap_or(theme.muted());
    let daily_style = row.change_24h.map(|p| theme.change(p)).unwrap_or(theme.muted());

    ListItem::new(Line::from(vec![
        hint,
        Span::raw(format!("{:<12}", row.symbol)),
        Span::styled(format!("{:>9}", format_percent(row.percent)), percent_style),
        Span::styled(format!("{:>9}", format_percent(row.change_24h)), daily_style),
    ]))
}

/// RISE or FALL panel for one side of the snapshot.
pub fn render_matches(
    frame: &mut Frame,
    area: Rect,
    snapshot: &BoardSnapshot,
    signal: Signal,
    theme: &Theme,
) {
    let (name, rows, side, style) = match signal {
        Signal::Up => ("RISE", &snapshot.rise, MatchSide::Rise, theme.rise()),
        _ => ("FALL", &snapshot.fall, MatchSide::Fall, theme.fall()),
    };
    let sort = snapshot.sort(side);

    let title = format!(
        "{} ({}) {} 24h%{} vol{}",
        name,
        rows.len(),
        snapshot.interval.as_deref().unwrap_or("-"),
        sort.percent.symbol(),
        sort.volume.symbol(),
    );

    let items: Vec<ListItem> = rows
        .iter()
        .map(|row| match_item(row, &snapshot.hints, theme))
        .collect();

    let list = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .title(Span::styled(title, style))
            .border_style(style),
    );
    frame.render_widget(list, area);
}

/// Tail of the in-memory log buffer.
pub fn render_logs(frame: &mut Frame, area: Rect, logs: &LogBuffer, theme: &Theme) {
    let lines = logs.recent(area.height.saturating_sub(2) as usize);
    let items: Vec<ListItem> = lines
        .into_iter()
        .map(|line| {
            let style = if line.contains("WARN") || line.contains("ERROR") {
                theme.warning()
            } else {
                theme.muted()
            };
            ListItem::new(Span::styled(line, style))
        })
        .collect();

    let list = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Logs")
            .border_style(theme.border()),
    );
    frame.render_widget(list, area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_price() {
        assert_eq!(format_price(64123.456), "64123.5");
        assert_eq!(format_price(2.5), "2.500");
        assert_eq!(format_price(0.0123456), "0.01235");
    }

    #[test]
    fn test_format_percent() {
        assert_eq!(format_percent(Some(1.234)), "+1.23%");
        assert_eq!(format_percent(Some(-0.5)), "-0.50%");
        assert_eq!(format_percent(None), "-");
    }
}
