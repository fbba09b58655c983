//! TUI rendering: header, matrix grid, and status bar.

pub mod grid;

use chrono::Local;
use ratatui::{
  Frame,
  layout::{Constraint, Direction, Layout, Rect},
  style::{Color, Modifier, Style},
  text::{Line, Span},
  widgets::{Block, Paragraph},
};

use crate::app::App;

// ─── Layout ───────────────────────────────────────────────────────────────────

/// Screen regions: (header, grid, status bar). Mouse hit-testing uses the
/// same split, so clicks and pixels agree.
pub fn regions(area: Rect) -> (Rect, Rect, Rect) {
  let rows = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(1), // header
      Constraint::Min(0),    // grid
      Constraint::Length(1), // status bar
    ])
    .split(area);
  (rows[0], rows[1], rows[2])
}

// ─── Root draw ────────────────────────────────────────────────────────────────

/// Main draw function called each frame.
pub fn draw(f: &mut Frame, app: &App) {
  let (header, body, status) = regions(f.area());
  draw_header(f, header, app);
  grid::draw(f, body, app);
  draw_status(f, status, app);
}

// ─── Header ───────────────────────────────────────────────────────────────────

fn draw_header(f: &mut Frame, area: Rect, _app: &App) {
  let date = Local::now().format("%Y-%m-%d").to_string();

  let left = Span::styled(
    " weft  [/] souls  [i] channels  [f] platform  [v] bulk  [q] quit",
    Style::default()
      .fg(Color::White)
      .add_modifier(Modifier::BOLD),
  );
  let right = Span::styled(
    format!("{date} "),
    Style::default().fg(Color::DarkGray),
  );

  // Simple left-right header: pad the middle.
  let left_width = left.content.len() as u16;
  let right_width = right.content.len() as u16;
  let pad = area
    .width
    .saturating_sub(left_width)
    .saturating_sub(right_width);

  let line = Line::from(vec![
    left,
    Span::raw(" ".repeat(pad as usize)),
    right,
  ]);

  let block = Block::default().style(Style::default().bg(Color::DarkGray));
  let inner = block.inner(area);
  f.render_widget(block, area);
  f.render_widget(Paragraph::new(line), inner);
}

// ─── Status bar ───────────────────────────────────────────────────────────────

fn draw_status(f: &mut Frame, area: Rect, app: &App) {
  // Filter input takes over the line while typing.
  if app.soul_filter_active {
    render_status(f, area, "SEARCH", &format!("/{}_", app.soul_filter));
    return;
  }
  if app.integration_filter_active {
    render_status(f, area, "FILTER", &format!("i/{}_", app.integration_filter));
    return;
  }

  let (mode_label, hints) = if app.bulk_mode {
    (
      "BULK",
      format!("{} marked  space mark  c connect  d disconnect  Esc cancel", app.selection.len()),
    )
  } else {
    (
      "NORMAL",
      "hjkl/arrows move  space toggle  p primary  v bulk  o/O/f filters  r refresh  q quit"
        .to_string(),
    )
  };

  // Active filters show as badges so the grid's emptiness is explicable.
  let mut badges = Vec::new();
  if !app.soul_filter.is_empty() {
    badges.push(format!("/{}", app.soul_filter));
  }
  if !app.integration_filter.is_empty() {
    badges.push(format!("i:{}", app.integration_filter));
  }
  if let Some(platform) = &app.platform_filter {
    badges.push(format!("f:{platform}"));
  }
  if app.only_connected {
    badges.push("o".into());
  }
  if app.only_primary {
    badges.push("O".into());
  }

  let status = if !app.status_msg.is_empty() {
    app.status_msg.clone()
  } else {
    let summary = app.cursor_summary();
    if summary.is_empty() { hints } else { format!("{summary}   {hints}") }
  };

  let mut spans = vec![Span::styled(
    format!(" {mode_label} "),
    Style::default()
      .fg(Color::Black)
      .bg(if app.bulk_mode { Color::Magenta } else { Color::Cyan })
      .add_modifier(Modifier::BOLD),
  )];
  if !badges.is_empty() {
    spans.push(Span::styled(
      format!(" [{}]", badges.join(" ")),
      Style::default().fg(Color::Yellow),
    ));
  }
  spans.push(Span::styled(
    format!("  {status}"),
    Style::default().fg(Color::DarkGray),
  ));

  f.render_widget(
    Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black)),
    area,
  );
}

fn render_status(f: &mut Frame, area: Rect, mode_label: &str, text: &str) {
  let line = Line::from(vec![
    Span::styled(
      format!(" {mode_label} "),
      Style::default()
        .fg(Color::Black)
        .bg(Color::Yellow)
        .add_modifier(Modifier::BOLD),
    ),
    Span::styled(format!("  {text}"), Style::default().fg(Color::Yellow)),
  ]);
  f.render_widget(
    Paragraph::new(line).style(Style::default().bg(Color::Black)),
    area,
  );
}
