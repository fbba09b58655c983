//! Matrix grid pane: souls as rows, integrations as columns.

use ratatui::{
  Frame,
  layout::Rect,
  style::{Color, Modifier, Style},
  text::{Line, Span},
  widgets::{Block, Borders, Paragraph},
};

use crate::app::{App, CellState, cell_key};

/// Width of the soul label column.
pub const LABEL_W: u16 = 22;
/// Width of one integration column.
pub const CELL_W: u16 = 12;

// ─── Draw ─────────────────────────────────────────────────────────────────────

/// Render the grid into `area`.
pub fn draw(f: &mut Frame, area: Rect, app: &App) {
  let souls = app.visible_souls();
  let integrations = app.visible_integrations();

  let title = format!(
    " Matrix ({} souls × {} channels) ",
    souls.len(),
    integrations.len()
  );
  let block = Block::default()
    .title(title)
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::DarkGray));
  let inner = block.inner(area);
  f.render_widget(block, area);

  if !app.has_data() {
    f.render_widget(
      Paragraph::new("No souls or integrations yet.")
        .style(Style::default().fg(Color::DarkGray)),
      inner,
    );
    return;
  }
  if souls.is_empty() || integrations.is_empty() {
    f.render_widget(
      Paragraph::new("No matches for the active filters.")
        .style(Style::default().fg(Color::Yellow)),
      inner,
    );
    return;
  }

  let (row_viewport, col_viewport) = viewport(inner);
  let row_offset = scroll_offset(app.cursor.0, souls.len(), row_viewport);
  let col_offset = scroll_offset(app.cursor.1, integrations.len(), col_viewport);

  let mut lines: Vec<Line> = Vec::with_capacity(row_viewport + 1);

  // Column headers; disabled integrations are dimmed.
  let mut header = vec![Span::raw(" ".repeat(LABEL_W as usize))];
  for integration in integrations.iter().skip(col_offset).take(col_viewport) {
    let style = if integration.disabled {
      Style::default().fg(Color::DarkGray)
    } else {
      Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
    };
    header.push(Span::styled(pad(&integration.name, CELL_W as usize), style));
  }
  lines.push(Line::from(header));

  // One line per visible soul.
  for (row, soul) in souls
    .iter()
    .enumerate()
    .skip(row_offset)
    .take(row_viewport)
  {
    let mut spans = vec![Span::styled(
      pad(&soul.soul.display_name, LABEL_W as usize),
      Style::default().add_modifier(Modifier::BOLD),
    )];

    for (col, integration) in integrations
      .iter()
      .enumerate()
      .skip(col_offset)
      .take(col_viewport)
    {
      let soul_id = &soul.soul.soul_id;
      let integration_id = &integration.integration_id;
      let state = app.cell_state(soul_id, integration_id);

      let symbol = if app.cell_busy(&cell_key(soul_id, integration_id)) {
        "…"
      } else {
        match state {
          CellState::Primary => "★",
          CellState::Connected => "●",
          CellState::Disconnected => "·",
        }
      };

      let marked = app.is_selected(soul_id, integration_id);
      let text = if marked {
        pad(&format!("[{symbol}]"), CELL_W as usize)
      } else {
        pad(symbol, CELL_W as usize)
      };

      let mut style = match state {
        CellState::Primary => {
          Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        }
        CellState::Connected => Style::default().fg(Color::Green),
        CellState::Disconnected => Style::default().fg(Color::DarkGray),
      };
      if marked {
        style = style.fg(Color::Magenta);
      }
      if (row, col) == app.cursor {
        style = style.add_modifier(Modifier::REVERSED);
      }

      spans.push(Span::styled(text, style));
    }
    lines.push(Line::from(spans));
  }

  f.render_widget(Paragraph::new(lines), inner);
}

// ─── Geometry ─────────────────────────────────────────────────────────────────

/// Rows and columns of cells that fit inside the block, after the header
/// row and the soul label column.
fn viewport(inner: Rect) -> (usize, usize) {
  let rows = inner.height.saturating_sub(1) as usize;
  let cols = (inner.width.saturating_sub(LABEL_W) / CELL_W) as usize;
  (rows, cols)
}

/// First visible index, keeping the cursor inside a `viewport`-sized window.
/// Stateless: derived from the cursor alone.
fn scroll_offset(cursor: usize, len: usize, viewport: usize) -> usize {
  if viewport == 0 || len <= viewport {
    return 0;
  }
  cursor.saturating_sub(viewport - 1).min(len - viewport)
}

/// Map a screen coordinate to a (row, column) in the visible grid. Mirrors
/// the geometry `draw` uses, including scroll offsets.
pub fn hit_test(area: Rect, app: &App, x: u16, y: u16) -> Option<(usize, usize)> {
  let rows = app.visible_souls().len();
  let cols = app.visible_integrations().len();
  if rows == 0 || cols == 0 {
    return None;
  }

  let inner = Block::default().borders(Borders::ALL).inner(area);
  if y < inner.y || y >= inner.y + inner.height {
    return None;
  }
  if x < inner.x + LABEL_W || x >= inner.x + inner.width {
    return None;
  }

  // The first inner line is the column header.
  let rel_y = (y - inner.y) as usize;
  if rel_y == 0 {
    return None;
  }

  let (row_viewport, col_viewport) = viewport(inner);
  let row_offset = scroll_offset(app.cursor.0, rows, row_viewport);
  let col_offset = scroll_offset(app.cursor.1, cols, col_viewport);

  let rel_x = (x - inner.x - LABEL_W) as usize;
  if rel_x >= col_viewport * CELL_W as usize {
    return None;
  }

  let row = rel_y - 1 + row_offset;
  let col = rel_x / CELL_W as usize + col_offset;
  (row < rows && col < cols).then_some((row, col))
}

/// Truncate or pad to exactly `width`, centred under the column.
fn pad(s: &str, width: usize) -> String {
  let truncated: String = s.chars().take(width.saturating_sub(1)).collect();
  format!("{truncated:^width$}")
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use weft_core::{
    integration::IntegrationDetails,
    matrix::{MatrixSoul, MatrixSummary, MatrixView},
    soul::Soul,
  };

  use super::*;
  use crate::{
    app::App,
    client::{ApiClient, ApiConfig},
  };

  /// 3×3 grid with no mappings; plenty for geometry checks.
  fn app() -> App {
    let client = ApiClient::new(ApiConfig {
      base_url: "http://localhost:0".into(),
      username: String::new(),
      password: String::new(),
    })
    .unwrap();
    let mut app = App::new(client);
    app.view = MatrixView {
      souls:        (0..3)
        .map(|i| MatrixSoul {
          soul:            Soul {
            soul_id:      format!("soul-{i}").into(),
            display_name: format!("Soul {i}"),
            email:        None,
          },
          integration_ids: Vec::new(),
        })
        .collect(),
      integrations: (0..3)
        .map(|i| IntegrationDetails {
          integration_id: format!("int-{i}").into(),
          name:           format!("Channel {i}"),
          picture:        None,
          provider:       "chirper".to_string(),
          disabled:       false,
        })
        .collect(),
      mappings:     Vec::new(),
      summary:      MatrixSummary {
        total_souls:        3,
        total_integrations: 3,
        total_mappings:     0,
      },
    };
    app
  }

  #[test]
  fn scroll_offset_keeps_the_cursor_visible() {
    // Everything fits: no scrolling.
    assert_eq!(scroll_offset(0, 3, 5), 0);
    assert_eq!(scroll_offset(2, 3, 5), 0);

    // Cursor walks past the window edge.
    assert_eq!(scroll_offset(4, 10, 5), 0);
    assert_eq!(scroll_offset(5, 10, 5), 1);
    assert_eq!(scroll_offset(9, 10, 5), 5);

    // Degenerate viewport.
    assert_eq!(scroll_offset(7, 10, 0), 0);
  }

  #[test]
  fn hit_test_maps_screen_cells() {
    let app = app();
    // Grid drawn at (0, 1) 80×10; inner area is (1, 2) 78×8, so the header
    // occupies y=2 and the first soul row y=3.
    let area = Rect::new(0, 1, 80, 10);

    // Header row is not clickable.
    assert_eq!(hit_test(area, &app, 23, 2), None);

    // First cell starts after the 22-column label gutter.
    assert_eq!(hit_test(area, &app, 23, 3), Some((0, 0)));
    assert_eq!(hit_test(area, &app, 23 + 12, 4), Some((1, 1)));
    assert_eq!(hit_test(area, &app, 23 + 24, 5), Some((2, 2)));

    // Label gutter, rows past the data, and columns past the data miss.
    assert_eq!(hit_test(area, &app, 5, 3), None);
    assert_eq!(hit_test(area, &app, 23, 6), None);
    assert_eq!(hit_test(area, &app, 23 + 36, 3), None);
  }

  #[test]
  fn hit_test_misses_when_the_grid_is_empty() {
    let client = ApiClient::new(ApiConfig {
      base_url: "http://localhost:0".into(),
      username: String::new(),
      password: String::new(),
    })
    .unwrap();
    let app = App::new(client);
    assert_eq!(hit_test(Rect::new(0, 1, 80, 10), &app, 30, 4), None);
  }
}
