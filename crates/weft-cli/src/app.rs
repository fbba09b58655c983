//! Application state machine and event dispatcher.

use std::{
  collections::{BTreeMap, HashMap, HashSet},
  sync::Arc,
  time::{Duration, Instant},
};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use fuzzy_matcher::{FuzzyMatcher, skim::SkimMatcherV2};
use serde_json::json;
use uuid::Uuid;
use weft_core::{
  id::{IntegrationId, SoulId},
  integration::IntegrationDetails,
  matrix::{
    BulkItem, BulkOperation, MatrixSoul, MatrixSummary, MatrixView,
    ToggleOutcome,
  },
};

use crate::client::ApiClient;

// ─── Cells ────────────────────────────────────────────────────────────────────

/// Visual state of one soul × integration cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellState {
  Disconnected,
  Connected,
  Primary,
}

/// Key for per-cell bookkeeping: the mapping index, the bulk selection, and
/// the in-flight guard all use it.
pub fn cell_key(soul_id: &SoulId, integration_id: &IntegrationId) -> String {
  format!("{soul_id}-{integration_id}")
}

// ─── Click disambiguation ─────────────────────────────────────────────────────

/// How long a single click waits for a second one before it becomes a toggle.
pub const DOUBLE_CLICK_MS: u64 = 350;

/// What a disambiguated mouse click should do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickAction {
  Toggle(SoulId, IntegrationId),
  FlipPrimary(SoulId, IntegrationId),
}

/// A first click parked until the double-click window closes.
#[derive(Debug, Clone)]
struct PendingClick {
  soul_id:        SoulId,
  integration_id: IntegrationId,
  at:             Instant,
}

// ─── App ──────────────────────────────────────────────────────────────────────

/// Top-level application state.
pub struct App {
  /// Last matrix snapshot fetched from the server.
  pub view: MatrixView,

  /// Mapping id and primary flag per connected cell, keyed by [`cell_key`].
  pub pairs: HashMap<String, (Uuid, bool)>,

  /// Cursor as (row, column) within the visible, filtered grid.
  pub cursor: (usize, usize),

  /// Fuzzy filter over soul names and ids.
  pub soul_filter:        String,
  pub soul_filter_active: bool,

  /// Case-insensitive substring filter over integration names.
  pub integration_filter:        String,
  pub integration_filter_active: bool,

  /// Show only integrations of this provider, cycled with `f`.
  pub platform_filter: Option<String>,

  /// Show only souls with at least one mapping.
  pub only_connected: bool,

  /// Show only souls holding a primary mapping.
  pub only_primary: bool,

  /// Bulk selection mode: space marks cells, `c`/`d` applies one request.
  pub bulk_mode: bool,

  /// Marked cells, keyed by [`cell_key`] for stable request order.
  pub selection: BTreeMap<String, (SoulId, IntegrationId)>,

  /// Cells with a request outstanding; they refuse further requests.
  in_flight: HashSet<String>,

  /// First click of a potential double click.
  pending_click: Option<PendingClick>,

  /// One-line status message shown in the status bar.
  pub status_msg: String,

  /// Shared HTTP client.
  pub client: Arc<ApiClient>,
}

fn empty_view() -> MatrixView {
  MatrixView {
    souls:        Vec::new(),
    integrations: Vec::new(),
    mappings:     Vec::new(),
    summary:      MatrixSummary {
      total_souls:        0,
      total_integrations: 0,
      total_mappings:     0,
    },
  }
}

impl App {
  /// Create an [`App`] with an empty matrix.
  pub fn new(client: ApiClient) -> Self {
    Self {
      view: empty_view(),
      pairs: HashMap::new(),
      cursor: (0, 0),
      soul_filter: String::new(),
      soul_filter_active: false,
      integration_filter: String::new(),
      integration_filter_active: false,
      platform_filter: None,
      only_connected: false,
      only_primary: false,
      bulk_mode: false,
      selection: BTreeMap::new(),
      in_flight: HashSet::new(),
      pending_click: None,
      status_msg: String::new(),
      client: Arc::new(client),
    }
  }

  // ── Data loading ──────────────────────────────────────────────────────────

  /// Fetch the matrix on startup; the app is unusable without it.
  pub async fn load_matrix(&mut self) -> anyhow::Result<()> {
    self.status_msg = "Loading matrix…".into();
    match self.client.get_matrix().await {
      Ok(view) => {
        self.view = view;
        self.rebuild_index();
        self.cursor = (0, 0);
        self.status_msg = String::new();
        Ok(())
      }
      Err(e) => {
        self.status_msg = format!("Error: {e}");
        Err(e)
      }
    }
  }

  /// Refetch after a mutation. Failures land in the status bar.
  pub async fn refresh(&mut self) {
    match self.client.get_matrix().await {
      Ok(view) => {
        self.view = view;
        self.rebuild_index();
        self.clamp_cursor();
      }
      Err(e) => self.status_msg = format!("Error: {e}"),
    }
  }

  /// Rebuild the per-cell mapping index from the current snapshot.
  pub fn rebuild_index(&mut self) {
    self.pairs = self
      .view
      .mappings
      .iter()
      .map(|m| {
        (
          cell_key(&m.soul_id, &m.integration_id),
          (m.mapping_id, m.is_primary),
        )
      })
      .collect();
  }

  // ── Filtered grid ─────────────────────────────────────────────────────────

  /// Souls visible under the current filters, in server order.
  pub fn visible_souls(&self) -> Vec<&MatrixSoul> {
    let matcher = SkimMatcherV2::default();
    self
      .view
      .souls
      .iter()
      .filter(|s| {
        if !self.soul_filter.is_empty() {
          let hit = matcher
            .fuzzy_match(&s.soul.display_name, &self.soul_filter)
            .is_some()
            || matcher
              .fuzzy_match(s.soul.soul_id.as_str(), &self.soul_filter)
              .is_some();
          if !hit {
            return false;
          }
        }
        if self.only_connected && s.integration_ids.is_empty() {
          return false;
        }
        if self.only_primary && !self.has_primary(s) {
          return false;
        }
        true
      })
      .collect()
  }

  fn has_primary(&self, soul: &MatrixSoul) -> bool {
    soul.integration_ids.iter().any(|id| {
      self
        .pairs
        .get(&cell_key(&soul.soul.soul_id, id))
        .is_some_and(|(_, primary)| *primary)
    })
  }

  /// Integrations visible under the current filters, in catalog order.
  pub fn visible_integrations(&self) -> Vec<&IntegrationDetails> {
    self
      .view
      .integrations
      .iter()
      .filter(|i| {
        if !self.integration_filter.is_empty()
          && !i
            .name
            .to_lowercase()
            .contains(&self.integration_filter.to_lowercase())
        {
          return false;
        }
        match &self.platform_filter {
          Some(platform) => i.provider == *platform,
          None => true,
        }
      })
      .collect()
  }

  /// Unique providers across the catalog, sorted.
  pub fn platforms(&self) -> Vec<String> {
    let mut platforms: Vec<String> = self
      .view
      .integrations
      .iter()
      .map(|i| i.provider.clone())
      .collect();
    platforms.sort();
    platforms.dedup();
    platforms
  }

  /// Advance the platform filter: none → first → … → last → none.
  pub fn cycle_platform(&mut self) {
    let platforms = self.platforms();
    self.platform_filter = match &self.platform_filter {
      None => platforms.first().cloned(),
      Some(current) => platforms
        .iter()
        .position(|p| p == current)
        .and_then(|i| platforms.get(i + 1))
        .cloned(),
    };
    self.clamp_cursor();
  }

  // ── Cells and cursor ──────────────────────────────────────────────────────

  /// Visual state of one cell, straight from the mapping index.
  pub fn cell_state(
    &self,
    soul_id: &SoulId,
    integration_id: &IntegrationId,
  ) -> CellState {
    match self.pairs.get(&cell_key(soul_id, integration_id)) {
      Some((_, true)) => CellState::Primary,
      Some((_, false)) => CellState::Connected,
      None => CellState::Disconnected,
    }
  }

  /// Whether any souls and integrations exist at all, before filtering.
  /// Distinguishes an empty tenant from filters that match nothing.
  pub fn has_data(&self) -> bool {
    !self.view.souls.is_empty() && !self.view.integrations.is_empty()
  }

  /// The (soul, integration) under the cursor, if the visible grid is
  /// non-empty.
  pub fn cursor_cell(&self) -> Option<(SoulId, IntegrationId)> {
    let soul = self.visible_souls().get(self.cursor.0)?.soul.soul_id.clone();
    let integration = self
      .visible_integrations()
      .get(self.cursor.1)?
      .integration_id
      .clone();
    Some((soul, integration))
  }

  /// Pull the cursor back inside the filtered grid.
  pub fn clamp_cursor(&mut self) {
    let rows = self.visible_souls().len();
    let cols = self.visible_integrations().len();
    self.cursor.0 = self.cursor.0.min(rows.saturating_sub(1));
    self.cursor.1 = self.cursor.1.min(cols.saturating_sub(1));
  }

  fn move_cursor(&mut self, row_delta: isize, col_delta: isize) {
    let rows = self.visible_souls().len();
    let cols = self.visible_integrations().len();
    if rows == 0 || cols == 0 {
      return;
    }
    self.cursor.0 = self.cursor.0.saturating_add_signed(row_delta).min(rows - 1);
    self.cursor.1 = self.cursor.1.saturating_add_signed(col_delta).min(cols - 1);
  }

  /// One-line description of the cursor cell for the status bar.
  pub fn cursor_summary(&self) -> String {
    let Some((soul_id, integration_id)) = self.cursor_cell() else {
      return String::new();
    };
    let name = self
      .visible_souls()
      .get(self.cursor.0)
      .map(|s| s.soul.display_name.clone())
      .unwrap_or_default();
    let channel = self
      .visible_integrations()
      .get(self.cursor.1)
      .map(|i| i.name.clone())
      .unwrap_or_default();
    let state = match self.cell_state(&soul_id, &integration_id) {
      CellState::Primary => "primary",
      CellState::Connected => "connected",
      CellState::Disconnected => "not connected",
    };
    format!("{name} × {channel}: {state}")
  }

  // ── In-flight guard ───────────────────────────────────────────────────────

  /// Claim a cell for a request. Returns false if one is already running.
  pub fn begin_cell_request(&mut self, key: &str) -> bool {
    self.in_flight.insert(key.to_string())
  }

  pub fn finish_cell_request(&mut self, key: &str) {
    self.in_flight.remove(key);
  }

  /// Whether a request is outstanding for this cell.
  pub fn cell_busy(&self, key: &str) -> bool {
    self.in_flight.contains(key)
  }

  // ── Click disambiguation ──────────────────────────────────────────────────

  /// Record a click on a cell. A second click on the same cell within
  /// [`DOUBLE_CLICK_MS`] becomes a primary flip; a click elsewhere releases
  /// the parked one as a toggle and parks the new one.
  pub fn register_click(
    &mut self,
    soul_id: SoulId,
    integration_id: IntegrationId,
    now: Instant,
  ) -> Option<ClickAction> {
    let window = Duration::from_millis(DOUBLE_CLICK_MS);
    match self.pending_click.take() {
      Some(pending)
        if pending.soul_id == soul_id
          && pending.integration_id == integration_id
          && now.duration_since(pending.at) <= window =>
      {
        Some(ClickAction::FlipPrimary(soul_id, integration_id))
      }
      Some(pending) => {
        self.pending_click =
          Some(PendingClick { soul_id, integration_id, at: now });
        Some(ClickAction::Toggle(pending.soul_id, pending.integration_id))
      }
      None => {
        self.pending_click =
          Some(PendingClick { soul_id, integration_id, at: now });
        None
      }
    }
  }

  /// Release a parked click as a toggle once its window has lapsed.
  pub fn expired_click(&mut self, now: Instant) -> Option<ClickAction> {
    let window = Duration::from_millis(DOUBLE_CLICK_MS);
    let lapsed = self
      .pending_click
      .as_ref()
      .is_some_and(|p| now.duration_since(p.at) > window);
    if !lapsed {
      return None;
    }
    let pending = self.pending_click.take()?;
    Some(ClickAction::Toggle(pending.soul_id, pending.integration_id))
  }

  // ── Bulk selection ────────────────────────────────────────────────────────

  /// Mark or unmark a cell in the bulk selection.
  pub fn toggle_selection(
    &mut self,
    soul_id: SoulId,
    integration_id: IntegrationId,
  ) {
    let key = cell_key(&soul_id, &integration_id);
    if self.selection.remove(&key).is_none() {
      self.selection.insert(key, (soul_id, integration_id));
    }
  }

  pub fn is_selected(
    &self,
    soul_id: &SoulId,
    integration_id: &IntegrationId,
  ) -> bool {
    self.selection.contains_key(&cell_key(soul_id, integration_id))
  }

  // ── Mutations ─────────────────────────────────────────────────────────────

  /// Toggle a pair and refetch. Errors land in the status bar.
  pub async fn toggle_cell(
    &mut self,
    soul_id: SoulId,
    integration_id: IntegrationId,
  ) {
    let key = cell_key(&soul_id, &integration_id);
    if !self.begin_cell_request(&key) {
      return;
    }
    let result = self.client.toggle(&soul_id, &integration_id).await;
    self.finish_cell_request(&key);

    match result {
      Ok(ToggleOutcome::Created { .. }) => {
        self.status_msg = format!("connected {soul_id} × {integration_id}");
        self.refresh().await;
      }
      Ok(ToggleOutcome::Deleted) => {
        self.status_msg = format!("disconnected {soul_id} × {integration_id}");
        self.refresh().await;
      }
      Err(e) => self.status_msg = format!("Error: {e}"),
    }
  }

  /// Promote a connected cell to primary, or drop the flag if it already
  /// holds it. No-op on a disconnected cell.
  pub async fn flip_primary(
    &mut self,
    soul_id: SoulId,
    integration_id: IntegrationId,
  ) {
    let key = cell_key(&soul_id, &integration_id);
    let Some(&(mapping_id, is_primary)) = self.pairs.get(&key) else {
      self.status_msg = "nothing connected here to promote".into();
      return;
    };
    if !self.begin_cell_request(&key) {
      return;
    }
    let result = if is_primary {
      self
        .client
        .update_mapping(mapping_id, &json!({ "isPrimary": false }))
        .await
        .map(|_| "demoted")
    } else {
      self.client.set_primary(mapping_id).await.map(|_| "promoted")
    };
    self.finish_cell_request(&key);

    match result {
      Ok(verb) => {
        self.status_msg = format!("{verb} {soul_id} × {integration_id}");
        self.refresh().await;
      }
      Err(e) => self.status_msg = format!("Error: {e}"),
    }
  }

  /// Apply one bulk request over the selection, then leave bulk mode. The
  /// report's per-item failures end up in the status bar.
  pub async fn apply_bulk(&mut self, operation: BulkOperation) {
    if self.selection.is_empty() {
      self.status_msg = "nothing selected".into();
      return;
    }
    let items: Vec<BulkItem> = self
      .selection
      .values()
      .map(|(soul_id, integration_id)| BulkItem {
        soul_id:        soul_id.clone(),
        integration_id: integration_id.clone(),
        priority:       None,
        notes:          None,
      })
      .collect();

    match self.client.bulk(operation, items).await {
      Ok(report) => {
        self.status_msg = if report.errors.is_empty() {
          format!("{} applied", report.succeeded)
        } else {
          let failures = report
            .errors
            .iter()
            .map(|e| format!("{}×{}: {}", e.soul_id, e.integration_id, e.error))
            .collect::<Vec<_>>()
            .join("; ");
          format!(
            "{} applied, {} failed: {failures}",
            report.succeeded, report.failed
          )
        };
        self.selection.clear();
        self.bulk_mode = false;
        self.refresh().await;
      }
      Err(e) => self.status_msg = format!("Error: {e}"),
    }
  }

  // ── Mouse ─────────────────────────────────────────────────────────────────

  /// A mouse click resolved to a visible cell. In bulk mode it marks; in
  /// normal mode it feeds the double-click disambiguator.
  pub async fn click_cell(&mut self, row: usize, col: usize, now: Instant) {
    self.cursor = (row, col);
    let Some((soul_id, integration_id)) = self.cursor_cell() else {
      return;
    };
    if self.bulk_mode {
      self.toggle_selection(soul_id, integration_id);
      return;
    }
    if let Some(action) = self.register_click(soul_id, integration_id, now) {
      self.apply_click(action).await;
    }
  }

  /// Run a disambiguated click action.
  pub async fn apply_click(&mut self, action: ClickAction) {
    match action {
      ClickAction::Toggle(soul_id, integration_id) => {
        self.toggle_cell(soul_id, integration_id).await
      }
      ClickAction::FlipPrimary(soul_id, integration_id) => {
        self.flip_primary(soul_id, integration_id).await
      }
    }
  }

  // ── Key handling ──────────────────────────────────────────────────────────

  /// Process a key event. Returns `true` to continue, `false` to quit.
  pub async fn handle_key(&mut self, key: KeyEvent) -> anyhow::Result<bool> {
    // Global: Ctrl-C quits from anywhere.
    if key.modifiers.contains(KeyModifiers::CONTROL)
      && key.code == KeyCode::Char('c')
    {
      return Ok(false);
    }

    // Filter input mode: printable keys go into the active filter string.
    if self.soul_filter_active || self.integration_filter_active {
      self.handle_filter_key(key);
      return Ok(true);
    }

    match key.code {
      KeyCode::Char('q') => return Ok(false),

      // Navigation
      KeyCode::Down | KeyCode::Char('j') => self.move_cursor(1, 0),
      KeyCode::Up | KeyCode::Char('k') => self.move_cursor(-1, 0),
      KeyCode::Right | KeyCode::Char('l') => self.move_cursor(0, 1),
      KeyCode::Left | KeyCode::Char('h') => self.move_cursor(0, -1),

      // Toggle the cursor cell, or mark it in bulk mode.
      KeyCode::Char(' ') | KeyCode::Enter => {
        if let Some((soul_id, integration_id)) = self.cursor_cell() {
          if self.bulk_mode {
            self.toggle_selection(soul_id, integration_id);
          } else {
            self.toggle_cell(soul_id, integration_id).await;
          }
        }
      }

      // Primary flip
      KeyCode::Char('p') => {
        if let Some((soul_id, integration_id)) = self.cursor_cell() {
          self.flip_primary(soul_id, integration_id).await;
        }
      }

      // Filters
      KeyCode::Char('/') => {
        self.soul_filter_active = true;
        self.soul_filter.clear();
        self.cursor.0 = 0;
      }
      KeyCode::Char('i') => {
        self.integration_filter_active = true;
        self.integration_filter.clear();
        self.cursor.1 = 0;
      }
      KeyCode::Char('f') => self.cycle_platform(),
      KeyCode::Char('o') => {
        self.only_connected = !self.only_connected;
        self.clamp_cursor();
      }
      KeyCode::Char('O') => {
        self.only_primary = !self.only_primary;
        self.clamp_cursor();
      }

      // Bulk mode
      KeyCode::Char('v') => {
        self.bulk_mode = !self.bulk_mode;
        self.selection.clear();
        self.status_msg = if self.bulk_mode {
          "bulk: space marks, c connects, d disconnects".into()
        } else {
          String::new()
        };
      }
      KeyCode::Char('c') if self.bulk_mode => {
        self.apply_bulk(BulkOperation::Create).await;
      }
      KeyCode::Char('d') if self.bulk_mode => {
        self.apply_bulk(BulkOperation::Delete).await;
      }

      // Refresh
      KeyCode::Char('r') => {
        self.refresh().await;
        self.status_msg = "refreshed".into();
      }

      // Esc leaves bulk mode first, then clears every filter.
      KeyCode::Esc => {
        if self.bulk_mode {
          self.bulk_mode = false;
          self.selection.clear();
        } else {
          self.soul_filter.clear();
          self.integration_filter.clear();
          self.platform_filter = None;
          self.only_connected = false;
          self.only_primary = false;
          self.clamp_cursor();
        }
      }

      _ => {}
    }
    Ok(true)
  }

  fn handle_filter_key(&mut self, key: KeyEvent) {
    match key.code {
      KeyCode::Esc => {
        if self.soul_filter_active {
          self.soul_filter.clear();
          self.soul_filter_active = false;
        } else {
          self.integration_filter.clear();
          self.integration_filter_active = false;
        }
      }
      KeyCode::Enter => {
        self.soul_filter_active = false;
        self.integration_filter_active = false;
      }
      KeyCode::Backspace => {
        if self.soul_filter_active {
          self.soul_filter.pop();
        } else {
          self.integration_filter.pop();
        }
      }
      KeyCode::Char(c) => {
        if self.soul_filter_active {
          self.soul_filter.push(c);
        } else {
          self.integration_filter.push(c);
        }
      }
      _ => {}
    }
    self.clamp_cursor();
  }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use chrono::Utc;
  use weft_core::{mapping::Mapping, soul::Soul};

  use super::*;
  use crate::client::ApiConfig;

  fn mapping(soul: &str, integration: &str, primary: bool) -> Mapping {
    Mapping {
      mapping_id:     Uuid::new_v4(),
      org_id:         "org-1".into(),
      soul_id:        soul.into(),
      integration_id: integration.into(),
      is_primary:     primary,
      priority:       0,
      notes:          None,
      created_by:     None,
      created_at:     Utc::now(),
      updated_at:     Utc::now(),
    }
  }

  fn integration(id: &str, name: &str, provider: &str) -> IntegrationDetails {
    IntegrationDetails {
      integration_id: id.into(),
      name:           name.to_string(),
      picture:        None,
      provider:       provider.to_string(),
      disabled:       false,
    }
  }

  fn soul_row(id: &str, name: &str, integration_ids: &[&str]) -> MatrixSoul {
    MatrixSoul {
      soul:            Soul {
        soul_id:      id.into(),
        display_name: name.to_string(),
        email:        None,
      },
      integration_ids: integration_ids.iter().map(|i| (*i).into()).collect(),
    }
  }

  /// 2×2 grid: Ada connected to both channels (primary on chirper), Brio to
  /// none.
  fn app() -> App {
    let client = ApiClient::new(ApiConfig {
      base_url: "http://localhost:0".into(),
      username: String::new(),
      password: String::new(),
    })
    .unwrap();
    let mut app = App::new(client);
    app.view = MatrixView {
      souls:        vec![
        soul_row("soul-a", "Ada", &["int-x", "int-y"]),
        soul_row("soul-b", "Brio", &[]),
      ],
      integrations: vec![
        integration("int-x", "Chirper Main", "chirper"),
        integration("int-y", "Album Backup", "album"),
      ],
      mappings:     vec![
        mapping("soul-a", "int-x", true),
        mapping("soul-a", "int-y", false),
      ],
      summary:      MatrixSummary {
        total_souls:        2,
        total_integrations: 2,
        total_mappings:     2,
      },
    };
    app.rebuild_index();
    app
  }

  #[test]
  fn cell_state_reflects_the_index() {
    let app = app();
    assert_eq!(
      app.cell_state(&"soul-a".into(), &"int-x".into()),
      CellState::Primary
    );
    assert_eq!(
      app.cell_state(&"soul-a".into(), &"int-y".into()),
      CellState::Connected
    );
    assert_eq!(
      app.cell_state(&"soul-b".into(), &"int-x".into()),
      CellState::Disconnected
    );
  }

  #[test]
  fn soul_filter_is_fuzzy_over_name_and_id() {
    let mut app = app();

    app.soul_filter = "ad".into();
    let visible = app.visible_souls();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].soul.display_name, "Ada");

    // Matches the id as well as the display name.
    app.soul_filter = "soul-b".into();
    assert_eq!(app.visible_souls().len(), 1);

    app.soul_filter = "zzz".into();
    assert!(app.visible_souls().is_empty());
  }

  #[test]
  fn integration_filter_is_a_substring_match() {
    let mut app = app();
    app.integration_filter = "album".into();
    let visible = app.visible_integrations();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].name, "Album Backup");
  }

  #[test]
  fn platform_cycle_walks_every_provider_then_clears() {
    let mut app = app();
    assert_eq!(app.platforms(), vec!["album", "chirper"]);

    app.cycle_platform();
    assert_eq!(app.platform_filter.as_deref(), Some("album"));
    app.cycle_platform();
    assert_eq!(app.platform_filter.as_deref(), Some("chirper"));
    app.cycle_platform();
    assert_eq!(app.platform_filter, None);
  }

  #[test]
  fn connected_and_primary_filters_drop_rows() {
    let mut app = app();

    app.only_connected = true;
    assert_eq!(app.visible_souls().len(), 1);

    app.only_connected = false;
    app.only_primary = true;
    assert_eq!(app.visible_souls().len(), 1);

    // Demote the only primary; the filter now matches nothing.
    app.view.mappings[0].is_primary = false;
    app.rebuild_index();
    assert!(app.visible_souls().is_empty());
  }

  #[test]
  fn filtered_empty_is_distinct_from_no_data() {
    let mut filtered = app();
    filtered.soul_filter = "zzz".into();
    assert!(filtered.has_data());
    assert!(filtered.visible_souls().is_empty());

    let fresh = App::new(
      ApiClient::new(ApiConfig {
        base_url: "http://localhost:0".into(),
        username: String::new(),
        password: String::new(),
      })
      .unwrap(),
    );
    assert!(!fresh.has_data());
  }

  #[test]
  fn selection_round_trips_and_keys_are_stable() {
    let mut app = app();
    app.toggle_selection("soul-a".into(), "int-x".into());
    assert!(app.is_selected(&"soul-a".into(), &"int-x".into()));
    assert_eq!(
      app.selection.keys().next().map(String::as_str),
      Some("soul-a-int-x")
    );

    app.toggle_selection("soul-a".into(), "int-x".into());
    assert!(app.selection.is_empty());
  }

  #[test]
  fn second_click_on_the_same_cell_flips_primary() {
    let mut app = app();
    let t0 = Instant::now();

    assert_eq!(app.register_click("soul-a".into(), "int-x".into(), t0), None);
    assert_eq!(
      app.register_click(
        "soul-a".into(),
        "int-x".into(),
        t0 + Duration::from_millis(100)
      ),
      Some(ClickAction::FlipPrimary("soul-a".into(), "int-x".into()))
    );

    // The pending slot was consumed; a third click starts over.
    assert_eq!(
      app.register_click(
        "soul-a".into(),
        "int-x".into(),
        t0 + Duration::from_millis(200)
      ),
      None
    );
  }

  #[test]
  fn click_on_another_cell_releases_the_parked_toggle() {
    let mut app = app();
    let t0 = Instant::now();

    assert_eq!(app.register_click("soul-a".into(), "int-x".into(), t0), None);
    assert_eq!(
      app.register_click(
        "soul-a".into(),
        "int-y".into(),
        t0 + Duration::from_millis(100)
      ),
      Some(ClickAction::Toggle("soul-a".into(), "int-x".into()))
    );

    // The new click is parked in turn and expires into a toggle.
    assert_eq!(
      app.expired_click(t0 + Duration::from_millis(200)),
      None
    );
    assert_eq!(
      app.expired_click(t0 + Duration::from_millis(600)),
      Some(ClickAction::Toggle("soul-a".into(), "int-y".into()))
    );
    assert_eq!(app.expired_click(t0 + Duration::from_millis(700)), None);
  }

  #[test]
  fn in_flight_guard_refuses_reentry() {
    let mut app = app();
    assert!(app.begin_cell_request("soul-a-int-x"));
    assert!(!app.begin_cell_request("soul-a-int-x"));
    assert!(app.cell_busy("soul-a-int-x"));

    app.finish_cell_request("soul-a-int-x");
    assert!(!app.cell_busy("soul-a-int-x"));
    assert!(app.begin_cell_request("soul-a-int-x"));
  }

  #[test]
  fn cursor_clamps_to_the_filtered_grid() {
    let mut app = app();
    app.cursor = (1, 1);

    app.soul_filter = "ada".into();
    app.clamp_cursor();
    assert_eq!(app.cursor.0, 0);

    app.move_cursor(10, 10);
    assert_eq!(app.cursor, (0, 1));

    app.move_cursor(-10, -10);
    assert_eq!(app.cursor, (0, 0));
  }
}
