// src/affects/table.rs

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use log::{debug, error, warn};
use uuid::Uuid;

use crate::models::affect::Affect;
use crate::models::flaw::Flaw;
use crate::osidb::api::OsidbApi;
use crate::osidb::types::TrackerPost;
use crate::settings::UserSettings;
use crate::toast::ToastStore;

use super::columns::{cell_value, column_definitions, ColumnDef, ColumnId, FilterKind};
use super::filters::{arr_includes_with_blanks, cvss_score_matches, matches_text};
use super::model::AffectsModel;

// Fit-to-content width estimation; header text renders bolder than cells.
const HEADER_CHAR_WIDTH: f32 = 12.0;
const BODY_CHAR_WIDTH: f32 = 10.0;
const CELL_PADDING: f32 = 32.0;

const FALLBACK_PAGE_SIZE: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Derived per-row presentation state. Computed from the model's tracking
/// sets and the table's own selection on every call, never stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowFlags {
    pub is_new: bool,
    pub is_modified: bool,
    pub is_removed: bool,
    pub is_selected: bool,
    pub is_filing: bool,
    pub tracker_unavailable: bool,
}

/// Grid engine over the affects model: pagination, multi-key sorting,
/// column/global filtering, selection, bulk edit and tracker actions.
pub struct AffectsTable<B> {
    backend: Arc<B>,
    toasts: Arc<ToastStore>,
    model: AffectsModel<B>,
    columns: Vec<ColumnDef>,
    settings: UserSettings,

    sorting: Vec<(ColumnId, SortDirection)>,
    column_filters: HashMap<ColumnId, Vec<String>>,
    cvss_filter: Option<String>,
    global_filter: String,
    show_all: bool,
    current_page: usize,

    selected_rows: HashSet<String>,

    bulk_edit_mode: bool,
    bulk_values: HashMap<ColumnId, String>,
    bulk_changed: HashSet<ColumnId>,
    bulk_selected_rows: Vec<String>,

    filing_tracker: HashSet<Uuid>,
    unavailable_trackers: HashSet<Uuid>,
    is_fetching_suggested_trackers: bool,
}

impl<B: OsidbApi> AffectsTable<B> {
    pub fn new(backend: Arc<B>, toasts: Arc<ToastStore>, settings: UserSettings) -> Self {
        Self {
            model: AffectsModel::new(backend.clone(), toasts.clone()),
            backend,
            toasts,
            columns: column_definitions(),
            settings,
            sorting: Vec::new(),
            column_filters: HashMap::new(),
            cvss_filter: None,
            global_filter: String::new(),
            show_all: false,
            current_page: 0,
            selected_rows: HashSet::new(),
            bulk_edit_mode: false,
            bulk_values: HashMap::new(),
            bulk_changed: HashSet::new(),
            bulk_selected_rows: Vec::new(),
            filing_tracker: HashSet::new(),
            unavailable_trackers: HashSet::new(),
            is_fetching_suggested_trackers: false,
        }
    }

    pub fn initialize(&mut self, flaw: &Flaw) {
        self.model.initialize(flaw);
        self.current_page = 0;
        self.selected_rows.clear();
        self.filing_tracker.clear();
        self.unavailable_trackers.clear();
    }

    pub fn model(&self) -> &AffectsModel<B> {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut AffectsModel<B> {
        &mut self.model
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    pub fn settings(&self) -> &UserSettings {
        &self.settings
    }

    pub fn is_fetching_suggested_trackers(&self) -> bool {
        self.is_fetching_suggested_trackers
    }

    pub fn unavailable_trackers(&self) -> &HashSet<Uuid> {
        &self.unavailable_trackers
    }

    /// Add a blank draft row, pinned to the top like any new affect.
    pub fn add_row(&mut self) -> Uuid {
        self.model.add_affect(Affect::default())
    }

    // ---- filtering / sorting / pagination -------------------------------

    pub fn set_column_filter(&mut self, column: ColumnId, values: Vec<String>) {
        if values.is_empty() {
            self.column_filters.remove(&column);
        } else {
            self.column_filters.insert(column, values);
        }
        self.current_page = 0;
    }

    pub fn set_cvss_filter(&mut self, filter: Option<String>) {
        self.cvss_filter = filter.filter(|f| !f.is_empty());
        self.current_page = 0;
    }

    pub fn set_global_filter(&mut self, filter: impl Into<String>) {
        self.global_filter = filter.into();
        self.current_page = 0;
    }

    fn passes_filters(&self, affect: &Affect) -> bool {
        for def in &self.columns {
            match def.filter {
                FilterKind::Values => {
                    if let Some(values) = self.column_filters.get(&def.id) {
                        if !arr_includes_with_blanks(&cell_value(affect, def.id), values) {
                            return false;
                        }
                    }
                }
                FilterKind::Score => {
                    if let Some(filter) = &self.cvss_filter {
                        if !cvss_score_matches(affect.cvss3_score(), filter) {
                            return false;
                        }
                    }
                }
                FilterKind::Text => {}
            }
        }

        if !self.global_filter.is_empty() {
            return self.columns.iter().any(|def| {
                self.settings.is_column_visible(def.id)
                    && matches_text(&cell_value(affect, def.id), &self.global_filter)
            });
        }
        true
    }

    /// Cycle one column asc -> desc -> none, clearing other sort keys.
    pub fn toggle_sort(&mut self, column: ColumnId) {
        let next = self.next_direction(column);
        self.sorting.clear();
        if let Some(direction) = next {
            self.sorting.push((column, direction));
        }
    }

    /// Shift-click contract: advance this column's state while keeping the
    /// other sort keys; later keys break ties of earlier ones.
    pub fn toggle_sort_additive(&mut self, column: ColumnId) {
        let next = self.next_direction(column);
        self.sorting.retain(|(id, _)| *id != column);
        if let Some(direction) = next {
            self.sorting.push((column, direction));
        }
    }

    fn next_direction(&self, column: ColumnId) -> Option<SortDirection> {
        match self.sorting.iter().find(|(id, _)| *id == column) {
            None => Some(SortDirection::Ascending),
            Some((_, SortDirection::Ascending)) => Some(SortDirection::Descending),
            Some((_, SortDirection::Descending)) => None,
        }
    }

    pub fn sorting(&self) -> &[(ColumnId, SortDirection)] {
        &self.sorting
    }

    fn compare(&self, a: &Affect, b: &Affect, column: ColumnId) -> std::cmp::Ordering {
        match column {
            ColumnId::Cvss => a
                .cvss3_score()
                .partial_cmp(&b.cvss3_score())
                .unwrap_or(std::cmp::Ordering::Equal),
            _ => cell_value(a, column).cmp(&cell_value(b, column)),
        }
    }

    fn filtered_sorted_rows(&self) -> Vec<&Affect> {
        let mut rows: Vec<&Affect> = self
            .model
            .affects()
            .iter()
            .filter(|a| self.passes_filters(a))
            .collect();

        if !self.sorting.is_empty() {
            // Vec::sort_by is stable, so equal keys keep their base order.
            rows.sort_by(|a, b| {
                for (column, direction) in &self.sorting {
                    let ordering = self.compare(a, b, *column);
                    let ordering = match direction {
                        SortDirection::Ascending => ordering,
                        SortDirection::Descending => ordering.reverse(),
                    };
                    if ordering != std::cmp::Ordering::Equal {
                        return ordering;
                    }
                }
                std::cmp::Ordering::Equal
            });
        }
        rows
    }

    pub fn filtered_count(&self) -> usize {
        self.filtered_sorted_rows().len()
    }

    pub fn page_size(&self) -> usize {
        if self.show_all {
            self.filtered_count().max(1)
        } else {
            self.settings.affects_per_page
        }
    }

    pub fn total_pages(&self) -> usize {
        let count = self.filtered_count();
        let size = self.page_size();
        count.div_ceil(size)
    }

    pub fn current_page(&self) -> usize {
        let total = self.total_pages();
        if total == 0 {
            0
        } else {
            self.current_page.min(total - 1)
        }
    }

    pub fn change_page(&mut self, page: usize) {
        let total = self.total_pages();
        if total == 0 {
            self.current_page = 0;
        } else {
            self.current_page = page.min(total - 1);
        }
    }

    pub fn show_all(&self) -> bool {
        self.show_all
    }

    pub fn set_show_all(&mut self, show_all: bool) {
        self.show_all = show_all;
        self.current_page = 0;
    }

    pub fn change_items_per_page(&mut self, count: usize) {
        let count = if count == 0 { FALLBACK_PAGE_SIZE } else { count };
        self.settings.affects_per_page = count.clamp(1, 100);
    }

    /// The current page after filtering and sorting.
    pub fn visible_rows(&self) -> Vec<&Affect> {
        let rows = self.filtered_sorted_rows();
        let size = self.page_size();
        let start = self.current_page() * size;
        let end = (start + size).min(rows.len());
        if start >= rows.len() {
            return Vec::new();
        }
        rows[start..end].to_vec()
    }

    // ---- columns --------------------------------------------------------

    pub fn toggle_column_visibility(&mut self, column: ColumnId) {
        let visible = self.settings.is_column_visible(column);
        self.settings.column_visibility.insert(column, !visible);
    }

    /// Move a column to a new position in the persisted order.
    pub fn move_column(&mut self, column: ColumnId, position: usize) {
        let order = &mut self.settings.column_order;
        if let Some(current) = order.iter().position(|id| *id == column) {
            let id = order.remove(current);
            order.insert(position.min(order.len()), id);
        }
    }

    /// Column definitions in the user's persisted order; columns missing
    /// from the order (e.g. added after the settings were saved) keep their
    /// default position at the end.
    pub fn ordered_columns(&self) -> Vec<&ColumnDef> {
        let mut ordered: Vec<&ColumnDef> = Vec::with_capacity(self.columns.len());
        for id in &self.settings.column_order {
            if let Some(def) = self.columns.iter().find(|d| d.id == *id) {
                ordered.push(def);
            }
        }
        for def in &self.columns {
            if !self.settings.column_order.contains(&def.id) {
                ordered.push(def);
            }
        }
        ordered
    }

    /// Estimate a pixel width from the header text and the widest rendered
    /// cell among the currently filtered rows, then persist it.
    pub fn fit_column_width(&mut self, column: ColumnId) {
        let Some(def) = self.columns.iter().find(|d| d.id == column) else {
            return;
        };
        let header_width = def.header.len() as f32 * HEADER_CHAR_WIDTH;
        let body_width = self
            .filtered_sorted_rows()
            .iter()
            .map(|a| cell_value(a, column).len() as f32 * BODY_CHAR_WIDTH)
            .fold(0.0f32, f32::max);
        self.settings
            .column_sizing
            .insert(column, header_width.max(body_width) + CELL_PADDING);
    }

    pub fn column_width(&self, column: ColumnId) -> f32 {
        self.settings
            .column_sizing
            .get(&column)
            .copied()
            .unwrap_or_else(|| {
                self.columns
                    .iter()
                    .find(|d| d.id == column)
                    .map(|d| d.width)
                    .unwrap_or(100.0)
            })
    }

    // ---- selection ------------------------------------------------------

    pub fn is_row_selected(&self, key: &str) -> bool {
        self.selected_rows.contains(key)
    }

    pub fn toggle_row_selected(&mut self, key: &str) {
        if !self.selected_rows.remove(key) {
            self.selected_rows.insert(key.to_string());
        }
    }

    pub fn selected_row_keys(&self) -> Vec<String> {
        self.selected_rows.iter().cloned().collect()
    }

    pub fn clear_selection(&mut self) {
        self.selected_rows.clear();
    }

    pub fn select_all_visible(&mut self) {
        let keys: Vec<String> = self.visible_rows().iter().map(|a| a.row_key()).collect();
        self.selected_rows.extend(keys);
    }

    /// Mark every selected row removed, then drop the selection.
    pub fn delete_selected_rows(&mut self) {
        let ids: Vec<Uuid> = self
            .selected_rows
            .iter()
            .filter_map(|key| Uuid::parse_str(key).ok())
            .collect();
        for id in ids {
            self.model.remove_affect(id);
        }
        self.selected_rows.clear();
    }

    pub fn revert_all_changes(&mut self) {
        self.model.revert_all();
    }

    pub fn row_flags(&self, affect: &Affect) -> RowFlags {
        let id = affect.row_id();
        RowFlags {
            is_new: id.is_some_and(|id| self.model.is_new(id)),
            is_modified: id.is_some_and(|id| self.model.is_modified(id)),
            is_removed: id.is_some_and(|id| self.model.is_being_removed(id)),
            is_selected: self.selected_rows.contains(&affect.row_key()),
            is_filing: affect.uuid.is_some_and(|u| self.filing_tracker.contains(&u)),
            tracker_unavailable: affect
                .uuid
                .is_some_and(|u| self.unavailable_trackers.contains(&u)),
        }
    }

    // ---- bulk edit ------------------------------------------------------

    pub fn is_bulk_edit_mode(&self) -> bool {
        self.bulk_edit_mode
    }

    pub fn enter_bulk_edit_mode(&mut self) {
        self.bulk_selected_rows = self.selected_rows.iter().cloned().collect();
        self.bulk_values.clear();
        self.bulk_changed.clear();
        self.bulk_edit_mode = true;
    }

    pub fn exit_bulk_edit_mode(&mut self) {
        self.bulk_edit_mode = false;
        self.bulk_values.clear();
        self.bulk_changed.clear();
        self.bulk_selected_rows.clear();
    }

    pub fn update_bulk_field(&mut self, column: ColumnId, value: impl Into<String>) {
        let editable = self
            .columns
            .iter()
            .any(|d| d.id == column && d.bulk_editable);
        if !editable {
            debug!("Column {column:?} is not bulk editable");
            return;
        }
        self.bulk_values.insert(column, value.into());
        self.bulk_changed.insert(column);
    }

    pub fn bulk_value(&self, column: ColumnId) -> Option<&String> {
        self.bulk_values.get(&column)
    }

    /// Write only the staged fields, and only where the value actually
    /// differs, to every row captured at bulk-edit entry. Exits the mode
    /// and clears the selection.
    pub fn commit_bulk_edits(&mut self) {
        let keys = std::mem::take(&mut self.bulk_selected_rows);
        let changed: Vec<ColumnId> = self.bulk_changed.iter().copied().collect();

        for key in &keys {
            let Ok(id) = Uuid::parse_str(key) else { continue };
            for column in &changed {
                let Some(field) = column.field() else { continue };
                let Some(value) = self.bulk_values.get(column).cloned() else {
                    continue;
                };
                let unchanged = self
                    .model
                    .affect(id)
                    .map(|a| cell_value(a, *column) == value)
                    .unwrap_or(true);
                if unchanged {
                    continue;
                }
                self.model.set_field(id, field, &value);
            }
        }

        self.exit_bulk_edit_mode();
        self.selected_rows.clear();
    }

    // ---- trackers -------------------------------------------------------

    /// Fetch server suggestions and select the rows they point at; affects
    /// the server cannot track at all are remembered and reported once.
    pub async fn select_related_trackers(&mut self) {
        self.is_fetching_suggested_trackers = true;
        self.unavailable_trackers.clear();

        let backend = self.backend.clone();
        match backend.tracker_suggestions(&[self.model.flaw_uuid()]).await {
            Ok(suggestions) => {
                for stream in &suggestions.streams_components {
                    if !stream.selected || stream.affect.is_none() {
                        continue;
                    }
                    if let Some(affect) = self
                        .model
                        .affects()
                        .iter()
                        .find(|a| a.uuid == stream.affect && a.tracker.is_none())
                    {
                        self.selected_rows.insert(affect.row_key());
                    }
                }

                if !suggestions.not_applicable.is_empty() {
                    let streams: Vec<String> = suggestions
                        .not_applicable
                        .iter()
                        .map(|affect| {
                            if let Some(uuid) = affect.uuid {
                                self.unavailable_trackers.insert(uuid);
                            }
                            format!("{}/{}", affect.ps_module, affect.ps_component)
                        })
                        .collect();
                    self.toasts.warning(
                        "Tracker suggestions",
                        format!(
                            "These affects do not have available trackers:\n{}",
                            streams.join("\n")
                        ),
                    );
                }
            }
            Err(err) => {
                error!("Failed to load tracker suggestions: {err}");
                self.toasts
                    .warning("Error loading tracker suggestions", err.summary());
            }
        }

        self.is_fetching_suggested_trackers = false;
    }

    /// File one tracker per row, strictly sequentially, skipping rows that
    /// are unsaved or already mid-filing. Individual failures do not stop
    /// the batch.
    pub async fn file_trackers(&mut self, row_keys: &[String]) -> usize {
        let mut to_file: Vec<Uuid> = Vec::new();
        for key in row_keys {
            let Some(affect) = self.model.affects().iter().find(|a| a.row_key() == *key) else {
                continue;
            };
            let Some(uuid) = affect.uuid else {
                warn!(
                    "Skipping tracker for unsaved affect {}/{}",
                    affect.ps_module, affect.ps_component
                );
                continue;
            };
            if !self.filing_tracker.contains(&uuid) && !to_file.contains(&uuid) {
                to_file.push(uuid);
            }
        }
        for uuid in &to_file {
            self.filing_tracker.insert(*uuid);
        }

        let mut filed = 0usize;
        for uuid in to_file {
            let post = match self.model.affects().iter().find(|a| a.uuid == Some(uuid)) {
                Some(affect) => TrackerPost {
                    affects: vec![uuid],
                    ps_update_stream: affect.ps_update_stream.clone(),
                    resolution: Some(affect.resolution),
                    embargoed: Some(self.model.flaw_embargoed()),
                    updated_dt: affect.updated_dt,
                },
                None => {
                    self.filing_tracker.remove(&uuid);
                    continue;
                }
            };

            let backend = self.backend.clone();
            match backend.file_trackers(&[post]).await {
                Ok(response) => {
                    filed += 1;
                    if let Some(tracker) = response.successes.into_iter().next() {
                        self.model.set_tracker(uuid, tracker);
                    }
                }
                Err(err) => {
                    error!("Failed to file tracker for affect {uuid}: {err}");
                    self.toasts.warning("Error filing tracker", err.summary());
                }
            }
            self.filing_tracker.remove(&uuid);
        }

        if filed > 0 {
            self.toasts
                .success("Success!", format!("{filed} tracker(s) filed."));
        }
        filed
    }

    /// File trackers for the selected rows that do not have one yet.
    pub async fn file_selected_trackers(&mut self) -> usize {
        let keys: Vec<String> = self
            .selected_rows
            .iter()
            .filter(|key| {
                self.model
                    .affects()
                    .iter()
                    .find(|a| a.row_key() == **key)
                    .is_some_and(|a| a.tracker.is_none())
            })
            .cloned()
            .collect();
        self.file_trackers(&keys).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::affect::{Affectedness, Resolution, Tracker};
    use crate::osidb::testing::MockBackend;
    use crate::osidb::types::{SuggestedStream, TrackerSuggestions};
    use pretty_assertions::assert_eq;

    fn persisted(module: &str, component: &str) -> Affect {
        Affect {
            uuid: Some(Uuid::new_v4()),
            ps_module: module.to_string(),
            ps_component: component.to_string(),
            ps_update_stream: format!("{module}.z"),
            affectedness: Affectedness::Affected,
            resolution: Resolution::Delegated,
            ..Default::default()
        }
    }

    fn table_with(affects: Vec<Affect>) -> (AffectsTable<MockBackend>, Arc<MockBackend>, Arc<ToastStore>) {
        let backend = Arc::new(MockBackend::new());
        let toasts = Arc::new(ToastStore::new());
        let flaw = Flaw {
            uuid: Uuid::new_v4(),
            cve_id: None,
            title: String::new(),
            embargoed: false,
            affects,
            created_dt: None,
            updated_dt: None,
        };
        *backend.flaw.lock().unwrap() = Some(flaw.clone());
        let mut table = AffectsTable::new(backend.clone(), toasts.clone(), UserSettings::default());
        table.initialize(&flaw);
        (table, backend, toasts)
    }

    #[test]
    fn pagination_math_follows_page_size() {
        let affects: Vec<Affect> = (0..6).map(|i| persisted("rhel-9", &format!("pkg-{i}"))).collect();
        let (mut table, _, _) = table_with(affects);

        table.change_items_per_page(5);
        assert_eq!(table.total_pages(), 2);
        assert_eq!(table.visible_rows().len(), 5);
        table.change_page(1);
        assert_eq!(table.visible_rows().len(), 1);

        table.change_items_per_page(1);
        assert_eq!(table.total_pages(), 6);
        assert_eq!(table.visible_rows().len(), 1);

        table.set_show_all(true);
        assert_eq!(table.total_pages(), 1);
        assert_eq!(table.visible_rows().len(), 6);
    }

    #[test]
    fn items_per_page_clamps_to_valid_range() {
        let (mut table, _, _) = table_with(vec![]);
        table.change_items_per_page(0);
        assert_eq!(table.settings().affects_per_page, 10);
        table.change_items_per_page(1000);
        assert_eq!(table.settings().affects_per_page, 100);
        table.change_items_per_page(1);
        assert_eq!(table.settings().affects_per_page, 1);
    }

    #[test]
    fn sort_cycles_through_three_states() {
        let mut a = persisted("rhel-9", "zlib");
        let mut b = persisted("rhel-9", "bash");
        a.impact = crate::models::affect::Impact::Low;
        b.impact = crate::models::affect::Impact::Critical;
        let (mut table, _, _) = table_with(vec![a, b]);

        table.toggle_sort(ColumnId::PsComponent);
        let rows = table.visible_rows();
        assert_eq!(rows[0].ps_component, "bash");

        table.toggle_sort(ColumnId::PsComponent);
        let rows = table.visible_rows();
        assert_eq!(rows[0].ps_component, "zlib");

        table.toggle_sort(ColumnId::PsComponent);
        assert!(table.sorting().is_empty());
        let rows = table.visible_rows();
        assert_eq!(rows[0].ps_component, "zlib"); // back to insertion order
    }

    #[test]
    fn additive_sort_breaks_ties_with_later_keys() {
        let mut rows = vec![
            persisted("rhel-9", "kernel"),
            persisted("rhel-8", "kernel"),
            persisted("rhel-8", "bash"),
        ];
        rows[0].ps_update_stream = "a".into();
        rows[1].ps_update_stream = "b".into();
        rows[2].ps_update_stream = "c".into();
        let (mut table, _, _) = table_with(rows);

        table.toggle_sort(ColumnId::PsModule);
        table.toggle_sort_additive(ColumnId::PsComponent);

        let visible = table.visible_rows();
        assert_eq!(visible[0].ps_component, "bash");
        assert_eq!(visible[0].ps_module, "rhel-8");
        assert_eq!(visible[1].ps_component, "kernel");
        assert_eq!(visible[1].ps_module, "rhel-8");
        assert_eq!(visible[2].ps_module, "rhel-9");
    }

    #[test]
    fn column_and_global_filters_narrow_rows() {
        let mut blank = persisted("rhel-9", "bash");
        blank.affectedness = Affectedness::Empty;
        blank.resolution = Resolution::Empty;
        let affected = persisted("rhel-9", "kernel");
        let (mut table, _, _) = table_with(vec![blank, affected]);

        table.set_column_filter(
            ColumnId::Affectedness,
            vec![crate::affects::filters::EMPTY_FILTER_OPTION.to_string()],
        );
        let rows = table.visible_rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].ps_component, "bash");

        table.set_column_filter(ColumnId::Affectedness, vec![]);
        table.set_global_filter("KERN");
        let rows = table.visible_rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].ps_component, "kernel");
    }

    #[test]
    fn fit_column_width_tracks_widest_cell() {
        let (mut table, _, _) = table_with(vec![persisted("rhel-9", "a-very-long-component-name")]);
        table.fit_column_width(ColumnId::PsComponent);
        let width = table.column_width(ColumnId::PsComponent);
        let expected = "a-very-long-component-name".len() as f32 * BODY_CHAR_WIDTH + CELL_PADDING;
        assert_eq!(width, expected);

        // Header dominates when cells are short.
        table.fit_column_width(ColumnId::Impact);
        let width = table.column_width(ColumnId::Impact);
        assert_eq!(width, "Impact".len() as f32 * HEADER_CHAR_WIDTH + CELL_PADDING);
    }

    #[test]
    fn moving_a_column_updates_the_persisted_order() {
        let (mut table, _, _) = table_with(vec![]);
        table.move_column(ColumnId::Impact, 0);

        assert_eq!(table.settings().column_order[0], ColumnId::Impact);
        assert_eq!(table.ordered_columns()[0].id, ColumnId::Impact);
        assert_eq!(table.ordered_columns().len(), table.columns().len());
    }

    #[test]
    fn delete_selected_marks_rows_removed_and_clears_selection() {
        let affect = persisted("rhel-9", "kernel");
        let uuid = affect.uuid.unwrap();
        let (mut table, _, _) = table_with(vec![affect]);

        table.toggle_row_selected(&uuid.to_string());
        table.delete_selected_rows();

        assert!(table.selected_row_keys().is_empty());
        assert!(table.model().is_being_removed(uuid));
        let affect = table.model().affect(uuid).unwrap().clone();
        assert!(table.row_flags(&affect).is_removed);
    }

    #[test]
    fn bulk_edit_with_no_staged_fields_changes_nothing() {
        let affect = persisted("rhel-9", "kernel");
        let uuid = affect.uuid.unwrap();
        let before = affect.clone();
        let (mut table, _, _) = table_with(vec![affect]);

        table.toggle_row_selected(&uuid.to_string());
        table.enter_bulk_edit_mode();
        table.commit_bulk_edits();

        assert_eq!(table.model().affect(uuid).unwrap(), &before);
        assert!(!table.model().is_modified(uuid));
        assert!(!table.is_bulk_edit_mode());
    }

    #[test]
    fn bulk_edit_applies_only_changed_fields_then_exits() {
        let affect = persisted("rhel-9", "kernel");
        let uuid = affect.uuid.unwrap();
        let (mut table, _, _) = table_with(vec![affect]);

        table.toggle_row_selected(&uuid.to_string());
        table.enter_bulk_edit_mode();
        table.update_bulk_field(ColumnId::PsModule, "new-module");
        table.commit_bulk_edits();

        let row = table.model().affect(uuid).unwrap();
        assert_eq!(row.ps_module, "new-module");
        assert_eq!(row.ps_component, "kernel");
        assert!(table.model().is_modified(uuid));
        assert!(!table.is_bulk_edit_mode());
        assert!(table.selected_row_keys().is_empty());
    }

    #[test]
    fn bulk_edit_cancel_discards_staging() {
        let affect = persisted("rhel-9", "kernel");
        let uuid = affect.uuid.unwrap();
        let (mut table, _, _) = table_with(vec![affect]);

        table.toggle_row_selected(&uuid.to_string());
        table.enter_bulk_edit_mode();
        table.update_bulk_field(ColumnId::PsModule, "new-module");
        table.exit_bulk_edit_mode();

        assert_eq!(table.model().affect(uuid).unwrap().ps_module, "rhel-9");
        assert!(table.bulk_value(ColumnId::PsModule).is_none());
    }

    #[tokio::test]
    async fn suggested_trackers_select_rows_and_report_unavailable() {
        let tracked = persisted("rhel-9", "kernel");
        let mut with_tracker = persisted("rhel-9", "bash");
        with_tracker.tracker = Some(Tracker::default());
        let unavailable = persisted("rhel-9", "glibc");
        let tracked_uuid = tracked.uuid.unwrap();
        let with_tracker_uuid = with_tracker.uuid.unwrap();
        let unavailable_uuid = unavailable.uuid.unwrap();

        let (mut table, backend, toasts) =
            table_with(vec![tracked.clone(), with_tracker, unavailable.clone()]);

        *backend.suggestions.lock().unwrap() = TrackerSuggestions {
            streams_components: vec![
                SuggestedStream {
                    affect: Some(tracked_uuid),
                    ps_update_stream: "rhel-9.z".to_string(),
                    ps_component: "kernel".to_string(),
                    selected: true,
                },
                SuggestedStream {
                    affect: Some(with_tracker_uuid),
                    ps_update_stream: "rhel-9.z".to_string(),
                    ps_component: "bash".to_string(),
                    selected: true,
                },
            ],
            not_applicable: vec![unavailable.clone()],
        };

        table.select_related_trackers().await;

        assert!(table.is_row_selected(&tracked_uuid.to_string()));
        // Rows that already have a tracker are never auto-selected.
        assert!(!table.is_row_selected(&with_tracker_uuid.to_string()));
        assert!(table.unavailable_trackers().contains(&unavailable_uuid));
        assert!(!table.is_fetching_suggested_trackers());

        let toasts = toasts.toasts();
        assert_eq!(toasts.len(), 1);
        assert!(toasts[0].body.contains("rhel-9/glibc"));
    }

    #[tokio::test]
    async fn filing_skips_unsaved_rows_and_assigns_returned_tracker() {
        let affect = persisted("rhel-9", "kernel");
        let uuid = affect.uuid.unwrap();
        let (mut table, backend, _) = table_with(vec![affect]);
        let unsaved = table.add_row();

        let filed_tracker = Tracker {
            uuid: Some(Uuid::new_v4()),
            affects: vec![uuid],
            external_system_id: "RHEL-1234".to_string(),
            ..Default::default()
        };
        backend.filed.lock().unwrap().successes = vec![filed_tracker];

        let filed = table
            .file_trackers(&[uuid.to_string(), unsaved.to_string()])
            .await;

        assert_eq!(filed, 1);
        assert_eq!(backend.call_count("file_trackers"), 1);
        let row = table.model().affect(uuid).unwrap();
        assert_eq!(
            row.tracker.as_ref().unwrap().external_system_id,
            "RHEL-1234"
        );
        assert!(table.filing_tracker.is_empty());
    }

    #[tokio::test]
    async fn filing_continues_past_individual_failures() {
        let a = persisted("rhel-9", "kernel");
        let b = persisted("rhel-9", "bash");
        let a_uuid = a.uuid.unwrap();
        let b_uuid = b.uuid.unwrap();
        let (mut table, backend, toasts) = table_with(vec![a, b]);

        backend.fail_next(true);
        let filed = table
            .file_trackers(&[a_uuid.to_string(), b_uuid.to_string()])
            .await;

        assert_eq!(filed, 0);
        // Both rows were attempted despite the first failure.
        assert_eq!(backend.call_count("file_trackers"), 2);
        assert!(table.filing_tracker.is_empty());
        assert_eq!(toasts.toasts().len(), 2);
    }

    #[tokio::test]
    async fn file_selected_only_targets_rows_without_trackers() {
        let bare = persisted("rhel-9", "kernel");
        let mut covered = persisted("rhel-9", "bash");
        covered.tracker = Some(Tracker::default());
        let bare_uuid = bare.uuid.unwrap();
        let covered_uuid = covered.uuid.unwrap();
        let (mut table, backend, _) = table_with(vec![bare, covered]);

        table.toggle_row_selected(&bare_uuid.to_string());
        table.toggle_row_selected(&covered_uuid.to_string());
        table.file_selected_trackers().await;

        assert_eq!(backend.call_count("file_trackers"), 1);
        let posts = backend.filed_posts.lock().unwrap();
        assert_eq!(posts[0][0].affects, vec![bare_uuid]);
    }
}
