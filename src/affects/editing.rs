// src/affects/editing.rs

use log::warn;
use uuid::Uuid;

use crate::models::affect::Affect;
use crate::osidb::api::OsidbApi;

use super::model::AffectsModel;

/// State the caller must force onto the select-all checkbox after a
/// toggle-all, since partial deselection would otherwise leave it checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderCheckbox {
    Checked,
    Unchecked,
    Indeterminate,
}

/// Inline-edit session over the affects list, independent of the grid
/// engine's selection. Rows under edit are paired 1:1 with pre-edit
/// snapshots; commit and cancel always clear both together.
///
/// Cancel and revert are distinct: cancel discards an uncommitted edit,
/// revert-to-last-saved discards a committed-but-unsaved modification.
#[derive(Default)]
pub struct EditingSession {
    being_edited: Vec<Uuid>,
    prior_values: Vec<Affect>,
    selected: Vec<Uuid>,
}

impl EditingSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_being_edited(&self, id: Uuid) -> bool {
        self.being_edited.contains(&id)
    }

    pub fn edited_ids(&self) -> &[Uuid] {
        &self.being_edited
    }

    /// Snapshot taken when the row entered edit, for rendering a diff or
    /// restoring on cancel. Falls back to nothing when the row is idle.
    pub fn prior_value(&self, id: Uuid) -> Option<&Affect> {
        self.being_edited
            .iter()
            .position(|edited| *edited == id)
            .map(|index| &self.prior_values[index])
    }

    /// Open a row for inline editing, snapshotting its current value. A row
    /// entering edit leaves the selection.
    pub fn edit_affect<B: OsidbApi>(&mut self, model: &AffectsModel<B>, id: Uuid) {
        self.selected.retain(|selected| *selected != id);
        if self.is_being_edited(id) {
            return;
        }
        let Some(affect) = model.affect(id) else {
            warn!("edit_affect: no affect with id {id}");
            return;
        };
        self.being_edited.push(id);
        self.prior_values.push(affect.clone());
    }

    fn clear_pair(&mut self, id: Uuid) -> Option<Affect> {
        let index = self.being_edited.iter().position(|edited| *edited == id)?;
        self.being_edited.remove(index);
        self.selected.retain(|selected| *selected != id);
        Some(self.prior_values.remove(index))
    }

    /// Splice the edited value into the live list and close the edit.
    pub fn commit_changes<B: OsidbApi>(&mut self, model: &mut AffectsModel<B>, edited: Affect) {
        let Some(id) = edited.row_id() else {
            warn!("commit_changes: edited affect has no identity");
            return;
        };
        let Some(prior) = self.clear_pair(id) else {
            warn!("commit_changes: affect {id} is not being edited");
            return;
        };
        let changed = edited != prior;
        model.replace_affect(id, edited, changed);
    }

    /// Discard an in-progress edit, restoring the pre-edit snapshot.
    pub fn cancel_changes<B: OsidbApi>(&mut self, model: &mut AffectsModel<B>, id: Uuid) {
        if let Some(prior) = self.clear_pair(id) {
            model.replace_affect(id, prior, false);
            model.unmark_if_pristine(id);
        }
    }

    /// Throw away a committed-but-unsaved modification, returning the row
    /// to the last state the server confirmed.
    pub fn revert_to_last_saved<B: OsidbApi>(&mut self, model: &mut AffectsModel<B>, id: Uuid) {
        model.restore_from_initial(id);
        self.selected.retain(|selected| *selected != id);
    }

    pub fn commit_all<B: OsidbApi>(&mut self, model: &mut AffectsModel<B>) {
        let ids: Vec<Uuid> = self.being_edited.clone();
        for id in ids {
            if let Some(current) = model.affect(id).cloned() {
                self.commit_changes(model, current);
            } else {
                self.clear_pair(id);
            }
        }
    }

    pub fn cancel_all<B: OsidbApi>(&mut self, model: &mut AffectsModel<B>) {
        let ids: Vec<Uuid> = self.being_edited.clone();
        for id in ids {
            self.cancel_changes(model, id);
        }
    }

    pub fn reset(&mut self) {
        self.being_edited.clear();
        self.prior_values.clear();
    }

    // ---- selection ------------------------------------------------------

    /// Rows pending removal or under edit cannot be selected.
    pub fn is_selectable<B: OsidbApi>(&self, model: &AffectsModel<B>, id: Uuid) -> bool {
        !model.is_being_removed(id) && !self.is_being_edited(id)
    }

    pub fn is_selected<B: OsidbApi>(&self, model: &AffectsModel<B>, id: Uuid) -> bool {
        self.is_selectable(model, id) && self.selected.contains(&id)
    }

    pub fn selected_ids(&self) -> &[Uuid] {
        &self.selected
    }

    pub fn toggle_selection<B: OsidbApi>(&mut self, model: &AffectsModel<B>, id: Uuid) {
        if !self.is_selectable(model, id) {
            return;
        }
        if self.is_selected(model, id) {
            self.selected.retain(|selected| *selected != id);
        } else {
            self.selected.push(id);
        }
    }

    pub fn all_selected<B: OsidbApi>(&self, model: &AffectsModel<B>) -> bool {
        model
            .affects()
            .iter()
            .all(|a| a.row_id().is_some_and(|id| self.is_selected(model, id)))
    }

    pub fn is_indeterminate<B: OsidbApi>(&self, model: &AffectsModel<B>) -> bool {
        !self.all_selected(model)
            && model
                .affects()
                .iter()
                .any(|a| a.row_id().is_some_and(|id| self.is_selected(model, id)))
    }

    pub fn all_selectable<B: OsidbApi>(&self, model: &AffectsModel<B>) -> bool {
        model
            .affects()
            .iter()
            .all(|a| a.row_id().is_some_and(|id| self.is_selectable(model, id)))
    }

    /// Three-way toggle: everything selected clears, nothing selected takes
    /// every selectable row, and a partial selection drops only the selected
    /// rows. Returns the state the header checkbox must show afterwards.
    pub fn toggle_all<B: OsidbApi>(&mut self, model: &AffectsModel<B>) -> HeaderCheckbox {
        if self.all_selected(model) {
            self.selected.clear();
            return HeaderCheckbox::Unchecked;
        }

        if self.selected.is_empty() {
            let ids: Vec<Uuid> = model
                .affects()
                .iter()
                .filter_map(Affect::row_id)
                .filter(|id| self.is_selectable(model, *id))
                .collect();
            self.selected = ids;
            if self.all_selected(model) {
                return HeaderCheckbox::Checked;
            }
            return HeaderCheckbox::Indeterminate;
        }

        self.selected.clear();
        HeaderCheckbox::Unchecked
    }

    pub fn reset_selections(&mut self) {
        self.selected.clear();
    }

    pub fn edit_selected<B: OsidbApi>(&mut self, model: &AffectsModel<B>) {
        let ids: Vec<Uuid> = self.selected.clone();
        for id in ids {
            self.edit_affect(model, id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::affects::columns::AffectField;
    use crate::models::affect::Affectedness;
    use crate::models::flaw::Flaw;
    use crate::osidb::testing::MockBackend;
    use crate::toast::ToastStore;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn persisted(component: &str) -> Affect {
        Affect {
            uuid: Some(Uuid::new_v4()),
            ps_module: "rhel-9".to_string(),
            ps_component: component.to_string(),
            affectedness: Affectedness::Affected,
            ..Default::default()
        }
    }

    fn model_with(affects: Vec<Affect>) -> AffectsModel<MockBackend> {
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
        let mut model = AffectsModel::new(backend, toasts);
        model.initialize(&flaw);
        model
    }

    #[test]
    fn editing_pairs_snapshot_with_row() {
        let affect = persisted("kernel");
        let id = affect.uuid.unwrap();
        let model = model_with(vec![affect.clone()]);
        let mut session = EditingSession::new();

        session.edit_affect(&model, id);
        assert!(session.is_being_edited(id));
        assert_eq!(session.prior_value(id), Some(&affect));

        // Re-entering an edit does not duplicate the pair.
        session.edit_affect(&model, id);
        assert_eq!(session.edited_ids().len(), 1);
    }

    #[test]
    fn commit_splices_edit_and_clears_both_entries() {
        let affect = persisted("kernel");
        let id = affect.uuid.unwrap();
        let mut model = model_with(vec![affect.clone()]);
        let mut session = EditingSession::new();

        session.edit_affect(&model, id);
        let mut edited = affect.clone();
        edited.ps_component = "kernel-rt".to_string();
        session.commit_changes(&mut model, edited);

        assert!(!session.is_being_edited(id));
        assert_eq!(session.prior_value(id), None);
        assert_eq!(model.affect(id).unwrap().ps_component, "kernel-rt");
        assert!(model.is_modified(id));
    }

    #[test]
    fn committing_an_unchanged_edit_does_not_mark_modified() {
        let affect = persisted("kernel");
        let id = affect.uuid.unwrap();
        let mut model = model_with(vec![affect.clone()]);
        let mut session = EditingSession::new();

        session.edit_affect(&model, id);
        session.commit_changes(&mut model, affect);
        assert!(!model.is_modified(id));
    }

    #[test]
    fn cancel_restores_the_pre_edit_snapshot() {
        let affect = persisted("kernel");
        let id = affect.uuid.unwrap();
        let mut model = model_with(vec![affect.clone()]);
        let mut session = EditingSession::new();

        session.edit_affect(&model, id);
        // Simulate a live mutation that the edit form wrote through.
        model.set_field(id, AffectField::PsComponent, "kernel-rt");
        session.cancel_changes(&mut model, id);

        assert!(!session.is_being_edited(id));
        assert_eq!(model.affect(id).unwrap().ps_component, "kernel");
        assert!(!model.is_modified(id));
    }

    #[test]
    fn revert_to_last_saved_is_not_cancel() {
        let affect = persisted("kernel");
        let id = affect.uuid.unwrap();
        let mut model = model_with(vec![affect]);
        let mut session = EditingSession::new();

        // A committed-but-unsaved modification, no edit in progress.
        model.set_field(id, AffectField::PsComponent, "kernel-rt");
        assert!(model.is_modified(id));

        session.revert_to_last_saved(&mut model, id);
        assert_eq!(model.affect(id).unwrap().ps_component, "kernel");
        assert!(!model.is_modified(id));
    }

    #[test]
    fn rows_being_edited_or_removed_are_not_selectable() {
        let a = persisted("kernel");
        let b = persisted("bash");
        let a_id = a.uuid.unwrap();
        let b_id = b.uuid.unwrap();
        let mut model = model_with(vec![a, b]);
        let mut session = EditingSession::new();

        session.edit_affect(&model, a_id);
        assert!(!session.is_selectable(&model, a_id));
        session.toggle_selection(&model, a_id);
        assert!(!session.is_selected(&model, a_id));

        model.remove_affect(b_id);
        assert!(!session.is_selectable(&model, b_id));
    }

    #[test]
    fn entering_edit_removes_the_row_from_selection() {
        let affect = persisted("kernel");
        let id = affect.uuid.unwrap();
        let model = model_with(vec![affect]);
        let mut session = EditingSession::new();

        session.toggle_selection(&model, id);
        assert!(session.is_selected(&model, id));
        session.edit_affect(&model, id);
        assert!(!session.selected_ids().contains(&id));
    }

    #[test]
    fn toggle_all_has_three_branches() {
        let a = persisted("kernel");
        let b = persisted("bash");
        let a_id = a.uuid.unwrap();
        let model = model_with(vec![a, b]);
        let mut session = EditingSession::new();

        // None selected: select every selectable row.
        assert_eq!(session.toggle_all(&model), HeaderCheckbox::Checked);
        assert!(session.all_selected(&model));

        // All selected: clear.
        assert_eq!(session.toggle_all(&model), HeaderCheckbox::Unchecked);
        assert!(session.selected_ids().is_empty());

        // Partial selection: deselect the selected rows and force the
        // checkbox unchecked.
        session.toggle_selection(&model, a_id);
        assert!(session.is_indeterminate(&model));
        assert_eq!(session.toggle_all(&model), HeaderCheckbox::Unchecked);
        assert!(session.selected_ids().is_empty());
    }

    #[test]
    fn commit_all_closes_every_open_edit() {
        let a = persisted("kernel");
        let b = persisted("bash");
        let a_id = a.uuid.unwrap();
        let b_id = b.uuid.unwrap();
        let mut model = model_with(vec![a, b]);
        let mut session = EditingSession::new();

        session.edit_affect(&model, a_id);
        session.edit_affect(&model, b_id);
        session.commit_all(&mut model);

        assert!(session.edited_ids().is_empty());
        assert_eq!(session.prior_value(a_id), None);
        assert_eq!(session.prior_value(b_id), None);
    }
}
