// src/affects/model.rs

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use log::{error, warn};
use uuid::Uuid;

use crate::models::affect::{
    self, is_valid_cvss3_vector, Affect, AffectCvss, Affectedness, Impact, Issuer, Justification,
    Resolution, Tracker, CVSS_V3,
};
use crate::models::flaw::Flaw;
use crate::osidb::api::OsidbApi;
use crate::osidb::types::AffectRequest;
use crate::toast::ToastStore;

use super::columns::AffectField;

#[derive(Debug, Default)]
pub struct SaveOutcome {
    pub saved: Vec<Affect>,
    pub has_errors: bool,
}

#[derive(Debug, Default)]
pub struct RemovalOutcome {
    pub deleted: Vec<Uuid>,
    pub has_errors: bool,
}

enum CvssOp {
    Create { affect: Uuid, cvss: AffectCvss },
    Update { affect: Uuid, cvss_uuid: Uuid, cvss: AffectCvss },
    Delete { affect: Uuid, cvss_uuid: Uuid },
}

/// Single source of truth for the affects of one flaw: the live list, the
/// last-saved baseline, and the new/modified/removed classification that
/// drives row styling and the save/delete payloads.
pub struct AffectsModel<B> {
    backend: Arc<B>,
    toasts: Arc<ToastStore>,
    flaw_uuid: Uuid,
    flaw_embargoed: bool,
    initial: Vec<Affect>,
    affects: Vec<Affect>,
    new_affects: HashSet<Uuid>,
    modified_affects: HashSet<Uuid>,
    removed_affects: HashSet<Uuid>,
    cvss_to_delete: HashMap<Uuid, Uuid>,
}

impl<B: OsidbApi> AffectsModel<B> {
    pub fn new(backend: Arc<B>, toasts: Arc<ToastStore>) -> Self {
        Self {
            backend,
            toasts,
            flaw_uuid: Uuid::nil(),
            flaw_embargoed: false,
            initial: Vec::new(),
            affects: Vec::new(),
            new_affects: HashSet::new(),
            modified_affects: HashSet::new(),
            removed_affects: HashSet::new(),
            cvss_to_delete: HashMap::new(),
        }
    }

    pub fn initialize(&mut self, flaw: &Flaw) {
        self.flaw_uuid = flaw.uuid;
        self.flaw_embargoed = flaw.embargoed;
        self.initial = flaw.affects.clone();
        self.affects = flaw.affects.clone();
        self.new_affects.clear();
        self.modified_affects.clear();
        self.removed_affects.clear();
        self.cvss_to_delete.clear();
    }

    pub fn flaw_uuid(&self) -> Uuid {
        self.flaw_uuid
    }

    pub fn flaw_embargoed(&self) -> bool {
        self.flaw_embargoed
    }

    pub fn affects(&self) -> &[Affect] {
        &self.affects
    }

    pub fn affect(&self, id: Uuid) -> Option<&Affect> {
        self.affects.iter().find(|a| a.row_id() == Some(id))
    }

    fn index_of(&self, id: Uuid) -> Option<usize> {
        self.affects.iter().position(|a| a.row_id() == Some(id))
    }

    pub fn is_new(&self, id: Uuid) -> bool {
        self.new_affects.contains(&id)
    }

    pub fn is_modified(&self, id: Uuid) -> bool {
        self.modified_affects.contains(&id)
    }

    pub fn is_being_removed(&self, id: Uuid) -> bool {
        self.removed_affects.contains(&id)
    }

    /// True while anything would be written by a save or pending delete.
    pub fn has_unsaved_changes(&self) -> bool {
        !self.new_affects.is_empty()
            || !self.modified_affects.is_empty()
            || !self.removed_affects.is_empty()
            || !self.cvss_to_delete.is_empty()
    }

    /// Prepend a draft row. It carries a client id only until the first
    /// save, and inherits the flaw's embargo state.
    pub fn add_affect(&mut self, mut draft: Affect) -> Uuid {
        let id = Uuid::new_v4();
        draft.uuid = None;
        draft.local_id = Some(id);
        draft.flaw = Some(self.flaw_uuid);
        draft.embargoed = self.flaw_embargoed;
        self.affects.insert(0, draft);
        self.new_affects.insert(id);
        id
    }

    /// Soft delete. Unsaved rows vanish outright; persisted rows stay in the
    /// list flagged for removal until the next bulk delete commit.
    pub fn remove_affect(&mut self, id: Uuid) {
        if self.new_affects.remove(&id) {
            self.affects.retain(|a| a.row_id() != Some(id));
            return;
        }
        self.modified_affects.remove(&id);
        self.removed_affects.insert(id);
    }

    pub fn recover_affect(&mut self, id: Uuid) {
        self.removed_affects.remove(&id);
    }

    fn mark_modified(&mut self, id: Uuid) {
        // New rows are re-sent whole on save, never also "modified".
        if !self.new_affects.contains(&id) {
            self.modified_affects.insert(id);
        }
    }

    /// Typed field write. Unknown enum values are ignored; the column
    /// options prevent them upstream. Affectedness writes cascade into
    /// resolution, justification and impact.
    pub fn set_field(&mut self, id: Uuid, field: AffectField, value: &str) {
        let Some(index) = self.index_of(id) else {
            warn!("set_field: no affect with id {id}");
            return;
        };

        {
            let affect = &mut self.affects[index];
            match field {
                AffectField::PsModule => affect.ps_module = value.to_string(),
                AffectField::PsComponent => affect.ps_component = value.to_string(),
                AffectField::PsUpdateStream => affect.ps_update_stream = value.to_string(),
                AffectField::Affectedness => match Affectedness::from_wire(value) {
                    Some(parsed) => affect.set_affectedness(parsed),
                    None => {
                        warn!("Ignoring unknown affectedness value {value:?}");
                        return;
                    }
                },
                AffectField::Resolution => match Resolution::from_wire(value) {
                    Some(parsed) => affect.resolution = parsed,
                    None => {
                        warn!("Ignoring unknown resolution value {value:?}");
                        return;
                    }
                },
                AffectField::Justification => match Justification::from_wire(value) {
                    Some(parsed) => affect.not_affected_justification = parsed,
                    None => {
                        warn!("Ignoring unknown justification value {value:?}");
                        return;
                    }
                },
                AffectField::Impact => match Impact::from_wire(value) {
                    Some(parsed) => affect.impact = parsed,
                    None => {
                        warn!("Ignoring unknown impact value {value:?}");
                        return;
                    }
                },
            }
        }
        self.mark_modified(id);
    }

    /// Upsert the row's RH CVSS v3 entry. Clearing a server-persisted entry
    /// queues an explicit delete for the save step instead of relying on the
    /// affect overwrite; malformed vectors leave the model untouched.
    pub fn update_affect_cvss(&mut self, id: Uuid, vector: &str, score: Option<f64>) {
        let Some(index) = self.index_of(id) else {
            warn!("update_affect_cvss: no affect with id {id}");
            return;
        };
        if !vector.is_empty() && !is_valid_cvss3_vector(vector) {
            warn!("Ignoring malformed CVSS vector {vector:?}");
            return;
        }

        let affect_uuid = self.affects[index].uuid;
        let embargoed = self.affects[index].embargoed;
        let existing = self.affects[index].rh_cvss3().cloned();

        match existing {
            Some(current) if vector.is_empty() => {
                if let Some(entry) = self.affects[index].rh_cvss3_mut() {
                    entry.vector.clear();
                    entry.score = None;
                }
                if let (Some(affect_uuid), Some(cvss_uuid)) = (affect_uuid, current.uuid) {
                    self.cvss_to_delete.insert(affect_uuid, cvss_uuid);
                }
            }
            Some(_) => {
                if let Some(entry) = self.affects[index].rh_cvss3_mut() {
                    entry.vector = vector.to_string();
                    entry.score = score;
                }
                if let Some(affect_uuid) = affect_uuid {
                    self.cvss_to_delete.remove(&affect_uuid);
                }
            }
            None if !vector.is_empty() => {
                self.affects[index].cvss_scores.push(AffectCvss {
                    issuer: Issuer::Rh,
                    cvss_version: CVSS_V3.to_string(),
                    vector: vector.to_string(),
                    score,
                    embargoed,
                    ..Default::default()
                });
                if let Some(affect_uuid) = affect_uuid {
                    self.cvss_to_delete.remove(&affect_uuid);
                }
            }
            None => return,
        }
        self.mark_modified(id);
    }

    /// Restore a row to its last-saved state, regardless of how it was
    /// changed since.
    pub(crate) fn restore_from_initial(&mut self, id: Uuid) {
        if let Some(original) = self.initial.iter().find(|a| a.uuid == Some(id)).cloned() {
            if let Some(index) = self.index_of(id) {
                self.affects[index] = original;
            }
        }
        self.modified_affects.remove(&id);
        self.cvss_to_delete.remove(&id);
    }

    /// Undo whatever classification the row currently has: new rows vanish,
    /// removed rows are recovered, modified rows return to the baseline.
    pub fn revert_affect(&mut self, id: Uuid) {
        if self.new_affects.remove(&id) {
            self.affects.retain(|a| a.row_id() != Some(id));
        } else if self.removed_affects.contains(&id) {
            self.removed_affects.remove(&id);
        } else if self.modified_affects.contains(&id) {
            self.restore_from_initial(id);
        }
    }

    pub fn revert_all(&mut self) {
        let ids: Vec<Uuid> = self.affects.iter().filter_map(Affect::row_id).collect();
        for id in ids {
            self.revert_affect(id);
        }
    }

    /// Replace a row wholesale (inline-edit commit path). Marks the row
    /// modified only when the new value actually differs.
    pub(crate) fn replace_affect(&mut self, id: Uuid, value: Affect, changed: bool) {
        if let Some(index) = self.index_of(id) {
            self.affects[index] = value;
            if changed {
                self.mark_modified(id);
            }
        }
    }

    /// Drop a stale modified mark once the row is back to its baseline
    /// value (e.g. after an edit was cancelled).
    pub(crate) fn unmark_if_pristine(&mut self, id: Uuid) {
        let pristine = match (
            self.affects.iter().find(|a| a.row_id() == Some(id)),
            self.initial.iter().find(|a| a.uuid == Some(id)),
        ) {
            (Some(current), Some(baseline)) => current == baseline,
            _ => false,
        };
        if pristine {
            self.modified_affects.remove(&id);
        }
    }

    pub(crate) fn set_tracker(&mut self, uuid: Uuid, tracker: Tracker) {
        if let Some(affect) = self.affects.iter_mut().find(|a| a.uuid == Some(uuid)) {
            affect.tracker = Some(tracker);
        }
    }

    pub fn initial_affects(&self) -> &[Affect] {
        &self.initial
    }

    /// Commit pending removals. Rows that never reached the server are
    /// spliced out locally and excluded from the delete payload; the delete
    /// call itself is all-or-nothing.
    pub async fn remove_affects(&mut self) -> RemovalOutcome {
        let unsaved: Vec<Uuid> = self
            .removed_affects
            .iter()
            .copied()
            .filter(|id| !self.affects.iter().any(|a| a.uuid == Some(*id)))
            .collect();
        for id in unsaved {
            self.affects.retain(|a| a.row_id() != Some(id));
            self.removed_affects.remove(&id);
        }

        let uuids: Vec<Uuid> = self.removed_affects.iter().copied().collect();
        if uuids.is_empty() {
            return RemovalOutcome::default();
        }

        match self.backend.delete_affects(&uuids).await {
            Ok(()) => {
                let removed = self.removed_affects.clone();
                self.affects.retain(|a| match a.uuid {
                    Some(uuid) => !removed.contains(&uuid),
                    None => true,
                });
                self.initial.retain(|a| match a.uuid {
                    Some(uuid) => !removed.contains(&uuid),
                    None => true,
                });
                self.removed_affects.clear();
                RemovalOutcome {
                    deleted: uuids,
                    has_errors: false,
                }
            }
            Err(err) => {
                // Rows stay flagged so the user can retry.
                error!("Failed to delete affects: {err}");
                self.toasts
                    .warning("Error removing affects", err.summary());
                RemovalOutcome {
                    deleted: Vec::new(),
                    has_errors: true,
                }
            }
        }
    }

    /// Persist all pending creates and updates, merge the authoritative
    /// response back row by row, then run the CVSS sub-operations. Rows the
    /// server did not confirm keep their tracking state for retry.
    pub async fn save_affects(&mut self) -> SaveOutcome {
        let mut has_errors = false;
        let mut saved: Vec<Affect> = Vec::new();

        let to_create: Vec<AffectRequest> = self
            .affects
            .iter()
            .filter(|a| a.local_id.map_or(false, |id| self.new_affects.contains(&id)))
            .map(|a| AffectRequest::from_affect(a, self.flaw_uuid))
            .collect();
        let to_update: Vec<AffectRequest> = self
            .affects
            .iter()
            .filter(|a| a.uuid.map_or(false, |id| self.modified_affects.contains(&id)))
            .map(|a| AffectRequest::from_affect(a, self.flaw_uuid))
            .collect();

        if !to_create.is_empty() {
            match self.backend.post_affects(&to_create).await {
                Ok(response) => saved.extend(response.results),
                Err(err) => {
                    has_errors = true;
                    error!("Failed to create affects: {err}");
                    self.toasts.warning("Error creating affects", err.summary());
                }
            }
        }

        if !to_update.is_empty() {
            match self.backend.put_affects(&to_update).await {
                Ok(response) => saved.extend(response.results),
                Err(err) => {
                    has_errors = true;
                    error!("Failed to update affects: {err}");
                    self.toasts.warning("Error updating affects", err.summary());
                }
            }
        }

        // Plan CVSS writes before the merge clears row tracking.
        let cvss_ops = self.plan_cvss_operations(&saved);
        self.merge_saved_affects(&saved);
        has_errors |= self.run_cvss_operations(cvss_ops).await;

        if !has_errors {
            self.refresh_from_server().await;
        }

        SaveOutcome { saved, has_errors }
    }

    fn plan_cvss_operations(&self, saved: &[Affect]) -> Vec<CvssOp> {
        let mut ops = Vec::new();

        for affect in &self.affects {
            let Some(id) = affect.row_id() else { continue };
            let Some(cvss) = affect.rh_cvss3() else { continue };
            if cvss.vector.is_empty() || cvss.score.is_none() {
                continue;
            }

            if self.modified_affects.contains(&id) {
                let Some(affect_uuid) = affect.uuid else { continue };
                match cvss.uuid {
                    None => ops.push(CvssOp::Create {
                        affect: affect_uuid,
                        cvss: cvss.clone(),
                    }),
                    Some(cvss_uuid) => {
                        let initial_cvss = self
                            .initial
                            .iter()
                            .find(|i| i.uuid == affect.uuid)
                            .and_then(Affect::rh_cvss3);
                        if initial_cvss != Some(cvss) {
                            ops.push(CvssOp::Update {
                                affect: affect_uuid,
                                cvss_uuid,
                                cvss: cvss.clone(),
                            });
                        }
                    }
                }
            } else if self.new_affects.contains(&id) {
                // The score belongs to the uuid the server just assigned.
                if let Some(server_uuid) = saved
                    .iter()
                    .find(|s| affect::matches(s, affect))
                    .and_then(|s| s.uuid)
                {
                    ops.push(CvssOp::Create {
                        affect: server_uuid,
                        cvss: cvss.clone(),
                    });
                }
            }
        }

        for (affect_uuid, cvss_uuid) in &self.cvss_to_delete {
            ops.push(CvssOp::Delete {
                affect: *affect_uuid,
                cvss_uuid: *cvss_uuid,
            });
        }

        ops
    }

    fn merge_saved_affects(&mut self, saved: &[Affect]) {
        for server in saved {
            let Some(index) = self.affects.iter().position(|a| affect::matches(a, server))
            else {
                continue;
            };
            let old_id = self.affects[index].row_id();

            let mut merged = server.clone();
            if merged.cvss_scores.is_empty() {
                // CVSS entries are saved separately below; keep the local
                // ones until those writes confirm.
                merged.cvss_scores = self.affects[index].cvss_scores.clone();
            }
            self.affects[index] = merged;

            if let Some(id) = old_id {
                self.new_affects.remove(&id);
                self.modified_affects.remove(&id);
            }

            match self.initial.iter().position(|a| affect::matches(a, server)) {
                Some(i) => self.initial[i] = server.clone(),
                None => self.initial.push(server.clone()),
            }
        }
    }

    async fn run_cvss_operations(&mut self, ops: Vec<CvssOp>) -> bool {
        if ops.is_empty() {
            return false;
        }

        let backend = self.backend.clone();
        let results = futures::future::join_all(ops.iter().map(|op| {
            let backend = backend.clone();
            async move {
                match op {
                    CvssOp::Create { affect, cvss } => {
                        backend.post_affect_cvss(*affect, cvss).await.map(Some)
                    }
                    CvssOp::Update { affect, cvss_uuid, cvss } => backend
                        .put_affect_cvss(*affect, *cvss_uuid, cvss)
                        .await
                        .map(Some),
                    CvssOp::Delete { affect, cvss_uuid } => backend
                        .delete_affect_cvss(*affect, *cvss_uuid)
                        .await
                        .map(|_| None),
                }
            }
        }))
        .await;

        let mut has_errors = false;
        let mut saved_count = 0usize;
        let mut removed_affects: HashSet<Uuid> = HashSet::new();

        for (op, result) in ops.iter().zip(results) {
            match result {
                Ok(Some(saved_cvss)) => {
                    saved_count += 1;
                    if let Some(affect_uuid) = saved_cvss.affect {
                        if let Some(affect) =
                            self.affects.iter_mut().find(|a| a.uuid == Some(affect_uuid))
                        {
                            if let Some(entry) = affect.rh_cvss3_mut() {
                                *entry = saved_cvss;
                            }
                        }
                    }
                }
                Ok(None) => {
                    if let CvssOp::Delete { affect, cvss_uuid } = op {
                        removed_affects.insert(*affect);
                        self.cvss_to_delete.remove(affect);
                        if let Some(row) =
                            self.affects.iter_mut().find(|a| a.uuid == Some(*affect))
                        {
                            row.cvss_scores.retain(|c| c.uuid != Some(*cvss_uuid));
                        }
                    }
                }
                Err(err) => {
                    has_errors = true;
                    error!("CVSS score operation failed: {err}");
                    self.toasts
                        .warning("Error saving CVSS score", err.summary());
                }
            }
        }

        if saved_count > 0 {
            self.toasts.success(
                "Success!",
                format!("{saved_count} CVSS score(s) saved on {saved_count} affect(s)."),
            );
        }
        if !removed_affects.is_empty() {
            let removed_count: usize = removed_affects.len();
            self.toasts.success(
                "Success!",
                format!("{removed_count} CVSS score(s) removed on {removed_count} affect(s)."),
            );
        }

        has_errors
    }

    /// Pull canonical state after a clean save. Rows still carrying local
    /// edits win over the fetched copy; everything else follows the server.
    async fn refresh_from_server(&mut self) {
        let flaw_id = self.flaw_uuid.to_string();
        match self.backend.get_flaw(&flaw_id).await {
            Ok(flaw) => {
                self.flaw_embargoed = flaw.embargoed;
                for server in flaw.affects {
                    match self.affects.iter().position(|a| affect::matches(a, &server)) {
                        Some(index) => {
                            let keep_local = self.affects[index].row_id().is_some_and(|id| {
                                self.modified_affects.contains(&id)
                                    || self.new_affects.contains(&id)
                            });
                            if !keep_local {
                                self.affects[index] = server.clone();
                            }
                        }
                        None => self.affects.push(server.clone()),
                    }
                    match self.initial.iter().position(|a| affect::matches(a, &server)) {
                        Some(i) => self.initial[i] = server,
                        None => self.initial.push(server),
                    }
                }
            }
            Err(err) => warn!("Post-save refresh failed: {err}"),
        }
    }
}
