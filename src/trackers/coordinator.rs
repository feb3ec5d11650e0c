// src/trackers/coordinator.rs

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use log::{error, info};
use uuid::Uuid;

use crate::models::affect::{Affect, Resolution};
use crate::osidb::api::OsidbApi;
use crate::osidb::types::{ModuleComponent, TrackerPost, UpdateStream};

/// Identity of one candidate stream across loads.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StreamKey {
    pub ps_module: String,
    pub ps_component: String,
    pub ps_update_stream: String,
}

/// A stream that could still receive a tracker, flattened from the
/// module-component response with its affect back-reference.
#[derive(Debug, Clone, PartialEq)]
pub struct AvailableStream {
    pub key: StreamKey,
    pub acked: bool,
    pub eus: bool,
    pub aus: bool,
    pub preselected: bool,
    pub affect_uuid: Option<Uuid>,
}

/// Coordinates tracker suggestion and filing for one or more flaws' affects:
/// which streams already have trackers, which can be filed, and which
/// affects cannot be tracked at all.
pub struct TrackerCoordinator<B> {
    backend: Arc<B>,
    flaw_uuids: Vec<Uuid>,
    affects: Vec<Affect>,
    module_components: Vec<ModuleComponent>,
    selections: HashMap<StreamKey, bool>,
    filter: String,
    is_loading_trackers: bool,
    is_filing_trackers: bool,
}

/// Terminal resolutions never receive trackers; only delegated or
/// still-undecided affects are eligible.
fn is_resolution_trackable(affect: &Affect) -> bool {
    matches!(affect.resolution, Resolution::Delegated | Resolution::Empty)
}

impl<B: OsidbApi> TrackerCoordinator<B> {
    pub fn new(backend: Arc<B>, flaw_uuids: Vec<Uuid>, affects: Vec<Affect>) -> Self {
        Self {
            backend,
            flaw_uuids,
            affects,
            module_components: Vec::new(),
            selections: HashMap::new(),
            filter: String::new(),
            is_loading_trackers: false,
            is_filing_trackers: false,
        }
    }

    /// Swap in a fresh affect snapshot, e.g. after the flaw reloads.
    pub fn set_affects(&mut self, affects: Vec<Affect>) {
        self.affects = affects;
    }

    pub fn is_loading_trackers(&self) -> bool {
        self.is_loading_trackers
    }

    pub fn is_filing_trackers(&self) -> bool {
        self.is_filing_trackers
    }

    pub fn set_filter(&mut self, filter: impl Into<String>) {
        self.filter = filter.into();
    }

    /// Fetch the module-component listing and re-seed stream selections
    /// from the server's flags.
    pub async fn load(&mut self) {
        self.is_loading_trackers = true;
        match self.backend.module_components(&self.flaw_uuids).await {
            Ok(response) => {
                self.module_components = response.modules_components;
                self.seed_selections();
            }
            Err(err) => {
                error!("Failed to load trackers: {err}");
            }
        }
        self.is_loading_trackers = false;
    }

    /// Tracker-affect uuid links across every affect in scope.
    fn tracked_affect_uuids(&self) -> HashSet<Uuid> {
        self.affects
            .iter()
            .flat_map(|a| a.trackers.iter().flat_map(|t| t.affects.iter().copied()))
            .collect()
    }

    /// (stream, component) pairs that already carry a filed tracker.
    pub fn already_filed(&self) -> HashSet<(String, String)> {
        let tracked = self.tracked_affect_uuids();
        self.affects
            .iter()
            .flat_map(|affect| {
                affect
                    .trackers
                    .iter()
                    .filter(|t| t.affects.iter().any(|uuid| tracked.contains(uuid)))
                    .filter_map(|t| {
                        t.ps_update_stream
                            .clone()
                            .map(|stream| (stream, affect.ps_component.clone()))
                    })
            })
            .collect()
    }

    /// Streams of resolution-trackable module-components, minus the ones
    /// already filed.
    pub fn available_streams(&self) -> Vec<AvailableStream> {
        let filed = self.already_filed();
        self.module_components
            .iter()
            .filter(|mc| is_resolution_trackable(&mc.affect))
            .flat_map(|mc| {
                mc.streams.iter().map(|stream: &UpdateStream| AvailableStream {
                    key: StreamKey {
                        ps_module: mc.ps_module.clone(),
                        ps_component: mc.ps_component.clone(),
                        ps_update_stream: stream.ps_update_stream.clone(),
                    },
                    acked: stream.acked,
                    eus: stream.eus,
                    aus: stream.aus,
                    preselected: stream.selected,
                    affect_uuid: mc.affect.uuid,
                })
            })
            .filter(|stream| {
                !filed.contains(&(
                    stream.key.ps_update_stream.clone(),
                    stream.key.ps_component.clone(),
                ))
            })
            .collect()
    }

    pub fn untracked_affects(&self) -> Vec<&Affect> {
        self.affects.iter().filter(|a| a.trackers.is_empty()).collect()
    }

    /// Untracked affects that are eligible by resolution but have no stream
    /// available at all: a backend data gap surfaced as a hard warning.
    pub fn untrackable_affects(&self) -> Vec<&Affect> {
        let streams = self.available_streams();
        self.untracked_affects()
            .into_iter()
            .filter(|affect| {
                is_resolution_trackable(affect)
                    && !streams.iter().any(|stream| {
                        stream.key.ps_module == affect.ps_module
                            && stream.key.ps_component == affect.ps_component
                    })
            })
            .collect()
    }

    /// Re-seed from the server's selected flags. Filed streams are never in
    /// the available list, so their state is never overwritten here.
    fn seed_selections(&mut self) {
        self.selections = self
            .available_streams()
            .into_iter()
            .map(|stream| (stream.key, stream.preselected))
            .collect();
    }

    pub fn is_selected(&self, key: &StreamKey) -> bool {
        self.selections.get(key).copied().unwrap_or(false)
    }

    pub fn set_selected(&mut self, key: &StreamKey, selected: bool) {
        if self.selections.contains_key(key) {
            self.selections.insert(key.clone(), selected);
        }
    }

    /// Select or clear every stream in the current filtered view.
    pub fn set_all_selections(&mut self, selected: bool) {
        let keys: Vec<StreamKey> = self
            .filtered_streams()
            .into_iter()
            .map(|stream| stream.key)
            .collect();
        for key in keys {
            self.selections.insert(key, selected);
        }
    }

    /// Available streams ordered by stream name and narrowed by the
    /// free-text filter (stream or component, case-insensitive).
    pub fn filtered_streams(&self) -> Vec<AvailableStream> {
        let needle = self.filter.to_lowercase();
        let mut streams = self.available_streams();
        streams.sort_by(|a, b| a.key.ps_update_stream.cmp(&b.key.ps_update_stream));
        if needle.is_empty() {
            return streams;
        }
        streams
            .into_iter()
            .filter(|stream| {
                stream.key.ps_update_stream.to_lowercase().contains(&needle)
                    || stream.key.ps_component.to_lowercase().contains(&needle)
            })
            .collect()
    }

    pub fn selected_streams(&self) -> Vec<AvailableStream> {
        self.filtered_streams()
            .into_iter()
            .filter(|stream| self.is_selected(&stream.key))
            .collect()
    }

    pub fn unselected_streams(&self) -> Vec<AvailableStream> {
        self.filtered_streams()
            .into_iter()
            .filter(|stream| !self.is_selected(&stream.key))
            .collect()
    }

    /// Streams of one module/component, for per-affect pickers.
    pub fn update_streams_for(&self, module: &str, component: &str) -> &[UpdateStream] {
        self.module_components
            .iter()
            .find(|mc| mc.ps_module == module && mc.ps_component == component)
            .map(|mc| mc.streams.as_slice())
            .unwrap_or(&[])
    }

    /// Every selected, not-yet-filed stream as one filing payload entry,
    /// carrying the owning affect's resolution, embargo and write guard.
    pub fn trackers_to_file(&self) -> Vec<TrackerPost> {
        self.available_streams()
            .into_iter()
            .filter(|stream| self.is_selected(&stream.key))
            .filter_map(|stream| {
                let affect = self.affects.iter().find(|a| {
                    a.ps_module == stream.key.ps_module
                        && a.ps_component == stream.key.ps_component
                })?;
                let uuid = stream.affect_uuid.or(affect.uuid)?;
                Some(TrackerPost {
                    affects: vec![uuid],
                    ps_update_stream: stream.key.ps_update_stream.clone(),
                    resolution: Some(affect.resolution),
                    embargoed: Some(affect.embargoed),
                    updated_dt: affect.updated_dt,
                })
            })
            .collect()
    }

    /// One batch write for everything selected, then a full reload so
    /// filed/unfiled state is server-confirmed rather than guessed.
    pub async fn file_trackers(&mut self) -> bool {
        self.is_filing_trackers = true;

        let posts = self.trackers_to_file();
        let filed = if posts.is_empty() {
            true
        } else {
            match self.backend.file_trackers(&posts).await {
                Ok(response) => {
                    info!("Filed {} tracker(s)", response.successes.len());
                    true
                }
                Err(err) => {
                    error!("Failed to file trackers: {err}");
                    false
                }
            }
        };

        if filed {
            self.load().await;
        }
        self.is_filing_trackers = false;
        filed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::affect::{Affectedness, Tracker};
    use crate::osidb::testing::MockBackend;
    use crate::osidb::types::ModuleComponentsResponse;
    use pretty_assertions::assert_eq;

    fn affect(module: &str, component: &str, resolution: Resolution) -> Affect {
        Affect {
            uuid: Some(Uuid::new_v4()),
            ps_module: module.to_string(),
            ps_component: component.to_string(),
            affectedness: Affectedness::Affected,
            resolution,
            ..Default::default()
        }
    }

    fn stream(name: &str, selected: bool) -> UpdateStream {
        UpdateStream {
            ps_update_stream: name.to_string(),
            selected,
            acked: true,
            eus: false,
            aus: false,
        }
    }

    fn module_component(affect: &Affect, streams: Vec<UpdateStream>) -> ModuleComponent {
        ModuleComponent {
            ps_module: affect.ps_module.clone(),
            ps_component: affect.ps_component.clone(),
            selected: false,
            affect: affect.clone(),
            streams,
        }
    }

    fn key(module: &str, component: &str, stream: &str) -> StreamKey {
        StreamKey {
            ps_module: module.to_string(),
            ps_component: component.to_string(),
            ps_update_stream: stream.to_string(),
        }
    }

    fn coordinator_with(
        affects: Vec<Affect>,
        modules_components: Vec<ModuleComponent>,
    ) -> (TrackerCoordinator<MockBackend>, Arc<MockBackend>) {
        let backend = Arc::new(MockBackend::new());
        *backend.module_components.lock().unwrap() = ModuleComponentsResponse {
            modules_components,
        };
        let coordinator =
            TrackerCoordinator::new(backend.clone(), vec![Uuid::new_v4()], affects);
        (coordinator, backend)
    }

    #[tokio::test]
    async fn terminal_resolutions_are_never_trackable() {
        let eligible = affect("rhel-9", "kernel", Resolution::Delegated);
        let wontfix = affect("rhel-9", "bash", Resolution::Wontfix);
        let mcs = vec![
            module_component(&eligible, vec![stream("rhel-9.z", true)]),
            module_component(&wontfix, vec![stream("rhel-9.z", true)]),
        ];
        let (mut coordinator, _) = coordinator_with(vec![eligible, wontfix], mcs);
        coordinator.load().await;

        let streams = coordinator.available_streams();
        assert_eq!(streams.len(), 1);
        assert_eq!(streams[0].key.ps_component, "kernel");
        assert!(!coordinator.is_loading_trackers());
    }

    #[tokio::test]
    async fn already_filed_streams_are_excluded() {
        let mut tracked = affect("rhel-9", "kernel", Resolution::Delegated);
        let tracked_uuid = tracked.uuid.unwrap();
        tracked.trackers.push(Tracker {
            uuid: Some(Uuid::new_v4()),
            affects: vec![tracked_uuid],
            ps_update_stream: Some("rhel-9.z".to_string()),
            ..Default::default()
        });
        let mcs = vec![module_component(
            &tracked,
            vec![stream("rhel-9.z", false), stream("rhel-9.y", false)],
        )];
        let (mut coordinator, _) = coordinator_with(vec![tracked], mcs);
        coordinator.load().await;

        assert!(coordinator
            .already_filed()
            .contains(&("rhel-9.z".to_string(), "kernel".to_string())));
        let streams = coordinator.available_streams();
        assert_eq!(streams.len(), 1);
        assert_eq!(streams[0].key.ps_update_stream, "rhel-9.y");
    }

    #[tokio::test]
    async fn untrackable_affects_have_no_candidate_stream() {
        let orphan = affect("rhel-9", "glibc", Resolution::Empty);
        let covered = affect("rhel-9", "kernel", Resolution::Delegated);
        let terminal = affect("rhel-9", "bash", Resolution::Wontfix);
        let mcs = vec![module_component(&covered, vec![stream("rhel-9.z", true)])];
        let (mut coordinator, _) =
            coordinator_with(vec![orphan.clone(), covered, terminal], mcs);
        coordinator.load().await;

        let untrackable = coordinator.untrackable_affects();
        assert_eq!(untrackable.len(), 1);
        assert_eq!(untrackable[0].ps_component, "glibc");
    }

    #[tokio::test]
    async fn selections_seed_from_server_flags() {
        let a = affect("rhel-9", "kernel", Resolution::Delegated);
        let mcs = vec![module_component(
            &a,
            vec![stream("rhel-9.z", true), stream("rhel-9.y", false)],
        )];
        let (mut coordinator, _) = coordinator_with(vec![a], mcs);
        coordinator.load().await;

        assert!(coordinator.is_selected(&key("rhel-9", "kernel", "rhel-9.z")));
        assert!(!coordinator.is_selected(&key("rhel-9", "kernel", "rhel-9.y")));

        let selected = coordinator.selected_streams();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].key.ps_update_stream, "rhel-9.z");
        assert_eq!(coordinator.unselected_streams().len(), 1);
    }

    #[tokio::test]
    async fn filter_narrows_by_stream_or_component() {
        let a = affect("rhel-9", "kernel", Resolution::Delegated);
        let b = affect("rhel-8", "glibc", Resolution::Delegated);
        let mcs = vec![
            module_component(&a, vec![stream("rhel-9.0.z", false)]),
            module_component(&b, vec![stream("rhel-8.6.0.z", false)]),
        ];
        let (mut coordinator, _) = coordinator_with(vec![a, b], mcs);
        coordinator.load().await;

        assert_eq!(coordinator.filtered_streams().len(), 2);
        // Sorted by stream name.
        assert_eq!(
            coordinator.filtered_streams()[0].key.ps_update_stream,
            "rhel-8.6.0.z"
        );

        coordinator.set_filter("GLIBC");
        let filtered = coordinator.filtered_streams();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].key.ps_component, "glibc");

        coordinator.set_filter("9.0");
        let filtered = coordinator.filtered_streams();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].key.ps_component, "kernel");
    }

    #[tokio::test]
    async fn filing_payload_carries_owning_affect_fields() {
        let mut a = affect("rhel-9", "kernel", Resolution::Delegated);
        a.embargoed = true;
        a.updated_dt = Some(chrono::Utc::now());
        let a_uuid = a.uuid.unwrap();
        let mcs = vec![module_component(&a, vec![stream("rhel-9.z", true)])];
        let (mut coordinator, _) = coordinator_with(vec![a.clone()], mcs);
        coordinator.load().await;

        let posts = coordinator.trackers_to_file();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].affects, vec![a_uuid]);
        assert_eq!(posts[0].ps_update_stream, "rhel-9.z");
        assert_eq!(posts[0].resolution, Some(Resolution::Delegated));
        assert_eq!(posts[0].embargoed, Some(true));
        assert_eq!(posts[0].updated_dt, a.updated_dt);
    }

    #[tokio::test]
    async fn filing_issues_one_batch_and_reloads() {
        let a = affect("rhel-9", "kernel", Resolution::Delegated);
        let mcs = vec![module_component(&a, vec![stream("rhel-9.z", true)])];
        let (mut coordinator, backend) = coordinator_with(vec![a], mcs);
        coordinator.load().await;

        let filed = coordinator.file_trackers().await;
        assert!(filed);
        assert_eq!(backend.call_count("file_trackers"), 1);
        // Reload for server-confirmed state rather than optimistic update.
        assert_eq!(backend.call_count("module_components"), 2);
        assert!(!coordinator.is_filing_trackers());
    }

    #[tokio::test]
    async fn failed_filing_resets_the_flag_and_skips_reload() {
        let a = affect("rhel-9", "kernel", Resolution::Delegated);
        let mcs = vec![module_component(&a, vec![stream("rhel-9.z", true)])];
        let (mut coordinator, backend) = coordinator_with(vec![a], mcs);
        coordinator.load().await;

        backend.fail_next(true);
        let filed = coordinator.file_trackers().await;
        assert!(!filed);
        assert!(!coordinator.is_filing_trackers());
        assert_eq!(backend.call_count("module_components"), 1);
    }

    #[tokio::test]
    async fn set_all_selections_covers_the_filtered_view_only() {
        let a = affect("rhel-9", "kernel", Resolution::Delegated);
        let b = affect("rhel-8", "glibc", Resolution::Delegated);
        let mcs = vec![
            module_component(&a, vec![stream("rhel-9.0.z", false)]),
            module_component(&b, vec![stream("rhel-8.6.0.z", false)]),
        ];
        let (mut coordinator, _) = coordinator_with(vec![a, b], mcs);
        coordinator.load().await;

        coordinator.set_filter("kernel");
        coordinator.set_all_selections(true);

        assert!(coordinator.is_selected(&key("rhel-9", "kernel", "rhel-9.0.z")));
        assert!(!coordinator.is_selected(&key("rhel-8", "glibc", "rhel-8.6.0.z")));
    }
}
