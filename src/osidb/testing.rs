// src/osidb/testing.rs
//
// In-memory OsidbApi double shared by the model, table and coordinator tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use uuid::Uuid;

use crate::models::affect::{Affect, AffectCvss};
use crate::models::flaw::Flaw;

use super::api::{OsidbApi, ServiceError};
use super::types::{
    AffectRequest, AffectsResponse, FileTrackersResponse, ModuleComponentsResponse, TrackerPost,
    TrackerSuggestions,
};

#[derive(Default)]
pub struct MockBackend {
    pub calls: Mutex<Vec<String>>,
    pub flaw: Mutex<Option<Flaw>>,
    pub post_results: Mutex<Vec<Affect>>,
    pub put_results: Mutex<Vec<Affect>>,
    pub module_components: Mutex<ModuleComponentsResponse>,
    pub suggestions: Mutex<TrackerSuggestions>,
    pub filed: Mutex<FileTrackersResponse>,
    pub deleted_uuids: Mutex<Vec<Vec<Uuid>>>,
    pub filed_posts: Mutex<Vec<Vec<TrackerPost>>>,
    pub fail_requests: AtomicBool,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    pub fn call_count(&self, name: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with(name))
            .count()
    }

    pub fn fail_next(&self, fail: bool) {
        self.fail_requests.store(fail, Ordering::SeqCst);
    }

    fn check_failure(&self) -> Result<(), ServiceError> {
        if self.fail_requests.load(Ordering::SeqCst) {
            return Err(ServiceError::Status {
                status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
                body: "mock failure".to_string(),
            });
        }
        Ok(())
    }
}

impl OsidbApi for MockBackend {
    async fn get_flaw(&self, id: &str) -> Result<Flaw, ServiceError> {
        self.record(format!("get_flaw:{id}"));
        self.check_failure()?;
        Ok(self
            .flaw
            .lock()
            .unwrap()
            .clone()
            .expect("MockBackend::flaw not seeded"))
    }

    async fn post_affects(&self, affects: &[AffectRequest]) -> Result<AffectsResponse, ServiceError> {
        self.record(format!("post_affects:{}", affects.len()));
        self.check_failure()?;
        Ok(AffectsResponse {
            results: self.post_results.lock().unwrap().clone(),
        })
    }

    async fn put_affects(&self, affects: &[AffectRequest]) -> Result<AffectsResponse, ServiceError> {
        self.record(format!("put_affects:{}", affects.len()));
        self.check_failure()?;
        Ok(AffectsResponse {
            results: self.put_results.lock().unwrap().clone(),
        })
    }

    async fn delete_affects(&self, uuids: &[Uuid]) -> Result<(), ServiceError> {
        self.record(format!("delete_affects:{}", uuids.len()));
        self.check_failure()?;
        self.deleted_uuids.lock().unwrap().push(uuids.to_vec());
        Ok(())
    }

    async fn post_affect_cvss(&self, affect: Uuid, cvss: &AffectCvss) -> Result<AffectCvss, ServiceError> {
        self.record(format!("post_affect_cvss:{affect}"));
        self.check_failure()?;
        let mut saved = cvss.clone();
        saved.uuid = Some(Uuid::new_v4());
        saved.affect = Some(affect);
        Ok(saved)
    }

    async fn put_affect_cvss(
        &self,
        affect: Uuid,
        cvss_uuid: Uuid,
        cvss: &AffectCvss,
    ) -> Result<AffectCvss, ServiceError> {
        self.record(format!("put_affect_cvss:{affect}:{cvss_uuid}"));
        self.check_failure()?;
        let mut saved = cvss.clone();
        saved.uuid = Some(cvss_uuid);
        saved.affect = Some(affect);
        Ok(saved)
    }

    async fn delete_affect_cvss(&self, affect: Uuid, cvss_uuid: Uuid) -> Result<(), ServiceError> {
        self.record(format!("delete_affect_cvss:{affect}:{cvss_uuid}"));
        self.check_failure()?;
        Ok(())
    }

    async fn module_components(
        &self,
        flaw_uuids: &[Uuid],
    ) -> Result<ModuleComponentsResponse, ServiceError> {
        self.record(format!("module_components:{}", flaw_uuids.len()));
        self.check_failure()?;
        Ok(ModuleComponentsResponse {
            modules_components: self
                .module_components
                .lock()
                .unwrap()
                .modules_components
                .clone(),
        })
    }

    async fn tracker_suggestions(
        &self,
        flaw_uuids: &[Uuid],
    ) -> Result<TrackerSuggestions, ServiceError> {
        self.record(format!("tracker_suggestions:{}", flaw_uuids.len()));
        self.check_failure()?;
        let suggestions = self.suggestions.lock().unwrap();
        Ok(TrackerSuggestions {
            streams_components: suggestions.streams_components.clone(),
            not_applicable: suggestions.not_applicable.clone(),
        })
    }

    async fn file_trackers(
        &self,
        trackers: &[TrackerPost],
    ) -> Result<FileTrackersResponse, ServiceError> {
        self.record(format!("file_trackers:{}", trackers.len()));
        self.check_failure()?;
        self.filed_posts.lock().unwrap().push(trackers.to_vec());
        Ok(FileTrackersResponse {
            successes: self.filed.lock().unwrap().successes.clone(),
        })
    }
}
