// src/osidb/api.rs

use thiserror::Error;
use uuid::Uuid;

use crate::models::affect::AffectCvss;
use crate::models::flaw::Flaw;

use super::types::{
    AffectRequest, AffectsResponse, FileTrackersResponse, ModuleComponentsResponse, TrackerPost,
    TrackerSuggestions,
};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("backend returned status {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
}

impl ServiceError {
    /// One-line summary suitable for a toast body.
    pub fn summary(&self) -> String {
        self.to_string()
    }
}

/// The OSIDB collaborator contract consumed by the affects model, the table
/// engine and the tracker coordinator.
///
/// The two tracker-query operations are deliberately distinct: the
/// module-component listing and the per-flaw suggestion query return
/// different shapes and serve different call sites.
#[allow(async_fn_in_trait)]
pub trait OsidbApi {
    /// Fetch canonical flaw + affects state. Accepts a uuid or a CVE id.
    async fn get_flaw(&self, id: &str) -> Result<Flaw, ServiceError>;

    /// Bulk create. The response list is the authoritative post-save state.
    async fn post_affects(&self, affects: &[AffectRequest]) -> Result<AffectsResponse, ServiceError>;

    /// Bulk update of already-persisted affects.
    async fn put_affects(&self, affects: &[AffectRequest]) -> Result<AffectsResponse, ServiceError>;

    /// Bulk delete. Only server-assigned uuids may appear here.
    async fn delete_affects(&self, uuids: &[Uuid]) -> Result<(), ServiceError>;

    async fn post_affect_cvss(&self, affect: Uuid, cvss: &AffectCvss) -> Result<AffectCvss, ServiceError>;

    async fn put_affect_cvss(
        &self,
        affect: Uuid,
        cvss_uuid: Uuid,
        cvss: &AffectCvss,
    ) -> Result<AffectCvss, ServiceError>;

    async fn delete_affect_cvss(&self, affect: Uuid, cvss_uuid: Uuid) -> Result<(), ServiceError>;

    /// Available update streams per (module, component) for the given flaws.
    async fn module_components(
        &self,
        flaw_uuids: &[Uuid],
    ) -> Result<ModuleComponentsResponse, ServiceError>;

    /// Server-side tracker suggestions for the given flaws, including the
    /// affects with no applicable stream.
    async fn tracker_suggestions(
        &self,
        flaw_uuids: &[Uuid],
    ) -> Result<TrackerSuggestions, ServiceError>;

    /// Batch tracker-filing write.
    async fn file_trackers(
        &self,
        trackers: &[TrackerPost],
    ) -> Result<FileTrackersResponse, ServiceError>;
}
