// src/osidb/types.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::affect::{Affect, Affectedness, Impact, Justification, Resolution, Tracker};

/// Body of one affect in a bulk create/update call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffectRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uuid: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flaw: Option<Uuid>,
    pub ps_module: String,
    pub ps_component: String,
    pub ps_update_stream: String,
    pub affectedness: Affectedness,
    pub resolution: Resolution,
    pub not_affected_justification: Justification,
    pub impact: Impact,
    pub embargoed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_dt: Option<DateTime<Utc>>,
}

impl AffectRequest {
    pub fn from_affect(affect: &Affect, flaw: Uuid) -> Self {
        Self {
            uuid: affect.uuid,
            flaw: Some(flaw),
            ps_module: affect.ps_module.clone(),
            ps_component: affect.ps_component.clone(),
            ps_update_stream: affect.ps_update_stream.clone(),
            affectedness: affect.affectedness,
            resolution: affect.resolution,
            not_affected_justification: affect.not_affected_justification,
            impact: affect.impact,
            embargoed: affect.embargoed,
            updated_dt: affect.updated_dt,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AffectsResponse {
    #[serde(default)]
    pub results: Vec<Affect>,
}

/// One release channel of a module/component, as product definitions know it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UpdateStream {
    pub ps_update_stream: String,
    #[serde(default)]
    pub selected: bool,
    #[serde(default)]
    pub acked: bool,
    #[serde(default)]
    pub eus: bool,
    #[serde(default)]
    pub aus: bool,
}

/// Candidate streams for one (module, component) pair, with a back-reference
/// to the affect they would track.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ModuleComponent {
    pub ps_module: String,
    pub ps_component: String,
    #[serde(default)]
    pub selected: bool,
    #[serde(default)]
    pub affect: Affect,
    #[serde(default)]
    pub streams: Vec<UpdateStream>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModuleComponentsResponse {
    #[serde(default)]
    pub modules_components: Vec<ModuleComponent>,
}

/// One server-suggested stream in the per-flaw suggestion query.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SuggestedStream {
    #[serde(default)]
    pub affect: Option<Uuid>,
    pub ps_update_stream: String,
    #[serde(default)]
    pub ps_component: String,
    #[serde(default)]
    pub selected: bool,
}

/// Response of the suggestion query. Affects in `not_applicable` have no
/// stream available to track them at all.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackerSuggestions {
    #[serde(default)]
    pub streams_components: Vec<SuggestedStream>,
    #[serde(default)]
    pub not_applicable: Vec<Affect>,
}

/// One tracker to file, carrying the owning affect's write-guard fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerPost {
    pub affects: Vec<Uuid>,
    pub ps_update_stream: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embargoed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_dt: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileTrackersResponse {
    #[serde(default)]
    pub successes: Vec<Tracker>,
}
