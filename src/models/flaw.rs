// src/models/flaw.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::affect::Affect;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flaw {
    pub uuid: Uuid,
    #[serde(default)]
    pub cve_id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub embargoed: bool,
    #[serde(default)]
    pub affects: Vec<Affect>,
    #[serde(default)]
    pub created_dt: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_dt: Option<DateTime<Utc>>,
}

impl Flaw {
    /// Display handle: the CVE id when assigned, the OSIDB uuid otherwise.
    pub fn label(&self) -> String {
        self.cve_id.clone().unwrap_or_else(|| self.uuid.to_string())
    }
}
