// src/models/affect.rs

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// CVSS version string carried by RH-issued scores.
pub const CVSS_V3: &str = "3.1";

lazy_static! {
    static ref CVSS3_VECTOR: Regex =
        Regex::new(r"^CVSS:3\.[01](/[A-Za-z]{1,3}:[A-Za-z]{1,2})+$").unwrap();
}

/// Syntactic check for a CVSS v3.x vector. Scoring itself happens elsewhere;
/// callers reject malformed vectors before they ever reach model state.
pub fn is_valid_cvss3_vector(vector: &str) -> bool {
    CVSS3_VECTOR.is_match(vector)
}

/// OSIDB serializes several enum and string fields as `null` rather than
/// omitting them; fold that into the blank member.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Affectedness {
    #[default]
    #[serde(rename = "")]
    Empty,
    #[serde(rename = "NEW")]
    New,
    #[serde(rename = "AFFECTED")]
    Affected,
    #[serde(rename = "NOTAFFECTED")]
    NotAffected,
}

impl Affectedness {
    pub const ALL: [Affectedness; 4] = [
        Affectedness::Empty,
        Affectedness::New,
        Affectedness::Affected,
        Affectedness::NotAffected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Affectedness::Empty => "",
            Affectedness::New => "NEW",
            Affectedness::Affected => "AFFECTED",
            Affectedness::NotAffected => "NOTAFFECTED",
        }
    }

    pub fn from_wire(value: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|a| a.as_str() == value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Resolution {
    #[default]
    #[serde(rename = "")]
    Empty,
    #[serde(rename = "FIX")]
    Fix,
    #[serde(rename = "DEFER")]
    Defer,
    #[serde(rename = "WONTFIX")]
    Wontfix,
    #[serde(rename = "OOSS")]
    Ooss,
    #[serde(rename = "DELEGATED")]
    Delegated,
    #[serde(rename = "WONTREPORT")]
    Wontreport,
}

impl Resolution {
    pub const ALL: [Resolution; 7] = [
        Resolution::Empty,
        Resolution::Fix,
        Resolution::Defer,
        Resolution::Wontfix,
        Resolution::Ooss,
        Resolution::Delegated,
        Resolution::Wontreport,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::Empty => "",
            Resolution::Fix => "FIX",
            Resolution::Defer => "DEFER",
            Resolution::Wontfix => "WONTFIX",
            Resolution::Ooss => "OOSS",
            Resolution::Delegated => "DELEGATED",
            Resolution::Wontreport => "WONTREPORT",
        }
    }

    pub fn from_wire(value: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|r| r.as_str() == value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Impact {
    #[default]
    #[serde(rename = "")]
    Empty,
    #[serde(rename = "LOW")]
    Low,
    #[serde(rename = "MODERATE")]
    Moderate,
    #[serde(rename = "IMPORTANT")]
    Important,
    #[serde(rename = "CRITICAL")]
    Critical,
}

impl Impact {
    pub const ALL: [Impact; 5] = [
        Impact::Empty,
        Impact::Low,
        Impact::Moderate,
        Impact::Important,
        Impact::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Impact::Empty => "",
            Impact::Low => "LOW",
            Impact::Moderate => "MODERATE",
            Impact::Important => "IMPORTANT",
            Impact::Critical => "CRITICAL",
        }
    }

    pub fn from_wire(value: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|i| i.as_str() == value)
    }
}

/// Justification for marking an affect NOTAFFECTED. The wire values are the
/// human-readable sentences OSIDB stores verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Justification {
    #[default]
    #[serde(rename = "")]
    Empty,
    #[serde(rename = "Component not Present")]
    ComponentNotPresent,
    #[serde(rename = "Inline Mitigations already Exist")]
    InlineMitigationsAlreadyExist,
    #[serde(rename = "Vulnerable Code cannot be Controlled by Adversary")]
    VulnerableCodeCannotBeControlledByAdversary,
    #[serde(rename = "Vulnerable Code not in Execute Path")]
    VulnerableCodeNotInExecutePath,
    #[serde(rename = "Vulnerable Code not Present")]
    VulnerableCodeNotPresent,
}

impl Justification {
    pub const ALL: [Justification; 6] = [
        Justification::Empty,
        Justification::ComponentNotPresent,
        Justification::InlineMitigationsAlreadyExist,
        Justification::VulnerableCodeCannotBeControlledByAdversary,
        Justification::VulnerableCodeNotInExecutePath,
        Justification::VulnerableCodeNotPresent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Justification::Empty => "",
            Justification::ComponentNotPresent => "Component not Present",
            Justification::InlineMitigationsAlreadyExist => "Inline Mitigations already Exist",
            Justification::VulnerableCodeCannotBeControlledByAdversary => {
                "Vulnerable Code cannot be Controlled by Adversary"
            }
            Justification::VulnerableCodeNotInExecutePath => "Vulnerable Code not in Execute Path",
            Justification::VulnerableCodeNotPresent => "Vulnerable Code not Present",
        }
    }

    pub fn from_wire(value: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|j| j.as_str() == value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Issuer {
    #[default]
    #[serde(rename = "RH")]
    Rh,
    #[serde(rename = "NIST")]
    Nist,
    #[serde(rename = "CVEORG")]
    Cveorg,
}

/// Resolutions a user may pick for a given affectedness. DEFER is only
/// offered while impact is LOW.
pub fn possible_resolutions(affectedness: Affectedness, impact: Impact) -> Vec<Resolution> {
    let base: &[Resolution] = match affectedness {
        Affectedness::Affected => &[
            Resolution::Delegated,
            Resolution::Defer,
            Resolution::Wontfix,
            Resolution::Ooss,
        ],
        Affectedness::New => &[
            Resolution::Empty,
            Resolution::Defer,
            Resolution::Wontfix,
            Resolution::Ooss,
        ],
        Affectedness::NotAffected => &[Resolution::Empty],
        Affectedness::Empty => &[],
    };

    base.iter()
        .copied()
        .filter(|r| *r != Resolution::Defer || impact == Impact::Low)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AffectCvss {
    #[serde(default)]
    pub uuid: Option<Uuid>,
    #[serde(default)]
    pub affect: Option<Uuid>,
    #[serde(default)]
    pub issuer: Issuer,
    #[serde(default, deserialize_with = "null_as_default")]
    pub cvss_version: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub vector: String,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub comment: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub embargoed: bool,
    #[serde(default)]
    pub created_dt: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_dt: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TrackerType {
    #[default]
    #[serde(rename = "JIRA")]
    Jira,
    #[serde(rename = "BUGZILLA")]
    Bugzilla,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Tracker {
    #[serde(default)]
    pub uuid: Option<Uuid>,
    #[serde(default)]
    pub affects: Vec<Uuid>,
    #[serde(default)]
    pub external_system_id: String,
    #[serde(default)]
    pub ps_update_stream: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub resolution: Option<String>,
    #[serde(rename = "type", default)]
    pub tracker_type: TrackerType,
    #[serde(default)]
    pub embargoed: bool,
    #[serde(default)]
    pub created_dt: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_dt: Option<DateTime<Utc>>,
}

/// One product-stream's exposure to a flaw.
///
/// `uuid` is assigned by OSIDB on first save; until then a row carries only
/// the client-generated `local_id`, which never goes over the wire.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Affect {
    #[serde(default)]
    pub uuid: Option<Uuid>,
    #[serde(skip)]
    pub local_id: Option<Uuid>,
    #[serde(default)]
    pub flaw: Option<Uuid>,
    #[serde(default)]
    pub ps_module: String,
    #[serde(default)]
    pub ps_component: String,
    #[serde(default)]
    pub ps_update_stream: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub affectedness: Affectedness,
    #[serde(default, deserialize_with = "null_as_default")]
    pub resolution: Resolution,
    #[serde(default, deserialize_with = "null_as_default")]
    pub not_affected_justification: Justification,
    #[serde(default, deserialize_with = "null_as_default")]
    pub impact: Impact,
    #[serde(default)]
    pub cvss_scores: Vec<AffectCvss>,
    #[serde(default)]
    pub tracker: Option<Tracker>,
    #[serde(default)]
    pub trackers: Vec<Tracker>,
    #[serde(default)]
    pub embargoed: bool,
    #[serde(default)]
    pub created_dt: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_dt: Option<DateTime<Utc>>,
}

impl Affect {
    /// Stable row identity: the server uuid once persisted, the client id
    /// before that.
    pub fn row_id(&self) -> Option<Uuid> {
        self.uuid.or(self.local_id)
    }

    /// String form of the row identity. A row with neither id keys to the
    /// empty string, so at most one such orphan can exist in grid state at a
    /// time without colliding.
    pub fn row_key(&self) -> String {
        self.row_id().map(|id| id.to_string()).unwrap_or_default()
    }

    /// The RH-issued CVSS v3 entry, if any.
    pub fn rh_cvss3(&self) -> Option<&AffectCvss> {
        self.cvss_scores
            .iter()
            .find(|c| c.issuer == Issuer::Rh && c.cvss_version == CVSS_V3)
    }

    pub fn rh_cvss3_mut(&mut self) -> Option<&mut AffectCvss> {
        self.cvss_scores
            .iter_mut()
            .find(|c| c.issuer == Issuer::Rh && c.cvss_version == CVSS_V3)
    }

    /// Numeric sort/filter key derived from the RH CVSS v3 entry.
    pub fn cvss3_score(&self) -> f64 {
        self.rh_cvss3().and_then(|c| c.score).unwrap_or(0.0)
    }

    /// Change affectedness and cascade dependent fields: resolution is
    /// cleared unless still valid for the new state, justification only
    /// survives NOTAFFECTED, and NOTAFFECTED clears impact.
    pub fn set_affectedness(&mut self, affectedness: Affectedness) {
        self.affectedness = affectedness;

        if !possible_resolutions(affectedness, self.impact).contains(&self.resolution) {
            self.resolution = Resolution::Empty;
        }
        if affectedness != Affectedness::NotAffected {
            self.not_affected_justification = Justification::Empty;
        }
        if affectedness == Affectedness::NotAffected {
            self.impact = Impact::Empty;
        }
    }
}

/// Identity match between two affect references. Rows created client-side
/// have no server uuid yet, so the (module, component) pair is the fallback;
/// a flaw cannot hold two persisted affects with the same pair.
pub fn matches(a: &Affect, b: &Affect) -> bool {
    if let (Some(left), Some(right)) = (a.uuid, b.uuid) {
        if left == right {
            return true;
        }
    }
    a.ps_module == b.ps_module && a.ps_component == b.ps_component
}
