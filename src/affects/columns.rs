// src/affects/columns.rs

use serde::{Deserialize, Serialize};

use crate::models::affect::{possible_resolutions, Affect, Affectedness, Justification};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnId {
    PsModule,
    PsComponent,
    PsUpdateStream,
    Affectedness,
    NotAffectedJustification,
    Resolution,
    Impact,
    Cvss,
    Tracker,
}

impl ColumnId {
    pub fn all() -> &'static [ColumnId] {
        &[
            ColumnId::PsModule,
            ColumnId::PsComponent,
            ColumnId::PsUpdateStream,
            ColumnId::Affectedness,
            ColumnId::NotAffectedJustification,
            ColumnId::Resolution,
            ColumnId::Impact,
            ColumnId::Cvss,
            ColumnId::Tracker,
        ]
    }

    /// The writable affect field behind this column, if any.
    pub fn field(&self) -> Option<AffectField> {
        match self {
            ColumnId::PsModule => Some(AffectField::PsModule),
            ColumnId::PsComponent => Some(AffectField::PsComponent),
            ColumnId::PsUpdateStream => Some(AffectField::PsUpdateStream),
            ColumnId::Affectedness => Some(AffectField::Affectedness),
            ColumnId::NotAffectedJustification => Some(AffectField::Justification),
            ColumnId::Resolution => Some(AffectField::Resolution),
            ColumnId::Impact => Some(AffectField::Impact),
            ColumnId::Cvss | ColumnId::Tracker => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AffectField {
    PsModule,
    PsComponent,
    PsUpdateStream,
    Affectedness,
    Justification,
    Resolution,
    Impact,
}

/// How a column participates in filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    /// Multi-select value filter with the blank-matching EMPTY option.
    Values,
    /// Numeric filter over the CVSS score.
    Score,
    /// Free text, reached only by the global filter.
    Text,
}

/// Where a column's selectable values come from. Static columns offer the
/// same options for every row; dynamic ones derive them from the row state
/// (e.g. resolutions valid for the row's affectedness).
pub enum EnumSource {
    Static(&'static [&'static str]),
    Dynamic(fn(&Affect) -> Vec<&'static str>),
}

impl EnumSource {
    pub fn options_for(&self, affect: Option<&Affect>) -> Vec<&'static str> {
        match self {
            EnumSource::Static(options) => options.to_vec(),
            EnumSource::Dynamic(f) => match affect {
                Some(affect) => f(affect),
                None => Vec::new(),
            },
        }
    }
}

pub struct ColumnDef {
    pub id: ColumnId,
    pub header: &'static str,
    pub width: f32,
    pub bulk_editable: bool,
    pub filter: FilterKind,
    pub options: Option<EnumSource>,
}

const AFFECTEDNESS_OPTIONS: &[&str] = &["", "NEW", "AFFECTED", "NOTAFFECTED"];
const IMPACT_OPTIONS: &[&str] = &["", "LOW", "MODERATE", "IMPORTANT", "CRITICAL"];

fn resolution_options(affect: &Affect) -> Vec<&'static str> {
    possible_resolutions(affect.affectedness, affect.impact)
        .iter()
        .map(|r| r.as_str())
        .collect()
}

fn justification_options(affect: &Affect) -> Vec<&'static str> {
    if affect.affectedness == Affectedness::NotAffected {
        Justification::ALL.iter().map(|j| j.as_str()).collect()
    } else {
        Vec::new()
    }
}

pub fn column_definitions() -> Vec<ColumnDef> {
    vec![
        ColumnDef {
            id: ColumnId::PsModule,
            header: "Module",
            width: 180.0,
            bulk_editable: true,
            filter: FilterKind::Text,
            options: None,
        },
        ColumnDef {
            id: ColumnId::PsComponent,
            header: "Component",
            width: 180.0,
            bulk_editable: true,
            filter: FilterKind::Text,
            options: None,
        },
        ColumnDef {
            id: ColumnId::PsUpdateStream,
            header: "Update Stream",
            width: 160.0,
            bulk_editable: true,
            filter: FilterKind::Text,
            options: None,
        },
        ColumnDef {
            id: ColumnId::Affectedness,
            header: "Affectedness",
            width: 170.0,
            bulk_editable: true,
            filter: FilterKind::Values,
            options: Some(EnumSource::Static(AFFECTEDNESS_OPTIONS)),
        },
        ColumnDef {
            id: ColumnId::NotAffectedJustification,
            header: "Not Affected Justification",
            width: 282.0,
            bulk_editable: true,
            filter: FilterKind::Values,
            options: Some(EnumSource::Dynamic(justification_options)),
        },
        ColumnDef {
            id: ColumnId::Resolution,
            header: "Resolution",
            width: 150.0,
            bulk_editable: true,
            filter: FilterKind::Values,
            options: Some(EnumSource::Dynamic(resolution_options)),
        },
        ColumnDef {
            id: ColumnId::Impact,
            header: "Impact",
            width: 130.0,
            bulk_editable: true,
            filter: FilterKind::Values,
            options: Some(EnumSource::Static(IMPACT_OPTIONS)),
        },
        ColumnDef {
            id: ColumnId::Cvss,
            header: "CVSS",
            width: 100.0,
            bulk_editable: false,
            filter: FilterKind::Score,
            options: None,
        },
        ColumnDef {
            id: ColumnId::Tracker,
            header: "Tracker",
            width: 140.0,
            bulk_editable: false,
            filter: FilterKind::Text,
            options: None,
        },
    ]
}

/// Rendered cell value, also used by filters, global search and the
/// fit-to-content width computation.
pub fn cell_value(affect: &Affect, id: ColumnId) -> String {
    match id {
        ColumnId::PsModule => affect.ps_module.clone(),
        ColumnId::PsComponent => affect.ps_component.clone(),
        ColumnId::PsUpdateStream => affect.ps_update_stream.clone(),
        ColumnId::Affectedness => affect.affectedness.as_str().to_string(),
        ColumnId::NotAffectedJustification => affect.not_affected_justification.as_str().to_string(),
        ColumnId::Resolution => affect.resolution.as_str().to_string(),
        ColumnId::Impact => affect.impact.as_str().to_string(),
        ColumnId::Cvss => affect
            .rh_cvss3()
            .and_then(|c| c.score)
            .map(|s| format!("{s:.1}"))
            .unwrap_or_default(),
        ColumnId::Tracker => affect
            .tracker
            .as_ref()
            .map(|t| {
                if t.external_system_id.is_empty() {
                    t.status.clone().unwrap_or_default()
                } else {
                    t.external_system_id.clone()
                }
            })
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::affect::{Impact, Resolution};

    #[test]
    fn dynamic_resolution_options_follow_affectedness() {
        let mut affect = Affect {
            affectedness: Affectedness::Affected,
            impact: Impact::Low,
            ..Default::default()
        };
        let defs = column_definitions();
        let resolution = defs
            .iter()
            .find(|d| d.id == ColumnId::Resolution)
            .unwrap();

        let options = resolution.options.as_ref().unwrap().options_for(Some(&affect));
        assert!(options.contains(&Resolution::Delegated.as_str()));
        assert!(options.contains(&Resolution::Defer.as_str()));

        affect.impact = Impact::Critical;
        let options = resolution.options.as_ref().unwrap().options_for(Some(&affect));
        assert!(!options.contains(&Resolution::Defer.as_str()));
    }

    #[test]
    fn justification_options_gated_on_notaffected() {
        let defs = column_definitions();
        let justification = defs
            .iter()
            .find(|d| d.id == ColumnId::NotAffectedJustification)
            .unwrap();

        let affect = Affect {
            affectedness: Affectedness::Affected,
            ..Default::default()
        };
        assert!(justification
            .options
            .as_ref()
            .unwrap()
            .options_for(Some(&affect))
            .is_empty());

        let affect = Affect {
            affectedness: Affectedness::NotAffected,
            ..Default::default()
        };
        assert!(!justification
            .options
            .as_ref()
            .unwrap()
            .options_for(Some(&affect))
            .is_empty());
    }

    #[test]
    fn cvss_cell_renders_score_not_vector() {
        let mut affect = Affect::default();
        assert_eq!(cell_value(&affect, ColumnId::Cvss), "");

        affect.cvss_scores.push(crate::models::affect::AffectCvss {
            cvss_version: crate::models::affect::CVSS_V3.to_string(),
            vector: "CVSS:3.1/AV:N/AC:L/PR:N/UI:N/S:U/C:H/I:H/A:H".to_string(),
            score: Some(9.8),
            ..Default::default()
        });
        assert_eq!(cell_value(&affect, ColumnId::Cvss), "9.8");
    }
}
