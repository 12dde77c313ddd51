use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{CARRIER_COLUMN, OUTPUT_COLUMNS, PHONE_COLUMN};

/// Column names of the non-phone fields the engine reads from every origin
/// row. All seven are required by the pre-flight schema check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldNames {
    pub deal_id: String,
    pub stage: String,
    pub contact_person: String,
    pub title: String,
    pub owner: String,
    pub county: String,
    pub value: String,
}

impl Default for FieldNames {
    fn default() -> Self {
        Self {
            deal_id: "Deal - ID".into(),
            stage: "Deal - Stage".into(),
            contact_person: "Deal - Contact person".into(),
            title: "Deal - Title".into(),
            owner: "Deal - Owner".into(),
            county: "Deal - County".into(),
            value: "Deal - Value".into(),
        }
    }
}

impl FieldNames {
    /// Required columns, in the order they are reported when missing.
    pub fn required(&self) -> [&str; 7] {
        [
            &self.deal_id,
            &self.stage,
            &self.contact_person,
            &self.title,
            &self.owner,
            &self.county,
            &self.value,
        ]
    }
}

/// How remarks and the chosen phone are arbitrated once all passes ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArbitrationMode {
    /// Remarks are reported as recorded and the chosen phone stands.
    Strict,
    /// A chosen phone suppresses format-only remarks; any non-format remark
    /// withdraws the chosen phone so the row goes to manual review.
    Lenient,
}

/// Column set a cleaned record renders with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputShape {
    /// Every column, including the deal value.
    Full,
    /// Every column except the deal value.
    Mid,
    /// Identifier, phone, first name, stage, and remarks only.
    Minimal,
}

impl OutputShape {
    /// The columns this shape carries, in canonical order.
    pub fn columns(self) -> &'static [&'static str] {
        match self {
            OutputShape::Full => &OUTPUT_COLUMNS,
            OutputShape::Mid => &[
                CARRIER_COLUMN,
                "Deal - ID",
                PHONE_COLUMN,
                "First Name",
                "Deal - Owner",
                "Deal - County",
                "Deal - Title",
                "Deal - Stage",
                "Remarks",
            ],
            OutputShape::Minimal => &[
                CARRIER_COLUMN,
                "Deal - ID",
                PHONE_COLUMN,
                "First Name",
                "Deal - Stage",
                "Remarks",
            ],
        }
    }
}

/// A set of pipeline stages that map to one output shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageGroup {
    pub shape: OutputShape,
    pub stages: Vec<String>,
}

/// Which rows make it into the output, and with which columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "lowercase")]
pub enum ShapePolicy {
    /// Every row is kept and rendered with the full shape.
    Universal,
    /// Rows are shaped by the first group their stage appears in; rows whose
    /// stage matches no group are dropped from the output entirely.
    Groups { groups: Vec<StageGroup> },
}

impl ShapePolicy {
    /// Resolves the output shape for `stage`, or `None` when the row should
    /// be dropped.
    pub fn shape_for(&self, stage: &str) -> Option<OutputShape> {
        match self {
            ShapePolicy::Universal => Some(OutputShape::Full),
            ShapePolicy::Groups { groups } => groups
                .iter()
                .find(|group| group.stages.iter().any(|s| s == stage))
                .map(|group| group.shape),
        }
    }
}

/// Maps a row's stage to the opt-out source lists that apply to it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptOutPolicy {
    /// Stage-specific overrides, checked in order; first match wins.
    #[serde(default)]
    pub rules: Vec<StageSourceRule>,
    /// Sources consulted when no rule matches the stage.
    pub default_sources: Vec<String>,
}

/// One stage-to-sources override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageSourceRule {
    pub stages: Vec<String>,
    pub sources: Vec<String>,
}

impl OptOutPolicy {
    /// The ordered source list (the policy key) for a row in `stage`.
    pub fn sources_for(&self, stage: &str) -> &[String] {
        self.rules
            .iter()
            .find(|rule| rule.stages.iter().any(|s| s == stage))
            .map(|rule| rule.sources.as_slice())
            .unwrap_or(&self.default_sources)
    }
}

/// Full configuration surface of the reconciliation engine. Loadable from a
/// JSON file; the default reproduces the production deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub fields: FieldNames,
    /// Phone-bearing columns in the order candidates are considered.
    pub phone_fields: Vec<String>,
    /// Contact names treated as "no usable name", compared case- and
    /// punctuation-insensitively.
    pub placeholder_names: Vec<String>,
    pub arbitration: ArbitrationMode,
    pub shape_policy: ShapePolicy,
    pub opt_out: OptOutPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let mut phone_fields: Vec<String> = ["Work", "Home", "Mobile", "Other"]
            .iter()
            .map(|kind| format!("Person - Phone - {kind}"))
            .collect();
        phone_fields.extend((1..=10).map(|n| format!("Person - Phone {n}")));
        phone_fields.push("Person - Archive - Phone".into());

        Self {
            fields: FieldNames::default(),
            phone_fields,
            placeholder_names: vec![
                "no name".into(),
                "unknown".into(),
                "unkown".into(),
                "uknown".into(),
            ],
            arbitration: ArbitrationMode::Strict,
            shape_policy: ShapePolicy::Groups {
                groups: vec![
                    StageGroup {
                        shape: OutputShape::Full,
                        stages: vec![
                            "Staging".into(),
                            "Updated Offer".into(),
                            "Contact Attempted - Junior Sales".into(),
                            "Waiting on Docs - Junior Sales".into(),
                        ],
                    },
                    StageGroup {
                        shape: OutputShape::Mid,
                        stages: vec![
                            "Staging - Mid Sales".into(),
                            "Contact Attempted - Mid Sales".into(),
                            "Waiting on Docs - Mid Sales".into(),
                        ],
                    },
                    StageGroup {
                        shape: OutputShape::Minimal,
                        stages: vec![
                            "Active Leads - Qualifying".into(),
                            "Active Leads - Website Email Only".into(),
                            "Active Leads - Abandoned".into(),
                            "Cold Deals - Priority 2".into(),
                            "Cold Deals - Priority 3".into(),
                            "Cold Deals - Priority 4".into(),
                        ],
                    },
                ],
            },
            opt_out: OptOutPolicy {
                rules: Vec::new(),
                default_sources: vec![
                    "DNC (Cold-PD).csv".into(),
                    "CallTextOut-7d (PD).csv".into(),
                ],
            },
        }
    }
}

impl EngineConfig {
    /// Loads a configuration from a JSON file. Missing keys fall back to the
    /// defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }
}
