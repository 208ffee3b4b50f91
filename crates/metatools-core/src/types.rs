use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// How an asset identifier should be resolved against the document store.
///
/// `Unknown` tries the name first, then the id, matching the lookup order
/// users expect when pasting either into a shared URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetIdentifier {
    Id(String),
    Name(String),
    Unknown(String),
}

impl AssetIdentifier {
    pub fn value(&self) -> &str {
        match self {
            AssetIdentifier::Id(v) | AssetIdentifier::Name(v) | AssetIdentifier::Unknown(v) => v,
        }
    }

    pub fn from_type(value: impl Into<String>, identifier_type: Option<&str>) -> Self {
        let value = value.into();
        match identifier_type {
            Some("id") => AssetIdentifier::Id(value),
            Some("name") => AssetIdentifier::Name(value),
            _ => AssetIdentifier::Unknown(value),
        }
    }

    /// Whether name-based lookup should be attempted for this identifier.
    pub fn tries_name(&self) -> bool {
        matches!(self, AssetIdentifier::Name(_) | AssetIdentifier::Unknown(_))
    }

    /// Whether id-based lookup should be attempted for this identifier.
    pub fn tries_id(&self) -> bool {
        matches!(self, AssetIdentifier::Id(_) | AssetIdentifier::Unknown(_))
    }
}

impl fmt::Display for AssetIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.value())
    }
}

/// The top-level core metadata files of a v1 asset record.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum CoreField {
    DataDescription,
    Procedures,
    Subject,
    Session,
    Rig,
    Processing,
    QualityControl,
}

impl CoreField {
    pub const ALL: [CoreField; 7] = [
        CoreField::DataDescription,
        CoreField::Procedures,
        CoreField::Subject,
        CoreField::Session,
        CoreField::Rig,
        CoreField::Processing,
        CoreField::QualityControl,
    ];

    /// The v1 document key for this field.
    pub fn key(&self) -> &'static str {
        match self {
            CoreField::DataDescription => "data_description",
            CoreField::Procedures => "procedures",
            CoreField::Subject => "subject",
            CoreField::Session => "session",
            CoreField::Rig => "rig",
            CoreField::Processing => "processing",
            CoreField::QualityControl => "quality_control",
        }
    }

    /// The v2 document key. `session` and `rig` were renamed during the
    /// schema migration; everything else keeps its name.
    pub fn converted_name(&self) -> &'static str {
        match self {
            CoreField::Session => "acquisition",
            CoreField::Rig => "instrument",
            other => other.key(),
        }
    }

    /// The rename applied by the migration, if any.
    pub fn rename(&self) -> Option<&'static str> {
        let converted = self.converted_name();
        (converted != self.key()).then_some(converted)
    }
}

impl fmt::Display for CoreField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Wire shape of one per-field result, keyed by field name in the report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldRecord {
    pub success: bool,
    pub original: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upgraded: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub converted_to: Option<String>,
}

/// Outcome of upgrading one top-level field.
///
/// Failure is a value here, not a caught panic: the tester records a
/// `Failed` outcome and moves on to the next field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "FieldRecord", try_from = "FieldRecord")]
pub enum FieldOutcome {
    Upgraded {
        original: Value,
        upgraded: Value,
        converted_to: Option<String>,
    },
    Failed {
        original: Value,
        error: String,
    },
}

impl FieldOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, FieldOutcome::Upgraded { .. })
    }

    pub fn original(&self) -> &Value {
        match self {
            FieldOutcome::Upgraded { original, .. } | FieldOutcome::Failed { original, .. } => {
                original
            }
        }
    }
}

impl From<FieldOutcome> for FieldRecord {
    fn from(outcome: FieldOutcome) -> Self {
        match outcome {
            FieldOutcome::Upgraded {
                original,
                upgraded,
                converted_to,
            } => FieldRecord {
                success: true,
                original,
                upgraded: Some(upgraded),
                error: None,
                converted_to,
            },
            FieldOutcome::Failed { original, error } => FieldRecord {
                success: false,
                original,
                upgraded: None,
                error: Some(error),
                converted_to: None,
            },
        }
    }
}

impl TryFrom<FieldRecord> for FieldOutcome {
    type Error = String;

    fn try_from(record: FieldRecord) -> std::result::Result<Self, String> {
        if record.success {
            let upgraded = record
                .upgraded
                .ok_or_else(|| "successful field record missing upgraded fragment".to_string())?;
            Ok(FieldOutcome::Upgraded {
                original: record.original,
                upgraded,
                converted_to: record.converted_to,
            })
        } else {
            let error = record
                .error
                .ok_or_else(|| "failed field record missing error".to_string())?;
            Ok(FieldOutcome::Failed {
                original: record.original,
                error,
            })
        }
    }
}

/// Full result of one upgrade test, serialized for the browser view and the
/// CLI. Built transiently per request, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpgradeReport {
    pub asset_identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    pub success: bool,
    pub partial_success: bool,
    /// Per-field breakdown of a successful whole-document upgrade.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub upgraded_fields: BTreeMap<CoreField, FieldOutcome>,
    /// Per-field isolation results; populated only when the whole-document
    /// attempt failed.
    #[serde(default)]
    pub field_results: BTreeMap<CoreField, FieldOutcome>,
    #[serde(default)]
    pub successful_fields: Vec<CoreField>,
    #[serde(default)]
    pub failed_fields: Vec<CoreField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overall_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overall_traceback: Option<String>,
}

impl UpgradeReport {
    pub fn new(asset_identifier: impl Into<String>) -> Self {
        Self {
            asset_identifier: asset_identifier.into(),
            asset_id: None,
            asset_name: None,
            created: None,
            success: false,
            partial_success: false,
            upgraded_fields: BTreeMap::new(),
            field_results: BTreeMap::new(),
            successful_fields: Vec::new(),
            failed_fields: Vec::new(),
            overall_error: None,
            overall_traceback: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn core_field_rename_map() {
        assert_eq!(CoreField::Session.converted_name(), "acquisition");
        assert_eq!(CoreField::Rig.converted_name(), "instrument");
        assert_eq!(CoreField::Subject.converted_name(), "subject");
        assert_eq!(CoreField::Session.rename(), Some("acquisition"));
        assert_eq!(CoreField::Processing.rename(), None);
    }

    #[test]
    fn field_outcome_serializes_as_flat_record() {
        let outcome = FieldOutcome::Upgraded {
            original: json!({"a": 1}),
            upgraded: json!({"a": 2}),
            converted_to: Some("acquisition".to_string()),
        };
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["success"], json!(true));
        assert_eq!(value["original"], json!({"a": 1}));
        assert_eq!(value["upgraded"], json!({"a": 2}));
        assert_eq!(value["converted_to"], json!("acquisition"));
        assert!(value.get("error").is_none());

        let back: FieldOutcome = serde_json::from_value(value).unwrap();
        assert_eq!(back, outcome);
    }

    #[test]
    fn failed_outcome_round_trips() {
        let outcome = FieldOutcome::Failed {
            original: json!([1, 2, 3]),
            error: "bad shape".to_string(),
        };
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["success"], json!(false));
        assert_eq!(value["error"], json!("bad shape"));
        let back: FieldOutcome = serde_json::from_value(value).unwrap();
        assert_eq!(back, outcome);
    }

    #[test]
    fn inconsistent_record_is_rejected() {
        let record = json!({"success": true, "original": {}});
        assert!(serde_json::from_value::<FieldOutcome>(record).is_err());
    }

    #[test]
    fn report_field_results_keyed_by_field_name() {
        let mut report = UpgradeReport::new("some-asset");
        report.field_results.insert(
            CoreField::Session,
            FieldOutcome::Failed {
                original: json!({}),
                error: "nope".to_string(),
            },
        );
        let value = serde_json::to_value(&report).unwrap();
        assert!(value["field_results"].get("session").is_some());
    }

    #[test]
    fn identifier_resolution_modes() {
        let unknown = AssetIdentifier::from_type("x", None);
        assert!(unknown.tries_name() && unknown.tries_id());
        let id = AssetIdentifier::from_type("x", Some("id"));
        assert!(!id.tries_name() && id.tries_id());
        let name = AssetIdentifier::from_type("x", Some("name"));
        assert!(name.tries_name() && !name.tries_id());
    }
}
