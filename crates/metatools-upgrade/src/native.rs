//! Built-in v1 → v2 structural migration.
//!
//! This is the default `SchemaUpgrader` wired into the binaries. It covers
//! the structural part of the migration (field renames, schema-version
//! bump, shape checks, the known fiber-connection channel requirement) and
//! the cross-field required-file validation that the isolation path
//! bypasses. It stands where the external upgrade engine sits in
//! production; swapping that engine in means implementing `SchemaUpgrader`.

use crate::upgrader::{SchemaUpgrader, UpgradeFailure, UpgradeOptions};
use metatools_core::CoreField;
use serde_json::{Map, Value};

const TARGET_SCHEMA_VERSION: &str = "2.0";

/// Core files that must be present for a whole-document migration.
const REQUIRED_FILES: [CoreField; 2] = [CoreField::Subject, CoreField::DataDescription];

#[derive(Debug, Clone, Default)]
pub struct NativeUpgrader;

impl NativeUpgrader {
    pub fn new() -> Self {
        Self
    }

    fn upgrade_field(
        &self,
        field: CoreField,
        fragment: &Value,
    ) -> std::result::Result<Value, UpgradeFailure> {
        let object = fragment.as_object().ok_or_else(|| {
            UpgradeFailure::new(format!(
                "{} is not an object and cannot be migrated",
                field.key()
            ))
        })?;

        match field {
            CoreField::Session => check_session(object)?,
            CoreField::Procedures => check_procedures(object)?,
            _ => {}
        }

        let mut upgraded = object.clone();
        upgraded.insert(
            "schema_version".to_string(),
            Value::String(TARGET_SCHEMA_VERSION.to_string()),
        );
        Ok(Value::Object(upgraded))
    }
}

impl SchemaUpgrader for NativeUpgrader {
    fn upgrade(
        &self,
        document: &Value,
        options: &UpgradeOptions,
    ) -> std::result::Result<Value, UpgradeFailure> {
        let source = document
            .as_object()
            .ok_or_else(|| UpgradeFailure::new("asset record is not a JSON object"))?;

        if !options.skip_validation {
            let missing: Vec<&str> = REQUIRED_FILES
                .iter()
                .filter(|field| {
                    !source
                        .get(field.key())
                        .is_some_and(|fragment| !fragment.is_null())
                })
                .map(|field| field.key())
                .collect();
            if !missing.is_empty() {
                return Err(UpgradeFailure::new(format!(
                    "missing required core file(s): {}",
                    missing.join(", ")
                )));
            }
        }

        let mut upgraded = Map::new();
        for key in ["_id", "name", "created"] {
            if let Some(value) = source.get(key) {
                upgraded.insert(key.to_string(), value.clone());
            }
        }
        upgraded.insert(
            "schema_version".to_string(),
            Value::String(TARGET_SCHEMA_VERSION.to_string()),
        );

        for field in CoreField::ALL {
            let Some(fragment) = source.get(field.key()) else {
                continue;
            };
            if fragment.is_null() {
                continue;
            }
            let migrated = self.upgrade_field(field, fragment)?;
            upgraded.insert(field.converted_name().to_string(), migrated);
        }

        Ok(Value::Object(upgraded))
    }
}

/// A v1 session stream that records fiber photometry must name a channel on
/// every fiber connection; v2 has no slot for a connection without one.
fn check_session(session: &Map<String, Value>) -> std::result::Result<(), UpgradeFailure> {
    let streams = session
        .get("data_streams")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    for stream in streams {
        let connections = stream
            .get("fiber_connections")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        for connection in connections {
            let has_channel = connection
                .get("channel")
                .is_some_and(|channel| !channel.is_null());
            if !has_channel {
                return Err(UpgradeFailure::new(
                    "fiber connection is missing channel data",
                ));
            }
        }
    }
    Ok(())
}

/// Every subject procedure must declare its type; the migration dispatches
/// on it and has no default.
fn check_procedures(procedures: &Map<String, Value>) -> std::result::Result<(), UpgradeFailure> {
    let subject_procedures = procedures
        .get("subject_procedures")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    for procedure in subject_procedures {
        let typed = procedure.get("procedure_type").is_some_and(Value::is_string)
            || procedure.get("object_type").is_some_and(Value::is_string);
        if !typed {
            return Err(UpgradeFailure::new(
                "subject procedure has no procedure_type or object_type",
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn good_asset() -> Value {
        json!({
            "_id": "abc",
            "name": "behavior_1_2024-01-01",
            "created": "2024-01-01T00:00:00Z",
            "subject": {"subject_id": "1", "schema_version": "1.0.0"},
            "data_description": {"modality": [], "schema_version": "1.0.1"},
            "session": {"data_streams": [], "schema_version": "1.1.2"},
            "rig": {"rig_id": "FIP-1", "schema_version": "1.0.3"}
        })
    }

    #[test]
    fn good_asset_upgrades_with_renames() {
        let upgraded = NativeUpgrader::new()
            .upgrade(&good_asset(), &UpgradeOptions::default())
            .unwrap();

        assert_eq!(upgraded["schema_version"], json!("2.0"));
        assert!(upgraded.get("acquisition").is_some());
        assert!(upgraded.get("session").is_none());
        assert!(upgraded.get("instrument").is_some());
        assert!(upgraded.get("rig").is_none());
        assert_eq!(upgraded["subject"]["schema_version"], json!("2.0"));
    }

    #[test]
    fn missing_required_files_fail_whole_document_only() {
        let doc = json!({
            "_id": "abc",
            "name": "n",
            "created": "c",
            "session": {"data_streams": []}
        });
        let upgrader = NativeUpgrader::new();

        let err = upgrader.upgrade(&doc, &UpgradeOptions::default()).unwrap_err();
        assert!(err.message.contains("missing required core file"));
        assert!(err.message.contains("subject"));

        // the isolation path bypasses the cross-field check
        let upgraded = upgrader.upgrade(&doc, &UpgradeOptions::isolated()).unwrap();
        assert!(upgraded.get("acquisition").is_some());
    }

    #[test]
    fn fiber_connection_without_channel_fails_session() {
        let mut doc = good_asset();
        doc["session"]["data_streams"] = json!([
            {"fiber_connections": [{"fiber_name": "Fiber_0", "channel": {"channel_name": "G"}}]},
            {"fiber_connections": [{"fiber_name": "Fiber_1"}]}
        ]);
        let err = NativeUpgrader::new()
            .upgrade(&doc, &UpgradeOptions::default())
            .unwrap_err();
        assert!(err.message.contains("channel"));
    }

    #[test]
    fn untyped_subject_procedure_fails_procedures() {
        let mut doc = good_asset();
        doc["procedures"] = json!({
            "subject_procedures": [{"start_date": "2023-10-01"}],
            "schema_version": "1.2.0"
        });
        let err = NativeUpgrader::new()
            .upgrade(&doc, &UpgradeOptions::default())
            .unwrap_err();
        assert!(err.message.contains("procedure_type"));
    }

    #[test]
    fn non_object_fragment_is_rejected() {
        let mut doc = good_asset();
        doc["processing"] = json!("not a document");
        let err = NativeUpgrader::new()
            .upgrade(&doc, &UpgradeOptions::default())
            .unwrap_err();
        assert!(err.message.contains("processing"));
    }

    #[test]
    fn input_document_is_not_mutated() {
        let doc = good_asset();
        let before = doc.clone();
        let _ = NativeUpgrader::new().upgrade(&doc, &UpgradeOptions::default());
        assert_eq!(doc, before);
    }
}
