//! Two-step, field-level upgrade tester.
//!
//! Step 1 attempts the whole-document migration. If that fails, step 2
//! rebuilds the attempt one top-level field at a time, each in a minimal
//! synthetic document with cross-field validation disabled, so a single
//! incompatible field never hides the status of the others.

use crate::upgrader::{SchemaUpgrader, UpgradeOptions};
use metatools_core::{
    AssetIdentifier, CoreField, DocumentStore, FieldOutcome, MetaError, Result, UpgradeReport,
};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

pub struct UpgradeTester<U> {
    upgrader: U,
}

impl<U: SchemaUpgrader> UpgradeTester<U> {
    pub fn new(upgrader: U) -> Self {
        Self { upgrader }
    }

    /// Resolve `identifier` in the store and run the upgrade test on the
    /// resulting document.
    pub async fn test_asset<S: DocumentStore + ?Sized>(
        &self,
        store: &S,
        identifier: &AssetIdentifier,
    ) -> Result<UpgradeReport> {
        let asset = store
            .fetch_asset(identifier)
            .await?
            .ok_or_else(|| MetaError::NotFound(format!("asset not found: {}", identifier)))?;
        Ok(self.test_document(identifier.value(), &asset))
    }

    /// Run the upgrade test on an already-fetched document. Read-only: the
    /// document is deep-copied before any attempt and never written back.
    pub fn test_document(&self, identifier: &str, asset: &Value) -> UpgradeReport {
        let mut report = UpgradeReport::new(identifier);
        report.asset_id = identity_string(asset, "_id");
        report.asset_name = identity_string(asset, "name");
        report.created = identity_string(asset, "created");

        // Clean copy taken before any upgrade attempt; every fragment in
        // the report comes from this copy, not from the upgrader's output.
        let original = asset.clone();
        let present: Vec<CoreField> = CoreField::ALL
            .iter()
            .copied()
            .filter(|field| field_present(&original, *field))
            .collect();

        match self.upgrader.upgrade(asset, &UpgradeOptions::default()) {
            Ok(upgraded) => {
                info!(asset = identifier, "full asset upgrade succeeded");
                for field in present {
                    let converted = field.converted_name();
                    if let Some(fragment) = upgraded.get(converted) {
                        report.upgraded_fields.insert(
                            field,
                            FieldOutcome::Upgraded {
                                original: original[field.key()].clone(),
                                upgraded: fragment.clone(),
                                converted_to: field.rename().map(str::to_string),
                            },
                        );
                        report.successful_fields.push(field);
                    }
                }
                report.success = true;
            }
            Err(failure) => {
                warn!(asset = identifier, error = %failure, "full asset upgrade failed, isolating fields");
                report.overall_error = Some(failure.message.clone());
                report.overall_traceback = failure.detail.clone();

                for field in present {
                    let outcome = self.test_field(&original, field);
                    if outcome.is_success() {
                        report.successful_fields.push(field);
                    } else {
                        report.failed_fields.push(field);
                    }
                    report.field_results.insert(field, outcome);
                }
            }
        }

        report.partial_success =
            !report.successful_fields.is_empty() && !report.failed_fields.is_empty();
        info!(
            asset = identifier,
            success = report.success,
            successful = report.successful_fields.len(),
            failed = report.failed_fields.len(),
            "upgrade test finished"
        );
        report
    }

    /// Upgrade one field inside a minimal synthetic document, bypassing
    /// cross-field validation. Failure comes back as a `Failed` outcome,
    /// never as an error of this function.
    fn test_field(&self, original: &Value, field: CoreField) -> FieldOutcome {
        debug!(field = %field, "testing field in isolation");
        let fragment = original[field.key()].clone();
        let test_doc = synthetic_document(original, field);

        match self.upgrader.upgrade(&test_doc, &UpgradeOptions::isolated()) {
            Ok(upgraded) => {
                let converted = field.converted_name();
                match upgraded.get(converted) {
                    Some(value) => FieldOutcome::Upgraded {
                        original: fragment,
                        upgraded: value.clone(),
                        converted_to: field.rename().map(str::to_string),
                    },
                    None => FieldOutcome::Failed {
                        original: fragment,
                        error: format!("field {} not found in upgraded result", converted),
                    },
                }
            }
            Err(failure) => FieldOutcome::Failed {
                original: fragment,
                error: failure.message,
            },
        }
    }
}

/// Build the minimal document for one field: identity fields, the field
/// under test, and `subject` as a companion (unless testing `subject`
/// itself) so upgraders that need a subject for context still run.
fn synthetic_document(original: &Value, field: CoreField) -> Value {
    let mut doc = Map::new();
    for key in ["_id", "name", "created"] {
        if let Some(value) = original.get(key) {
            doc.insert(key.to_string(), value.clone());
        }
    }
    doc.insert(field.key().to_string(), original[field.key()].clone());
    if field != CoreField::Subject {
        if let Some(subject) = original.get(CoreField::Subject.key()) {
            if !subject.is_null() {
                doc.insert(CoreField::Subject.key().to_string(), subject.clone());
            }
        }
    }
    Value::Object(doc)
}

fn field_present(document: &Value, field: CoreField) -> bool {
    document
        .get(field.key())
        .is_some_and(|value| !value.is_null())
}

fn identity_string(document: &Value, key: &str) -> Option<String> {
    document.get(key).and_then(|value| match value {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    })
}
