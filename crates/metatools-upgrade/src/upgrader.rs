use serde_json::Value;
use std::fmt;

/// Options controlling one upgrade attempt.
#[derive(Debug, Clone, Default)]
pub struct UpgradeOptions {
    /// Skip cross-field metadata validation. Used by the field-isolation
    /// path so a single field can be upgraded without its siblings.
    pub skip_validation: bool,
}

impl UpgradeOptions {
    pub fn isolated() -> Self {
        Self {
            skip_validation: true,
        }
    }
}

/// A failed upgrade attempt, carried as an ordinary value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeFailure {
    pub message: String,
    /// Optional multi-line detail (the original library's traceback slot).
    pub detail: Option<String>,
}

impl UpgradeFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            detail: None,
        }
    }

    pub fn with_detail(message: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            detail: Some(detail.into()),
        }
    }
}

impl fmt::Display for UpgradeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for UpgradeFailure {}

/// The consumed interface of the schema-upgrade engine.
///
/// Implementations take a v1 document by reference and return a freshly
/// built v2 document; the input is never mutated.
pub trait SchemaUpgrader: Send + Sync {
    fn upgrade(
        &self,
        document: &Value,
        options: &UpgradeOptions,
    ) -> std::result::Result<Value, UpgradeFailure>;
}

impl<T: SchemaUpgrader + ?Sized> SchemaUpgrader for std::sync::Arc<T> {
    fn upgrade(
        &self,
        document: &Value,
        options: &UpgradeOptions,
    ) -> std::result::Result<Value, UpgradeFailure> {
        (**self).upgrade(document, options)
    }
}
