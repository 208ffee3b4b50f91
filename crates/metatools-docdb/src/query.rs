//! Query-surface normalization: a JSON array is an aggregation pipeline run
//! verbatim; a single object is treated as a find-by-example filter and
//! wrapped into a `$match`/`$limit` pipeline.

use crate::relaxed::parse_relaxed;
use metatools_core::{MetaError, Result};
use serde_json::{json, Value};

#[derive(Debug, Clone, PartialEq)]
pub struct PreparedQuery {
    pub pipeline: Vec<Value>,
    pub default_limit_applied: bool,
}

pub fn prepare_query(input: &str, default_limit: usize) -> Result<PreparedQuery> {
    match parse_relaxed(input)? {
        Value::Array(stages) => Ok(PreparedQuery {
            pipeline: stages,
            default_limit_applied: false,
        }),
        Value::Object(filter) => Ok(PreparedQuery {
            pipeline: vec![
                json!({"$match": Value::Object(filter)}),
                json!({"$limit": default_limit}),
            ],
            default_limit_applied: true,
        }),
        _ => Err(MetaError::Query(
            "pipeline must be a JSON array or object".to_string(),
        )),
    }
}
