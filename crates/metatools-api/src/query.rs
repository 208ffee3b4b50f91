use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::{extract::State, Json};
use metatools_docdb::prepare_query;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tabled::builder::Builder;
use tabled::settings::Style;
use tracing::debug;

#[derive(Deserialize)]
pub struct QueryRequest {
    pub pipeline: String,
}

#[derive(Serialize)]
pub struct QueryResponse {
    pub results: Vec<Value>,
    pub count: usize,
    pub default_limit_applied: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_limit: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub markdown: Option<String>,
}

/// Run a user-supplied pipeline or filter against the v1 document store.
pub async fn run_query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> ApiResult<Json<QueryResponse>> {
    let prepared = prepare_query(&request.pipeline, state.default_limit)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    debug!(
        stages = prepared.pipeline.len(),
        wrapped = prepared.default_limit_applied,
        "running docdb query"
    );

    let results = state.store.aggregate(&prepared.pipeline).await?;
    let markdown = markdown_table(&results);

    Ok(Json(QueryResponse {
        count: results.len(),
        default_limit_applied: prepared.default_limit_applied,
        default_limit: prepared.default_limit_applied.then_some(state.default_limit),
        markdown,
        results,
    }))
}

/// Tabulate result documents as a markdown table. Columns are the union of
/// top-level keys in first-seen order; date-like columns are truncated to
/// second precision.
pub fn markdown_table(results: &[Value]) -> Option<String> {
    if results.is_empty() || !results.iter().all(Value::is_object) {
        return None;
    }

    let mut columns: Vec<String> = Vec::new();
    for record in results {
        for key in record.as_object().expect("checked above").keys() {
            if !columns.iter().any(|c| c == key) {
                columns.push(key.clone());
            }
        }
    }

    let mut builder = Builder::default();
    builder.push_record(columns.clone());
    for record in results {
        let row: Vec<String> = columns
            .iter()
            .map(|column| {
                let cell = match record.get(column) {
                    None | Some(Value::Null) => String::new(),
                    Some(Value::String(s)) => s.clone(),
                    Some(other) => other.to_string(),
                };
                if column.to_lowercase().contains("date") && cell.len() > 19 {
                    cell.chars().take(19).collect()
                } else {
                    cell
                }
            })
            .collect();
        builder.push_record(row);
    }

    let mut table = builder.build();
    table.with(Style::markdown());
    Some(table.to_string())
}
