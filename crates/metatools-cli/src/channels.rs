//! Survey of v1-session assets whose fiber connections lack channel data.
//!
//! Sessions written before the channel field existed carry fiber
//! connections with no `channel` entry; those assets fail the schema
//! upgrade. This module turns a sample of asset records into a per-asset
//! report and a CSV file.

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// One surveyed asset. Only assets that have fiber connections at all are
/// reported.
#[derive(Debug, Clone, Serialize)]
pub struct AssetChannelRow {
    pub asset_id: String,
    pub name: String,
    pub created: String,
    pub session_version: String,
    pub num_fiber_connections: usize,
    pub missing_channel_data: bool,
    pub num_missing_channel: usize,
}

/// Count fiber connections and the subset without channel data across all
/// data streams of a session. Returns `(total, missing)`.
pub fn count_fiber_channels(session: &Value) -> (usize, usize) {
    let mut total = 0;
    let mut missing = 0;

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

        total += connections.len();
        missing += connections
            .iter()
            .filter(|connection| channel_is_missing(connection))
            .count();
    }

    (total, missing)
}

/// Absent, null, and empty channel entries all count as missing.
fn channel_is_missing(connection: &Value) -> bool {
    match connection.get("channel") {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Object(map)) => map.is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(_) => false,
    }
}

/// Reduce sampled asset records to rows, keeping only assets that have
/// fiber connections.
pub fn survey_assets(records: &[Value]) -> Vec<AssetChannelRow> {
    let mut rows = Vec::new();

    for record in records {
        let session = record.get("session").cloned().unwrap_or(Value::Null);
        let (total, missing) = count_fiber_channels(&session);
        if total == 0 {
            continue;
        }

        rows.push(AssetChannelRow {
            asset_id: field_string(record, "_id"),
            name: field_string(record, "name"),
            created: field_string(record, "created"),
            session_version: session
                .get("schema_version")
                .and_then(Value::as_str)
                .unwrap_or("N/A")
                .to_string(),
            num_fiber_connections: total,
            missing_channel_data: missing > 0,
            num_missing_channel: missing,
        });
    }

    rows
}

fn field_string(record: &Value, key: &str) -> String {
    record
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or("N/A")
        .to_string()
}

/// Per session-version counts, split by whether channel data is missing.
pub fn version_breakdown(rows: &[AssetChannelRow]) -> Vec<Value> {
    let mut counts: BTreeMap<(String, bool), usize> = BTreeMap::new();
    for row in rows {
        *counts
            .entry((row.session_version.clone(), row.missing_channel_data))
            .or_default() += 1;
    }

    counts
        .into_iter()
        .map(|((session_version, missing_channel_data), count)| {
            serde_json::json!({
                "session_version": session_version,
                "missing_channel_data": missing_channel_data,
                "count": count,
            })
        })
        .collect()
}

pub fn write_csv(path: &Path, rows: &[AssetChannelRow]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn asset(id: &str, version: &str, connections: Vec<Value>) -> Value {
        json!({
            "_id": id,
            "name": format!("asset_{id}"),
            "created": "2024-01-01T00:00:00Z",
            "session": {
                "schema_version": version,
                "data_streams": [{"fiber_connections": connections}]
            }
        })
    }

    #[test]
    fn absent_null_and_empty_channels_count_as_missing() {
        let session = json!({
            "data_streams": [{
                "fiber_connections": [
                    {"fiber_name": "Fiber 0"},
                    {"fiber_name": "Fiber 1", "channel": null},
                    {"fiber_name": "Fiber 2", "channel": ""},
                    {"fiber_name": "Fiber 3", "channel": {"channel_name": "G"}}
                ]
            }]
        });
        assert_eq!(count_fiber_channels(&session), (4, 3));
    }

    #[test]
    fn connections_are_counted_across_streams() {
        let session = json!({
            "data_streams": [
                {"fiber_connections": [{"channel": {"channel_name": "G"}}]},
                {"fiber_connections": [{}]},
                {"other": true}
            ]
        });
        assert_eq!(count_fiber_channels(&session), (2, 1));
    }

    #[test]
    fn assets_without_fiber_connections_are_dropped() {
        let records = vec![
            asset("a", "1.1.2", vec![json!({"channel": {"channel_name": "G"}})]),
            asset("b", "1.0.4", vec![]),
            json!({"_id": "c", "name": "no_session"}),
        ];
        let rows = survey_assets(&records);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].asset_id, "a");
        assert!(!rows[0].missing_channel_data);
    }

    #[test]
    fn breakdown_groups_by_version_and_missing_flag() {
        let records = vec![
            asset("a", "1.1.2", vec![json!({})]),
            asset("b", "1.1.2", vec![json!({})]),
            asset("c", "1.1.2", vec![json!({"channel": {"channel_name": "G"}})]),
        ];
        let breakdown = version_breakdown(&survey_assets(&records));
        assert_eq!(breakdown.len(), 2);
        assert_eq!(breakdown[0]["missing_channel_data"], false);
        assert_eq!(breakdown[0]["count"], 1);
        assert_eq!(breakdown[1]["missing_channel_data"], true);
        assert_eq!(breakdown[1]["count"], 2);
    }

    #[test]
    fn csv_report_has_one_line_per_asset_plus_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("affected.csv");
        let rows = survey_assets(&[asset("a", "1.1.2", vec![json!({})])]);

        write_csv(&path, &rows).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written.lines().count(), 2);
        assert!(written.starts_with("asset_id,name,created,session_version"));
        assert!(written.contains("asset_a"));
    }
}
