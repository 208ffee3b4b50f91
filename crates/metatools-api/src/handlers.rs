use axum::response::Html;
use axum::Json;
use serde::Serialize;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: option_env!("CARGO_PKG_VERSION")
            .unwrap_or("0.1.0")
            .to_string(),
    })
}

/// Landing page listing the mounted tools. Also serves as the fallback for
/// unmatched paths.
pub async fn landing() -> Html<&'static str> {
    Html(
        r#"<!DOCTYPE html>
<html>
<head><title>AIND Tools</title></head>
<body>
<h1>AIND Tools</h1>
<ul>
    <li><a href="/query_tool">Query Tool</a></li>
    <li><a href="/fiber_schematic_viewer">Fiber Schematic Viewer</a></li>
    <li><a href="/upgrader">Metadata Upgrader Tool</a></li>
</ul>
</body>
</html>
"#,
    )
}
