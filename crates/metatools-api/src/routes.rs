use crate::{handlers, query, schematic, upgrade, AppState};
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// One router serving every tool, each mounted under its own path prefix.
/// Unmatched paths fall through to the landing page.
pub fn create_router(state: AppState) -> Router {
    let query_tool = Router::new()
        .route("/", get(handlers::landing))
        .route("/query", post(query::run_query));

    let upgrader_tool = Router::new()
        .route("/", get(handlers::landing))
        .route("/upgrade/{identifier}", get(upgrade::upgrade_asset));

    let fiber_viewer = Router::new()
        .route("/", get(handlers::landing))
        .route("/generate", post(schematic::generate_schematic));

    Router::new()
        .route("/", get(handlers::landing))
        .route("/health", get(handlers::health))
        .nest("/query_tool", query_tool)
        .nest("/upgrader", upgrader_tool)
        .nest("/fiber_schematic_viewer", fiber_viewer)
        .fallback(handlers::landing)
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .layer(TraceLayer::new_for_http())
}
