use crate::error::ApiResult;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use metatools_core::{AssetIdentifier, UpgradeReport};
use metatools_upgrade::UpgradeTester;
use serde::Deserialize;

#[derive(Deserialize)]
pub struct UpgradeParams {
    /// `id`, `name`, or absent for name-then-id resolution.
    pub identifier_type: Option<String>,
}

/// Run the two-step upgrade test for one asset. The identifier lives in
/// the URL so result views are shareable links.
pub async fn upgrade_asset(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
    Query(params): Query<UpgradeParams>,
) -> ApiResult<Json<UpgradeReport>> {
    let identifier =
        AssetIdentifier::from_type(identifier, params.identifier_type.as_deref());
    let tester = UpgradeTester::new(state.upgrader.clone());
    let report = tester.test_asset(state.store.as_ref(), &identifier).await?;
    Ok(Json(report))
}
