use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::{extract::State, Json};
use metatools_schematic::{extract_fiber_implants, render_schematic, ProcedureResolver};
use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
pub struct GenerateRequest {
    pub subject_id: String,
}

#[derive(Serialize)]
pub struct GenerateResponse {
    pub success: bool,
    pub svg: String,
    pub fiber_count: usize,
    pub subject_id: String,
}

/// Generate the fiber implant schematic for a subject.
pub async fn generate_schematic(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> ApiResult<Json<GenerateResponse>> {
    let subject_id = request.subject_id.trim().to_string();
    if subject_id.is_empty() {
        return Err(ApiError::BadRequest("Subject ID is required".to_string()));
    }

    let resolver = ProcedureResolver::new(
        state.store_v2.as_ref(),
        state.store.as_ref(),
        state.procedures.as_ref(),
    );
    let procedures = resolver
        .procedures_for_subject(&subject_id)
        .await?
        .ok_or_else(|| {
            ApiError::NotFound(format!(
                "Could not find a procedures record for subject {}. This subject may not have any data assets in the database yet.",
                subject_id
            ))
        })?;

    let fibers = extract_fiber_implants(&procedures);
    if fibers.is_empty() {
        return Err(ApiError::NotFound(format!(
            "Found procedures record for subject {}, but no fiber implants were found in the procedures data. This subject may not have had fiber implant surgery yet.",
            subject_id
        )));
    }

    let svg = render_schematic(&subject_id, &fibers);
    Ok(Json(GenerateResponse {
        success: true,
        svg,
        fiber_count: fibers.len(),
        subject_id,
    }))
}
