use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::plan::{PlanStatus, PlanView};
use crate::models::request_log::RequestLog;
use crate::planning::export::FileExporter;
use crate::planning::generator::GeneratePlanRequest;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ProfileIdQuery {
    pub profile_id: Option<Uuid>,
}

#[derive(Deserialize)]
pub struct StatusUpdate {
    pub status: PlanStatus,
}

#[derive(Serialize)]
pub struct ExportResponse {
    pub success: bool,
    pub message: String,
    pub file_path: String,
    pub count: usize,
}

/// POST /api/v1/career-plans/generate
///
/// One profile answers with its own result (201 or 400). Several profiles
/// always answer 201 with every per-profile result in order.
pub async fn handle_generate(
    State(state): State<AppState>,
    Json(req): Json<GeneratePlanRequest>,
) -> Result<Response, AppError> {
    if req.user_profiles.is_empty() {
        return Err(AppError::Validation(
            "user_profiles must contain at least one profile".to_string(),
        ));
    }

    info!("Generating plans for {} profile(s)", req.user_profiles.len());
    let mut results = state.generator().generate(&req).await;

    if results.len() == 1 {
        let result = results.remove(0);
        let status = if result.success {
            StatusCode::CREATED
        } else {
            StatusCode::BAD_REQUEST
        };
        return Ok((status, Json(result)).into_response());
    }

    let body = json!({
        "success": true,
        "message": format!("Processed {} user profiles", results.len()),
        "results": results,
    });
    Ok((StatusCode::CREATED, Json(body)).into_response())
}

/// GET /api/v1/career-plans
pub async fn handle_list_plans(
    State(state): State<AppState>,
    Query(params): Query<ProfileIdQuery>,
) -> Result<Json<Vec<PlanView>>, AppError> {
    let plans = state.store.list_plans(params.profile_id).await?;
    Ok(Json(plans.into_iter().map(PlanView::from).collect()))
}

/// GET /api/v1/career-plans/:id
pub async fn handle_get_plan(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PlanView>, AppError> {
    let plan = state
        .store
        .get_plan(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Career plan {id} not found")))?;
    Ok(Json(plan.into()))
}

/// PATCH /api/v1/career-plans/:id/status
pub async fn handle_update_plan_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<StatusUpdate>,
) -> Result<Json<PlanView>, AppError> {
    let plan = state
        .store
        .update_plan_status(id, req.status)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Career plan {id} not found")))?;
    info!("Plan {id} is now {}", plan.status);
    Ok(Json(plan.into()))
}

/// DELETE /api/v1/career-plans/:id
pub async fn handle_delete_plan(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if state.store.delete_plan(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("Career plan {id} not found")))
    }
}

/// GET /api/v1/career-plans/export
pub async fn handle_export_plans(
    State(state): State<AppState>,
) -> Result<Json<ExportResponse>, AppError> {
    let plans: Vec<PlanView> = state
        .store
        .list_plans(None)
        .await?
        .into_iter()
        .map(PlanView::from)
        .collect();
    export_all(&state.exporter, "all_career_plans", "career plans", &plans)
}

/// GET /api/v1/ai-logs
pub async fn handle_list_logs(
    State(state): State<AppState>,
) -> Result<Json<Vec<RequestLog>>, AppError> {
    Ok(Json(state.store.list_request_logs().await?))
}

/// GET /api/v1/ai-logs/:id
pub async fn handle_get_log(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RequestLog>, AppError> {
    state
        .store
        .get_request_log(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("AI request log {id} not found")))
}

/// GET /api/v1/ai-logs/export
pub async fn handle_export_logs(
    State(state): State<AppState>,
) -> Result<Json<ExportResponse>, AppError> {
    let logs = state.store.list_request_logs().await?;
    export_all(&state.exporter, "ai_request_logs", "AI request logs", &logs)
}

fn export_all<T: Serialize>(
    exporter: &FileExporter,
    prefix: &str,
    label: &str,
    items: &[T],
) -> Result<Json<ExportResponse>, AppError> {
    let filename = FileExporter::timestamped_filename(prefix);
    let path = exporter
        .save_json(items, &filename)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to export {label}")))?;
    Ok(Json(ExportResponse {
        success: true,
        message: format!("Exported {} {label}", items.len()),
        file_path: path.display().to_string(),
        count: items.len(),
    }))
}
