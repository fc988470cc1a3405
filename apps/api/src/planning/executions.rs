//! Plan executions: per-task progress tracking for a stored plan.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::execution::{ExecutionProgress, NewPlanExecution, PlanExecution};
use crate::planning::validation::MAX_FOCUS_AREAS;
use crate::state::AppState;

/// Same focus-area cap as weekly plans, plus basic range checks.
pub fn validate_new_execution(execution: &NewPlanExecution) -> Result<(), AppError> {
    if execution.focus_areas.len() > MAX_FOCUS_AREAS {
        return Err(AppError::Validation(format!(
            "Maximum {MAX_FOCUS_AREAS} focus areas allowed per week, got {}",
            execution.focus_areas.len()
        )));
    }
    if execution.milestone_order < 1 || execution.week_number < 1 {
        return Err(AppError::Validation(
            "milestone_order and week_number must be positive".to_string(),
        ));
    }
    if execution.time_commitment < 0 {
        return Err(AppError::Validation(
            "time_commitment must not be negative".to_string(),
        ));
    }
    if execution.planned_end_date < execution.planned_start_date {
        return Err(AppError::Validation(
            "planned_end_date must not be before planned_start_date".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_progress(progress: &ExecutionProgress) -> Result<(), AppError> {
    if let Some(pct) = progress.completion_percentage {
        if !(0..=100).contains(&pct) {
            return Err(AppError::Validation(format!(
                "completion_percentage must be between 0 and 100, got {pct}"
            )));
        }
    }
    Ok(())
}

#[derive(Deserialize)]
pub struct PlanIdQuery {
    pub plan_id: Option<Uuid>,
}

/// POST /api/v1/plan-executions
pub async fn handle_create_execution(
    State(state): State<AppState>,
    Json(req): Json<NewPlanExecution>,
) -> Result<(StatusCode, Json<PlanExecution>), AppError> {
    validate_new_execution(&req)?;
    let execution = state.store.insert_execution(&req).await?;
    info!(
        "Created execution {} for plan {} (milestone {}, week {}/{})",
        execution.id, execution.plan_id, execution.milestone_order, execution.week_number, execution.year
    );
    Ok((StatusCode::CREATED, Json(execution)))
}

/// GET /api/v1/plan-executions
pub async fn handle_list_executions(
    State(state): State<AppState>,
    Query(params): Query<PlanIdQuery>,
) -> Result<Json<Vec<PlanExecution>>, AppError> {
    Ok(Json(state.store.list_executions(params.plan_id).await?))
}

/// GET /api/v1/plan-executions/:id
pub async fn handle_get_execution(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PlanExecution>, AppError> {
    state
        .store
        .get_execution(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Plan execution {id} not found")))
}

/// PATCH /api/v1/plan-executions/:id
pub async fn handle_update_execution(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(progress): Json<ExecutionProgress>,
) -> Result<Json<PlanExecution>, AppError> {
    validate_progress(&progress)?;
    state
        .store
        .update_execution(id, &progress)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Plan execution {id} not found")))
}
