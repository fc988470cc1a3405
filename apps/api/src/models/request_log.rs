use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RequestType {
    PlanGeneration,
    PlanRefinement,
    MilestoneUpdate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Success,
    Error,
    Partial,
}

/// Audit record of one model invocation. Insert-only.
///
/// `profile_id` is a weak reference: it is `None` when the profile never
/// committed or was deleted later. `profile_email` always names the submitter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct RequestLog {
    pub id: Uuid,
    pub profile_id: Option<Uuid>,
    pub profile_email: String,
    pub plan_id: Option<Uuid>,
    pub request_type: RequestType,
    pub input_data: Value,
    pub output_data: Value,
    pub ai_model: String,
    pub tokens_used: i32,
    pub processing_time: f64,
    pub status: RequestStatus,
    pub error_message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewRequestLog {
    pub profile_id: Option<Uuid>,
    pub profile_email: String,
    pub plan_id: Option<Uuid>,
    pub request_type: RequestType,
    pub input_data: Value,
    pub output_data: Value,
    pub ai_model: String,
    pub tokens_used: i32,
    pub processing_time: f64,
    pub status: RequestStatus,
    pub error_message: String,
}
