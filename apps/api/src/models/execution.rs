use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
    Skipped,
}

/// Progress on one task of a plan, keyed by milestone and week.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct PlanExecution {
    pub id: Uuid,
    pub plan_id: Uuid,
    pub milestone_order: i32,
    pub milestone_title: String,
    pub week_number: i32,
    pub year: i32,
    pub task_description: String,
    pub focus_areas: Value,
    /// minutes
    pub time_commitment: i32,
    pub status: ExecutionStatus,
    pub completion_percentage: i32,
    pub notes: String,
    pub planned_start_date: NaiveDate,
    pub planned_end_date: NaiveDate,
    pub actual_start_date: Option<NaiveDate>,
    pub actual_completion_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPlanExecution {
    pub plan_id: Uuid,
    pub milestone_order: i32,
    pub milestone_title: String,
    pub week_number: i32,
    pub year: i32,
    pub task_description: String,
    #[serde(default)]
    pub focus_areas: Vec<String>,
    pub time_commitment: i32,
    pub planned_start_date: NaiveDate,
    pub planned_end_date: NaiveDate,
}

/// Partial update of execution progress. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExecutionProgress {
    pub status: Option<ExecutionStatus>,
    pub completion_percentage: Option<i32>,
    pub notes: Option<String>,
    pub actual_start_date: Option<NaiveDate>,
    pub actual_completion_date: Option<NaiveDate>,
}
