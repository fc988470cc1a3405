use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// Lifecycle of a career plan. Plans are created as `Draft`; every other
/// transition is made by the caller through the plans API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    #[default]
    Draft,
    Active,
    Completed,
    Archived,
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Archived => "archived",
        };
        f.write_str(s)
    }
}

/// An AI-generated career transformation plan owned by one profile.
///
/// `milestones` and `weekly_plans` hold the validated JSON objects exactly as
/// the model returned them, in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Plan {
    pub id: Uuid,
    pub profile_id: Uuid,
    pub goal_id: String,
    pub plan_description: String,
    pub blockers: Value,
    pub milestones: Value,
    pub weekly_plans: Value,
    pub user_prompt: String,
    pub ai_model_used: String,
    pub tokens_used: i32,
    /// seconds
    pub processing_time: f64,
    pub status: PlanStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Plan {
    pub fn milestones_count(&self) -> usize {
        self.milestones.as_array().map_or(0, Vec::len)
    }

    pub fn weekly_plans_count(&self) -> usize {
        self.weekly_plans.as_array().map_or(0, Vec::len)
    }

    /// Sum of every week's `weekly_time_commitment`. Non-numeric values count as zero.
    pub fn total_time_commitment(&self) -> f64 {
        self.weekly_plans
            .as_array()
            .map(|weeks| {
                weeks
                    .iter()
                    .filter_map(|w| w.get("weekly_time_commitment").and_then(Value::as_f64))
                    .sum()
            })
            .unwrap_or(0.0)
    }
}

/// Insert payload for a freshly validated plan.
#[derive(Debug, Clone)]
pub struct NewPlan {
    pub profile_id: Uuid,
    pub goal_id: String,
    pub plan_description: String,
    pub blockers: Value,
    pub milestones: Value,
    pub weekly_plans: Value,
    pub user_prompt: String,
    pub ai_model_used: String,
    pub tokens_used: i32,
    pub processing_time: f64,
}

/// Plan plus the derived counters returned by the API.
#[derive(Debug, Clone, Serialize)]
pub struct PlanView {
    #[serde(flatten)]
    pub plan: Plan,
    pub milestones_count: usize,
    pub weekly_plans_count: usize,
    pub total_time_commitment: f64,
}

impl From<Plan> for PlanView {
    fn from(plan: Plan) -> Self {
        Self {
            milestones_count: plan.milestones_count(),
            weekly_plans_count: plan.weekly_plans_count(),
            total_time_commitment: plan.total_time_commitment(),
            plan,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn plan_with_weeks(weeks: Value) -> Plan {
        let now = Utc::now();
        Plan {
            id: Uuid::new_v4(),
            profile_id: Uuid::new_v4(),
            goal_id: "goal".into(),
            plan_description: "desc".into(),
            blockers: json!([]),
            milestones: json!([{}, {}]),
            weekly_plans: weeks,
            user_prompt: String::new(),
            ai_model_used: "gpt-3.5-turbo".into(),
            tokens_used: 0,
            processing_time: 0.0,
            status: PlanStatus::Draft,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_total_time_commitment_sums_numeric_weeks() {
        let plan = plan_with_weeks(json!([
            {"weekly_time_commitment": 120},
            {"weekly_time_commitment": 90.5},
            {"weekly_time_commitment": "lots"},
            {}
        ]));
        assert_eq!(plan.total_time_commitment(), 210.5);
        assert_eq!(plan.weekly_plans_count(), 4);
        assert_eq!(plan.milestones_count(), 2);
    }

    #[test]
    fn test_counts_are_zero_for_non_arrays() {
        let mut plan = plan_with_weeks(json!(null));
        plan.milestones = json!({});
        assert_eq!(plan.weekly_plans_count(), 0);
        assert_eq!(plan.milestones_count(), 0);
        assert_eq!(plan.total_time_commitment(), 0.0);
    }

    #[test]
    fn test_plan_status_display_matches_stored_text() {
        assert_eq!(PlanStatus::Draft.to_string(), "draft");
        assert_eq!(PlanStatus::Archived.to_string(), "archived");
        assert_eq!(PlanStatus::default(), PlanStatus::Draft);
    }

    #[test]
    fn test_plan_view_flattens_plan_fields() {
        let view = PlanView::from(plan_with_weeks(json!([{"weekly_time_commitment": 60}])));
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["status"], "draft");
        assert_eq!(json["weekly_plans_count"], 1);
        assert_eq!(json["total_time_commitment"], 60.0);
    }
}
