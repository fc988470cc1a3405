//! Plan Validator — schema check for model-generated career plans.
//!
//! The model is not trusted to follow the requested shape, so every reply is
//! checked against a fixed contract before anything is stored:
//!
//! 1. top-level `goal_id`, `plan_description`, `blockers`, `milestones`, `weekly_plans`
//! 2. exactly [`MILESTONE_COUNT`] milestones
//! 3. every milestone carries [`MILESTONE_FIELDS`]
//! 4. exactly [`WEEKLY_PLAN_COUNT`] weekly plans
//! 5. every weekly plan carries [`WEEKLY_PLAN_FIELDS`]
//! 6. at most [`MAX_FOCUS_AREAS`] focus areas per week
//!
//! Checks run in that order and stop at the first violation. Nothing is
//! coerced or trimmed to fit.

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

pub const MILESTONE_COUNT: usize = 4;
pub const WEEKLY_PLAN_COUNT: usize = 12;
pub const MAX_FOCUS_AREAS: usize = 5;

pub const TOP_LEVEL_FIELDS: [&str; 5] = [
    "goal_id",
    "plan_description",
    "blockers",
    "milestones",
    "weekly_plans",
];

pub const MILESTONE_FIELDS: [&str; 4] = ["milestone_order", "title", "description", "target_date"];

pub const WEEKLY_PLAN_FIELDS: [&str; 7] = [
    "week_number",
    "year",
    "week_start_date",
    "week_end_date",
    "weekly_objective",
    "focus_areas",
    "weekly_time_commitment",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaErrorKind {
    NotAnObject,
    MissingField,
    WrongType,
    MilestoneCount,
    MilestoneField,
    WeeklyPlanCount,
    WeeklyPlanField,
    TooManyFocusAreas,
}

/// Indices in messages are 1-based, matching how weeks and milestones are numbered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("Plan document must be a JSON object")]
    NotAnObject,

    #[error("Missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("Field {field} must be {expected}")]
    WrongType {
        field: String,
        expected: &'static str,
    },

    #[error("Expected exactly {expected} milestones, got {actual}")]
    MilestoneCount { expected: usize, actual: usize },

    #[error("Milestone {index} missing required field: {field}")]
    MilestoneField { index: usize, field: &'static str },

    #[error("Expected exactly {expected} weekly plans, got {actual}")]
    WeeklyPlanCount { expected: usize, actual: usize },

    #[error("Weekly plan {index} missing required field: {field}")]
    WeeklyPlanField { index: usize, field: &'static str },

    #[error("Weekly plan {index} has more than {max} focus areas: {count}")]
    TooManyFocusAreas {
        index: usize,
        count: usize,
        max: usize,
    },
}

impl SchemaError {
    pub fn kind(&self) -> SchemaErrorKind {
        match self {
            SchemaError::NotAnObject => SchemaErrorKind::NotAnObject,
            SchemaError::MissingField { .. } => SchemaErrorKind::MissingField,
            SchemaError::WrongType { .. } => SchemaErrorKind::WrongType,
            SchemaError::MilestoneCount { .. } => SchemaErrorKind::MilestoneCount,
            SchemaError::MilestoneField { .. } => SchemaErrorKind::MilestoneField,
            SchemaError::WeeklyPlanCount { .. } => SchemaErrorKind::WeeklyPlanCount,
            SchemaError::WeeklyPlanField { .. } => SchemaErrorKind::WeeklyPlanField,
            SchemaError::TooManyFocusAreas { .. } => SchemaErrorKind::TooManyFocusAreas,
        }
    }
}

/// A document that passed every check. Milestones and weekly plans are the
/// model's objects verbatim, in their original order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanDocument {
    pub goal_id: String,
    pub plan_description: String,
    pub blockers: Vec<Value>,
    pub milestones: Vec<Value>,
    pub weekly_plans: Vec<Value>,
}

pub fn validate_plan_document(doc: &Value) -> Result<PlanDocument, SchemaError> {
    let obj = doc.as_object().ok_or(SchemaError::NotAnObject)?;

    // Rule 1
    for field in TOP_LEVEL_FIELDS {
        if !obj.contains_key(field) {
            return Err(SchemaError::MissingField { field });
        }
    }

    // Rules 2 and 3
    let milestones = array_field(obj, "milestones")?;
    if milestones.len() != MILESTONE_COUNT {
        return Err(SchemaError::MilestoneCount {
            expected: MILESTONE_COUNT,
            actual: milestones.len(),
        });
    }
    for (i, milestone) in milestones.iter().enumerate() {
        let index = i + 1;
        let entry = milestone.as_object().ok_or_else(|| SchemaError::WrongType {
            field: format!("milestones[{index}]"),
            expected: "an object",
        })?;
        if let Some(field) = first_missing(entry, &MILESTONE_FIELDS) {
            return Err(SchemaError::MilestoneField { index, field });
        }
    }

    // Rules 4, 5 and 6
    let weekly_plans = array_field(obj, "weekly_plans")?;
    if weekly_plans.len() != WEEKLY_PLAN_COUNT {
        return Err(SchemaError::WeeklyPlanCount {
            expected: WEEKLY_PLAN_COUNT,
            actual: weekly_plans.len(),
        });
    }
    for (i, week) in weekly_plans.iter().enumerate() {
        let index = i + 1;
        let entry = week.as_object().ok_or_else(|| SchemaError::WrongType {
            field: format!("weekly_plans[{index}]"),
            expected: "an object",
        })?;
        if let Some(field) = first_missing(entry, &WEEKLY_PLAN_FIELDS) {
            return Err(SchemaError::WeeklyPlanField { index, field });
        }
        let focus_areas = entry["focus_areas"]
            .as_array()
            .ok_or_else(|| SchemaError::WrongType {
                field: format!("weekly_plans[{index}].focus_areas"),
                expected: "an array",
            })?;
        if focus_areas.len() > MAX_FOCUS_AREAS {
            return Err(SchemaError::TooManyFocusAreas {
                index,
                count: focus_areas.len(),
                max: MAX_FOCUS_AREAS,
            });
        }
    }

    let plan_description = obj["plan_description"]
        .as_str()
        .ok_or_else(|| SchemaError::WrongType {
            field: "plan_description".to_string(),
            expected: "a string",
        })?
        .to_string();
    let blockers = array_field(obj, "blockers")?.clone();

    Ok(PlanDocument {
        goal_id: goal_id_text(&obj["goal_id"]),
        plan_description,
        blockers,
        milestones: milestones.clone(),
        weekly_plans: weekly_plans.clone(),
    })
}

fn array_field<'a>(obj: &'a Map<String, Value>, field: &str) -> Result<&'a Vec<Value>, SchemaError> {
    obj[field].as_array().ok_or_else(|| SchemaError::WrongType {
        field: field.to_string(),
        expected: "an array",
    })
}

fn first_missing(entry: &Map<String, Value>, required: &[&'static str]) -> Option<&'static str> {
    required.iter().copied().find(|f| !entry.contains_key(*f))
}

/// The goal id is opaque: strings are kept as-is, anything else keeps its JSON text.
fn goal_id_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use serde_json::json;

    #[test]
    fn test_valid_document_is_accepted_verbatim() {
        let doc = valid_plan_json();
        let plan = validate_plan_document(&doc).unwrap();
        assert_eq!(plan.goal_id, "goal-123");
        assert_eq!(plan.milestones.len(), 4);
        assert_eq!(plan.weekly_plans.len(), 12);
        assert_eq!(&Value::Array(plan.milestones.clone()), &doc["milestones"]);
        assert_eq!(&Value::Array(plan.weekly_plans.clone()), &doc["weekly_plans"]);
        assert_eq!(plan.blockers.len(), 2);
    }

    #[test]
    fn test_extra_keys_survive_validation() {
        let mut doc = valid_plan_json();
        doc["milestones"][0]["owner"] = json!("me");
        let plan = validate_plan_document(&doc).unwrap();
        assert_eq!(plan.milestones[0]["owner"], "me");
    }

    #[test]
    fn test_each_missing_top_level_field_is_named() {
        for field in TOP_LEVEL_FIELDS {
            let mut doc = valid_plan_json();
            doc.as_object_mut().unwrap().remove(field);
            let err = validate_plan_document(&doc).unwrap_err();
            assert_eq!(err, SchemaError::MissingField { field });
            assert!(err.to_string().contains(field));
        }
    }

    #[test]
    fn test_non_object_document_rejected() {
        let err = validate_plan_document(&json!([1, 2, 3])).unwrap_err();
        assert_eq!(err.kind(), SchemaErrorKind::NotAnObject);
    }

    #[test]
    fn test_three_milestones_rejected_with_counts() {
        let mut doc = valid_plan_json();
        doc["milestones"].as_array_mut().unwrap().pop();
        let err = validate_plan_document(&doc).unwrap_err();
        assert_eq!(err, SchemaError::MilestoneCount { expected: 4, actual: 3 });
        let msg = err.to_string();
        assert!(msg.contains('4') && msg.contains('3'), "{msg}");
    }

    #[test]
    fn test_five_milestones_rejected_with_counts() {
        let mut doc = valid_plan_json();
        doc["milestones"].as_array_mut().unwrap().push(milestone(5));
        let err = validate_plan_document(&doc).unwrap_err();
        assert_eq!(err, SchemaError::MilestoneCount { expected: 4, actual: 5 });
    }

    #[test]
    fn test_milestone_missing_field_names_index_and_field() {
        let mut doc = valid_plan_json();
        doc["milestones"][2].as_object_mut().unwrap().remove("target_date");
        let err = validate_plan_document(&doc).unwrap_err();
        assert_eq!(
            err,
            SchemaError::MilestoneField {
                index: 3,
                field: "target_date"
            }
        );
        assert_eq!(err.to_string(), "Milestone 3 missing required field: target_date");
    }

    #[test]
    fn test_milestone_order_is_presence_only() {
        let mut doc = valid_plan_json();
        doc["milestones"][0]["milestone_order"] = json!(10);
        doc["milestones"][1]["milestone_order"] = json!("second");
        assert!(validate_plan_document(&doc).is_ok());
    }

    #[test]
    fn test_eleven_weekly_plans_rejected() {
        let mut doc = valid_plan_json();
        doc["weekly_plans"].as_array_mut().unwrap().pop();
        let err = validate_plan_document(&doc).unwrap_err();
        assert_eq!(
            err,
            SchemaError::WeeklyPlanCount {
                expected: 12,
                actual: 11
            }
        );
    }

    #[test]
    fn test_weekly_plan_missing_field_names_index_and_field() {
        let mut doc = valid_plan_json();
        doc["weekly_plans"][11]
            .as_object_mut()
            .unwrap()
            .remove("weekly_time_commitment");
        let err = validate_plan_document(&doc).unwrap_err();
        assert_eq!(
            err,
            SchemaError::WeeklyPlanField {
                index: 12,
                field: "weekly_time_commitment"
            }
        );
    }

    #[test]
    fn test_six_focus_areas_rejected_with_week_and_count() {
        let mut doc = valid_plan_json();
        doc["weekly_plans"][4] = weekly_plan(5, 6);
        let err = validate_plan_document(&doc).unwrap_err();
        assert_eq!(
            err,
            SchemaError::TooManyFocusAreas {
                index: 5,
                count: 6,
                max: 5
            }
        );
        assert_eq!(
            err.to_string(),
            "Weekly plan 5 has more than 5 focus areas: 6"
        );
    }

    #[test]
    fn test_exactly_five_focus_areas_accepted() {
        let mut doc = valid_plan_json();
        doc["weekly_plans"][0] = weekly_plan(1, 5);
        assert!(validate_plan_document(&doc).is_ok());
    }

    #[test]
    fn test_milestone_errors_win_over_weekly_errors() {
        let mut doc = valid_plan_json();
        doc["milestones"].as_array_mut().unwrap().pop();
        doc["weekly_plans"].as_array_mut().unwrap().clear();
        let err = validate_plan_document(&doc).unwrap_err();
        assert_eq!(err.kind(), SchemaErrorKind::MilestoneCount);
    }

    #[test]
    fn test_focus_areas_must_be_array() {
        let mut doc = valid_plan_json();
        doc["weekly_plans"][0]["focus_areas"] = json!("networking");
        let err = validate_plan_document(&doc).unwrap_err();
        assert_eq!(err.kind(), SchemaErrorKind::WrongType);
    }

    #[test]
    fn test_numeric_goal_id_keeps_json_text() {
        let mut doc = valid_plan_json();
        doc["goal_id"] = json!(42);
        assert_eq!(validate_plan_document(&doc).unwrap().goal_id, "42");
    }
}
