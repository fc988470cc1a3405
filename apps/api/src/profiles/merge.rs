//! Allow-listed field merge for profile submissions.
//!
//! Each known field name maps to one typed setter. Unknown keys and the
//! read-only keys (`id`, `created_at`, `updated_at`) are skipped and reported
//! back to the caller, never applied.

use chrono::NaiveDate;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::models::profile::{Profile, ProfileFields};

const READ_ONLY_FIELDS: [&str; 3] = ["id", "created_at", "updated_at"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MergeError {
    #[error("Profile submission must be a JSON object")]
    NotAnObject,

    #[error("Field {field} must be {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },

    #[error("Missing required profile field(s): {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),
}

/// Profile fields under construction. Every slot is optional until
/// [`ProfileDraft::finish`] checks the required ones.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileDraft {
    pub email: Option<String>,
    pub google_id: Option<Option<String>>,
    pub name: Option<String>,
    pub picture_url: Option<Option<String>>,
    pub age: Option<i32>,
    pub gender: Option<String>,
    pub title: Option<String>,
    pub education: Option<String>,
    pub years_experience: Option<i32>,
    pub income_level: Option<String>,
    pub last_career_change: Option<NaiveDate>,
    pub summary: Option<String>,
    pub personality_traits: Option<Value>,
    pub motivators: Option<Value>,
    pub work_style: Option<Value>,
    pub user_type: Option<String>,
    pub onboarding_completed: Option<bool>,
}

impl From<&Profile> for ProfileDraft {
    fn from(p: &Profile) -> Self {
        let f = ProfileFields::from(p);
        Self {
            email: Some(f.email),
            google_id: Some(f.google_id),
            name: Some(f.name),
            picture_url: Some(f.picture_url),
            age: Some(f.age),
            gender: Some(f.gender),
            title: Some(f.title),
            education: Some(f.education),
            years_experience: Some(f.years_experience),
            income_level: Some(f.income_level),
            last_career_change: Some(f.last_career_change),
            summary: Some(f.summary),
            personality_traits: Some(f.personality_traits),
            motivators: Some(f.motivators),
            work_style: Some(f.work_style),
            user_type: Some(f.user_type),
            onboarding_completed: Some(f.onboarding_completed),
        }
    }
}

impl ProfileDraft {
    /// Applies every allow-listed key of `submission`. Returns the keys that
    /// were skipped. Stops at the first key whose value has the wrong type.
    pub fn merge(&mut self, submission: &Map<String, Value>) -> Result<Vec<String>, MergeError> {
        let mut skipped = Vec::new();
        for (key, value) in submission {
            match key.as_str() {
                "email" => self.email = Some(email(value)?),
                "google_id" => self.google_id = Some(nullable_string("google_id", value)?),
                "name" => self.name = Some(string("name", value)?),
                "picture_url" => self.picture_url = Some(nullable_string("picture_url", value)?),
                "age" => self.age = Some(non_negative("age", value)?),
                "gender" => self.gender = Some(string("gender", value)?),
                "title" => self.title = Some(string("title", value)?),
                "education" => self.education = Some(string("education", value)?),
                "years_experience" => {
                    self.years_experience = Some(non_negative("years_experience", value)?)
                }
                "income_level" => self.income_level = Some(string("income_level", value)?),
                "last_career_change" => {
                    self.last_career_change = Some(date("last_career_change", value)?)
                }
                "summary" => self.summary = Some(string("summary", value)?),
                "personality_traits" => self.personality_traits = Some(trait_scores(value)?),
                "motivators" => self.motivators = Some(array("motivators", value)?),
                "work_style" => self.work_style = Some(object("work_style", value)?),
                "user_type" => self.user_type = Some(string("user_type", value)?),
                "onboarding_completed" => {
                    self.onboarding_completed = Some(boolean("onboarding_completed", value)?)
                }
                _ => skipped.push(key.clone()),
            }
        }
        Ok(skipped)
    }

    /// Produces complete fields, filling optional slots with their defaults.
    pub fn finish(self) -> Result<ProfileFields, MergeError> {
        let mut missing = Vec::new();
        macro_rules! required {
            ($field:ident) => {
                match self.$field {
                    Some(v) => Some(v),
                    None => {
                        missing.push(stringify!($field));
                        None
                    }
                }
            };
        }

        let email = required!(email);
        let name = required!(name);
        let age = required!(age);
        let gender = required!(gender);
        let title = required!(title);
        let education = required!(education);
        let years_experience = required!(years_experience);
        let income_level = required!(income_level);
        let last_career_change = required!(last_career_change);
        let summary = required!(summary);
        let user_type = required!(user_type);

        match (
            email,
            name,
            age,
            gender,
            title,
            education,
            years_experience,
            income_level,
            last_career_change,
            summary,
            user_type,
        ) {
            (
                Some(email),
                Some(name),
                Some(age),
                Some(gender),
                Some(title),
                Some(education),
                Some(years_experience),
                Some(income_level),
                Some(last_career_change),
                Some(summary),
                Some(user_type),
            ) => Ok(ProfileFields {
                email,
                google_id: self.google_id.flatten(),
                name,
                picture_url: self.picture_url.flatten(),
                age,
                gender,
                title,
                education,
                years_experience,
                income_level,
                last_career_change,
                summary,
                personality_traits: self
                    .personality_traits
                    .unwrap_or_else(|| Value::Object(Map::new())),
                motivators: self.motivators.unwrap_or_else(|| Value::Array(vec![])),
                work_style: self.work_style.unwrap_or_else(|| Value::Object(Map::new())),
                user_type,
                onboarding_completed: self.onboarding_completed.unwrap_or(false),
            }),
            _ => Err(MergeError::MissingFields(missing)),
        }
    }
}

/// True for keys the merge never writes because the store owns them.
pub fn is_read_only(key: &str) -> bool {
    READ_ONLY_FIELDS.contains(&key)
}

fn string(field: &'static str, value: &Value) -> Result<String, MergeError> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or(MergeError::WrongType {
            field,
            expected: "a string",
        })
}

fn nullable_string(field: &'static str, value: &Value) -> Result<Option<String>, MergeError> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) if s.is_empty() => Ok(None),
        Value::String(s) => Ok(Some(s.clone())),
        _ => Err(MergeError::WrongType {
            field,
            expected: "a string or null",
        }),
    }
}

fn email(value: &Value) -> Result<String, MergeError> {
    let raw = string("email", value)?;
    let trimmed = raw.trim();
    match trimmed.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => {
            Ok(trimmed.to_string())
        }
        _ => Err(MergeError::WrongType {
            field: "email",
            expected: "a valid email address",
        }),
    }
}

fn non_negative(field: &'static str, value: &Value) -> Result<i32, MergeError> {
    value
        .as_u64()
        .and_then(|n| i32::try_from(n).ok())
        .ok_or(MergeError::WrongType {
            field,
            expected: "a non-negative integer",
        })
}

fn date(field: &'static str, value: &Value) -> Result<NaiveDate, MergeError> {
    value
        .as_str()
        .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
        .ok_or(MergeError::WrongType {
            field,
            expected: "a YYYY-MM-DD date",
        })
}

fn boolean(field: &'static str, value: &Value) -> Result<bool, MergeError> {
    value.as_bool().ok_or(MergeError::WrongType {
        field,
        expected: "a boolean",
    })
}

fn array(field: &'static str, value: &Value) -> Result<Value, MergeError> {
    if value.is_array() {
        Ok(value.clone())
    } else {
        Err(MergeError::WrongType {
            field,
            expected: "an array",
        })
    }
}

fn object(field: &'static str, value: &Value) -> Result<Value, MergeError> {
    if value.is_object() {
        Ok(value.clone())
    } else {
        Err(MergeError::WrongType {
            field,
            expected: "an object",
        })
    }
}

fn trait_scores(value: &Value) -> Result<Value, MergeError> {
    let scores_ok = value
        .as_object()
        .is_some_and(|traits| traits.values().all(Value::is_number));
    if scores_ok {
        Ok(value.clone())
    } else {
        Err(MergeError::WrongType {
            field: "personality_traits",
            expected: "an object of numeric scores",
        })
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use serde_json::json;

    fn submission_map(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_full_submission_builds_fields() {
        let mut draft = ProfileDraft::default();
        let skipped = draft
            .merge(&submission_map(sample_submission("ada@example.com")))
            .unwrap();
        assert!(skipped.is_empty());

        let fields = draft.finish().unwrap();
        assert_eq!(fields.email, "ada@example.com");
        assert_eq!(fields.age, 36);
        assert_eq!(fields.last_career_change.to_string(), "2020-03-01");
        assert_eq!(fields.motivators, json!(["growth", "impact"]));
        assert!(!fields.onboarding_completed);
        assert_eq!(fields.google_id, None);
    }

    #[test]
    fn test_unknown_and_read_only_keys_are_skipped() {
        let mut submission = sample_submission("ada@example.com");
        submission["id"] = json!("00000000-0000-0000-0000-000000000000");
        submission["is_admin"] = json!(true);

        let mut draft = ProfileDraft::default();
        let mut skipped = draft.merge(&submission_map(submission)).unwrap();
        skipped.sort();
        assert_eq!(skipped, vec!["id".to_string(), "is_admin".to_string()]);
        assert!(is_read_only("id"));
        assert!(!is_read_only("is_admin"));
    }

    #[test]
    fn test_missing_required_fields_are_all_listed() {
        let mut draft = ProfileDraft::default();
        draft
            .merge(&submission_map(json!({"email": "x@example.com", "name": "X"})))
            .unwrap();
        let err = draft.finish().unwrap_err();
        match &err {
            MergeError::MissingFields(fields) => {
                assert!(fields.contains(&"age"));
                assert!(fields.contains(&"user_type"));
                assert!(!fields.contains(&"email"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().starts_with("Missing required profile field(s): age"));
    }

    #[test]
    fn test_merge_over_existing_profile_changes_only_submitted_fields() {
        let existing = sample_profile("ada@example.com");
        let mut draft = ProfileDraft::from(&existing);
        draft
            .merge(&submission_map(json!({"title": "Data Scientist", "age": 37})))
            .unwrap();
        let fields = draft.finish().unwrap();
        assert_eq!(fields.title, "Data Scientist");
        assert_eq!(fields.age, 37);
        assert_eq!(fields.summary, existing.summary);
        assert_eq!(fields.email, existing.email);
    }

    #[test]
    fn test_wrong_types_are_rejected() {
        let cases = [
            (json!({"age": "thirty"}), "age"),
            (json!({"age": -1}), "age"),
            (json!({"last_career_change": "03/01/2020"}), "last_career_change"),
            (json!({"motivators": "growth"}), "motivators"),
            (json!({"personality_traits": {"openness": "high"}}), "personality_traits"),
            (json!({"onboarding_completed": "yes"}), "onboarding_completed"),
            (json!({"email": "not-an-email"}), "email"),
        ];
        for (submission, expected_field) in cases {
            let err = ProfileDraft::default()
                .merge(&submission_map(submission))
                .unwrap_err();
            match err {
                MergeError::WrongType { field, .. } => assert_eq!(field, expected_field),
                other => panic!("unexpected error: {other:?}"),
            }
        }
    }

    #[test]
    fn test_nullable_strings_accept_null_and_empty() {
        let mut draft = ProfileDraft::default();
        draft
            .merge(&submission_map(json!({"google_id": null, "picture_url": ""})))
            .unwrap();
        assert_eq!(draft.google_id, Some(None));
        assert_eq!(draft.picture_url, Some(None));
    }
}
