use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// A stored career profile. `email` is unique across the table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    pub google_id: Option<String>,
    pub name: String,
    pub picture_url: Option<String>,
    pub age: i32,
    pub gender: String,
    pub title: String,
    pub education: String,
    pub years_experience: i32,
    pub income_level: String,
    pub last_career_change: NaiveDate,
    pub summary: String,
    /// trait name → numeric score
    pub personality_traits: Value,
    /// ordered motivator tags
    pub motivators: Value,
    /// preference name → value
    pub work_style: Value,
    pub user_type: String,
    pub onboarding_completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The writable part of a profile. Built from a submission by
/// `profiles::merge`, then inserted or written over an existing row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileFields {
    pub email: String,
    pub google_id: Option<String>,
    pub name: String,
    pub picture_url: Option<String>,
    pub age: i32,
    pub gender: String,
    pub title: String,
    pub education: String,
    pub years_experience: i32,
    pub income_level: String,
    pub last_career_change: NaiveDate,
    pub summary: String,
    pub personality_traits: Value,
    pub motivators: Value,
    pub work_style: Value,
    pub user_type: String,
    pub onboarding_completed: bool,
}

impl From<&Profile> for ProfileFields {
    fn from(p: &Profile) -> Self {
        Self {
            email: p.email.clone(),
            google_id: p.google_id.clone(),
            name: p.name.clone(),
            picture_url: p.picture_url.clone(),
            age: p.age,
            gender: p.gender.clone(),
            title: p.title.clone(),
            education: p.education.clone(),
            years_experience: p.years_experience,
            income_level: p.income_level.clone(),
            last_career_change: p.last_career_change,
            summary: p.summary.clone(),
            personality_traits: p.personality_traits.clone(),
            motivators: p.motivators.clone(),
            work_style: p.work_style.clone(),
            user_type: p.user_type.clone(),
            onboarding_completed: p.onboarding_completed,
        }
    }
}

impl Profile {
    /// Materializes a profile from writable fields without touching storage.
    /// Postgres fills `id` and the timestamps itself on insert.
    pub fn from_fields(id: Uuid, fields: ProfileFields, now: DateTime<Utc>) -> Self {
        Self {
            id,
            email: fields.email,
            google_id: fields.google_id,
            name: fields.name,
            picture_url: fields.picture_url,
            age: fields.age,
            gender: fields.gender,
            title: fields.title,
            education: fields.education,
            years_experience: fields.years_experience,
            income_level: fields.income_level,
            last_career_change: fields.last_career_change,
            summary: fields.summary,
            personality_traits: fields.personality_traits,
            motivators: fields.motivators,
            work_style: fields.work_style,
            user_type: fields.user_type,
            onboarding_completed: fields.onboarding_completed,
            created_at: now,
            updated_at: now,
        }
    }
}
