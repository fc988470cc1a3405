//! Career background records attached to a profile: skills, education, work
//! history, goals, and the history of JSON imports that filled them.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SkillCategory {
    #[default]
    Technical,
    Soft,
    Language,
    Framework,
    Tool,
    Certification,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum GoalPriority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
    OnHold,
}

/// Catalog entry shared by every profile. `name` is unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Skill {
    pub id: Uuid,
    pub name: String,
    pub category: SkillCategory,
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewSkill {
    pub name: String,
    pub category: SkillCategory,
    #[serde(default)]
    pub description: String,
}

/// A profile's proficiency in one catalog skill. One row per (profile, skill).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct UserSkill {
    pub id: Uuid,
    pub profile_id: Uuid,
    pub skill_id: Uuid,
    pub skill_name: String,
    pub skill_category: SkillCategory,
    /// 1 = beginner, 5 = expert
    pub proficiency_level: i32,
    pub years_of_experience: i32,
    pub is_current: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewUserSkill {
    pub skill_id: Uuid,
    pub proficiency_level: i32,
    #[serde(default)]
    pub years_of_experience: i32,
    #[serde(default = "default_true")]
    pub is_current: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Education {
    pub id: Uuid,
    pub profile_id: Uuid,
    pub institution: String,
    pub degree: String,
    pub field_of_study: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub gpa: Option<f64>,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewEducation {
    pub institution: String,
    pub degree: String,
    pub field_of_study: String,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub gpa: Option<f64>,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct WorkExperience {
    pub id: Uuid,
    pub profile_id: Uuid,
    pub company: String,
    pub position: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub is_current: bool,
    pub description: String,
    pub achievements: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewWorkExperience {
    pub company: String,
    pub position: String,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub is_current: bool,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub achievements: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct CareerGoal {
    pub id: Uuid,
    pub profile_id: Uuid,
    pub title: String,
    pub description: String,
    pub target_date: Option<NaiveDate>,
    pub priority: GoalPriority,
    pub status: GoalStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewCareerGoal {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub target_date: Option<NaiveDate>,
    #[serde(default)]
    pub priority: GoalPriority,
    #[serde(default)]
    pub status: GoalStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ImportType {
    Skills,
    Education,
    Experience,
    Goals,
    Profile,
    /// Mixed records, each naming its own kind under `"type"`.
    Bulk,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ImportFileType {
    Csv,
    Excel,
    Json,
    Xml,
}

impl ImportFileType {
    /// Classifies an upload by its extension.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let ext = name.rsplit_once('.')?.1.to_ascii_lowercase();
        match ext.as_str() {
            "csv" => Some(Self::Csv),
            "xlsx" | "xls" => Some(Self::Excel),
            "json" => Some(Self::Json),
            "xml" => Some(Self::Xml),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ImportStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
}

/// One import run. Counters and `error_log` are filled in as records are
/// processed; `completed_at` is set only when the run completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct DataImport {
    pub id: Uuid,
    pub profile_id: Uuid,
    pub file_name: String,
    pub file_type: ImportFileType,
    pub import_type: ImportType,
    pub status: ImportStatus,
    pub records_processed: i32,
    pub records_successful: i32,
    pub records_failed: i32,
    pub error_log: String,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewDataImport {
    pub file_name: String,
    pub file_type: ImportFileType,
    pub import_type: ImportType,
}
