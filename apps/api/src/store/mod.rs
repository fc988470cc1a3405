//! Storage seam for profiles, plans, executions, request logs and the
//! career background records (skills, education, experience, goals, imports).
//!
//! Writes that must commit together (profile upsert + plan creation) go
//! through a [`StoreTx`] obtained from [`PlannerStore::begin`]. Dropping a
//! transaction without calling `commit` discards its writes.
//!
//! `AppState` holds an `Arc<dyn PlannerStore>`; production uses [`PgStore`].

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::background::{
    CareerGoal, DataImport, Education, NewCareerGoal, NewDataImport, NewEducation, NewSkill,
    NewUserSkill, NewWorkExperience, Skill, SkillCategory, UserSkill, WorkExperience,
};
use crate::models::execution::{ExecutionProgress, NewPlanExecution, PlanExecution};
use crate::models::plan::{NewPlan, Plan, PlanStatus};
use crate::models::profile::{Profile, ProfileFields};
use crate::models::request_log::{NewRequestLog, RequestLog};

#[cfg(test)]
pub mod memory;
pub mod postgres;

pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Writes scoped to one all-or-nothing unit of work.
#[async_trait]
pub trait StoreTx: Send {
    async fn find_profile_by_email(&mut self, email: &str) -> StoreResult<Option<Profile>>;

    async fn find_profile(&mut self, id: Uuid) -> StoreResult<Option<Profile>>;

    async fn insert_profile(&mut self, fields: &ProfileFields) -> StoreResult<Profile>;

    async fn update_profile(&mut self, id: Uuid, fields: &ProfileFields) -> StoreResult<Profile>;

    async fn insert_plan(&mut self, plan: &NewPlan) -> StoreResult<Plan>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;
}

#[async_trait]
pub trait PlannerStore: BackgroundStore + Send + Sync {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>>;

    // Profiles

    async fn list_profiles(&self) -> StoreResult<Vec<Profile>>;

    async fn get_profile(&self, id: Uuid) -> StoreResult<Option<Profile>>;

    /// Unlocked read, for work that must not hold a transaction open.
    async fn find_profile_by_email(&self, email: &str) -> StoreResult<Option<Profile>>;

    /// Deletes the profile and, by cascade, its plans. Request logs are kept
    /// with `profile_id` cleared. Returns false when absent.
    async fn delete_profile(&self, id: Uuid) -> StoreResult<bool>;

    // Plans

    async fn list_plans(&self, profile_id: Option<Uuid>) -> StoreResult<Vec<Plan>>;

    async fn get_plan(&self, id: Uuid) -> StoreResult<Option<Plan>>;

    async fn update_plan_status(&self, id: Uuid, status: PlanStatus) -> StoreResult<Option<Plan>>;

    async fn delete_plan(&self, id: Uuid) -> StoreResult<bool>;

    // Plan executions

    async fn insert_execution(&self, execution: &NewPlanExecution) -> StoreResult<PlanExecution>;

    async fn list_executions(&self, plan_id: Option<Uuid>) -> StoreResult<Vec<PlanExecution>>;

    async fn get_execution(&self, id: Uuid) -> StoreResult<Option<PlanExecution>>;

    async fn update_execution(
        &self,
        id: Uuid,
        progress: &ExecutionProgress,
    ) -> StoreResult<Option<PlanExecution>>;

    // Request logs (insert-only)

    /// Fails with `NotFound` when `profile_id` or `plan_id` names a missing row.
    async fn append_request_log(&self, entry: &NewRequestLog) -> StoreResult<RequestLog>;

    /// Newest first.
    async fn list_request_logs(&self) -> StoreResult<Vec<RequestLog>>;

    async fn get_request_log(&self, id: Uuid) -> StoreResult<Option<RequestLog>>;
}

/// Background records owned by a profile. Deleting the profile deletes them.
///
/// `insert_*` fail with `NotFound` when the profile (or skill) is missing.
/// `update_*` write every column of the given row and return `None` when
/// the row is gone.
#[async_trait]
pub trait BackgroundStore: Send + Sync {
    // Skill catalog

    async fn list_skills(&self) -> StoreResult<Vec<Skill>>;

    async fn get_skill(&self, id: Uuid) -> StoreResult<Option<Skill>>;

    /// `Conflict` when the name is taken.
    async fn insert_skill(&self, skill: &NewSkill) -> StoreResult<Skill>;

    /// The skill called `name`, created with `category` when absent.
    async fn find_or_create_skill(&self, name: &str, category: SkillCategory) -> StoreResult<Skill>;

    async fn delete_skill(&self, id: Uuid) -> StoreResult<bool>;

    // Profile skills

    async fn list_user_skills(&self, profile_id: Uuid) -> StoreResult<Vec<UserSkill>>;

    async fn get_user_skill(&self, id: Uuid) -> StoreResult<Option<UserSkill>>;

    /// `Conflict` when the profile already has this skill.
    async fn insert_user_skill(
        &self,
        profile_id: Uuid,
        skill: &NewUserSkill,
    ) -> StoreResult<UserSkill>;

    async fn update_user_skill(&self, skill: &UserSkill) -> StoreResult<Option<UserSkill>>;

    async fn delete_user_skill(&self, id: Uuid) -> StoreResult<bool>;

    // Education

    async fn list_education(&self, profile_id: Uuid) -> StoreResult<Vec<Education>>;

    async fn get_education(&self, id: Uuid) -> StoreResult<Option<Education>>;

    async fn insert_education(
        &self,
        profile_id: Uuid,
        education: &NewEducation,
    ) -> StoreResult<Education>;

    async fn update_education(&self, education: &Education) -> StoreResult<Option<Education>>;

    async fn delete_education(&self, id: Uuid) -> StoreResult<bool>;

    // Work experience

    async fn list_experience(&self, profile_id: Uuid) -> StoreResult<Vec<WorkExperience>>;

    async fn get_experience(&self, id: Uuid) -> StoreResult<Option<WorkExperience>>;

    async fn insert_experience(
        &self,
        profile_id: Uuid,
        experience: &NewWorkExperience,
    ) -> StoreResult<WorkExperience>;

    async fn update_experience(
        &self,
        experience: &WorkExperience,
    ) -> StoreResult<Option<WorkExperience>>;

    async fn delete_experience(&self, id: Uuid) -> StoreResult<bool>;

    // Career goals

    async fn list_goals(&self, profile_id: Uuid) -> StoreResult<Vec<CareerGoal>>;

    async fn get_goal(&self, id: Uuid) -> StoreResult<Option<CareerGoal>>;

    async fn insert_goal(&self, profile_id: Uuid, goal: &NewCareerGoal) -> StoreResult<CareerGoal>;

    async fn update_goal(&self, goal: &CareerGoal) -> StoreResult<Option<CareerGoal>>;

    async fn delete_goal(&self, id: Uuid) -> StoreResult<bool>;

    // Imports

    /// Newest first.
    async fn list_imports(&self, profile_id: Uuid) -> StoreResult<Vec<DataImport>>;

    async fn get_import(&self, id: Uuid) -> StoreResult<Option<DataImport>>;

    /// Starts a run in `Pending` with zeroed counters.
    async fn insert_import(
        &self,
        profile_id: Uuid,
        import: &NewDataImport,
    ) -> StoreResult<DataImport>;

    async fn update_import(&self, import: &DataImport) -> StoreResult<Option<DataImport>>;
}
