//! In-memory `PlannerStore` for tests. Transactions work on a snapshot of the
//! state and swap it back in on commit.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::models::background::{
    CareerGoal, DataImport, Education, ImportStatus, NewCareerGoal, NewDataImport, NewEducation,
    NewSkill, NewUserSkill, NewWorkExperience, Skill, SkillCategory, UserSkill, WorkExperience,
};
use crate::models::execution::{ExecutionProgress, ExecutionStatus, NewPlanExecution, PlanExecution};
use crate::models::plan::{NewPlan, Plan, PlanStatus};
use crate::models::profile::{Profile, ProfileFields};
use crate::models::request_log::{NewRequestLog, RequestLog};
use crate::store::{BackgroundStore, PlannerStore, StoreError, StoreResult, StoreTx};

#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    pub profiles: Vec<Profile>,
    pub plans: Vec<Plan>,
    pub executions: Vec<PlanExecution>,
    pub logs: Vec<RequestLog>,
    pub skills: Vec<Skill>,
    pub user_skills: Vec<UserSkill>,
    pub education: Vec<Education>,
    pub experience: Vec<WorkExperience>,
    pub goals: Vec<CareerGoal>,
    pub imports: Vec<DataImport>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    open_txs: Arc<AtomicUsize>,
    fail_plan_inserts: bool,
    fail_log_appends: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `insert_plan` returns a database error.
    pub fn failing_plan_inserts() -> Self {
        Self {
            fail_plan_inserts: true,
            ..Self::default()
        }
    }

    /// Every `append_request_log` returns a database error.
    pub fn failing_log_appends() -> Self {
        Self {
            fail_log_appends: true,
            ..Self::default()
        }
    }

    pub fn snapshot(&self) -> MemoryState {
        self.state.lock().unwrap().clone()
    }

    /// Transactions begun and not yet committed or dropped.
    pub fn open_transactions(&self) -> usize {
        self.open_txs.load(Ordering::SeqCst)
    }
}

pub struct MemoryTx {
    shared: Arc<Mutex<MemoryState>>,
    working: MemoryState,
    fail_plan_inserts: bool,
    open_txs: Arc<AtomicUsize>,
}

impl Drop for MemoryTx {
    fn drop(&mut self) {
        self.open_txs.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn find_profile_by_email(&mut self, email: &str) -> StoreResult<Option<Profile>> {
        Ok(self.working.profiles.iter().find(|p| p.email == email).cloned())
    }

    async fn find_profile(&mut self, id: Uuid) -> StoreResult<Option<Profile>> {
        Ok(self.working.profiles.iter().find(|p| p.id == id).cloned())
    }

    async fn insert_profile(&mut self, fields: &ProfileFields) -> StoreResult<Profile> {
        if self.working.profiles.iter().any(|p| p.email == fields.email) {
            return Err(StoreError::Conflict(format!(
                "profile with email {} already exists",
                fields.email
            )));
        }
        let profile = Profile::from_fields(Uuid::new_v4(), fields.clone(), Utc::now());
        self.working.profiles.push(profile.clone());
        Ok(profile)
    }

    async fn update_profile(&mut self, id: Uuid, fields: &ProfileFields) -> StoreResult<Profile> {
        if self
            .working
            .profiles
            .iter()
            .any(|p| p.email == fields.email && p.id != id)
        {
            return Err(StoreError::Conflict(format!(
                "profile with email {} already exists",
                fields.email
            )));
        }
        let existing = self
            .working
            .profiles
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("profile {id}")))?;
        let created_at = existing.created_at;
        *existing = Profile::from_fields(id, fields.clone(), Utc::now());
        existing.created_at = created_at;
        Ok(existing.clone())
    }

    async fn insert_plan(&mut self, plan: &NewPlan) -> StoreResult<Plan> {
        if self.fail_plan_inserts {
            return Err(StoreError::Database(sqlx::Error::PoolClosed));
        }
        let now = Utc::now();
        let row = Plan {
            id: Uuid::new_v4(),
            profile_id: plan.profile_id,
            goal_id: plan.goal_id.clone(),
            plan_description: plan.plan_description.clone(),
            blockers: plan.blockers.clone(),
            milestones: plan.milestones.clone(),
            weekly_plans: plan.weekly_plans.clone(),
            user_prompt: plan.user_prompt.clone(),
            ai_model_used: plan.ai_model_used.clone(),
            tokens_used: plan.tokens_used,
            processing_time: plan.processing_time,
            status: PlanStatus::Draft,
            created_at: now,
            updated_at: now,
        };
        self.working.plans.push(row.clone());
        Ok(row)
    }

    async fn commit(mut self: Box<Self>) -> StoreResult<()> {
        *self.shared.lock().unwrap() = std::mem::take(&mut self.working);
        Ok(())
    }
}

#[async_trait]
impl PlannerStore for MemoryStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>> {
        self.open_txs.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryTx {
            shared: Arc::clone(&self.state),
            working: self.snapshot(),
            fail_plan_inserts: self.fail_plan_inserts,
            open_txs: Arc::clone(&self.open_txs),
        }))
    }

    async fn list_profiles(&self) -> StoreResult<Vec<Profile>> {
        let mut profiles = self.snapshot().profiles;
        profiles.reverse();
        Ok(profiles)
    }

    async fn get_profile(&self, id: Uuid) -> StoreResult<Option<Profile>> {
        Ok(self.snapshot().profiles.into_iter().find(|p| p.id == id))
    }

    async fn find_profile_by_email(&self, email: &str) -> StoreResult<Option<Profile>> {
        Ok(self.snapshot().profiles.into_iter().find(|p| p.email == email))
    }

    async fn delete_profile(&self, id: Uuid) -> StoreResult<bool> {
        let mut state = self.state.lock().unwrap();
        let before = state.profiles.len();
        state.profiles.retain(|p| p.id != id);
        if state.profiles.len() == before {
            return Ok(false);
        }
        let removed_plans: Vec<Uuid> = state
            .plans
            .iter()
            .filter(|p| p.profile_id == id)
            .map(|p| p.id)
            .collect();
        state.plans.retain(|p| p.profile_id != id);
        state.executions.retain(|e| !removed_plans.contains(&e.plan_id));
        state.user_skills.retain(|r| r.profile_id != id);
        state.education.retain(|r| r.profile_id != id);
        state.experience.retain(|r| r.profile_id != id);
        state.goals.retain(|r| r.profile_id != id);
        state.imports.retain(|r| r.profile_id != id);
        for log in state.logs.iter_mut() {
            if log.profile_id == Some(id) {
                log.profile_id = None;
            }
            if log.plan_id.is_some_and(|plan| removed_plans.contains(&plan)) {
                log.plan_id = None;
            }
        }
        Ok(true)
    }

    async fn list_plans(&self, profile_id: Option<Uuid>) -> StoreResult<Vec<Plan>> {
        let mut plans: Vec<Plan> = self
            .snapshot()
            .plans
            .into_iter()
            .filter(|p| profile_id.map_or(true, |id| p.profile_id == id))
            .collect();
        plans.reverse();
        Ok(plans)
    }

    async fn get_plan(&self, id: Uuid) -> StoreResult<Option<Plan>> {
        Ok(self.snapshot().plans.into_iter().find(|p| p.id == id))
    }

    async fn update_plan_status(&self, id: Uuid, status: PlanStatus) -> StoreResult<Option<Plan>> {
        let mut state = self.state.lock().unwrap();
        Ok(state.plans.iter_mut().find(|p| p.id == id).map(|plan| {
            plan.status = status;
            plan.updated_at = Utc::now();
            plan.clone()
        }))
    }

    async fn delete_plan(&self, id: Uuid) -> StoreResult<bool> {
        let mut state = self.state.lock().unwrap();
        let before = state.plans.len();
        state.plans.retain(|p| p.id != id);
        state.executions.retain(|e| e.plan_id != id);
        for log in state.logs.iter_mut().filter(|l| l.plan_id == Some(id)) {
            log.plan_id = None;
        }
        Ok(state.plans.len() < before)
    }

    async fn insert_execution(&self, execution: &NewPlanExecution) -> StoreResult<PlanExecution> {
        let mut state = self.state.lock().unwrap();
        if !state.plans.iter().any(|p| p.id == execution.plan_id) {
            return Err(StoreError::NotFound(format!("plan {}", execution.plan_id)));
        }
        let duplicate = state.executions.iter().any(|e| {
            e.plan_id == execution.plan_id
                && e.milestone_order == execution.milestone_order
                && e.week_number == execution.week_number
                && e.year == execution.year
        });
        if duplicate {
            return Err(StoreError::Conflict(format!(
                "execution for milestone {} week {}/{} already exists",
                execution.milestone_order, execution.week_number, execution.year
            )));
        }
        let now = Utc::now();
        let row = PlanExecution {
            id: Uuid::new_v4(),
            plan_id: execution.plan_id,
            milestone_order: execution.milestone_order,
            milestone_title: execution.milestone_title.clone(),
            week_number: execution.week_number,
            year: execution.year,
            task_description: execution.task_description.clone(),
            focus_areas: json!(execution.focus_areas),
            time_commitment: execution.time_commitment,
            status: ExecutionStatus::NotStarted,
            completion_percentage: 0,
            notes: String::new(),
            planned_start_date: execution.planned_start_date,
            planned_end_date: execution.planned_end_date,
            actual_start_date: None,
            actual_completion_date: None,
            created_at: now,
            updated_at: now,
        };
        state.executions.push(row.clone());
        Ok(row)
    }

    async fn list_executions(&self, plan_id: Option<Uuid>) -> StoreResult<Vec<PlanExecution>> {
        Ok(self
            .snapshot()
            .executions
            .into_iter()
            .filter(|e| plan_id.map_or(true, |id| e.plan_id == id))
            .collect())
    }

    async fn get_execution(&self, id: Uuid) -> StoreResult<Option<PlanExecution>> {
        Ok(self.snapshot().executions.into_iter().find(|e| e.id == id))
    }

    async fn update_execution(
        &self,
        id: Uuid,
        progress: &ExecutionProgress,
    ) -> StoreResult<Option<PlanExecution>> {
        let mut state = self.state.lock().unwrap();
        Ok(state.executions.iter_mut().find(|e| e.id == id).map(|execution| {
            apply_progress(progress, execution);
            execution.updated_at = Utc::now();
            execution.clone()
        }))
    }

    async fn append_request_log(&self, entry: &NewRequestLog) -> StoreResult<RequestLog> {
        if self.fail_log_appends {
            return Err(StoreError::Database(sqlx::Error::PoolClosed));
        }
        let mut state = self.state.lock().unwrap();
        if let Some(id) = entry.profile_id {
            if !state.profiles.iter().any(|p| p.id == id) {
                return Err(StoreError::NotFound(format!("profile {id}")));
            }
        }
        if let Some(id) = entry.plan_id {
            if !state.plans.iter().any(|p| p.id == id) {
                return Err(StoreError::NotFound(format!("plan {id}")));
            }
        }
        let row = RequestLog {
            id: Uuid::new_v4(),
            profile_id: entry.profile_id,
            profile_email: entry.profile_email.clone(),
            plan_id: entry.plan_id,
            request_type: entry.request_type,
            input_data: entry.input_data.clone(),
            output_data: entry.output_data.clone(),
            ai_model: entry.ai_model.clone(),
            tokens_used: entry.tokens_used,
            processing_time: entry.processing_time,
            status: entry.status,
            error_message: entry.error_message.clone(),
            created_at: Utc::now(),
        };
        state.logs.push(row.clone());
        Ok(row)
    }

    async fn list_request_logs(&self) -> StoreResult<Vec<RequestLog>> {
        let mut logs = self.snapshot().logs;
        logs.reverse();
        Ok(logs)
    }

    async fn get_request_log(&self, id: Uuid) -> StoreResult<Option<RequestLog>> {
        Ok(self.snapshot().logs.into_iter().find(|l| l.id == id))
    }
}

/// Same semantics as the `COALESCE` update in `PgStore::update_execution`.
fn apply_progress(progress: &ExecutionProgress, execution: &mut PlanExecution) {
    if let Some(status) = progress.status {
        execution.status = status;
    }
    if let Some(pct) = progress.completion_percentage {
        execution.completion_percentage = pct;
    }
    if let Some(notes) = &progress.notes {
        execution.notes = notes.clone();
    }
    if progress.actual_start_date.is_some() {
        execution.actual_start_date = progress.actual_start_date;
    }
    if progress.actual_completion_date.is_some() {
        execution.actual_completion_date = progress.actual_completion_date;
    }
}

impl MemoryState {
    fn require_profile(&self, id: Uuid) -> StoreResult<()> {
        if self.profiles.iter().any(|p| p.id == id) {
            Ok(())
        } else {
            Err(StoreError::NotFound(format!("profile {id}")))
        }
    }
}

/// Replaces the row with the same id, if present.
fn replace_row<T: Clone>(rows: &mut [T], id_of: impl Fn(&T) -> Uuid, row: &T) -> Option<T> {
    let slot = rows.iter_mut().find(|r| id_of(r) == id_of(row))?;
    *slot = row.clone();
    Some(slot.clone())
}

fn remove_row<T>(rows: &mut Vec<T>, id_of: impl Fn(&T) -> Uuid, id: Uuid) -> bool {
    let before = rows.len();
    rows.retain(|r| id_of(r) != id);
    rows.len() < before
}

#[async_trait]
impl BackgroundStore for MemoryStore {
    async fn list_skills(&self) -> StoreResult<Vec<Skill>> {
        let mut skills = self.snapshot().skills;
        skills.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(skills)
    }

    async fn get_skill(&self, id: Uuid) -> StoreResult<Option<Skill>> {
        Ok(self.snapshot().skills.into_iter().find(|s| s.id == id))
    }

    async fn insert_skill(&self, skill: &NewSkill) -> StoreResult<Skill> {
        let mut state = self.state.lock().unwrap();
        if state.skills.iter().any(|s| s.name == skill.name) {
            return Err(StoreError::Conflict(format!("skill {} already exists", skill.name)));
        }
        let row = Skill {
            id: Uuid::new_v4(),
            name: skill.name.clone(),
            category: skill.category,
            description: skill.description.clone(),
        };
        state.skills.push(row.clone());
        Ok(row)
    }

    async fn find_or_create_skill(&self, name: &str, category: SkillCategory) -> StoreResult<Skill> {
        let mut state = self.state.lock().unwrap();
        if let Some(existing) = state.skills.iter().find(|s| s.name == name) {
            return Ok(existing.clone());
        }
        let row = Skill {
            id: Uuid::new_v4(),
            name: name.to_string(),
            category,
            description: String::new(),
        };
        state.skills.push(row.clone());
        Ok(row)
    }

    async fn delete_skill(&self, id: Uuid) -> StoreResult<bool> {
        let mut state = self.state.lock().unwrap();
        state.user_skills.retain(|r| r.skill_id != id);
        Ok(remove_row(&mut state.skills, |s| s.id, id))
    }

    async fn list_user_skills(&self, profile_id: Uuid) -> StoreResult<Vec<UserSkill>> {
        Ok(self
            .snapshot()
            .user_skills
            .into_iter()
            .filter(|r| r.profile_id == profile_id)
            .collect())
    }

    async fn get_user_skill(&self, id: Uuid) -> StoreResult<Option<UserSkill>> {
        Ok(self.snapshot().user_skills.into_iter().find(|r| r.id == id))
    }

    async fn insert_user_skill(
        &self,
        profile_id: Uuid,
        skill: &NewUserSkill,
    ) -> StoreResult<UserSkill> {
        let mut state = self.state.lock().unwrap();
        state.require_profile(profile_id)?;
        let catalog = state
            .skills
            .iter()
            .find(|s| s.id == skill.skill_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("skill {}", skill.skill_id)))?;
        if state
            .user_skills
            .iter()
            .any(|r| r.profile_id == profile_id && r.skill_id == skill.skill_id)
        {
            return Err(StoreError::Conflict(format!(
                "profile already has skill {}",
                skill.skill_id
            )));
        }
        let row = UserSkill {
            id: Uuid::new_v4(),
            profile_id,
            skill_id: catalog.id,
            skill_name: catalog.name,
            skill_category: catalog.category,
            proficiency_level: skill.proficiency_level,
            years_of_experience: skill.years_of_experience,
            is_current: skill.is_current,
            created_at: Utc::now(),
        };
        state.user_skills.push(row.clone());
        Ok(row)
    }

    async fn update_user_skill(&self, skill: &UserSkill) -> StoreResult<Option<UserSkill>> {
        let mut state = self.state.lock().unwrap();
        Ok(replace_row(&mut state.user_skills, |r| r.id, skill))
    }

    async fn delete_user_skill(&self, id: Uuid) -> StoreResult<bool> {
        let mut state = self.state.lock().unwrap();
        Ok(remove_row(&mut state.user_skills, |r| r.id, id))
    }

    async fn list_education(&self, profile_id: Uuid) -> StoreResult<Vec<Education>> {
        let mut rows: Vec<Education> = self
            .snapshot()
            .education
            .into_iter()
            .filter(|r| r.profile_id == profile_id)
            .collect();
        rows.sort_by(|a, b| b.start_date.cmp(&a.start_date));
        Ok(rows)
    }

    async fn get_education(&self, id: Uuid) -> StoreResult<Option<Education>> {
        Ok(self.snapshot().education.into_iter().find(|r| r.id == id))
    }

    async fn insert_education(
        &self,
        profile_id: Uuid,
        education: &NewEducation,
    ) -> StoreResult<Education> {
        let mut state = self.state.lock().unwrap();
        state.require_profile(profile_id)?;
        let row = Education {
            id: Uuid::new_v4(),
            profile_id,
            institution: education.institution.clone(),
            degree: education.degree.clone(),
            field_of_study: education.field_of_study.clone(),
            start_date: education.start_date,
            end_date: education.end_date,
            gpa: education.gpa,
            description: education.description.clone(),
            created_at: Utc::now(),
        };
        state.education.push(row.clone());
        Ok(row)
    }

    async fn update_education(&self, education: &Education) -> StoreResult<Option<Education>> {
        let mut state = self.state.lock().unwrap();
        Ok(replace_row(&mut state.education, |r| r.id, education))
    }

    async fn delete_education(&self, id: Uuid) -> StoreResult<bool> {
        let mut state = self.state.lock().unwrap();
        Ok(remove_row(&mut state.education, |r| r.id, id))
    }

    async fn list_experience(&self, profile_id: Uuid) -> StoreResult<Vec<WorkExperience>> {
        let mut rows: Vec<WorkExperience> = self
            .snapshot()
            .experience
            .into_iter()
            .filter(|r| r.profile_id == profile_id)
            .collect();
        rows.sort_by(|a, b| b.start_date.cmp(&a.start_date));
        Ok(rows)
    }

    async fn get_experience(&self, id: Uuid) -> StoreResult<Option<WorkExperience>> {
        Ok(self.snapshot().experience.into_iter().find(|r| r.id == id))
    }

    async fn insert_experience(
        &self,
        profile_id: Uuid,
        experience: &NewWorkExperience,
    ) -> StoreResult<WorkExperience> {
        let mut state = self.state.lock().unwrap();
        state.require_profile(profile_id)?;
        let row = WorkExperience {
            id: Uuid::new_v4(),
            profile_id,
            company: experience.company.clone(),
            position: experience.position.clone(),
            start_date: experience.start_date,
            end_date: experience.end_date,
            is_current: experience.is_current,
            description: experience.description.clone(),
            achievements: experience.achievements.clone(),
            created_at: Utc::now(),
        };
        state.experience.push(row.clone());
        Ok(row)
    }

    async fn update_experience(
        &self,
        experience: &WorkExperience,
    ) -> StoreResult<Option<WorkExperience>> {
        let mut state = self.state.lock().unwrap();
        Ok(replace_row(&mut state.experience, |r| r.id, experience))
    }

    async fn delete_experience(&self, id: Uuid) -> StoreResult<bool> {
        let mut state = self.state.lock().unwrap();
        Ok(remove_row(&mut state.experience, |r| r.id, id))
    }

    async fn list_goals(&self, profile_id: Uuid) -> StoreResult<Vec<CareerGoal>> {
        Ok(self
            .snapshot()
            .goals
            .into_iter()
            .filter(|r| r.profile_id == profile_id)
            .collect())
    }

    async fn get_goal(&self, id: Uuid) -> StoreResult<Option<CareerGoal>> {
        Ok(self.snapshot().goals.into_iter().find(|r| r.id == id))
    }

    async fn insert_goal(&self, profile_id: Uuid, goal: &NewCareerGoal) -> StoreResult<CareerGoal> {
        let mut state = self.state.lock().unwrap();
        state.require_profile(profile_id)?;
        let now = Utc::now();
        let row = CareerGoal {
            id: Uuid::new_v4(),
            profile_id,
            title: goal.title.clone(),
            description: goal.description.clone(),
            target_date: goal.target_date,
            priority: goal.priority,
            status: goal.status,
            created_at: now,
            updated_at: now,
        };
        state.goals.push(row.clone());
        Ok(row)
    }

    async fn update_goal(&self, goal: &CareerGoal) -> StoreResult<Option<CareerGoal>> {
        let mut state = self.state.lock().unwrap();
        let touched = CareerGoal {
            updated_at: Utc::now(),
            ..goal.clone()
        };
        Ok(replace_row(&mut state.goals, |r| r.id, &touched))
    }

    async fn delete_goal(&self, id: Uuid) -> StoreResult<bool> {
        let mut state = self.state.lock().unwrap();
        Ok(remove_row(&mut state.goals, |r| r.id, id))
    }

    async fn list_imports(&self, profile_id: Uuid) -> StoreResult<Vec<DataImport>> {
        let mut rows: Vec<DataImport> = self
            .snapshot()
            .imports
            .into_iter()
            .filter(|r| r.profile_id == profile_id)
            .collect();
        rows.reverse();
        Ok(rows)
    }

    async fn get_import(&self, id: Uuid) -> StoreResult<Option<DataImport>> {
        Ok(self.snapshot().imports.into_iter().find(|r| r.id == id))
    }

    async fn insert_import(
        &self,
        profile_id: Uuid,
        import: &NewDataImport,
    ) -> StoreResult<DataImport> {
        let mut state = self.state.lock().unwrap();
        state.require_profile(profile_id)?;
        let row = DataImport {
            id: Uuid::new_v4(),
            profile_id,
            file_name: import.file_name.clone(),
            file_type: import.file_type,
            import_type: import.import_type,
            status: ImportStatus::Pending,
            records_processed: 0,
            records_successful: 0,
            records_failed: 0,
            error_log: String::new(),
            created_at: Utc::now(),
            completed_at: None,
        };
        state.imports.push(row.clone());
        Ok(row)
    }

    async fn update_import(&self, import: &DataImport) -> StoreResult<Option<DataImport>> {
        let mut state = self.state.lock().unwrap();
        Ok(replace_row(&mut state.imports, |r| r.id, import))
    }
}
