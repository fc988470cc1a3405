use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::info;
use uuid::Uuid;

use crate::models::execution::{ExecutionProgress, NewPlanExecution, PlanExecution};
use crate::models::plan::{NewPlan, Plan, PlanStatus};
use crate::models::profile::{Profile, ProfileFields};
use crate::models::request_log::{NewRequestLog, RequestLog};
use crate::store::{PlannerStore, StoreError, StoreResult, StoreTx};

mod background;

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

/// PostgreSQL-backed store. Schema lives in `migrations/`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn has_code(err: &sqlx::Error, code: &str) -> bool {
    err.as_database_error()
        .and_then(|e| e.code())
        .is_some_and(|c| c == code)
}

/// Maps unique-constraint violations to `Conflict`, everything else to `Database`.
fn map_unique(err: sqlx::Error, what: impl FnOnce() -> String) -> StoreError {
    if has_code(&err, UNIQUE_VIOLATION) {
        StoreError::Conflict(what())
    } else {
        StoreError::Database(err)
    }
}

pub struct PgStoreTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PgStoreTx {
    async fn find_profile_by_email(&mut self, email: &str) -> StoreResult<Option<Profile>> {
        Ok(
            sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE email = $1 FOR UPDATE")
                .bind(email)
                .fetch_optional(&mut *self.tx)
                .await?,
        )
    }

    async fn find_profile(&mut self, id: Uuid) -> StoreResult<Option<Profile>> {
        Ok(
            sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *self.tx)
                .await?,
        )
    }

    async fn insert_profile(&mut self, fields: &ProfileFields) -> StoreResult<Profile> {
        sqlx::query_as::<_, Profile>(
            r#"
            INSERT INTO profiles
                (email, google_id, name, picture_url, age, gender, title, education,
                 years_experience, income_level, last_career_change, summary,
                 personality_traits, motivators, work_style, user_type, onboarding_completed)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            RETURNING *
            "#,
        )
        .bind(&fields.email)
        .bind(&fields.google_id)
        .bind(&fields.name)
        .bind(&fields.picture_url)
        .bind(fields.age)
        .bind(&fields.gender)
        .bind(&fields.title)
        .bind(&fields.education)
        .bind(fields.years_experience)
        .bind(&fields.income_level)
        .bind(fields.last_career_change)
        .bind(&fields.summary)
        .bind(&fields.personality_traits)
        .bind(&fields.motivators)
        .bind(&fields.work_style)
        .bind(&fields.user_type)
        .bind(fields.onboarding_completed)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_unique(e, || format!("profile with email {} already exists", fields.email)))
    }

    async fn update_profile(&mut self, id: Uuid, fields: &ProfileFields) -> StoreResult<Profile> {
        sqlx::query_as::<_, Profile>(
            r#"
            UPDATE profiles SET
                email = $2, google_id = $3, name = $4, picture_url = $5, age = $6,
                gender = $7, title = $8, education = $9, years_experience = $10,
                income_level = $11, last_career_change = $12, summary = $13,
                personality_traits = $14, motivators = $15, work_style = $16,
                user_type = $17, onboarding_completed = $18, updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&fields.email)
        .bind(&fields.google_id)
        .bind(&fields.name)
        .bind(&fields.picture_url)
        .bind(fields.age)
        .bind(&fields.gender)
        .bind(&fields.title)
        .bind(&fields.education)
        .bind(fields.years_experience)
        .bind(&fields.income_level)
        .bind(fields.last_career_change)
        .bind(&fields.summary)
        .bind(&fields.personality_traits)
        .bind(&fields.motivators)
        .bind(&fields.work_style)
        .bind(&fields.user_type)
        .bind(fields.onboarding_completed)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_unique(e, || format!("profile with email {} already exists", fields.email)))?
        .ok_or_else(|| StoreError::NotFound(format!("profile {id}")))
    }

    async fn insert_plan(&mut self, plan: &NewPlan) -> StoreResult<Plan> {
        let row = sqlx::query_as::<_, Plan>(
            r#"
            INSERT INTO career_plans
                (profile_id, goal_id, plan_description, blockers, milestones, weekly_plans,
                 user_prompt, ai_model_used, tokens_used, processing_time, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 'draft')
            RETURNING *
            "#,
        )
        .bind(plan.profile_id)
        .bind(&plan.goal_id)
        .bind(&plan.plan_description)
        .bind(&plan.blockers)
        .bind(&plan.milestones)
        .bind(&plan.weekly_plans)
        .bind(&plan.user_prompt)
        .bind(&plan.ai_model_used)
        .bind(plan.tokens_used)
        .bind(plan.processing_time)
        .fetch_one(&mut *self.tx)
        .await?;

        info!("Inserted career plan {} for profile {}", row.id, row.profile_id);
        Ok(row)
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl PlannerStore for PgStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgStoreTx { tx }))
    }

    async fn list_profiles(&self) -> StoreResult<Vec<Profile>> {
        Ok(
            sqlx::query_as::<_, Profile>("SELECT * FROM profiles ORDER BY created_at DESC")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    async fn get_profile(&self, id: Uuid) -> StoreResult<Option<Profile>> {
        Ok(
            sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn find_profile_by_email(&self, email: &str) -> StoreResult<Option<Profile>> {
        Ok(
            sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE email = $1")
                .bind(email)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn delete_profile(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM profiles WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_plans(&self, profile_id: Option<Uuid>) -> StoreResult<Vec<Plan>> {
        Ok(sqlx::query_as::<_, Plan>(
            r#"
            SELECT * FROM career_plans
            WHERE $1::uuid IS NULL OR profile_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(profile_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn get_plan(&self, id: Uuid) -> StoreResult<Option<Plan>> {
        Ok(
            sqlx::query_as::<_, Plan>("SELECT * FROM career_plans WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn update_plan_status(&self, id: Uuid, status: PlanStatus) -> StoreResult<Option<Plan>> {
        Ok(sqlx::query_as::<_, Plan>(
            "UPDATE career_plans SET status = $2, updated_at = now() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn delete_plan(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM career_plans WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_execution(&self, execution: &NewPlanExecution) -> StoreResult<PlanExecution> {
        sqlx::query_as::<_, PlanExecution>(
            r#"
            INSERT INTO plan_executions
                (plan_id, milestone_order, milestone_title, week_number, year,
                 task_description, focus_areas, time_commitment,
                 planned_start_date, planned_end_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(execution.plan_id)
        .bind(execution.milestone_order)
        .bind(&execution.milestone_title)
        .bind(execution.week_number)
        .bind(execution.year)
        .bind(&execution.task_description)
        .bind(Json(&execution.focus_areas))
        .bind(execution.time_commitment)
        .bind(execution.planned_start_date)
        .bind(execution.planned_end_date)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if has_code(&e, FOREIGN_KEY_VIOLATION) {
                return StoreError::NotFound(format!("plan {}", execution.plan_id));
            }
            map_unique(e, || {
                format!(
                    "execution for milestone {} week {}/{} already exists",
                    execution.milestone_order, execution.week_number, execution.year
                )
            })
        })
    }

    async fn list_executions(&self, plan_id: Option<Uuid>) -> StoreResult<Vec<PlanExecution>> {
        Ok(sqlx::query_as::<_, PlanExecution>(
            r#"
            SELECT * FROM plan_executions
            WHERE $1::uuid IS NULL OR plan_id = $1
            ORDER BY year, week_number, milestone_order
            "#,
        )
        .bind(plan_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn get_execution(&self, id: Uuid) -> StoreResult<Option<PlanExecution>> {
        Ok(
            sqlx::query_as::<_, PlanExecution>("SELECT * FROM plan_executions WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn update_execution(
        &self,
        id: Uuid,
        progress: &ExecutionProgress,
    ) -> StoreResult<Option<PlanExecution>> {
        Ok(sqlx::query_as::<_, PlanExecution>(
            r#"
            UPDATE plan_executions SET
                status = COALESCE($2, status),
                completion_percentage = COALESCE($3, completion_percentage),
                notes = COALESCE($4, notes),
                actual_start_date = COALESCE($5, actual_start_date),
                actual_completion_date = COALESCE($6, actual_completion_date),
                updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(progress.status)
        .bind(progress.completion_percentage)
        .bind(&progress.notes)
        .bind(progress.actual_start_date)
        .bind(progress.actual_completion_date)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn append_request_log(&self, entry: &NewRequestLog) -> StoreResult<RequestLog> {
        sqlx::query_as::<_, RequestLog>(
            r#"
            INSERT INTO ai_request_logs
                (profile_id, profile_email, plan_id, request_type, input_data, output_data,
                 ai_model, tokens_used, processing_time, status, error_message)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(entry.profile_id)
        .bind(&entry.profile_email)
        .bind(entry.plan_id)
        .bind(entry.request_type)
        .bind(&entry.input_data)
        .bind(&entry.output_data)
        .bind(&entry.ai_model)
        .bind(entry.tokens_used)
        .bind(entry.processing_time)
        .bind(entry.status)
        .bind(&entry.error_message)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if has_code(&e, FOREIGN_KEY_VIOLATION) {
                StoreError::NotFound(format!(
                    "profile {:?} or plan {:?} referenced by request log",
                    entry.profile_id, entry.plan_id
                ))
            } else {
                StoreError::Database(e)
            }
        })
    }

    async fn list_request_logs(&self) -> StoreResult<Vec<RequestLog>> {
        Ok(sqlx::query_as::<_, RequestLog>(
            "SELECT * FROM ai_request_logs ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?)
    }

    async fn get_request_log(&self, id: Uuid) -> StoreResult<Option<RequestLog>> {
        Ok(
            sqlx::query_as::<_, RequestLog>("SELECT * FROM ai_request_logs WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }
}
