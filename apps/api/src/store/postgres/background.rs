use async_trait::async_trait;
use uuid::Uuid;

use super::{has_code, map_unique, PgStore, FOREIGN_KEY_VIOLATION};
use crate::models::background::{
    CareerGoal, DataImport, Education, NewCareerGoal, NewDataImport, NewEducation, NewSkill,
    NewUserSkill, NewWorkExperience, Skill, SkillCategory, UserSkill, WorkExperience,
};
use crate::store::{BackgroundStore, StoreError, StoreResult};

/// User skills are always read joined with their catalog entry.
const USER_SKILL_SELECT: &str = r#"
    SELECT us.*, s.name AS skill_name, s.category AS skill_category
    FROM user_skills us
    JOIN skills s ON s.id = us.skill_id
"#;

/// Maps FK violations to `NotFound`, unique violations to `Conflict`.
fn map_write(
    err: sqlx::Error,
    missing: impl FnOnce() -> String,
    duplicate: impl FnOnce() -> String,
) -> StoreError {
    if has_code(&err, FOREIGN_KEY_VIOLATION) {
        StoreError::NotFound(missing())
    } else {
        map_unique(err, duplicate)
    }
}

fn missing_profile(profile_id: Uuid) -> impl FnOnce() -> String {
    move || format!("profile {profile_id}")
}

fn no_duplicates() -> String {
    "duplicate row".to_string()
}

#[async_trait]
impl BackgroundStore for PgStore {
    async fn list_skills(&self) -> StoreResult<Vec<Skill>> {
        Ok(sqlx::query_as::<_, Skill>("SELECT * FROM skills ORDER BY name")
            .fetch_all(&self.pool)
            .await?)
    }

    async fn get_skill(&self, id: Uuid) -> StoreResult<Option<Skill>> {
        Ok(sqlx::query_as::<_, Skill>("SELECT * FROM skills WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn insert_skill(&self, skill: &NewSkill) -> StoreResult<Skill> {
        sqlx::query_as::<_, Skill>(
            "INSERT INTO skills (name, category, description) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(&skill.name)
        .bind(skill.category)
        .bind(&skill.description)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique(e, || format!("skill {} already exists", skill.name)))
    }

    async fn find_or_create_skill(&self, name: &str, category: SkillCategory) -> StoreResult<Skill> {
        // The no-op update makes RETURNING yield the existing row on conflict.
        Ok(sqlx::query_as::<_, Skill>(
            r#"
            INSERT INTO skills (name, category) VALUES ($1, $2)
            ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
            RETURNING *
            "#,
        )
        .bind(name)
        .bind(category)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn delete_skill(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM skills WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_user_skills(&self, profile_id: Uuid) -> StoreResult<Vec<UserSkill>> {
        let sql = format!("{USER_SKILL_SELECT} WHERE us.profile_id = $1 ORDER BY us.created_at");
        Ok(sqlx::query_as::<_, UserSkill>(&sql)
            .bind(profile_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn get_user_skill(&self, id: Uuid) -> StoreResult<Option<UserSkill>> {
        let sql = format!("{USER_SKILL_SELECT} WHERE us.id = $1");
        Ok(sqlx::query_as::<_, UserSkill>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn insert_user_skill(
        &self,
        profile_id: Uuid,
        skill: &NewUserSkill,
    ) -> StoreResult<UserSkill> {
        sqlx::query_as::<_, UserSkill>(
            r#"
            WITH inserted AS (
                INSERT INTO user_skills
                    (profile_id, skill_id, proficiency_level, years_of_experience, is_current)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING *
            )
            SELECT inserted.*, s.name AS skill_name, s.category AS skill_category
            FROM inserted JOIN skills s ON s.id = inserted.skill_id
            "#,
        )
        .bind(profile_id)
        .bind(skill.skill_id)
        .bind(skill.proficiency_level)
        .bind(skill.years_of_experience)
        .bind(skill.is_current)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            map_write(
                e,
                || format!("profile {profile_id} or skill {}", skill.skill_id),
                || format!("profile already has skill {}", skill.skill_id),
            )
        })
    }

    async fn update_user_skill(&self, skill: &UserSkill) -> StoreResult<Option<UserSkill>> {
        Ok(sqlx::query_as::<_, UserSkill>(
            r#"
            WITH updated AS (
                UPDATE user_skills SET
                    proficiency_level = $2, years_of_experience = $3, is_current = $4
                WHERE id = $1
                RETURNING *
            )
            SELECT updated.*, s.name AS skill_name, s.category AS skill_category
            FROM updated JOIN skills s ON s.id = updated.skill_id
            "#,
        )
        .bind(skill.id)
        .bind(skill.proficiency_level)
        .bind(skill.years_of_experience)
        .bind(skill.is_current)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn delete_user_skill(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM user_skills WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_education(&self, profile_id: Uuid) -> StoreResult<Vec<Education>> {
        Ok(sqlx::query_as::<_, Education>(
            "SELECT * FROM education WHERE profile_id = $1 ORDER BY start_date DESC",
        )
        .bind(profile_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn get_education(&self, id: Uuid) -> StoreResult<Option<Education>> {
        Ok(sqlx::query_as::<_, Education>("SELECT * FROM education WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn insert_education(
        &self,
        profile_id: Uuid,
        education: &NewEducation,
    ) -> StoreResult<Education> {
        sqlx::query_as::<_, Education>(
            r#"
            INSERT INTO education
                (profile_id, institution, degree, field_of_study, start_date, end_date, gpa, description)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(profile_id)
        .bind(&education.institution)
        .bind(&education.degree)
        .bind(&education.field_of_study)
        .bind(education.start_date)
        .bind(education.end_date)
        .bind(education.gpa)
        .bind(&education.description)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_write(e, missing_profile(profile_id), no_duplicates))
    }

    async fn update_education(&self, education: &Education) -> StoreResult<Option<Education>> {
        Ok(sqlx::query_as::<_, Education>(
            r#"
            UPDATE education SET
                institution = $2, degree = $3, field_of_study = $4, start_date = $5,
                end_date = $6, gpa = $7, description = $8
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(education.id)
        .bind(&education.institution)
        .bind(&education.degree)
        .bind(&education.field_of_study)
        .bind(education.start_date)
        .bind(education.end_date)
        .bind(education.gpa)
        .bind(&education.description)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn delete_education(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM education WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_experience(&self, profile_id: Uuid) -> StoreResult<Vec<WorkExperience>> {
        Ok(sqlx::query_as::<_, WorkExperience>(
            "SELECT * FROM work_experience WHERE profile_id = $1 ORDER BY start_date DESC",
        )
        .bind(profile_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn get_experience(&self, id: Uuid) -> StoreResult<Option<WorkExperience>> {
        Ok(
            sqlx::query_as::<_, WorkExperience>("SELECT * FROM work_experience WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn insert_experience(
        &self,
        profile_id: Uuid,
        experience: &NewWorkExperience,
    ) -> StoreResult<WorkExperience> {
        sqlx::query_as::<_, WorkExperience>(
            r#"
            INSERT INTO work_experience
                (profile_id, company, position, start_date, end_date, is_current,
                 description, achievements)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(profile_id)
        .bind(&experience.company)
        .bind(&experience.position)
        .bind(experience.start_date)
        .bind(experience.end_date)
        .bind(experience.is_current)
        .bind(&experience.description)
        .bind(&experience.achievements)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_write(e, missing_profile(profile_id), no_duplicates))
    }

    async fn update_experience(
        &self,
        experience: &WorkExperience,
    ) -> StoreResult<Option<WorkExperience>> {
        Ok(sqlx::query_as::<_, WorkExperience>(
            r#"
            UPDATE work_experience SET
                company = $2, position = $3, start_date = $4, end_date = $5,
                is_current = $6, description = $7, achievements = $8
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(experience.id)
        .bind(&experience.company)
        .bind(&experience.position)
        .bind(experience.start_date)
        .bind(experience.end_date)
        .bind(experience.is_current)
        .bind(&experience.description)
        .bind(&experience.achievements)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn delete_experience(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM work_experience WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_goals(&self, profile_id: Uuid) -> StoreResult<Vec<CareerGoal>> {
        Ok(sqlx::query_as::<_, CareerGoal>(
            "SELECT * FROM career_goals WHERE profile_id = $1 ORDER BY created_at",
        )
        .bind(profile_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn get_goal(&self, id: Uuid) -> StoreResult<Option<CareerGoal>> {
        Ok(sqlx::query_as::<_, CareerGoal>("SELECT * FROM career_goals WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn insert_goal(&self, profile_id: Uuid, goal: &NewCareerGoal) -> StoreResult<CareerGoal> {
        sqlx::query_as::<_, CareerGoal>(
            r#"
            INSERT INTO career_goals (profile_id, title, description, target_date, priority, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(profile_id)
        .bind(&goal.title)
        .bind(&goal.description)
        .bind(goal.target_date)
        .bind(goal.priority)
        .bind(goal.status)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_write(e, missing_profile(profile_id), no_duplicates))
    }

    async fn update_goal(&self, goal: &CareerGoal) -> StoreResult<Option<CareerGoal>> {
        Ok(sqlx::query_as::<_, CareerGoal>(
            r#"
            UPDATE career_goals SET
                title = $2, description = $3, target_date = $4, priority = $5,
                status = $6, updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(goal.id)
        .bind(&goal.title)
        .bind(&goal.description)
        .bind(goal.target_date)
        .bind(goal.priority)
        .bind(goal.status)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn delete_goal(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM career_goals WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_imports(&self, profile_id: Uuid) -> StoreResult<Vec<DataImport>> {
        Ok(sqlx::query_as::<_, DataImport>(
            "SELECT * FROM data_imports WHERE profile_id = $1 ORDER BY created_at DESC",
        )
        .bind(profile_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn get_import(&self, id: Uuid) -> StoreResult<Option<DataImport>> {
        Ok(sqlx::query_as::<_, DataImport>("SELECT * FROM data_imports WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn insert_import(
        &self,
        profile_id: Uuid,
        import: &NewDataImport,
    ) -> StoreResult<DataImport> {
        sqlx::query_as::<_, DataImport>(
            r#"
            INSERT INTO data_imports (profile_id, file_name, file_type, import_type, status)
            VALUES ($1, $2, $3, $4, 'pending')
            RETURNING *
            "#,
        )
        .bind(profile_id)
        .bind(&import.file_name)
        .bind(import.file_type)
        .bind(import.import_type)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_write(e, missing_profile(profile_id), no_duplicates))
    }

    async fn update_import(&self, import: &DataImport) -> StoreResult<Option<DataImport>> {
        Ok(sqlx::query_as::<_, DataImport>(
            r#"
            UPDATE data_imports SET
                status = $2, records_processed = $3, records_successful = $4,
                records_failed = $5, error_log = $6, completed_at = $7
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(import.id)
        .bind(import.status)
        .bind(import.records_processed)
        .bind(import.records_successful)
        .bind(import.records_failed)
        .bind(&import.error_log)
        .bind(import.completed_at)
        .fetch_optional(&self.pool)
        .await?)
    }
}
