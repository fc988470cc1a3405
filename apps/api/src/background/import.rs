//! JSON import of background records with a tracked `DataImport` run.
//!
//! A run moves `pending → processing → completed | failed`. Each record is
//! imported on its own: one bad record is counted and logged as
//! `Item N: reason` and the rest continue, unless `skip_errors` is off, in
//! which case the first bad record fails the run. Records already written
//! stay written.

use std::sync::Arc;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::background::{
    invalid, validate_new_education, validate_new_experience, validate_new_user_skill,
    RecordError,
};
use crate::models::background::{
    DataImport, ImportFileType, ImportStatus, ImportType, NewCareerGoal, NewDataImport,
    NewEducation, NewUserSkill, NewWorkExperience, SkillCategory,
};
use crate::profiles::update_profile_by_id;
use crate::store::{BackgroundStore, PlannerStore, StoreError};

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ImportOptions {
    /// Replace a matching existing record instead of keeping it.
    #[serde(default)]
    pub overwrite_existing: bool,
    #[serde(default = "skip_errors_default")]
    pub skip_errors: bool,
}

fn skip_errors_default() -> bool {
    true
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            overwrite_existing: false,
            skip_errors: skip_errors_default(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum ImportSource {
    /// Raw bytes of an uploaded file.
    File(Vec<u8>),
    /// Records already parsed from a request body.
    Records(Value),
}

#[derive(Debug, Clone)]
pub struct ImportRequest {
    pub file_name: String,
    pub import_type: ImportType,
    pub options: ImportOptions,
    pub source: ImportSource,
}

/// The stored run plus the reason it failed, if it did.
#[derive(Debug, Clone)]
pub struct ImportRun {
    pub import: DataImport,
    pub failure: Option<String>,
}

/// Skill record as it appears in import files.
#[derive(Debug, Deserialize)]
struct SkillRecord {
    #[serde(alias = "name")]
    skill_name: String,
    #[serde(default)]
    category: SkillCategory,
    #[serde(default = "beginner")]
    proficiency_level: i32,
    #[serde(default)]
    years_of_experience: i32,
}

fn beginner() -> i32 {
    1
}

#[derive(Clone)]
pub struct Importer {
    store: Arc<dyn PlannerStore>,
}

impl Importer {
    pub fn new(store: Arc<dyn PlannerStore>) -> Self {
        Self { store }
    }

    /// Records a run for `profile_id` and imports every record.
    ///
    /// Errors only when the upload is rejected up front (unsupported file
    /// type) or the run itself cannot be stored. Problems with the file's
    /// content end up in the returned run.
    pub async fn run(&self, profile_id: Uuid, request: ImportRequest) -> Result<ImportRun, RecordError> {
        let file_type = ImportFileType::from_file_name(&request.file_name)
            .ok_or_else(|| invalid(format!("Unsupported file format: {}", request.file_name)))?;
        if file_type != ImportFileType::Json {
            return Err(invalid("Only JSON imports are supported"));
        }

        let mut import = self
            .store
            .insert_import(
                profile_id,
                &NewDataImport {
                    file_name: request.file_name.clone(),
                    file_type,
                    import_type: request.import_type,
                },
            )
            .await?;
        import.status = ImportStatus::Processing;
        let mut import = self.save(&import).await?;

        let records = match parse_records(request.source) {
            Ok(records) => records,
            Err(reason) => return self.fail(import, reason).await,
        };

        info!(
            "Importing {} {:?} record(s) from {} into profile {profile_id}",
            records.len(),
            request.import_type,
            request.file_name
        );

        let mut errors = Vec::new();
        for (index, record) in records.iter().enumerate() {
            import.records_processed += 1;
            match self
                .import_record(profile_id, request.import_type, record, request.options)
                .await
            {
                Ok(()) => import.records_successful += 1,
                Err(e) => {
                    import.records_failed += 1;
                    let line = format!("Item {}: {e}", index + 1);
                    if !request.options.skip_errors {
                        return self.fail(import, line).await;
                    }
                    errors.push(line);
                }
            }
        }

        import.error_log = errors.join("\n");
        import.status = ImportStatus::Completed;
        import.completed_at = Some(Utc::now());
        let import = self.save(&import).await?;
        info!(
            "Import {} completed: {} ok, {} failed",
            import.id, import.records_successful, import.records_failed
        );
        Ok(ImportRun {
            import,
            failure: None,
        })
    }

    async fn fail(&self, mut import: DataImport, reason: String) -> Result<ImportRun, RecordError> {
        warn!("Import {} failed: {reason}", import.id);
        import.status = ImportStatus::Failed;
        import.error_log = reason.clone();
        Ok(ImportRun {
            import: self.save(&import).await?,
            failure: Some(reason),
        })
    }

    async fn save(&self, import: &DataImport) -> Result<DataImport, RecordError> {
        self.store
            .update_import(import)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("import {}", import.id)).into())
    }

    async fn import_record(
        &self,
        profile_id: Uuid,
        import_type: ImportType,
        record: &Value,
        options: ImportOptions,
    ) -> Result<(), RecordError> {
        match record_kind(import_type, record)? {
            ImportType::Skills => self.import_skill(profile_id, parse(record)?, options).await,
            ImportType::Education => {
                self.import_education(profile_id, parse(record)?, options).await
            }
            ImportType::Experience => {
                self.import_experience(profile_id, parse(record)?, options).await
            }
            ImportType::Goals => self.import_goal(profile_id, parse(record)?, options).await,
            ImportType::Profile => self.import_profile(profile_id, record).await,
            ImportType::Bulk => Err(invalid("bulk records cannot nest")),
        }
    }

    async fn import_skill(
        &self,
        profile_id: Uuid,
        record: SkillRecord,
        options: ImportOptions,
    ) -> Result<(), RecordError> {
        let skill = self
            .store
            .find_or_create_skill(&record.skill_name, record.category)
            .await?;
        let wanted = NewUserSkill {
            skill_id: skill.id,
            proficiency_level: record.proficiency_level,
            years_of_experience: record.years_of_experience,
            is_current: true,
        };
        validate_new_user_skill(&wanted)?;

        let existing = self
            .store
            .list_user_skills(profile_id)
            .await?
            .into_iter()
            .find(|row| row.skill_id == skill.id);
        match existing {
            Some(mut row) if options.overwrite_existing => {
                row.proficiency_level = wanted.proficiency_level;
                row.years_of_experience = wanted.years_of_experience;
                self.store.update_user_skill(&row).await?;
            }
            Some(_) => debug!("Keeping existing skill {} for {profile_id}", skill.name),
            None => {
                self.store.insert_user_skill(profile_id, &wanted).await?;
            }
        }
        Ok(())
    }

    async fn import_education(
        &self,
        profile_id: Uuid,
        record: NewEducation,
        options: ImportOptions,
    ) -> Result<(), RecordError> {
        validate_new_education(&record)?;
        if options.overwrite_existing {
            let matching = self
                .store
                .list_education(profile_id)
                .await?
                .into_iter()
                .find(|row| row.institution == record.institution && row.degree == record.degree);
            if let Some(row) = matching {
                self.store.delete_education(row.id).await?;
            }
        }
        self.store.insert_education(profile_id, &record).await?;
        Ok(())
    }

    async fn import_experience(
        &self,
        profile_id: Uuid,
        record: NewWorkExperience,
        options: ImportOptions,
    ) -> Result<(), RecordError> {
        validate_new_experience(&record)?;
        if options.overwrite_existing {
            let matching = self
                .store
                .list_experience(profile_id)
                .await?
                .into_iter()
                .find(|row| row.company == record.company && row.position == record.position);
            if let Some(row) = matching {
                self.store.delete_experience(row.id).await?;
            }
        }
        self.store.insert_experience(profile_id, &record).await?;
        Ok(())
    }

    async fn import_goal(
        &self,
        profile_id: Uuid,
        record: NewCareerGoal,
        options: ImportOptions,
    ) -> Result<(), RecordError> {
        if options.overwrite_existing {
            let matching = self
                .store
                .list_goals(profile_id)
                .await?
                .into_iter()
                .find(|row| row.title == record.title);
            if let Some(row) = matching {
                self.store.delete_goal(row.id).await?;
            }
        }
        self.store.insert_goal(profile_id, &record).await?;
        Ok(())
    }

    /// Merges the record onto the importing profile with the usual profile rules.
    async fn import_profile(&self, profile_id: Uuid, record: &Value) -> Result<(), RecordError> {
        let mut tx = self.store.begin().await?;
        update_profile_by_id(tx.as_mut(), profile_id, record)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("profile {profile_id}")))?;
        tx.commit().await?;
        Ok(())
    }
}

fn parse_records(source: ImportSource) -> Result<Vec<Value>, String> {
    let value = match source {
        ImportSource::File(bytes) => {
            serde_json::from_slice(&bytes).map_err(|e| format!("Invalid JSON file: {e}"))?
        }
        ImportSource::Records(value) => value,
    };
    match value {
        Value::Array(records) => Ok(records),
        _ => Err("Expected a JSON array of records".to_string()),
    }
}

/// The kind a record is imported as. Bulk records name theirs under `"type"`.
fn record_kind(import_type: ImportType, record: &Value) -> Result<ImportType, RecordError> {
    if import_type != ImportType::Bulk {
        return Ok(import_type);
    }
    let kind = record
        .get("type")
        .cloned()
        .ok_or_else(|| invalid("bulk record is missing \"type\""))?;
    serde_json::from_value(kind).map_err(|e| invalid(format!("unknown record type: {e}")))
}

fn parse<T: DeserializeOwned>(record: &Value) -> Result<T, RecordError> {
    T::deserialize(record).map_err(|e| invalid(e.to_string()))
}
