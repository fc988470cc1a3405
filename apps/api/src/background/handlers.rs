use axum::{
    extract::{FromRequest, Multipart, Path, Query, Request, State},
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::background::import::{ImportOptions, ImportRequest, ImportSource, Importer};
use crate::background::{
    validate_new_education, validate_new_experience, validate_new_user_skill, EducationPatch,
    ExperiencePatch, GoalPatch, UserSkillPatch,
};
use crate::errors::AppError;
use crate::models::background::{
    CareerGoal, DataImport, Education, ImportType, NewCareerGoal, NewEducation, NewSkill,
    NewUserSkill, NewWorkExperience, Skill, UserSkill, WorkExperience,
};
use crate::models::profile::Profile;
use crate::planning::export::FileExporter;
use crate::state::AppState;
use crate::store::BackgroundStore;

const UPLOAD_FIELD: &str = "file";
const JSON_FORMAT: &str = "json";

#[derive(Deserialize)]
pub struct ExportQuery {
    pub format: Option<String>,
}

#[derive(Serialize)]
pub struct RecordExportResponse {
    pub success: bool,
    pub message: String,
    pub file_path: String,
    pub format: &'static str,
    pub count: usize,
}

#[derive(Serialize)]
pub struct ImportResponse {
    pub message: String,
    pub import_id: Uuid,
    pub records_processed: i32,
    pub records_successful: i32,
    pub records_failed: i32,
    pub timestamp: String,
    pub file_path: Option<String>,
}

/// JSON-body alternative to a multipart upload.
#[derive(Deserialize)]
pub struct ImportBody {
    pub import_type: ImportType,
    #[serde(default = "default_import_name")]
    pub file_name: String,
    #[serde(flatten)]
    pub options: ImportOptions,
    pub records: Value,
}

fn default_import_name() -> String {
    "records.json".to_string()
}

async fn require_profile(state: &AppState, id: Uuid) -> Result<Profile, AppError> {
    state
        .store
        .get_profile(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User profile {id} not found")))
}

fn not_found(kind: &str, id: Uuid) -> AppError {
    AppError::NotFound(format!("{kind} {id} not found"))
}

fn deleted(found: bool, kind: &str, id: Uuid) -> Result<StatusCode, AppError> {
    if found {
        info!("Deleted {kind} {id}");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(kind, id))
    }
}

// Skill catalog

/// GET /api/v1/skills
pub async fn handle_list_skills(
    State(state): State<AppState>,
) -> Result<Json<Vec<Skill>>, AppError> {
    Ok(Json(state.store.list_skills().await?))
}

/// POST /api/v1/skills
pub async fn handle_create_skill(
    State(state): State<AppState>,
    Json(skill): Json<NewSkill>,
) -> Result<(StatusCode, Json<Skill>), AppError> {
    if skill.name.trim().is_empty() {
        return Err(AppError::Validation("Skill name is required".to_string()));
    }
    Ok((StatusCode::CREATED, Json(state.store.insert_skill(&skill).await?)))
}

/// GET /api/v1/skills/:id
pub async fn handle_get_skill(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Skill>, AppError> {
    state
        .store
        .get_skill(id)
        .await?
        .map(Json)
        .ok_or_else(|| not_found("Skill", id))
}

/// DELETE /api/v1/skills/:id
pub async fn handle_delete_skill(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    deleted(state.store.delete_skill(id).await?, "Skill", id)
}

// User skills

/// GET /api/v1/user-profiles/:id/skills
pub async fn handle_list_user_skills(
    State(state): State<AppState>,
    Path(profile_id): Path<Uuid>,
) -> Result<Json<Vec<UserSkill>>, AppError> {
    require_profile(&state, profile_id).await?;
    Ok(Json(state.store.list_user_skills(profile_id).await?))
}

/// POST /api/v1/user-profiles/:id/skills
pub async fn handle_add_user_skill(
    State(state): State<AppState>,
    Path(profile_id): Path<Uuid>,
    Json(skill): Json<NewUserSkill>,
) -> Result<(StatusCode, Json<UserSkill>), AppError> {
    validate_new_user_skill(&skill)?;
    let row = state.store.insert_user_skill(profile_id, &skill).await?;
    Ok((StatusCode::CREATED, Json(row)))
}

/// GET /api/v1/user-skills/:id
pub async fn handle_get_user_skill(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<UserSkill>, AppError> {
    state
        .store
        .get_user_skill(id)
        .await?
        .map(Json)
        .ok_or_else(|| not_found("User skill", id))
}

/// PATCH /api/v1/user-skills/:id
pub async fn handle_update_user_skill(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(patch): Json<UserSkillPatch>,
) -> Result<Json<UserSkill>, AppError> {
    let mut row = state
        .store
        .get_user_skill(id)
        .await?
        .ok_or_else(|| not_found("User skill", id))?;
    patch.apply(&mut row)?;
    state
        .store
        .update_user_skill(&row)
        .await?
        .map(Json)
        .ok_or_else(|| not_found("User skill", id))
}

/// DELETE /api/v1/user-skills/:id
pub async fn handle_delete_user_skill(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    deleted(state.store.delete_user_skill(id).await?, "User skill", id)
}

// Education

/// GET /api/v1/user-profiles/:id/education
pub async fn handle_list_education(
    State(state): State<AppState>,
    Path(profile_id): Path<Uuid>,
) -> Result<Json<Vec<Education>>, AppError> {
    require_profile(&state, profile_id).await?;
    Ok(Json(state.store.list_education(profile_id).await?))
}

/// POST /api/v1/user-profiles/:id/education
pub async fn handle_add_education(
    State(state): State<AppState>,
    Path(profile_id): Path<Uuid>,
    Json(education): Json<NewEducation>,
) -> Result<(StatusCode, Json<Education>), AppError> {
    validate_new_education(&education)?;
    let row = state.store.insert_education(profile_id, &education).await?;
    Ok((StatusCode::CREATED, Json(row)))
}

/// GET /api/v1/education/:id
pub async fn handle_get_education(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Education>, AppError> {
    state
        .store
        .get_education(id)
        .await?
        .map(Json)
        .ok_or_else(|| not_found("Education", id))
}

/// PATCH /api/v1/education/:id
pub async fn handle_update_education(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(patch): Json<EducationPatch>,
) -> Result<Json<Education>, AppError> {
    let mut row = state
        .store
        .get_education(id)
        .await?
        .ok_or_else(|| not_found("Education", id))?;
    patch.apply(&mut row)?;
    state
        .store
        .update_education(&row)
        .await?
        .map(Json)
        .ok_or_else(|| not_found("Education", id))
}

/// DELETE /api/v1/education/:id
pub async fn handle_delete_education(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    deleted(state.store.delete_education(id).await?, "Education", id)
}

// Work experience

/// GET /api/v1/user-profiles/:id/experience
pub async fn handle_list_experience(
    State(state): State<AppState>,
    Path(profile_id): Path<Uuid>,
) -> Result<Json<Vec<WorkExperience>>, AppError> {
    require_profile(&state, profile_id).await?;
    Ok(Json(state.store.list_experience(profile_id).await?))
}

/// POST /api/v1/user-profiles/:id/experience
pub async fn handle_add_experience(
    State(state): State<AppState>,
    Path(profile_id): Path<Uuid>,
    Json(experience): Json<NewWorkExperience>,
) -> Result<(StatusCode, Json<WorkExperience>), AppError> {
    validate_new_experience(&experience)?;
    let row = state.store.insert_experience(profile_id, &experience).await?;
    Ok((StatusCode::CREATED, Json(row)))
}

/// GET /api/v1/experience/:id
pub async fn handle_get_experience(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<WorkExperience>, AppError> {
    state
        .store
        .get_experience(id)
        .await?
        .map(Json)
        .ok_or_else(|| not_found("Work experience", id))
}

/// PATCH /api/v1/experience/:id
pub async fn handle_update_experience(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(patch): Json<ExperiencePatch>,
) -> Result<Json<WorkExperience>, AppError> {
    let mut row = state
        .store
        .get_experience(id)
        .await?
        .ok_or_else(|| not_found("Work experience", id))?;
    patch.apply(&mut row)?;
    state
        .store
        .update_experience(&row)
        .await?
        .map(Json)
        .ok_or_else(|| not_found("Work experience", id))
}

/// DELETE /api/v1/experience/:id
pub async fn handle_delete_experience(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    deleted(state.store.delete_experience(id).await?, "Work experience", id)
}

// Career goals

/// GET /api/v1/user-profiles/:id/goals
pub async fn handle_list_goals(
    State(state): State<AppState>,
    Path(profile_id): Path<Uuid>,
) -> Result<Json<Vec<CareerGoal>>, AppError> {
    require_profile(&state, profile_id).await?;
    Ok(Json(state.store.list_goals(profile_id).await?))
}

/// POST /api/v1/user-profiles/:id/goals
pub async fn handle_add_goal(
    State(state): State<AppState>,
    Path(profile_id): Path<Uuid>,
    Json(goal): Json<NewCareerGoal>,
) -> Result<(StatusCode, Json<CareerGoal>), AppError> {
    if goal.title.trim().is_empty() {
        return Err(AppError::Validation("Goal title is required".to_string()));
    }
    let row = state.store.insert_goal(profile_id, &goal).await?;
    Ok((StatusCode::CREATED, Json(row)))
}

/// GET /api/v1/goals/:id
pub async fn handle_get_goal(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CareerGoal>, AppError> {
    state
        .store
        .get_goal(id)
        .await?
        .map(Json)
        .ok_or_else(|| not_found("Career goal", id))
}

/// PATCH /api/v1/goals/:id
pub async fn handle_update_goal(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(patch): Json<GoalPatch>,
) -> Result<Json<CareerGoal>, AppError> {
    let mut row = state
        .store
        .get_goal(id)
        .await?
        .ok_or_else(|| not_found("Career goal", id))?;
    patch.apply(&mut row);
    state
        .store
        .update_goal(&row)
        .await?
        .map(Json)
        .ok_or_else(|| not_found("Career goal", id))
}

/// DELETE /api/v1/goals/:id
pub async fn handle_delete_goal(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    deleted(state.store.delete_goal(id).await?, "Career goal", id)
}

// Imports

/// GET /api/v1/user-profiles/:id/imports
pub async fn handle_list_imports(
    State(state): State<AppState>,
    Path(profile_id): Path<Uuid>,
) -> Result<Json<Vec<DataImport>>, AppError> {
    require_profile(&state, profile_id).await?;
    Ok(Json(state.store.list_imports(profile_id).await?))
}

/// GET /api/v1/imports/:id
pub async fn handle_get_import(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DataImport>, AppError> {
    state
        .store
        .get_import(id)
        .await?
        .map(Json)
        .ok_or_else(|| not_found("Import", id))
}

/// POST /api/v1/user-profiles/:id/imports
///
/// Multipart upload of a `.json` file (fields `file`, `import_type`,
/// `overwrite_existing`, `skip_errors`) or a JSON body with the records
/// inline. 201 when the run completes, 400 when it fails; either way the
/// response is also written to the downloads directory.
pub async fn handle_import(
    State(state): State<AppState>,
    Path(profile_id): Path<Uuid>,
    request: Request,
) -> Result<Response, AppError> {
    let is_multipart = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"));

    let upload = if is_multipart {
        let multipart = Multipart::from_request(request, &state)
            .await
            .map_err(|e| AppError::Validation(e.body_text()))?;
        read_import_upload(multipart).await?
    } else {
        let Json(body) = Json::<ImportBody>::from_request(request, &state)
            .await
            .map_err(|e| AppError::Validation(e.body_text()))?;
        ImportRequest {
            file_name: body.file_name,
            import_type: body.import_type,
            options: body.options,
            source: ImportSource::Records(body.records),
        }
    };

    let profile = require_profile(&state, profile_id).await?;
    let run = Importer::new(state.store.clone()).run(profile_id, upload).await?;
    let import = run.import;
    let timestamp = Utc::now().to_rfc3339();

    let (status, prefix, mut body) = match run.failure {
        None => (
            StatusCode::CREATED,
            "import_response",
            serde_json::to_value(ImportResponse {
                message: "File uploaded and processed successfully".to_string(),
                import_id: import.id,
                records_processed: import.records_processed,
                records_successful: import.records_successful,
                records_failed: import.records_failed,
                timestamp,
                file_path: None,
            })
            .map_err(anyhow::Error::from)?,
        ),
        Some(details) => (
            StatusCode::BAD_REQUEST,
            "import_error",
            json!({
                "error": "Failed to process file",
                "details": details,
                "import_id": import.id,
                "timestamp": timestamp,
                "file_path": null,
            }),
        ),
    };
    let filename = FileExporter::generate_filename(prefix, &profile.name, None);
    if let Some(path) = state.exporter.save_json(&body, &filename) {
        body["file_path"] = json!(path.display().to_string());
    }
    Ok((status, Json(body)).into_response())
}

async fn read_import_upload(mut multipart: Multipart) -> Result<ImportRequest, AppError> {
    let mut file = None;
    let mut import_type: Option<ImportType> = None;
    let mut options = ImportOptions::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == UPLOAD_FIELD {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| AppError::Validation(format!("Invalid file: {e}")))?;
            file = Some((file_name, data.to_vec()));
            continue;
        }
        let text = field
            .text()
            .await
            .map_err(|e| AppError::Validation(format!("Invalid field {name}: {e}")))?;
        match name.as_str() {
            "import_type" => {
                import_type = Some(
                    serde_json::from_value(Value::String(text.trim().to_string()))
                        .map_err(|_| AppError::Validation(format!("Unknown import_type {text:?}")))?,
                )
            }
            "overwrite_existing" => options.overwrite_existing = parse_flag(&name, &text)?,
            "skip_errors" => options.skip_errors = parse_flag(&name, &text)?,
            _ => {}
        }
    }

    let (file_name, data) =
        file.ok_or_else(|| AppError::Validation(format!("Missing '{UPLOAD_FIELD}' upload")))?;
    let import_type =
        import_type.ok_or_else(|| AppError::Validation("import_type is required".to_string()))?;
    Ok(ImportRequest {
        file_name,
        import_type,
        options,
        source: ImportSource::File(data),
    })
}

fn parse_flag(name: &str, text: &str) -> Result<bool, AppError> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(AppError::Validation(format!("{name} must be true or false"))),
    }
}

// Exports

fn check_format(query: &ExportQuery) -> Result<(), AppError> {
    match query.format.as_deref() {
        None | Some(JSON_FORMAT) => Ok(()),
        Some(other) => Err(AppError::Validation(format!(
            "Unsupported export format {other:?}; only json is available"
        ))),
    }
}

fn export_records<T: Serialize>(
    exporter: &FileExporter,
    profile: &Profile,
    prefix: &str,
    label: &str,
    items: &[T],
) -> Result<Json<RecordExportResponse>, AppError> {
    let filename = FileExporter::generate_filename(prefix, &profile.name, None);
    let path = exporter
        .save_json(items, &filename)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to export {label}")))?;
    Ok(Json(RecordExportResponse {
        success: true,
        message: format!("Exported {} {label}", items.len()),
        file_path: path.display().to_string(),
        format: JSON_FORMAT,
        count: items.len(),
    }))
}

/// GET /api/v1/user-profiles/:id/skills/export
pub async fn handle_export_user_skills(
    State(state): State<AppState>,
    Path(profile_id): Path<Uuid>,
    Query(query): Query<ExportQuery>,
) -> Result<Json<RecordExportResponse>, AppError> {
    check_format(&query)?;
    let profile = require_profile(&state, profile_id).await?;
    let rows = state.store.list_user_skills(profile_id).await?;
    export_records(&state.exporter, &profile, "user_skills", "skills", &rows)
}

/// GET /api/v1/user-profiles/:id/education/export
pub async fn handle_export_education(
    State(state): State<AppState>,
    Path(profile_id): Path<Uuid>,
    Query(query): Query<ExportQuery>,
) -> Result<Json<RecordExportResponse>, AppError> {
    check_format(&query)?;
    let profile = require_profile(&state, profile_id).await?;
    let rows = state.store.list_education(profile_id).await?;
    export_records(&state.exporter, &profile, "education", "education records", &rows)
}

/// GET /api/v1/user-profiles/:id/experience/export
pub async fn handle_export_experience(
    State(state): State<AppState>,
    Path(profile_id): Path<Uuid>,
    Query(query): Query<ExportQuery>,
) -> Result<Json<RecordExportResponse>, AppError> {
    check_format(&query)?;
    let profile = require_profile(&state, profile_id).await?;
    let rows = state.store.list_experience(profile_id).await?;
    export_records(&state.exporter, &profile, "work_experience", "work experience records", &rows)
}

/// GET /api/v1/user-profiles/:id/goals/export
pub async fn handle_export_goals(
    State(state): State<AppState>,
    Path(profile_id): Path<Uuid>,
    Query(query): Query<ExportQuery>,
) -> Result<Json<RecordExportResponse>, AppError> {
    check_format(&query)?;
    let profile = require_profile(&state, profile_id).await?;
    let rows = state.store.list_goals(profile_id).await?;
    export_records(&state.exporter, &profile, "career_goals", "career goals", &rows)
}

/// GET /api/v1/user-profiles/:id/imports/export
pub async fn handle_export_imports(
    State(state): State<AppState>,
    Path(profile_id): Path<Uuid>,
    Query(query): Query<ExportQuery>,
) -> Result<Json<RecordExportResponse>, AppError> {
    check_format(&query)?;
    let profile = require_profile(&state, profile_id).await?;
    let rows = state.store.list_imports(profile_id).await?;
    export_records(&state.exporter, &profile, "import_history", "imports", &rows)
}

/// GET /api/v1/user-profiles/:id/export
///
/// Everything stored for one profile in a single file.
pub async fn handle_export_all(
    State(state): State<AppState>,
    Path(profile_id): Path<Uuid>,
    Query(query): Query<ExportQuery>,
) -> Result<Json<Value>, AppError> {
    check_format(&query)?;
    let profile = require_profile(&state, profile_id).await?;
    let skills = state.store.list_user_skills(profile_id).await?;
    let education = state.store.list_education(profile_id).await?;
    let experience = state.store.list_experience(profile_id).await?;
    let goals = state.store.list_goals(profile_id).await?;
    let imports = state.store.list_imports(profile_id).await?;

    let data = json!({
        "user_info": {"email": profile.email, "name": profile.name},
        "profile": profile,
        "skills": skills,
        "education": education,
        "experience": experience,
        "goals": goals,
        "imports": imports,
        "export_date": Utc::now().to_rfc3339(),
    });
    let filename = FileExporter::generate_filename("all_user_data", &profile.name, None);
    let path = state
        .exporter
        .save_json(&data, &filename)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to export user data")))?;
    info!("Exported all data for profile {profile_id}");

    Ok(Json(json!({
        "message": "All user data exported successfully",
        "file_path": path.display().to_string(),
        "format": JSON_FORMAT,
        "data_summary": {
            "skills_count": skills.len(),
            "education_count": education.len(),
            "experience_count": experience.len(),
            "goals_count": goals.len(),
            "imports_count": imports.len(),
        },
    })))
}
