use axum::{
    extract::{FromRequest, Multipart, Path, Request, State},
    http::{header::CONTENT_TYPE, StatusCode},
    Json,
};
use serde::Serialize;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::profile::Profile;
use crate::planning::export::FileExporter;
use crate::profiles::{update_profile_by_id, upsert_profile, ProfileError};
use crate::state::AppState;

/// Multipart field carrying a bulk upload.
const UPLOAD_FIELD: &str = "file";

#[derive(Debug, Serialize)]
pub struct BulkResponse {
    pub success: bool,
    pub message: String,
    pub created_count: usize,
    pub updated_count: usize,
    pub profiles: Vec<Profile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
}

/// GET /api/v1/user-profiles
pub async fn handle_list_profiles(
    State(state): State<AppState>,
) -> Result<Json<Vec<Profile>>, AppError> {
    Ok(Json(state.store.list_profiles().await?))
}

/// POST /api/v1/user-profiles
///
/// Upsert keyed by email: 201 when created, 200 when an existing profile
/// was updated.
pub async fn handle_create_profile(
    State(state): State<AppState>,
    Json(submission): Json<Value>,
) -> Result<(StatusCode, Json<Profile>), AppError> {
    let mut tx = state.store.begin().await?;
    let upserted = upsert_profile(tx.as_mut(), &submission).await?;
    tx.commit().await?;

    let status = if upserted.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(upserted.profile)))
}

/// GET /api/v1/user-profiles/:id
pub async fn handle_get_profile(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Profile>, AppError> {
    state
        .store
        .get_profile(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("User profile {id} not found")))
}

/// PATCH /api/v1/user-profiles/:id
pub async fn handle_update_profile(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(submission): Json<Value>,
) -> Result<Json<Profile>, AppError> {
    let mut tx = state.store.begin().await?;
    let profile = update_profile_by_id(tx.as_mut(), id, &submission)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User profile {id} not found")))?;
    tx.commit().await?;
    Ok(Json(profile))
}

/// DELETE /api/v1/user-profiles/:id
pub async fn handle_delete_profile(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if state.store.delete_profile(id).await? {
        info!("Deleted profile {id}");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("User profile {id} not found")))
    }
}

/// POST /api/v1/user-profiles/bulk
///
/// Accepts a JSON body (`{"user_profiles": [...]}` or one profile object) or
/// a multipart upload of a `.json` file in the same shape. All profiles are
/// upserted in one transaction; the first bad profile rejects the batch.
pub async fn handle_bulk_create(
    State(state): State<AppState>,
    request: Request,
) -> Result<(StatusCode, Json<BulkResponse>), AppError> {
    let is_multipart = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"));

    let payload = if is_multipart {
        let multipart = Multipart::from_request(request, &state)
            .await
            .map_err(|e| AppError::Validation(e.body_text()))?;
        read_json_upload(multipart).await?
    } else {
        let Json(body) = Json::<Value>::from_request(request, &state)
            .await
            .map_err(|e| AppError::Validation(e.body_text()))?;
        body
    };

    let submissions = profiles_from_payload(payload)?;

    let mut tx = state.store.begin().await?;
    let mut created = Vec::new();
    let mut updated = Vec::new();
    for (index, submission) in submissions.iter().enumerate() {
        match upsert_profile(tx.as_mut(), submission).await {
            Ok(upserted) if upserted.created => created.push(upserted.profile),
            Ok(upserted) => updated.push(upserted.profile),
            Err(ProfileError::Invalid(e)) => {
                return Err(AppError::Validation(format!(
                    "Error processing profile {}: {e}",
                    index + 1
                )));
            }
            Err(e) => return Err(e.into()),
        }
    }
    tx.commit().await?;

    info!(
        "Bulk upsert: {} created, {} updated",
        created.len(),
        updated.len()
    );

    let mut response = BulkResponse {
        success: true,
        message: format!("Processed {} user profiles", submissions.len()),
        created_count: created.len(),
        updated_count: updated.len(),
        profiles: created.into_iter().chain(updated).collect(),
        file_path: None,
    };
    let filename = FileExporter::timestamped_filename("user_profiles_bulk");
    response.file_path = state
        .exporter
        .save_json(&response, &filename)
        .map(|p| p.display().to_string());

    Ok((StatusCode::CREATED, Json(response)))
}

async fn read_json_upload(mut multipart: Multipart) -> Result<Value, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart body: {e}")))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        if !filename.ends_with(".json") {
            return Err(AppError::Validation(
                "Only JSON files are supported".to_string(),
            ));
        }
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Invalid file: {e}")))?;
        return serde_json::from_slice(&data)
            .map_err(|e| AppError::Validation(format!("Invalid JSON file {filename}: {e}")));
    }
    Err(AppError::Validation(format!(
        "Missing '{UPLOAD_FIELD}' upload"
    )))
}

/// `{"user_profiles": [...]}` yields the list; any other object is one profile.
fn profiles_from_payload(payload: Value) -> Result<Vec<Value>, AppError> {
    match payload {
        Value::Object(mut map) if map.contains_key("user_profiles") => {
            match map.remove("user_profiles") {
                Some(Value::Array(items)) => Ok(items),
                _ => Err(AppError::Validation(
                    "user_profiles must be an array".to_string(),
                )),
            }
        }
        single @ Value::Object(_) => Ok(vec![single]),
        _ => Err(AppError::Validation(
            "Expected a profile object or {\"user_profiles\": [...]}".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wrapped_list_is_unpacked() {
        let items = profiles_from_payload(json!({
            "user_profiles": [{"email": "a@x.io"}, {"email": "b@x.io"}]
        }))
        .unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1]["email"], "b@x.io");
    }

    #[test]
    fn test_single_object_is_one_profile() {
        let items = profiles_from_payload(json!({"email": "a@x.io", "name": "A"})).unwrap();
        assert_eq!(items, vec![json!({"email": "a@x.io", "name": "A"})]);
    }

    #[test]
    fn test_non_array_user_profiles_rejected() {
        let err = profiles_from_payload(json!({"user_profiles": {"email": "a@x.io"}})).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_bare_array_rejected() {
        assert!(profiles_from_payload(json!([{"email": "a@x.io"}])).is_err());
    }
}
