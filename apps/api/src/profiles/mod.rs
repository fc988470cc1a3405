// Profile storage helpers and HTTP handlers.
// Writes go through `upsert_profile` so every entry point shares the same
// email-keyed merge rules.

pub mod handlers;
pub mod merge;

use chrono::Utc;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::profile::{Profile, ProfileFields};
use crate::profiles::merge::{is_read_only, MergeError, ProfileDraft};
use crate::store::{PlannerStore, StoreError, StoreTx};

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error(transparent)]
    Invalid(#[from] MergeError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone)]
pub struct UpsertedProfile {
    pub profile: Profile,
    pub created: bool,
}

/// Inserts a profile, or merges the submission onto the existing row with the
/// same email. Runs inside the caller's transaction.
pub async fn upsert_profile(
    tx: &mut dyn StoreTx,
    submission: &Value,
) -> Result<UpsertedProfile, ProfileError> {
    let (fields, email) = split_submission(submission)?;

    match tx.find_profile_by_email(email).await? {
        Some(existing) => {
            let (merged, skipped) = merge_onto(Some(&existing), fields)?;
            report_skipped(&skipped);
            let profile = tx.update_profile(existing.id, &merged).await?;
            debug!("Updated profile {} ({})", profile.id, profile.email);
            Ok(UpsertedProfile {
                profile,
                created: false,
            })
        }
        None => {
            let (merged, skipped) = merge_onto(None, fields)?;
            report_skipped(&skipped);
            let profile = tx.insert_profile(&merged).await?;
            debug!("Created profile {} ({})", profile.id, profile.email);
            Ok(UpsertedProfile {
                profile,
                created: true,
            })
        }
    }
}

/// The profile `upsert_profile` would write, computed from an unlocked read
/// and without writing anything. A profile that does not exist yet carries
/// the nil id.
pub async fn preview_profile(
    store: &dyn PlannerStore,
    submission: &Value,
) -> Result<Profile, ProfileError> {
    let (fields, email) = split_submission(submission)?;
    let existing = store.find_profile_by_email(email).await?;
    let (merged, _) = merge_onto(existing.as_ref(), fields)?;

    let now = Utc::now();
    Ok(match existing {
        Some(current) => Profile {
            created_at: current.created_at,
            ..Profile::from_fields(current.id, merged, now)
        },
        None => Profile::from_fields(Uuid::nil(), merged, now),
    })
}

/// Merges a partial update onto the profile with the given id.
/// Returns `None` when no such profile exists.
pub async fn update_profile_by_id(
    tx: &mut dyn StoreTx,
    id: Uuid,
    submission: &Value,
) -> Result<Option<Profile>, ProfileError> {
    let fields = submission.as_object().ok_or(MergeError::NotAnObject)?;
    let Some(existing) = tx.find_profile(id).await? else {
        return Ok(None);
    };
    let (merged, skipped) = merge_onto(Some(&existing), fields)?;
    report_skipped(&skipped);
    Ok(Some(tx.update_profile(id, &merged).await?))
}

fn split_submission(submission: &Value) -> Result<(&Map<String, Value>, &str), MergeError> {
    let fields = submission.as_object().ok_or(MergeError::NotAnObject)?;
    let email = fields
        .get("email")
        .and_then(Value::as_str)
        .map(str::trim)
        .ok_or_else(|| MergeError::MissingFields(vec!["email"]))?;
    Ok((fields, email))
}

/// Returns the merged fields and the submission keys that were skipped.
fn merge_onto(
    existing: Option<&Profile>,
    fields: &Map<String, Value>,
) -> Result<(ProfileFields, Vec<String>), MergeError> {
    let mut draft = existing.map(ProfileDraft::from).unwrap_or_default();
    let skipped = draft.merge(fields)?;
    Ok((draft.finish()?, skipped))
}

fn report_skipped(skipped: &[String]) {
    for key in skipped {
        if is_read_only(key) {
            debug!("Ignoring read-only profile field '{key}'");
        } else {
            warn!("Ignoring unknown profile field '{key}'");
        }
    }
}
