//! Plan Generation — turns submitted profiles into stored career plans.
//!
//! Flow per profile: preview merged profile → build prompt → model call →
//! validate → (transaction: upsert profile, INSERT plan, commit) → request
//! log → export file.
//!
//! The model call can take as long as the request timeout, so it runs before
//! any transaction is opened: the prompt is built from a merge computed on an
//! unlocked read, and the upsert is redone inside the write transaction.
//! When the model call or validation fails the upsert is still committed and
//! only the plan is missing. A storage failure rolls back both. Profiles in a
//! batch are independent: one failing never stops the next.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::llm_client::{ModelReply, PlanModel};
use crate::models::plan::{NewPlan, Plan, PlanView};
use crate::models::profile::Profile;
use crate::models::request_log::{NewRequestLog, RequestStatus, RequestType};
use crate::planning::export::FileExporter;
use crate::planning::prompts::build_plan_prompt;
use crate::planning::request_log::RequestLogger;
use crate::planning::validation::{validate_plan_document, PlanDocument};
use crate::planning::GenerationError;
use crate::profiles::{preview_profile, upsert_profile, ProfileError};
use crate::store::PlannerStore;

/// Request body for plan generation.
#[derive(Debug, Clone, Deserialize)]
pub struct GeneratePlanRequest {
    pub user_profiles: Vec<Value>,
    #[serde(default)]
    pub user_prompt: Option<String>,
}

/// Outcome of one profile's trip through the pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct PlanResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub career_plan: Option<PlanView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    pub processing_time: f64,
    pub tokens_used: u32,
}

impl PlanResult {
    fn failed(error: String, details: String, elapsed: Duration) -> Self {
        Self {
            success: false,
            message: None,
            error: Some(error),
            details: Some(details),
            career_plan: None,
            file_path: None,
            processing_time: elapsed.as_secs_f64(),
            tokens_used: 0,
        }
    }
}

/// One submission in flight. `profile` is the preview until a write lands.
struct Attempt<'a> {
    submission: &'a Value,
    user_prompt: &'a str,
    profile: Profile,
    input_data: Value,
}

impl Attempt<'_> {
    /// Id of a profile row that existed before this attempt, if any.
    fn stored_profile_id(&self) -> Option<Uuid> {
        Some(self.profile.id).filter(|id| !id.is_nil())
    }
}

#[derive(Clone)]
pub struct PlanGenerator {
    store: Arc<dyn PlannerStore>,
    model: Arc<dyn PlanModel>,
    logger: RequestLogger,
    exporter: FileExporter,
}

impl PlanGenerator {
    pub fn new(
        store: Arc<dyn PlannerStore>,
        model: Arc<dyn PlanModel>,
        exporter: FileExporter,
    ) -> Self {
        Self {
            logger: RequestLogger::new(store.clone()),
            store,
            model,
            exporter,
        }
    }

    /// Runs every profile in order and returns one result per profile.
    pub async fn generate(&self, request: &GeneratePlanRequest) -> Vec<PlanResult> {
        let user_prompt = request.user_prompt.as_deref().unwrap_or_default();
        let mut results = Vec::with_capacity(request.user_profiles.len());
        for submission in &request.user_profiles {
            results.push(self.generate_for_profile(submission, user_prompt).await);
        }
        results
    }

    pub async fn generate_for_profile(&self, submission: &Value, user_prompt: &str) -> PlanResult {
        let display_name = submission
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("unknown user")
            .to_string();

        let profile = match preview_profile(self.store.as_ref(), submission).await {
            Ok(profile) => profile,
            Err(e) => {
                warn!("Rejected profile submission for {display_name}: {e}");
                return PlanResult::failed(
                    format!("Error processing {display_name}"),
                    e.to_string(),
                    Duration::ZERO,
                );
            }
        };

        let prompt = build_plan_prompt(&profile, Some(user_prompt));
        info!("Requesting plan for {} ({})", profile.email, profile.name);

        let attempt = Attempt {
            submission,
            user_prompt,
            profile,
            input_data: json!({
                "user_profile": submission,
                "user_prompt": user_prompt,
            }),
        };

        let (cause, elapsed) = match self.model.complete_json(&prompt).await {
            Ok(reply) => match validate_plan_document(&reply.document) {
                Ok(document) => return self.store_plan(attempt, document, reply).await,
                Err(schema) => {
                    warn!("Plan reply rejected ({:?}): {schema}", schema.kind());
                    debug!("Rejected reply: {}", reply.raw_text);
                    (GenerationError::from(schema), reply.elapsed)
                }
            },
            Err(failure) => (GenerationError::from(failure.error), failure.elapsed),
        };

        // Profile without plan: the upsert stands.
        self.save_profile_and_report(attempt, cause, elapsed).await
    }

    /// Upserts the profile and inserts the plan in one transaction.
    async fn write_plan(
        &self,
        submission: &Value,
        plan: impl FnOnce(&Profile) -> NewPlan,
    ) -> Result<(Profile, Plan), ProfileError> {
        let mut tx = self.store.begin().await?;
        let profile = upsert_profile(tx.as_mut(), submission).await?.profile;
        let plan = tx.insert_plan(&plan(&profile)).await?;
        tx.commit().await?;
        Ok((profile, plan))
    }

    async fn store_plan(
        &self,
        mut attempt: Attempt<'_>,
        document: PlanDocument,
        reply: ModelReply,
    ) -> PlanResult {
        let user_prompt = attempt.user_prompt;
        let ai_model_used = self.model.model_name().to_string();
        let new_plan = |profile: &Profile| NewPlan {
            profile_id: profile.id,
            goal_id: document.goal_id,
            plan_description: document.plan_description,
            blockers: Value::Array(document.blockers),
            milestones: Value::Array(document.milestones),
            weekly_plans: Value::Array(document.weekly_plans),
            user_prompt: user_prompt.to_string(),
            ai_model_used,
            tokens_used: i32::try_from(reply.tokens_used).unwrap_or(i32::MAX),
            processing_time: reply.elapsed.as_secs_f64(),
        };

        let (profile, plan) = match self.write_plan(attempt.submission, new_plan).await {
            Ok(written) => written,
            Err(e) => {
                // Dropped transaction: the upsert was rolled back with the plan.
                error!("Failed to store plan for {}: {e}", attempt.profile.email);
                let profile_id = attempt.stored_profile_id();
                let summary = format!("Error processing {}", attempt.profile.name);
                return self
                    .report_failure(&attempt, profile_id, summary, e.to_string(), reply.elapsed)
                    .await;
            }
        };

        self.logger
            .record(NewRequestLog {
                profile_id: Some(profile.id),
                profile_email: profile.email.clone(),
                plan_id: Some(plan.id),
                request_type: RequestType::PlanGeneration,
                input_data: std::mem::take(&mut attempt.input_data),
                output_data: reply.document.clone(),
                ai_model: self.model.model_name().to_string(),
                tokens_used: plan.tokens_used,
                processing_time: plan.processing_time,
                status: RequestStatus::Success,
                error_message: String::new(),
            })
            .await;

        let filename = FileExporter::generate_filename("career_plan", &profile.name, None);
        let file_path = self.exporter.save_json(&reply.document, &filename);

        info!(
            "Generated plan {} for profile {} in {:.2}s ({} tokens)",
            plan.id,
            profile.id,
            plan.processing_time,
            reply.tokens_used
        );

        PlanResult {
            success: true,
            message: Some(format!(
                "Career plan generated successfully for {}",
                profile.name
            )),
            error: None,
            details: None,
            career_plan: Some(PlanView::from(plan)),
            file_path: file_path.map(|p| p.display().to_string()),
            processing_time: reply.elapsed.as_secs_f64(),
            tokens_used: reply.tokens_used,
        }
    }

    async fn save_profile(&self, submission: &Value) -> Result<Profile, ProfileError> {
        let mut tx = self.store.begin().await?;
        let profile = upsert_profile(tx.as_mut(), submission).await?.profile;
        tx.commit().await?;
        Ok(profile)
    }

    async fn save_profile_and_report(
        &self,
        attempt: Attempt<'_>,
        cause: GenerationError,
        elapsed: Duration,
    ) -> PlanResult {
        warn!("Plan generation failed for {}: {cause}", attempt.profile.email);

        let (profile_id, summary, details) = match self.save_profile(attempt.submission).await {
            Ok(profile) => (
                Some(profile.id),
                format!("Failed to generate plan for {}", profile.name),
                cause.to_string(),
            ),
            Err(e) => {
                error!("Failed to save profile {}: {e}", attempt.profile.email);
                (
                    attempt.stored_profile_id(),
                    format!("Error processing {}", attempt.profile.name),
                    e.to_string(),
                )
            }
        };

        self.report_failure(&attempt, profile_id, summary, details, elapsed)
            .await
    }

    /// Logs the failed request and writes a best-effort error file.
    /// `profile_id` must name a committed row or be `None`.
    async fn report_failure(
        &self,
        attempt: &Attempt<'_>,
        profile_id: Option<Uuid>,
        summary: String,
        details: String,
        elapsed: Duration,
    ) -> PlanResult {
        self.logger
            .record(NewRequestLog {
                profile_id,
                profile_email: attempt.profile.email.clone(),
                plan_id: None,
                request_type: RequestType::PlanGeneration,
                input_data: attempt.input_data.clone(),
                output_data: json!({}),
                ai_model: self.model.model_name().to_string(),
                tokens_used: 0,
                processing_time: elapsed.as_secs_f64(),
                status: RequestStatus::Error,
                error_message: details.clone(),
            })
            .await;

        let error_data = json!({
            "success": false,
            "error": details,
            "user_profile": attempt.submission,
            "user_prompt": attempt.user_prompt,
            "timestamp": Utc::now().to_rfc3339(),
        });
        let filename =
            FileExporter::generate_filename("career_plan_error", &attempt.profile.name, None);
        let file_path = self.exporter.save_json(&error_data, &filename);

        let mut result = PlanResult::failed(summary, details, elapsed);
        result.file_path = file_path.map(|p| p.display().to_string());
        result
    }
}
