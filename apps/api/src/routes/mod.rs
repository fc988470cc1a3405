pub mod health;

use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::background::handlers as background;
use crate::planning::{executions, handlers as plans};
use crate::profiles::handlers as profiles;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Career plans
        .route("/api/v1/career-plans", get(plans::handle_list_plans))
        .route(
            "/api/v1/career-plans/generate",
            post(plans::handle_generate),
        )
        .route(
            "/api/v1/career-plans/export",
            get(plans::handle_export_plans),
        )
        .route(
            "/api/v1/career-plans/:id",
            get(plans::handle_get_plan).delete(plans::handle_delete_plan),
        )
        .route(
            "/api/v1/career-plans/:id/status",
            patch(plans::handle_update_plan_status),
        )
        // User profiles
        .route(
            "/api/v1/user-profiles",
            get(profiles::handle_list_profiles).post(profiles::handle_create_profile),
        )
        .route(
            "/api/v1/user-profiles/bulk",
            post(profiles::handle_bulk_create),
        )
        .route(
            "/api/v1/user-profiles/:id",
            get(profiles::handle_get_profile)
                .patch(profiles::handle_update_profile)
                .delete(profiles::handle_delete_profile),
        )
        // Career background
        .route(
            "/api/v1/skills",
            get(background::handle_list_skills).post(background::handle_create_skill),
        )
        .route(
            "/api/v1/skills/:id",
            get(background::handle_get_skill).delete(background::handle_delete_skill),
        )
        .route(
            "/api/v1/user-profiles/:id/skills",
            get(background::handle_list_user_skills).post(background::handle_add_user_skill),
        )
        .route(
            "/api/v1/user-profiles/:id/skills/export",
            get(background::handle_export_user_skills),
        )
        .route(
            "/api/v1/user-skills/:id",
            get(background::handle_get_user_skill)
                .patch(background::handle_update_user_skill)
                .delete(background::handle_delete_user_skill),
        )
        .route(
            "/api/v1/user-profiles/:id/education",
            get(background::handle_list_education).post(background::handle_add_education),
        )
        .route(
            "/api/v1/user-profiles/:id/education/export",
            get(background::handle_export_education),
        )
        .route(
            "/api/v1/education/:id",
            get(background::handle_get_education)
                .patch(background::handle_update_education)
                .delete(background::handle_delete_education),
        )
        .route(
            "/api/v1/user-profiles/:id/experience",
            get(background::handle_list_experience).post(background::handle_add_experience),
        )
        .route(
            "/api/v1/user-profiles/:id/experience/export",
            get(background::handle_export_experience),
        )
        .route(
            "/api/v1/experience/:id",
            get(background::handle_get_experience)
                .patch(background::handle_update_experience)
                .delete(background::handle_delete_experience),
        )
        .route(
            "/api/v1/user-profiles/:id/goals",
            get(background::handle_list_goals).post(background::handle_add_goal),
        )
        .route(
            "/api/v1/user-profiles/:id/goals/export",
            get(background::handle_export_goals),
        )
        .route(
            "/api/v1/goals/:id",
            get(background::handle_get_goal)
                .patch(background::handle_update_goal)
                .delete(background::handle_delete_goal),
        )
        .route(
            "/api/v1/user-profiles/:id/imports",
            get(background::handle_list_imports).post(background::handle_import),
        )
        .route(
            "/api/v1/user-profiles/:id/imports/export",
            get(background::handle_export_imports),
        )
        .route("/api/v1/imports/:id", get(background::handle_get_import))
        .route(
            "/api/v1/user-profiles/:id/export",
            get(background::handle_export_all),
        )
        // Plan executions
        .route(
            "/api/v1/plan-executions",
            get(executions::handle_list_executions).post(executions::handle_create_execution),
        )
        .route(
            "/api/v1/plan-executions/:id",
            get(executions::handle_get_execution).patch(executions::handle_update_execution),
        )
        // AI request logs
        .route("/api/v1/ai-logs", get(plans::handle_list_logs))
        .route("/api/v1/ai-logs/export", get(plans::handle_export_logs))
        .route("/api/v1/ai-logs/:id", get(plans::handle_get_log))
        .with_state(state)
}
