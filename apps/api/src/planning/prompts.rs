// Prompt Builder for career plan generation.
// Pure string assembly: no validation, no I/O.

use serde_json::Value;

use crate::models::profile::Profile;

pub const PLAN_PROMPT_HEADER: &str =
    "Generate a career transformation plan for the following user:";

pub const PLAN_PROMPT_DIRECTIVE: &str = "Please generate a comprehensive career transformation \
    plan with exactly 4 milestones and 12 weekly plans. \
    Each weekly plan should have maximum 5 focus areas.";

/// Builds the user-role prompt for one profile. A blank instruction is
/// treated as absent.
pub fn build_plan_prompt(profile: &Profile, user_prompt: Option<&str>) -> String {
    let mut parts = vec![
        PLAN_PROMPT_HEADER.to_string(),
        format!("\nName: {}", profile.name),
        format!("Age: {}", profile.age),
        format!("Gender: {}", profile.gender),
        format!("Current Title: {}", profile.title),
        format!("Education: {}", profile.education),
        format!("Years of Experience: {}", profile.years_experience),
        format!("Income Level: {}", profile.income_level),
        format!("Last Career Change: {}", profile.last_career_change),
        format!("User Type: {}", profile.user_type),
        format!("\nSummary: {}", profile.summary),
        format!("\nPersonality Traits: {}", pretty(&profile.personality_traits)),
        format!("\nMotivators: {}", pretty(&profile.motivators)),
        format!("\nWork Style: {}", pretty(&profile.work_style)),
    ];

    if let Some(extra) = user_prompt.map(str::trim).filter(|s| !s.is_empty()) {
        parts.push(format!("\nAdditional Requirements: {extra}"));
    }

    parts.push(format!("\n\n{PLAN_PROMPT_DIRECTIVE}"));
    parts.join("\n")
}

fn pretty(value: &Value) -> String {
    // Serializing a Value cannot fail; fall back to compact form regardless.
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
