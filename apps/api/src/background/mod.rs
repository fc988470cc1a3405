// Career background records: the skill catalog, a profile's skills,
// education, work experience and goals, plus JSON imports into them.
//
// Field rules live here so the HTTP handlers and the importer apply the
// same checks before anything reaches the store.

pub mod handlers;
pub mod import;

use chrono::NaiveDate;
use serde::Deserialize;
use thiserror::Error;

use crate::models::background::{
    CareerGoal, Education, GoalPriority, GoalStatus, NewEducation, NewUserSkill,
    NewWorkExperience, UserSkill, WorkExperience,
};
use crate::profiles::ProfileError;
use crate::store::StoreError;

const PROFICIENCY_RANGE: std::ops::RangeInclusive<i32> = 1..=5;
const MAX_GPA: f64 = 9.99;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("{0}")]
    Invalid(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<ProfileError> for RecordError {
    fn from(err: ProfileError) -> Self {
        match err {
            ProfileError::Invalid(e) => RecordError::Invalid(e.to_string()),
            ProfileError::Store(e) => RecordError::Store(e),
        }
    }
}

fn invalid(message: impl Into<String>) -> RecordError {
    RecordError::Invalid(message.into())
}

fn check_skill_levels(proficiency_level: i32, years_of_experience: i32) -> Result<(), RecordError> {
    if !PROFICIENCY_RANGE.contains(&proficiency_level) {
        return Err(invalid(format!(
            "proficiency_level must be between 1 and 5, got {proficiency_level}"
        )));
    }
    if years_of_experience < 0 {
        return Err(invalid("years_of_experience must not be negative"));
    }
    Ok(())
}

fn check_dates(start: NaiveDate, end: Option<NaiveDate>) -> Result<(), RecordError> {
    match end {
        Some(end) if end < start => Err(invalid("end_date must not be before start_date")),
        _ => Ok(()),
    }
}

fn check_gpa(gpa: Option<f64>) -> Result<(), RecordError> {
    match gpa {
        Some(gpa) if !(0.0..=MAX_GPA).contains(&gpa) => {
            Err(invalid(format!("gpa must be between 0 and {MAX_GPA}, got {gpa}")))
        }
        _ => Ok(()),
    }
}

pub fn validate_new_user_skill(skill: &NewUserSkill) -> Result<(), RecordError> {
    check_skill_levels(skill.proficiency_level, skill.years_of_experience)
}

pub fn validate_new_education(education: &NewEducation) -> Result<(), RecordError> {
    check_dates(education.start_date, education.end_date)?;
    check_gpa(education.gpa)
}

pub fn validate_new_experience(experience: &NewWorkExperience) -> Result<(), RecordError> {
    check_dates(experience.start_date, experience.end_date)
}

// Partial updates. Absent fields are left untouched; each `apply` re-checks
// the merged row.

#[derive(Debug, Default, Deserialize)]
pub struct UserSkillPatch {
    pub proficiency_level: Option<i32>,
    pub years_of_experience: Option<i32>,
    pub is_current: Option<bool>,
}

impl UserSkillPatch {
    pub fn apply(self, row: &mut UserSkill) -> Result<(), RecordError> {
        if let Some(level) = self.proficiency_level {
            row.proficiency_level = level;
        }
        if let Some(years) = self.years_of_experience {
            row.years_of_experience = years;
        }
        if let Some(current) = self.is_current {
            row.is_current = current;
        }
        check_skill_levels(row.proficiency_level, row.years_of_experience)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct EducationPatch {
    pub institution: Option<String>,
    pub degree: Option<String>,
    pub field_of_study: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub gpa: Option<f64>,
    pub description: Option<String>,
}

impl EducationPatch {
    pub fn apply(self, row: &mut Education) -> Result<(), RecordError> {
        if let Some(v) = self.institution {
            row.institution = v;
        }
        if let Some(v) = self.degree {
            row.degree = v;
        }
        if let Some(v) = self.field_of_study {
            row.field_of_study = v;
        }
        if let Some(v) = self.start_date {
            row.start_date = v;
        }
        if self.end_date.is_some() {
            row.end_date = self.end_date;
        }
        if self.gpa.is_some() {
            row.gpa = self.gpa;
        }
        if let Some(v) = self.description {
            row.description = v;
        }
        check_dates(row.start_date, row.end_date)?;
        check_gpa(row.gpa)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ExperiencePatch {
    pub company: Option<String>,
    pub position: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub is_current: Option<bool>,
    pub description: Option<String>,
    pub achievements: Option<String>,
}

impl ExperiencePatch {
    pub fn apply(self, row: &mut WorkExperience) -> Result<(), RecordError> {
        if let Some(v) = self.company {
            row.company = v;
        }
        if let Some(v) = self.position {
            row.position = v;
        }
        if let Some(v) = self.start_date {
            row.start_date = v;
        }
        if self.end_date.is_some() {
            row.end_date = self.end_date;
        }
        if let Some(v) = self.is_current {
            row.is_current = v;
        }
        if let Some(v) = self.description {
            row.description = v;
        }
        if let Some(v) = self.achievements {
            row.achievements = v;
        }
        check_dates(row.start_date, row.end_date)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct GoalPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub target_date: Option<NaiveDate>,
    pub priority: Option<GoalPriority>,
    pub status: Option<GoalStatus>,
}

impl GoalPatch {
    pub fn apply(self, row: &mut CareerGoal) {
        if let Some(v) = self.title {
            row.title = v;
        }
        if let Some(v) = self.description {
            row.description = v;
        }
        if self.target_date.is_some() {
            row.target_date = self.target_date;
        }
        if let Some(v) = self.priority {
            row.priority = v;
        }
        if let Some(v) = self.status {
            row.status = v;
        }
    }
}
