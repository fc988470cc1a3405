// Career plan generation: prompt building, model invocation, schema
// validation, persistence, audit logging and file export.
// All model calls go through llm_client — nothing here talks HTTP directly.

pub mod executions;
pub mod export;
pub mod generator;
pub mod handlers;
pub mod prompts;
pub mod request_log;
pub mod validation;

use thiserror::Error;

use crate::llm_client::LlmError;
use crate::planning::validation::SchemaError;

/// Why a model reply did not become a plan.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// The service could not be reached or answered with an error.
    #[error("{0}")]
    Transport(String),

    /// The service answered, but not with a JSON document.
    #[error("{0}")]
    MalformedReply(String),

    /// Valid JSON in the wrong shape.
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

impl From<LlmError> for GenerationError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Parse(_) | LlmError::EmptyContent => {
                GenerationError::MalformedReply(err.to_string())
            }
            LlmError::Http(_) | LlmError::Api { .. } => GenerationError::Transport(err.to_string()),
        }
    }
}
