use crate::llm::GenerationUnit;

/// Every way a story run can fail. Callers match on the variant to tell bad
/// input, unknown children, unusable generation services and unusable model
/// output apart.
#[derive(Debug, thiserror::Error)]
pub enum StoryError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("{entity} '{id}' does not exist")]
    NotFound { entity: &'static str, id: String },

    #[error("Missing required placeholders: {}", .0.join(", "))]
    MissingParameters(Vec<String>),

    #[error("Generated story is malformed: {0}")]
    MalformedStory(String),

    #[error("Generation failed for {unit}: {message}")]
    GenerationFailure {
        unit: GenerationUnit,
        message: String,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoryError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        StoryError::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn generation(unit: GenerationUnit, message: impl Into<String>) -> Self {
        StoryError::GenerationFailure {
            unit,
            message: message.into(),
        }
    }

    /// Stable label stored alongside failed deferred jobs.
    pub fn kind(&self) -> &'static str {
        match self {
            StoryError::Configuration(_) => "configuration",
            StoryError::NotFound { .. } => "not_found",
            StoryError::MissingParameters(_) => "missing_parameters",
            StoryError::MalformedStory(_) => "malformed_story",
            StoryError::GenerationFailure { .. } => "generation_failure",
            StoryError::Validation(_) => "validation",
            StoryError::Database(_) => "database",
            StoryError::Serialization(_) => "serialization",
        }
    }
}

pub type StoryResult<T> = Result<T, StoryError>;
