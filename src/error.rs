use thiserror::Error;

pub type Result<T> = std::result::Result<T, BoardError>;

#[derive(Debug, Error)]
pub enum BoardError {
    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Board has no column to place a task in")]
    NoColumnAvailable,

    #[error("{0} is already being saved")]
    Busy(String),

    #[error("Board invariant violated: {0}")]
    InvariantViolation(String),

    #[error("Board not initialized")]
    BoardNotInitialized,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

impl BoardError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub fn task_not_found(id: impl ToString) -> Self {
        Self::NotFound {
            kind: "Task",
            id: id.to_string(),
        }
    }

    pub fn column_not_found(id: impl ToString) -> Self {
        Self::NotFound {
            kind: "Column",
            id: id.to_string(),
        }
    }

    /// Whether a failed backend call is worth repeating
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Persistence(_) | Self::Io(_))
    }
}
