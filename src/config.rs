//! Configuration for new boards and for board sessions.
//!
//! Both structs deserialize from TOML and fall back to defaults for any
//! field that is left out.

use crate::{
    domain::board::BOARD_COLORS,
    error::{BoardError, Result},
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Layout of a freshly initialized board
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    pub title: String,
    pub color: String,
    pub columns: Vec<String>,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            title: "Default Board".to_string(),
            color: "bg-blue-500".to_string(),
            columns: vec![
                "To Do".to_string(),
                "In Progress".to_string(),
                "Review".to_string(),
                "Done".to_string(),
            ],
        }
    }
}

impl BoardConfig {
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(BoardError::Config("board title must not be empty".to_string()));
        }
        if !BOARD_COLORS.contains(&self.color.as_str()) {
            return Err(BoardError::Config(format!(
                "unknown board color '{}'",
                self.color
            )));
        }
        if let Some(blank) = self.columns.iter().position(|c| c.trim().is_empty()) {
            return Err(BoardError::Config(format!(
                "column {} has an empty title",
                blank + 1
            )));
        }
        Ok(())
    }
}

/// How a failed backend call is reconciled with the local board
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconcileStrategy {
    /// Undo the local change
    #[default]
    Revert,
    /// Reload the board from the store, reverting if that fails too
    Refetch,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Attempts per backend call before the change is reconciled
    pub persist_attempts: u32,
    pub reconcile: ReconcileStrategy,
    /// Board created when the store does not hold one yet
    pub board: BoardConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            persist_attempts: 2,
            reconcile: ReconcileStrategy::Revert,
            board: BoardConfig::default(),
        }
    }
}

impl SessionConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: SessionConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = tokio::fs::read_to_string(path.as_ref()).await?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        if self.persist_attempts == 0 {
            return Err(BoardError::Config(
                "persist_attempts must be at least 1".to_string(),
            ));
        }
        self.board.validate()
    }
}
