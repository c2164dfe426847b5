use dash_core::types::AgentMode;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::AgentError;

/// Executable invocation produced by a [`crate::adapter::CliAdapter`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentCommand {
    pub executable: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

/// Validated inputs for launching one agent process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    pub task: String,
    pub mode: AgentMode,
    pub scenario_root: PathBuf,
    pub notes: String,
}

impl LaunchRequest {
    pub fn new(
        task: impl Into<String>,
        mode: AgentMode,
        scenario_root: impl Into<PathBuf>,
        notes: impl Into<String>,
    ) -> Result<Self, AgentError> {
        let task = task.into();
        if task.trim().is_empty() {
            return Err(AgentError::InvalidRequest {
                message: "task must not be empty".to_string(),
            });
        }
        Ok(Self {
            task,
            mode,
            scenario_root: scenario_root.into(),
            notes: notes.into(),
        })
    }
}
