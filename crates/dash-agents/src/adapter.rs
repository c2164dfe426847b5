use dash_core::types::AgentKind;
use std::path::{Path, PathBuf};

use crate::error::AgentError;
use crate::prompt::compose_prompt;
use crate::types::{AgentCommand, LaunchRequest};

pub trait CliAdapter: Send + Sync {
    fn kind(&self) -> AgentKind;
    fn executable(&self) -> &str;
    fn build_command(&self, request: &LaunchRequest) -> AgentCommand;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodexAdapter {
    pub executable: String,
}

impl Default for CodexAdapter {
    fn default() -> Self {
        Self {
            executable: "codex".to_string(),
        }
    }
}

impl CliAdapter for CodexAdapter {
    fn kind(&self) -> AgentKind {
        AgentKind::Codex
    }

    fn executable(&self) -> &str {
        &self.executable
    }

    fn build_command(&self, request: &LaunchRequest) -> AgentCommand {
        AgentCommand {
            executable: self.executable.clone(),
            args: vec!["exec".to_string(), compose_prompt(request)],
            env: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaudeCodeAdapter {
    pub executable: String,
}

impl Default for ClaudeCodeAdapter {
    fn default() -> Self {
        Self {
            executable: "claude".to_string(),
        }
    }
}

impl CliAdapter for ClaudeCodeAdapter {
    fn kind(&self) -> AgentKind {
        AgentKind::ClaudeCode
    }

    fn executable(&self) -> &str {
        &self.executable
    }

    fn build_command(&self, request: &LaunchRequest) -> AgentCommand {
        AgentCommand {
            executable: self.executable.clone(),
            args: vec!["-p".to_string(), compose_prompt(request)],
            env: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OllamaAdapter {
    pub executable: String,
}

impl Default for OllamaAdapter {
    fn default() -> Self {
        Self {
            executable: "ollama".to_string(),
        }
    }
}

impl CliAdapter for OllamaAdapter {
    fn kind(&self) -> AgentKind {
        AgentKind::Ollama
    }

    fn executable(&self) -> &str {
        &self.executable
    }

    fn build_command(&self, request: &LaunchRequest) -> AgentCommand {
        AgentCommand {
            executable: self.executable.clone(),
            args: vec!["run".to_string(), compose_prompt(request)],
            env: Vec::new(),
        }
    }
}

pub fn default_adapter_for(kind: AgentKind) -> Box<dyn CliAdapter> {
    match kind {
        AgentKind::Codex => Box::new(CodexAdapter::default()),
        AgentKind::ClaudeCode => Box::new(ClaudeCodeAdapter::default()),
        AgentKind::Ollama => Box::new(OllamaAdapter::default()),
    }
}

/// Resolve an adapter's executable to a concrete path.
///
/// Configured directories are scanned before `PATH`; a binary found nowhere
/// is [`AgentError::NotInstalled`], distinct from a later spawn failure.
pub fn resolve_binary(executable: &str, extra_dirs: &[PathBuf]) -> Result<PathBuf, AgentError> {
    for dir in extra_dirs {
        let candidate = dir.join(executable);
        if is_executable_file(&candidate) {
            return Ok(candidate);
        }
    }

    if let Some(path_var) = std::env::var_os("PATH") {
        for dir in std::env::split_paths(&path_var) {
            let candidate = dir.join(executable);
            if is_executable_file(&candidate) {
                return Ok(candidate);
            }
        }
    }

    Err(AgentError::NotInstalled {
        binary: executable.to_string(),
    })
}

fn is_executable_file(path: &Path) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        path.metadata()
            .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
            .unwrap_or(false)
    }
    #[cfg(not(unix))]
    {
        path.is_file()
    }
}
