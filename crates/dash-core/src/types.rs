//! Core types for the agent dashboard supervisor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};

/// Capability lists are truncated to this length on start.
pub const MAX_CAPABILITIES: usize = 32;

const MAX_DERIVED_NAME_CHARS: usize = 48;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum AgentKind {
    #[default]
    Codex,
    ClaudeCode,
    Ollama,
}

impl AgentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AgentKind::Codex => "codex",
            AgentKind::ClaudeCode => "claude-code",
            AgentKind::Ollama => "ollama",
        }
    }
}

impl std::str::FromStr for AgentKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "codex" => Ok(AgentKind::Codex),
            "claude-code" => Ok(AgentKind::ClaudeCode),
            "ollama" => Ok(AgentKind::Ollama),
            other => Err(format!(
                "unknown agent type '{other}'. valid values: codex, claude-code, ollama"
            )),
        }
    }
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AgentMode {
    #[default]
    Auto,
    Interactive,
    Review,
}

impl AgentMode {
    pub fn as_str(self) -> &'static str {
        match self {
            AgentMode::Auto => "auto",
            AgentMode::Interactive => "interactive",
            AgentMode::Review => "review",
        }
    }
}

impl std::str::FromStr for AgentMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "auto" => Ok(AgentMode::Auto),
            "interactive" => Ok(AgentMode::Interactive),
            "review" => Ok(AgentMode::Review),
            other => Err(format!(
                "invalid mode '{other}'. valid values: auto, interactive, review"
            )),
        }
    }
}

impl std::fmt::Display for AgentMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    #[default]
    Starting,
    Running,
    Completed,
    Failed,
    Stopped,
    Timeout,
}

impl AgentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AgentStatus::Starting => "starting",
            AgentStatus::Running => "running",
            AgentStatus::Completed => "completed",
            AgentStatus::Failed => "failed",
            AgentStatus::Stopped => "stopped",
            AgentStatus::Timeout => "timeout",
        }
    }

    /// Terminal statuses are sticky: no transition leaves them.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            AgentStatus::Completed
                | AgentStatus::Failed
                | AgentStatus::Stopped
                | AgentStatus::Timeout
        )
    }
}

impl std::str::FromStr for AgentStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "starting" => Ok(AgentStatus::Starting),
            "running" => Ok(AgentStatus::Running),
            "completed" => Ok(AgentStatus::Completed),
            "failed" => Ok(AgentStatus::Failed),
            "stopped" => Ok(AgentStatus::Stopped),
            "timeout" => Ok(AgentStatus::Timeout),
            other => Err(format!(
                "invalid agent status '{other}'. valid values: starting, running, completed, failed, stopped, timeout"
            )),
        }
    }
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Check if a status transition is valid.
///
/// ```text
/// starting → running → {completed, failed, timeout, stopped}
///     └────────────────────────────┘
/// ```
pub fn is_transition_allowed(from: AgentStatus, to: AgentStatus) -> bool {
    use AgentStatus::*;

    if from == to {
        return true;
    }

    match (from, to) {
        (Starting, Running) => true,
        // An agent may die before it is ever observed running.
        (Starting, Completed | Failed | Stopped | Timeout) => true,
        (Running, Completed | Failed | Stopped | Timeout) => true,
        _ => false,
    }
}

/// Per-process resource metrics. Missing platform data yields zero, never absence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AgentMetrics {
    pub cpu_percent: f64,
    pub memory_mb: f64,
    pub io_read_bytes: u64,
    pub io_write_bytes: u64,
    pub thread_count: u64,
    pub fd_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AgentSummary {
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub stopped: usize,
    pub total: usize,
}

impl AgentSummary {
    /// Bucket counts: `starting` counts as running, `timeout` counts as failed.
    pub fn tally(statuses: impl IntoIterator<Item = AgentStatus>) -> Self {
        let mut summary = Self::default();
        for status in statuses {
            summary.total += 1;
            match status {
                AgentStatus::Starting | AgentStatus::Running => summary.running += 1,
                AgentStatus::Completed => summary.completed += 1,
                AgentStatus::Failed | AgentStatus::Timeout => summary.failed += 1,
                AgentStatus::Stopped => summary.stopped += 1,
            }
        }
        summary
    }
}

/// Observable snapshot of one supervised agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub agent_type: AgentKind,
    pub status: AgentStatus,
    pub pid: u32,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub last_seen: DateTime<Utc>,
    pub task: String,
    pub mode: AgentMode,
    pub capabilities: Vec<String>,
    pub metrics: AgentMetrics,
    pub radar_position: Option<[f64; 2]>,
    pub exit_code: Option<i32>,
}

impl Agent {
    /// Create a new agent snapshot in `starting` state, pid unset.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        agent_type: AgentKind,
        task: impl Into<String>,
        mode: AgentMode,
        capabilities: Vec<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            agent_type,
            status: AgentStatus::Starting,
            pid: 0,
            start_time: now,
            end_time: None,
            last_seen: now,
            task: task.into(),
            mode,
            capabilities,
            metrics: AgentMetrics::default(),
            radar_position: None,
            exit_code: None,
        }
    }

    /// Bump `last_seen`, keeping it monotonically non-decreasing.
    pub fn touch(&mut self, at: DateTime<Utc>) {
        if at > self.last_seen {
            self.last_seen = at;
        }
    }

    /// Reader-facing copy: capabilities deduplicated case-insensitively,
    /// radar position generated and pinned on first read.
    pub fn read_view(&mut self) -> Agent {
        if self.radar_position.is_none() {
            self.radar_position = Some(radar_position_for(&self.id));
        }
        let mut view = self.clone();
        view.capabilities = dedupe_capabilities(&self.capabilities);
        view
    }
}

/// Request body for starting an agent.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StartRequest {
    pub task: String,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub timeout_seconds: Option<i64>,
    #[serde(default)]
    pub capabilities: Option<Vec<String>>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Trim entries, drop empties, truncate to [`MAX_CAPABILITIES`].
pub fn normalize_capabilities(raw: &[String]) -> Vec<String> {
    raw.iter()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .take(MAX_CAPABILITIES)
        .collect()
}

/// Case-insensitive deduplication, first occurrence wins.
pub fn dedupe_capabilities(capabilities: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for capability in capabilities {
        if seen.insert(capability.to_lowercase()) {
            out.push(capability.clone());
        }
    }
    out
}

/// Display label: the explicit name when provided, else the task truncated.
pub fn derive_name(explicit: Option<&str>, task: &str) -> String {
    if let Some(name) = explicit {
        let name = name.trim();
        if !name.is_empty() {
            return name.to_string();
        }
    }
    let mut label: String = task.chars().take(MAX_DERIVED_NAME_CHARS).collect();
    if task.chars().count() > MAX_DERIVED_NAME_CHARS {
        label.push('…');
    }
    label
}

/// Deterministic radar coordinates in `[0, 100]²` derived from the agent id.
pub fn radar_position_for(id: &str) -> [f64; 2] {
    [hashed_axis(id, 0), hashed_axis(id, 1)]
}

fn hashed_axis(id: &str, seed: u64) -> f64 {
    let mut hasher = DefaultHasher::new();
    seed.hash(&mut hasher);
    id.hash(&mut hasher);
    (hasher.finish() % 10_001) as f64 / 100.0
}
