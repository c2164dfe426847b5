use chrono::{DateTime, Utc};
use dash_core::types::{Agent, AgentSummary};
use serde::Serialize;
use std::collections::HashMap;

/// The shared response envelope. Raw endpoints (`/health`, `/version`,
/// `/agents/{id}/metrics`) bypass it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

impl Envelope<serde_json::Value> {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentListData {
    pub agents: Vec<Agent>,
    #[serde(flatten)]
    pub summary: AgentSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusData {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub summary: AgentSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogsData {
    pub logs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchData {
    pub capability: String,
    pub agents: Vec<Agent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapabilityEntry {
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapabilitiesData {
    pub capabilities: Vec<CapabilityEntry>,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanData {
    pub rescanned: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VersionData {
    pub service: String,
    pub api_version: String,
    pub codex_default_mode: String,
    pub default_timeout_sec: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthData {
    pub status: String,
    pub service: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub readiness: bool,
}

/// Aggregate capability counts across agents: case-insensitive dedup with
/// the first-seen spelling, sorted by name in ASCII order.
pub fn aggregate_capabilities(agents: &[Agent]) -> CapabilitiesData {
    let mut counts: HashMap<String, (String, usize)> = HashMap::new();
    for agent in agents {
        for capability in dash_core::types::dedupe_capabilities(&agent.capabilities) {
            let entry = counts
                .entry(capability.to_lowercase())
                .or_insert_with(|| (capability.clone(), 0));
            entry.1 += 1;
        }
    }

    let mut capabilities: Vec<CapabilityEntry> = counts
        .into_values()
        .map(|(name, count)| CapabilityEntry { name, count })
        .collect();
    capabilities.sort_by(|a, b| a.name.cmp(&b.name));

    let total = capabilities.len();
    CapabilitiesData {
        capabilities,
        total,
    }
}

/// Agents whose capability list contains `capability`, case-insensitively.
pub fn agents_with_capability(agents: &[Agent], capability: &str) -> Vec<Agent> {
    agents
        .iter()
        .filter(|agent| {
            agent
                .capabilities
                .iter()
                .any(|have| have.eq_ignore_ascii_case(capability))
        })
        .cloned()
        .collect()
}
