//! # Agent Planning
//!
//! Decides which tools the answering engine sees for a query and tracks the
//! agent lifecycle. Every loaded document contributes a vector tool and a
//! summary tool. In advanced mode, once there are more tools than
//! `tool_retrieval_threshold`, only the best-matching `top_k` are offered
//! per query.

mod tools;

pub use tools::{ToolIndex, ToolKind, ToolSpec};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_TOOL_RETRIEVAL_THRESHOLD: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AgentMode {
    /// Every tool on every query.
    Simple,
    /// Tool retrieval once the tool count passes the threshold.
    #[default]
    Advanced,
}

impl AgentMode {
    pub fn as_str(self) -> &'static str {
        match self {
            AgentMode::Simple => "simple",
            AgentMode::Advanced => "advanced",
        }
    }
}

impl fmt::Display for AgentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentMode {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simple" => Ok(AgentMode::Simple),
            "advanced" => Ok(AgentMode::Advanced),
            other => Err(crate::Error::invalid_argument(
                format!("unknown agent mode '{}'", other),
                crate::ErrorContext::new()
                    .with_field_path("agent.mode")
                    .with_details("expected simple or advanced"),
            )),
        }
    }
}

/// How tools reach the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolSelection {
    /// The full tool list, every query.
    Eager(Vec<ToolSpec>),
    /// Per-query retrieval of `top_k` tools from these candidates.
    Retrieved { tools: Vec<ToolSpec>, top_k: usize },
}

impl ToolSelection {
    pub fn tools(&self) -> &[ToolSpec] {
        match self {
            ToolSelection::Eager(tools) => tools,
            ToolSelection::Retrieved { tools, .. } => tools,
        }
    }

    pub fn uses_retrieval(&self) -> bool {
        matches!(self, ToolSelection::Retrieved { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolPlanner {
    pub mode: AgentMode,
    pub tool_retrieval_threshold: usize,
    pub top_k: usize,
}

impl ToolPlanner {
    pub fn new(mode: AgentMode, top_k: usize) -> Self {
        Self {
            mode,
            tool_retrieval_threshold: DEFAULT_TOOL_RETRIEVAL_THRESHOLD,
            top_k,
        }
    }

    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.tool_retrieval_threshold = threshold;
        self
    }

    /// Builds both tools per document, in document order.
    pub fn plan<S: AsRef<str>>(&self, documents: &[S]) -> ToolSelection {
        let tools: Vec<ToolSpec> = documents
            .iter()
            .flat_map(|d| ToolSpec::for_document(d.as_ref()))
            .collect();
        if self.mode == AgentMode::Advanced && tools.len() > self.tool_retrieval_threshold {
            ToolSelection::Retrieved {
                tools,
                top_k: self.top_k,
            }
        } else {
            ToolSelection::Eager(tools)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    #[default]
    Initializing,
    Ready,
    Processing,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    pub status: AgentStatus,
    pub num_documents: usize,
    pub num_chunks: usize,
    pub mode: AgentMode,
    pub last_query_at: Option<DateTime<Utc>>,
}

impl AgentState {
    pub fn new(mode: AgentMode) -> Self {
        Self {
            status: AgentStatus::Initializing,
            num_documents: 0,
            num_chunks: 0,
            mode,
            last_query_at: None,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.num_documents > 0 && self.status != AgentStatus::Initializing
    }
}

impl Default for AgentState {
    fn default() -> Self {
        Self::new(AgentMode::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_mode_is_always_eager() {
        let planner = ToolPlanner::new(AgentMode::Simple, 3);
        let docs: Vec<String> = (0..10).map(|i| format!("doc{}", i)).collect();
        let sel = planner.plan(&docs);
        assert!(!sel.uses_retrieval());
        assert_eq!(sel.tools().len(), 20);
    }

    #[test]
    fn advanced_switches_above_threshold() {
        let planner = ToolPlanner::new(AgentMode::Advanced, 3);
        // 3 documents -> 6 tools: not above the threshold
        assert!(!planner.plan(&["a", "b", "c"]).uses_retrieval());
        let sel = planner.plan(&["a", "b", "c", "d"]);
        assert_eq!(
            sel,
            ToolSelection::Retrieved {
                tools: ToolSpec::for_document("a")
                    .into_iter()
                    .chain(ToolSpec::for_document("b"))
                    .chain(ToolSpec::for_document("c"))
                    .chain(ToolSpec::for_document("d"))
                    .collect(),
                top_k: 3,
            }
        );
    }

    #[test]
    fn custom_threshold() {
        let planner = ToolPlanner::new(AgentMode::Advanced, 2).with_threshold(2);
        assert!(!planner.plan(&["a"]).uses_retrieval());
        assert!(planner.plan(&["a", "b"]).uses_retrieval());
    }

    #[test]
    fn mode_parsing_and_serde() {
        assert_eq!("Simple".parse::<AgentMode>().unwrap(), AgentMode::Simple);
        assert!("turbo".parse::<AgentMode>().is_err());
        assert_eq!(serde_json::to_string(&AgentMode::Advanced).unwrap(), "\"advanced\"");
        assert_eq!(AgentMode::default(), AgentMode::Advanced);
    }

    #[test]
    fn fresh_state_is_not_ready() {
        let state = AgentState::default();
        assert_eq!(state.status, AgentStatus::Initializing);
        assert!(!state.is_ready());
        assert!(state.last_query_at.is_none());
    }
}
