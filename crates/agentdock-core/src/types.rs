use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

// ─── Tab Kind ─────────────────────────────────────────────────────

/// Closed set of logical view kinds a tab can host.
///
/// Exactly two kinds are process-bearing: [`TabKind::Chat`] and
/// [`TabKind::AgentExecution`] may hold a live run binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TabKind {
    Chat,
    Agent,
    Projects,
    Usage,
    Mcp,
    Settings,
    ClaudeMd,
    ClaudeFile,
    AgentExecution,
    CreateAgent,
    ImportAgent,
}

impl TabKind {
    pub const ALL: [Self; 11] = [
        Self::Chat,
        Self::Agent,
        Self::Projects,
        Self::Usage,
        Self::Mcp,
        Self::Settings,
        Self::ClaudeMd,
        Self::ClaudeFile,
        Self::AgentExecution,
        Self::CreateAgent,
        Self::ImportAgent,
    ];

    /// True for kinds that may be bound to a live external process.
    pub fn is_process_bearing(self) -> bool {
        matches!(self, Self::Chat | Self::AgentExecution)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Agent => "agent",
            Self::Projects => "projects",
            Self::Usage => "usage",
            Self::Mcp => "mcp",
            Self::Settings => "settings",
            Self::ClaudeMd => "claude-md",
            Self::ClaudeFile => "claude-file",
            Self::AgentExecution => "agent-execution",
            Self::CreateAgent => "create-agent",
            Self::ImportAgent => "import-agent",
        }
    }
}

impl fmt::Display for TabKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TabKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| CoreError::UnknownTabKind(s.to_owned()))
    }
}

// ─── Tab Status ───────────────────────────────────────────────────

/// Focus/lifecycle status of a tab.
///
/// `Idle ↔ Active` follows focus changes; `Running → Complete|Error`
/// follows the bound process lifecycle. Terminal states do not revert;
/// a new run requires a new binding.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TabStatus {
    Active,
    #[default]
    Idle,
    Running,
    Complete,
    Error,
}

impl TabStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Complete => "complete",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for TabStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Run Status ───────────────────────────────────────────────────

/// External process-status vocabulary for a unit of work.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl RunStatus {
    /// True once the run can no longer produce further output.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(CoreError::UnknownRunStatus(s.to_owned())),
        }
    }
}

// ─── Running Unit ─────────────────────────────────────────────────

/// One externally-reported unit of live or historical work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunningUnit {
    pub id: String,
    pub name: String,
    pub task: String,
    pub model: String,
    pub project_path: String,
    /// Session identifier once the underlying process has reported one.
    pub session_id: Option<String>,
    pub status: RunStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

// ─── Session Info ─────────────────────────────────────────────────

/// Session binding announced by the stream (`session_info` record).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub project_id: Option<String>,
}
