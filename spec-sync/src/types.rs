//! Shared increment and feature enums

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status recorded in an increment's `metadata.json`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum IncrementStatus {
    Planning,
    Active,
    Paused,
    Completed,
    Abandoned,
    /// No metadata or an unrecognised status string
    #[default]
    Unknown,
}

impl IncrementStatus {
    /// Parse a status string (case-insensitive). Unrecognised values map to
    /// `Unknown` rather than failing.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "planning" => Self::Planning,
            "active" | "in-progress" | "in_progress" => Self::Active,
            "paused" | "backlog" => Self::Paused,
            "completed" | "complete" | "done" => Self::Completed,
            "abandoned" | "cancelled" | "canceled" => Self::Abandoned,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Planning => "planning",
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Abandoned => "abandoned",
            Self::Unknown => "unknown",
        }
    }

    /// Winner-selection priority: higher wins.
    pub fn priority(self) -> u8 {
        match self {
            Self::Active => 4,
            Self::Paused | Self::Planning => 3,
            Self::Completed => 2,
            Self::Abandoned => 1,
            Self::Unknown => 0,
        }
    }
}

impl fmt::Display for IncrementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Storage root an increment copy lives under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageLocation {
    Primary,
    Archived,
    Abandoned,
}

impl StorageLocation {
    pub fn all() -> [Self; 3] {
        [Self::Primary, Self::Archived, Self::Abandoned]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Archived => "archived",
            Self::Abandoned => "abandoned",
        }
    }

    /// Final tie-break priority: higher wins.
    pub fn priority(self) -> u8 {
        match self {
            Self::Primary => 3,
            Self::Archived => 2,
            Self::Abandoned => 1,
        }
    }
}

impl fmt::Display for StorageLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a feature's defining work item was authored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Internal,
    External,
}

impl Origin {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Internal => "internal",
            Self::External => "external",
        }
    }
}
