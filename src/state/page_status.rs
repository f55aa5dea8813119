/// Page status definitions for tracking validation progress
use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents the lifecycle of a page record
///
/// A record is created `Pending` when its URL is accepted by the frontier and
/// moves exactly once to a terminal status when its fetch completes (or the
/// deadline abandons it).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageStatus {
    /// Queued or in flight
    Pending,

    /// A response was received and the page is usable (2xx)
    Fetched,

    /// The fetch produced an error: transport failure, TLS, timeout,
    /// redirect exhaustion, or a 4xx/5xx status
    Failed,
}

impl PageStatus {
    /// Returns true if this is a terminal status
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Returns true if a record in this status may move to `next`
    pub fn can_transition_to(&self, next: PageStatus) -> bool {
        matches!(self, Self::Pending) && next.is_terminal()
    }

    /// Converts the status to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Fetched => "fetched",
            Self::Failed => "failed",
        }
    }

    /// Parses a status from its database string representation
    ///
    /// Returns None if the string doesn't match any known status.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "fetched" => Some(Self::Fetched),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Returns all possible statuses
    pub fn all_statuses() -> [Self; 3] {
        [Self::Pending, Self::Fetched, Self::Failed]
    }
}

impl fmt::Display for PageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
