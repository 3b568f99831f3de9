//! Run identity.
//!
//! A run id correlates the logs and reports of one pipeline invocation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Run ID for tracking pipeline invocations.
///
/// Format: `run-<date>-<time>-<random>`
/// Example: `run-20260115-143022-abc123`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub String);

impl RunId {
    /// Generate a new run ID.
    pub fn new() -> Self {
        let now = chrono::Utc::now();
        let random: String = uuid::Uuid::new_v4()
            .to_string()
            .chars()
            .take(6)
            .collect();
        RunId(format!("run-{}-{}", now.format("%Y%m%d-%H%M%S"), random))
    }

    /// Parse an existing run ID string.
    pub fn parse(s: &str) -> Option<Self> {
        if s.starts_with("run-") && s.len() > 19 {
            Some(RunId(s.to_string()))
        } else {
            None
        }
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_id_format() {
        let rid = RunId::new();
        assert!(rid.0.starts_with("run-"));
        assert!(RunId::parse(&rid.0).is_some());
    }

    #[test]
    fn test_run_id_rejects_foreign_ids() {
        assert!(RunId::parse("sess-20260115-143022-abc123").is_none());
        assert!(RunId::parse("run-").is_none());
    }
}
