//! Output format selection for CLI reports.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How stage reports are rendered on stdout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Short human-readable summary lines.
    #[default]
    Human,
    /// Pretty-printed JSON with schema version and run id.
    Json,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Human => write!(f, "human"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}
