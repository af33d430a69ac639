//! Types for the artifact store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix that turns an input artifact name into its output artifact name.
pub const OUTPUT_PREFIX: &str = "output-";

/// Which namespace an artifact lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Uploaded image, staged before execution.
    Input,
    /// File produced by the transform executable.
    Output,
}

impl ArtifactKind {
    /// Directory / URL namespace of this kind.
    pub fn namespace(&self) -> &'static str {
        match self {
            Self::Input => "uploads",
            Self::Output => "results",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => f.write_str("input"),
            Self::Output => f.write_str("output"),
        }
    }
}

/// Reference to a staged artifact: its namespace plus its file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub kind: ArtifactKind,
    pub name: String,
}

impl ArtifactRef {
    pub fn input(name: impl Into<String>) -> Self {
        Self {
            kind: ArtifactKind::Input,
            name: name.into(),
        }
    }

    pub fn output(name: impl Into<String>) -> Self {
        Self {
            kind: ArtifactKind::Output,
            name: name.into(),
        }
    }

    /// Output reference owned by this input.
    ///
    /// A pure function of the input name, so the retrieval location is known
    /// before the transform runs.
    pub fn output_for(input: &ArtifactRef) -> ArtifactRef {
        Self::output(format!("{}{}", OUTPUT_PREFIX, input.name))
    }

    /// Path under the retrieval surface, e.g. `results/output-1-a.jpg`.
    pub fn url_path(&self) -> String {
        format!("{}/{}", self.kind.namespace(), self.name)
    }
}

impl fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind.namespace(), self.name)
    }
}

/// A staged artifact together with its ownership and retention data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub reference: ArtifactRef,
    pub job_id: String,
    pub created_at: DateTime<Utc>,
    /// Set once the owning job reaches a terminal status.
    pub expires_at: Option<DateTime<Utc>>,
}

impl Artifact {
    pub fn new(reference: ArtifactRef, job_id: impl Into<String>) -> Self {
        Self {
            reference,
            job_id: job_id.into(),
            created_at: Utc::now(),
            expires_at: None,
        }
    }
}

/// Result of a best-effort cleanup pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub removed: usize,
    pub already_gone: usize,
    pub errors: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_name_is_derived_from_input() {
        let input = ArtifactRef::input("1718000000000-image.jpg");
        let output = ArtifactRef::output_for(&input);
        assert_eq!(output.kind, ArtifactKind::Output);
        assert_eq!(output.name, "output-1718000000000-image.jpg");
        assert_eq!(ArtifactRef::output_for(&input), output);
    }

    #[test]
    fn test_url_paths() {
        let input = ArtifactRef::input("1-a.png");
        assert_eq!(input.url_path(), "uploads/1-a.png");
        assert_eq!(ArtifactRef::output_for(&input).url_path(), "results/output-1-a.png");
    }
}
