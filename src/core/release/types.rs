use serde::Serialize;

use crate::archive::ArchiveSummary;
use crate::clean::CleanReport;

pub const RELEASE_BUILD: &str = "release-build";
pub const PACKAGE_RELEASE: &str = "package-release";
pub const DEFAULT_PIPELINE: &str = "default";

/// Directory inside the staging tree that receives the sample copies.
pub const STAGED_SAMPLES_DIR: &str = "Samples";

/// Leaf steps of the release pipelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseStep {
    CleanStaging,
    BuildSource,
    RefreshDependencies,
    CleanSamplePackages,
    BuildSamples,
    CleanSamples,
    Stage,
    Compress,
}

impl ReleaseStep {
    pub const ALL: [ReleaseStep; 8] = [
        ReleaseStep::CleanStaging,
        ReleaseStep::BuildSource,
        ReleaseStep::RefreshDependencies,
        ReleaseStep::CleanSamplePackages,
        ReleaseStep::BuildSamples,
        ReleaseStep::CleanSamples,
        ReleaseStep::Stage,
        ReleaseStep::Compress,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReleaseStep::CleanStaging => "clean:staging",
            ReleaseStep::BuildSource => "build:source",
            ReleaseStep::RefreshDependencies => "deps:refresh",
            ReleaseStep::CleanSamplePackages => "clean:sample-packages",
            ReleaseStep::BuildSamples => "build:samples",
            ReleaseStep::CleanSamples => "clean:samples",
            ReleaseStep::Stage => "stage",
            ReleaseStep::Compress => "compress",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|step| step.as_str() == s)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanOutput {
    #[serde(flatten)]
    pub report: CleanReport,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageOutput {
    pub staging_dir: String,
    pub files: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_file: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveOutput {
    pub id: String,
    #[serde(flatten)]
    pub summary: ArchiveSummary,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FanOutOutput {
    pub targets: Vec<String>,
    pub tasks: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_names_round_trip() {
        for step in ReleaseStep::ALL {
            assert_eq!(ReleaseStep::parse(step.as_str()), Some(step));
        }
        assert_eq!(ReleaseStep::parse("publish"), None);
    }
}
