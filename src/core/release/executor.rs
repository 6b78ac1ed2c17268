use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::archive::{self, ArchiveSpec, ArchiveSummary};
use crate::clean;
use crate::config::ReleaseConfig;
use crate::engine::{RunContext, StepHandler};
use crate::error::{Error, Result};
use crate::target::{self, BuildTarget};
use crate::utils::parser;
use crate::version;

use super::build;
use super::staging;
use super::types::{ArchiveOutput, CleanOutput, FanOutOutput, ReleaseStep, StageOutput};

/// Executes release steps against one source tree.
pub struct ReleaseSteps {
    root: PathBuf,
    config: ReleaseConfig,
}

impl ReleaseSteps {
    pub fn new(root: impl Into<PathBuf>, config: ReleaseConfig) -> Self {
        Self {
            root: root.into(),
            config,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &ReleaseConfig {
        &self.config
    }

    pub fn source_targets(&self) -> Vec<BuildTarget> {
        target::enumerate_solutions(&self.root, &self.config.source_solutions)
    }

    pub fn sample_targets(&self) -> Vec<BuildTarget> {
        let names: Vec<&str> = self.config.samples.iter().map(|s| s.name.as_str()).collect();
        target::enumerate_samples(&self.samples_dir(), &names)
    }

    fn samples_dir(&self) -> PathBuf {
        staging::samples_dir(&self.root, &self.config)
    }

    fn staging_dir(&self) -> PathBuf {
        staging::staging_dir(&self.root, &self.config)
    }

    fn current_version<'c>(&self, ctx: &'c RunContext) -> Result<&'c str> {
        ctx.version()
            .ok_or_else(|| Error::internal_unexpected("Version was not resolved before packaging"))
    }

    fn run_clean_staging(&self, ctx: &RunContext) -> Result<CleanOutput> {
        let staging = self.staging_dir();
        let existed = clean::reset_dir(&staging, ctx.is_dry_run())?;
        let removed = if existed {
            vec![staging.display().to_string()]
        } else {
            Vec::new()
        };
        Ok(CleanOutput {
            report: clean::CleanReport {
                patterns: vec![self.config.staging_dir.clone()],
                removed,
            },
            dry_run: ctx.is_dry_run(),
        })
    }

    fn run_build(&self, ctx: &mut RunContext, targets: Vec<BuildTarget>) -> FanOutOutput {
        let queued = build::queue_build(ctx, &self.config.build, &targets);
        FanOutOutput {
            targets: target_names(&targets),
            tasks: queued.len(),
        }
    }

    fn run_dependency_refresh(&self, ctx: &mut RunContext) -> Result<FanOutOutput> {
        let targets = self.sample_targets();
        let queued = build::queue_dependency_refresh(ctx, &self.config.dependencies, &targets)?;
        Ok(FanOutOutput {
            targets: target_names(&targets),
            tasks: queued.len(),
        })
    }

    fn run_clean_sample_packages(&self, ctx: &RunContext) -> Result<CleanOutput> {
        let report = clean::remove_matching(
            &self.root,
            &self.config.clean.sample_packages,
            ctx.is_dry_run(),
        )?;
        Ok(CleanOutput {
            report,
            dry_run: ctx.is_dry_run(),
        })
    }

    fn run_clean_samples(&self, ctx: &RunContext) -> Result<CleanOutput> {
        let names: Vec<&str> = self.config.samples.iter().map(|s| s.name.as_str()).collect();
        let patterns = clean::sample_transient_patterns(
            &staging::samples_base(&self.root, &self.config),
            &names,
            &self.config.clean.sample_transient,
        );
        let report = clean::remove_matching(&self.root, &patterns, ctx.is_dry_run())?;
        Ok(CleanOutput {
            report,
            dry_run: ctx.is_dry_run(),
        })
    }

    fn run_stage(&self, ctx: &RunContext) -> Result<StageOutput> {
        let staging = self.staging_dir();
        let set = staging::stage_file_set(&self.root, &self.config)?;

        if ctx.is_dry_run() {
            return Ok(StageOutput {
                staging_dir: staging.display().to_string(),
                files: set.len(),
                version_file: None,
            });
        }

        clean::reset_dir(&staging, false)?;
        let version_file = version::write_version_file(&staging, self.current_version(ctx)?)?;
        let files = staging::copy_into(&set, &staging)?;
        log_status!("stage", "Copied {} file(s) into {}", files, staging.display());

        Ok(StageOutput {
            staging_dir: staging.display().to_string(),
            files,
            version_file: Some(version_file),
        })
    }

    fn run_compress(&self, ctx: &RunContext) -> Result<Vec<ArchiveOutput>> {
        let version = self.current_version(ctx)?;
        let staging = self.staging_dir();
        let mut outputs = Vec::with_capacity(self.config.archives.len());

        for archive_config in &self.config.archives {
            let path = staging::archive_path(&self.root, &self.config, archive_config, version);

            let summary = if ctx.is_dry_run() {
                ArchiveSummary {
                    path: path.display().to_string(),
                    entries: 0,
                    bytes: 0,
                    sha256: String::new(),
                }
            } else {
                let set = staging::archive_file_set(&staging, archive_config)?;
                archive::write(&ArchiveSpec {
                    path,
                    level: archive_config.level,
                    file_sets: vec![set],
                })?
            };

            outputs.push(ArchiveOutput {
                id: archive_config.id.clone(),
                summary,
            });
        }

        Ok(outputs)
    }
}

impl StepHandler for ReleaseSteps {
    fn supports(&self, step: &str) -> bool {
        ReleaseStep::parse(step).is_some()
    }

    fn resolve_version(&self) -> Result<String> {
        let path = parser::resolve_path(&self.root, &self.config.version_file);
        Ok(version::resolve_version(&path, &self.config.version_pattern)?.version)
    }

    fn execute_step(&self, step: &str, ctx: &mut RunContext) -> Result<Option<serde_json::Value>> {
        let Some(release_step) = ReleaseStep::parse(step) else {
            return Err(Error::pipeline_not_found(step, Vec::new()));
        };

        match release_step {
            ReleaseStep::CleanStaging => to_data(self.run_clean_staging(ctx)?),
            ReleaseStep::BuildSource => to_data(self.run_build(ctx, self.source_targets())),
            ReleaseStep::RefreshDependencies => to_data(self.run_dependency_refresh(ctx)?),
            ReleaseStep::CleanSamplePackages => to_data(self.run_clean_sample_packages(ctx)?),
            ReleaseStep::BuildSamples => to_data(self.run_build(ctx, self.sample_targets())),
            ReleaseStep::CleanSamples => to_data(self.run_clean_samples(ctx)?),
            ReleaseStep::Stage => to_data(self.run_stage(ctx)?),
            ReleaseStep::Compress => to_data(self.run_compress(ctx)?),
        }
    }
}

fn target_names(targets: &[BuildTarget]) -> Vec<String> {
    targets.iter().map(|t| t.name().to_string()).collect()
}

fn to_data<T: Serialize>(value: T) -> Result<Option<serde_json::Value>> {
    serde_json::to_value(value)
        .map(Some)
        .map_err(|e| Error::internal_json(e.to_string(), Some("step output".to_string())))
}
