use serde::Serialize;
use std::path::Path;

use crate::config::ReleaseConfig;
use crate::engine::pipeline::referenced_steps;
use crate::engine::{Orchestrator, PipelineRegistry, RunContext, RunReport, StepHandler};
use crate::error::{Error, Result};
use crate::files::FileEntry;
use crate::process::{CommandRunner, ShellRunner};

use super::executor::ReleaseSteps;
use super::staging;
use super::types::{ReleaseStep, DEFAULT_PIPELINE, PACKAGE_RELEASE, RELEASE_BUILD};

/// `release-build`, `package-release` and `default` (both in sequence).
pub fn default_registry() -> PipelineRegistry {
    let mut registry = PipelineRegistry::new();
    registry
        .register(
            RELEASE_BUILD,
            &[
                ReleaseStep::CleanStaging.as_str(),
                ReleaseStep::BuildSource.as_str(),
                ReleaseStep::RefreshDependencies.as_str(),
                ReleaseStep::CleanSamplePackages.as_str(),
                ReleaseStep::BuildSamples.as_str(),
            ],
        )
        .register(
            PACKAGE_RELEASE,
            &[
                ReleaseStep::CleanSamples.as_str(),
                ReleaseStep::Stage.as_str(),
                ReleaseStep::Compress.as_str(),
            ],
        )
        .register(DEFAULT_PIPELINE, &[RELEASE_BUILD, PACKAGE_RELEASE]);
    registry
}

/// Run `pipeline` end to end. Any failure comes back as `Err`.
pub fn run(
    root: &Path,
    config: ReleaseConfig,
    pipeline: &str,
    runner: &dyn CommandRunner,
) -> Result<RunReport> {
    execute(root, config, pipeline, runner, RunContext::new())
}

/// Resolve `pipeline` and every task it would run, without side effects.
pub fn plan(root: &Path, config: ReleaseConfig, pipeline: &str) -> Result<RunReport> {
    execute(root, config, pipeline, &ShellRunner::quiet(), RunContext::dry_run())
}

fn execute(
    root: &Path,
    config: ReleaseConfig,
    pipeline: &str,
    runner: &dyn CommandRunner,
    mut ctx: RunContext,
) -> Result<RunReport> {
    let registry = default_registry();
    let steps = ReleaseSteps::new(root, config);
    validate_registry(&registry, &steps)?;
    let mut orchestrator = Orchestrator::new(&registry, &steps, runner);

    log_status!(
        "pipeline",
        "{} '{}' (run {})",
        if ctx.is_dry_run() { "Planning" } else { "Running" },
        pipeline,
        ctx.run_id()
    );

    orchestrator.run(pipeline, &mut ctx)?.into_result()
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileListing {
    /// `stage` or an archive id.
    pub set: String,
    pub base_dir: String,
    pub count: usize,
    pub entries: Vec<FileEntry>,
}

/// Entries `stage` would copy, or with `archive` the entries that archive
/// would hold given the current staging directory.
pub fn list_files(root: &Path, config: &ReleaseConfig, archive: Option<&str>) -> Result<FileListing> {
    let (set_name, base_dir, set) = match archive {
        Some(id) => {
            let archive_config = config.archive(id)?;
            let staging = staging::staging_dir(root, config);
            let set = staging::archive_file_set(&staging, archive_config)?;
            (id.to_string(), staging, set)
        }
        None => (
            ReleaseStep::Stage.as_str().to_string(),
            root.to_path_buf(),
            staging::stage_file_set(root, config)?,
        ),
    };

    Ok(FileListing {
        set: set_name,
        base_dir: base_dir.display().to_string(),
        count: set.len(),
        entries: set.entries,
    })
}

/// Fail when a registered pipeline names a step nothing can execute.
pub fn validate_registry(registry: &PipelineRegistry, handler: &dyn StepHandler) -> Result<()> {
    let mut unknown: Vec<String> = referenced_steps(registry)
        .into_iter()
        .filter(|step| !handler.supports(step))
        .collect();
    if unknown.is_empty() {
        return Ok(());
    }
    unknown.sort();
    Err(Error::validation_invalid_argument(
        "pipeline",
        "Pipelines reference unknown steps",
        None,
        Some(unknown),
    ))
}
