//! Staging tree assembly and archive file sets.

use std::path::{Path, PathBuf};

use crate::config::{ArchiveConfig, CopyGroup, ReleaseConfig, SampleConfig};
use crate::error::Result;
use crate::files::{self, FilePattern, FileSet};
use crate::utils::template::{self, TemplateVars};
use crate::utils::{io, parser};

use super::types::STAGED_SAMPLES_DIR;

fn group_patterns(group: &CopyGroup) -> Vec<FilePattern> {
    FilePattern::parse_all(&group.src)
        .into_iter()
        .map(|p| {
            p.with_base(&group.cwd)
                .with_dest(&group.dest)
                .with_rename(group.rename.clone())
                .with_dot(group.dot)
        })
        .collect()
}

/// Copy group for one sample: everything (plus `.nuget/`) minus its excludes.
///
/// `samples_dir` is relative to the source root or absolute, as returned by
/// [`samples_base`].
pub fn sample_group(samples_dir: &str, sample: &SampleConfig) -> CopyGroup {
    let mut src = vec!["**/*".to_string(), "**/.nuget/*".to_string()];
    src.extend(sample.exclude.iter().map(|e| format!("!{}", e)));

    CopyGroup {
        cwd: format!("{}/{}", samples_dir.trim_end_matches('/'), sample.name),
        src,
        dest: format!("{}/{}", STAGED_SAMPLES_DIR, sample.name),
        rename: None,
        dot: false,
    }
}

/// Configured copy groups followed by one group per sample.
pub fn stage_groups(root: &Path, config: &ReleaseConfig) -> Vec<CopyGroup> {
    let samples_dir = samples_base(root, config);
    let mut groups = config.stage.clone();
    groups.extend(
        config
            .samples
            .iter()
            .map(|sample| sample_group(&samples_dir, sample)),
    );
    groups
}

pub fn stage_patterns(root: &Path, config: &ReleaseConfig) -> Vec<FilePattern> {
    stage_groups(root, config)
        .iter()
        .flat_map(group_patterns)
        .collect()
}

/// Files that `stage` copies, keyed by their path inside the staging directory.
pub fn stage_file_set(root: &Path, config: &ReleaseConfig) -> Result<FileSet> {
    files::collect(root, &stage_patterns(root, config))
}

/// Copy every entry of `set` to `<staging>/<destination>`.
pub fn copy_into(set: &FileSet, staging: &Path) -> Result<usize> {
    for entry in &set.entries {
        io::copy_file(&entry.source, &staging.join(&entry.destination), "stage file")?;
    }
    Ok(set.len())
}

pub fn archive_patterns(archive: &ArchiveConfig) -> Vec<FilePattern> {
    FilePattern::parse_all(&archive.patterns)
        .into_iter()
        .map(|p| p.with_dot(archive.dot))
        .collect()
}

/// Entries of one archive, resolved against the staging directory.
pub fn archive_file_set(staging: &Path, archive: &ArchiveConfig) -> Result<FileSet> {
    files::collect(staging, &archive_patterns(archive))
}

pub fn archive_file_name(archive: &ArchiveConfig, product: &str, version: &str) -> String {
    template::render(
        &archive.name,
        &[(TemplateVars::PRODUCT, product), (TemplateVars::VERSION, version)],
    )
}

pub fn archive_path(root: &Path, config: &ReleaseConfig, archive: &ArchiveConfig, version: &str) -> PathBuf {
    parser::resolve_path(root, &config.output_dir)
        .join(archive_file_name(archive, &config.product, version))
}

pub fn staging_dir(root: &Path, config: &ReleaseConfig) -> PathBuf {
    parser::resolve_path(root, &config.staging_dir)
}

pub fn samples_dir(root: &Path, config: &ReleaseConfig) -> PathBuf {
    parser::resolve_path(root, &config.samples_dir)
}

/// `samplesDir` as a `/`-separated path: relative when it lies under `root`,
/// absolute otherwise.
pub fn samples_base(root: &Path, config: &ReleaseConfig) -> String {
    let resolved = samples_dir(root, config);
    match resolved.strip_prefix(root) {
        Ok(rel) => parser::to_slash(rel),
        Err(_) => parser::to_slash(&resolved),
    }
}
