//! Glob-driven removal of build leftovers and staging output.

use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::utils::{io, parser};

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanReport {
    pub patterns: Vec<String>,
    pub removed: Vec<String>,
}

impl CleanReport {
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty()
    }
}

/// `<samples_dir>/<sample>/**/<name>` for every sample and transient name.
///
/// `samples_dir` is either relative to the clean root or absolute; it and the
/// sample names are escaped so only `names` carry wildcards.
pub fn sample_transient_patterns<S: AsRef<str>, T: AsRef<str>>(
    samples_dir: &str,
    samples: &[S],
    names: &[T],
) -> Vec<String> {
    let samples_dir = glob::Pattern::escape(samples_dir.trim_end_matches('/'));
    samples
        .iter()
        .flat_map(|sample| {
            let sample = glob::Pattern::escape(sample.as_ref());
            let samples_dir = samples_dir.clone();
            names.iter().map(move |name| {
                format!("{}/{}/**/{}", samples_dir, sample, name.as_ref())
            })
        })
        .collect()
}

/// Paths matched by any of `patterns`, sorted and without entries nested
/// inside another match. Relative patterns are evaluated under `root`.
pub fn resolve(root: &Path, patterns: &[String]) -> Result<Vec<PathBuf>> {
    let escaped_root = glob::Pattern::escape(&parser::to_slash(root));
    let mut matches = Vec::new();

    for pattern in patterns {
        let full = if Path::new(pattern).is_absolute() {
            pattern.clone()
        } else {
            format!("{}/{}", escaped_root.trim_end_matches('/'), pattern)
        };
        let paths = glob::glob(&full).map_err(|e| {
            Error::file_set_resolution(
                root.display().to_string(),
                Some(pattern.clone()),
                e.to_string(),
            )
        })?;
        matches.extend(paths.filter_map(|entry| entry.ok()));
    }

    matches.sort();
    matches.dedup();

    let mut outermost: Vec<PathBuf> = Vec::with_capacity(matches.len());
    for path in matches {
        if outermost.iter().any(|kept| path.starts_with(kept)) {
            continue;
        }
        outermost.push(path);
    }
    Ok(outermost)
}

/// Delete every path matched by `patterns` beneath `root`.
pub fn remove_matching(root: &Path, patterns: &[String], dry_run: bool) -> Result<CleanReport> {
    let targets = resolve(root, patterns)?;
    let mut removed = Vec::new();

    for path in targets {
        let deleted = dry_run || io::remove_path(&path, "clean")?;
        if deleted {
            removed.push(relative_display(root, &path));
        }
    }

    if !dry_run && !removed.is_empty() {
        log_status!("clean", "Removed {} path(s)", removed.len());
    }

    Ok(CleanReport {
        patterns: patterns.to_vec(),
        removed,
    })
}

/// Remove `dir` if it exists and recreate it empty.
pub fn reset_dir(dir: &Path, dry_run: bool) -> Result<bool> {
    if dry_run {
        return Ok(dir.exists());
    }
    let existed = io::remove_path(dir, "reset staging directory")?;
    io::ensure_dir(dir, "reset staging directory")?;
    Ok(existed)
}

fn relative_display(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .map(parser::to_slash)
        .unwrap_or_else(|_| parser::to_slash(path))
}
