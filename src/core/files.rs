//! Pattern-driven file set collection.
//!
//! Patterns are replayed in declaration order over an accumulating map keyed by
//! destination path. Includes add (or overwrite) entries, `!` excludes remove the
//! entries currently present, and a later include re-admits what an earlier
//! exclude removed. Output is sorted by destination path.

use glob_match::glob_match;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::utils::parser;

/// Rewrites the file name of a match. The containing directory is never touched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RenameRule {
    /// Replace everything before the first `.`: `b01_breeze.foo.js` -> `breeze.foo.js`.
    Stem { stem: String },
    /// Replace the extension chain after the first `.`: `app.win64.dll` -> `app.dll`.
    Extension { extension: String },
}

impl RenameRule {
    pub fn apply(&self, relative: &str) -> String {
        let (dir, name) = match relative.rsplit_once('/') {
            Some((dir, name)) => (Some(dir), name),
            None => (None, relative),
        };

        let renamed = match self {
            RenameRule::Stem { stem } => match name.find('.') {
                Some(idx) => format!("{}{}", stem, &name[idx..]),
                None => stem.clone(),
            },
            RenameRule::Extension { extension } => {
                let base = name.find('.').map(|idx| &name[..idx]).unwrap_or(name);
                let ext = extension.trim_start_matches('.');
                if ext.is_empty() {
                    base.to_string()
                } else {
                    format!("{}.{}", base, ext)
                }
            }
        };

        match dir {
            Some(dir) => format!("{}/{}", dir, renamed),
            None => renamed,
        }
    }
}

/// One include or exclude glob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilePattern {
    pub glob: String,
    pub exclude: bool,
    /// Directory the glob is evaluated against, relative to the collection root
    /// unless absolute.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,
    /// Prefix prepended to destination paths of included matches.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dest: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rename: Option<RenameRule>,
    /// Let wildcards match names starting with `.`.
    pub dot: bool,
}

impl FilePattern {
    /// Parse a raw glob; a leading `!` marks an exclude.
    pub fn parse(raw: &str) -> Self {
        let (exclude, glob) = match raw.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, raw),
        };

        Self {
            glob: glob.to_string(),
            exclude,
            base: None,
            dest: None,
            rename: None,
            dot: false,
        }
    }

    pub fn parse_all<S: AsRef<str>>(raw: &[S]) -> Vec<Self> {
        raw.iter().map(|r| Self::parse(r.as_ref())).collect()
    }

    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        let raw = base.into();
        let mut base = normalize_rel(&raw);
        if raw.starts_with('/') {
            base.insert(0, '/');
        }
        self.base = (!base.is_empty() && base != "/").then_some(base);
        self
    }

    pub fn with_dest(mut self, dest: impl Into<String>) -> Self {
        let dest = normalize_rel(&dest.into());
        self.dest = (!dest.is_empty()).then_some(dest);
        self
    }

    pub fn with_rename(mut self, rename: Option<RenameRule>) -> Self {
        self.rename = rename;
        self
    }

    pub fn with_dot(mut self, dot: bool) -> Self {
        self.dot = dot;
        self
    }

    fn matches(&self, relative: &str) -> bool {
        dot_allowed(relative, &self.glob, self.dot) && glob_match(&self.glob, relative)
    }
}

/// A resolved `(source, destination)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub source: PathBuf,
    pub destination: String,
    /// Source path relative to the collection root, `/`-separated.
    #[serde(skip)]
    pub relative: String,
}

/// Deterministic, deduplicated entry list sorted by destination.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileSet {
    pub entries: Vec<FileEntry>,
}

impl FileSet {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn destinations(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.destination.as_str()).collect()
    }

    /// Merge file sets in order; later sets win on destination collisions.
    pub fn merge(sets: &[FileSet]) -> FileSet {
        let mut map: BTreeMap<String, FileEntry> = BTreeMap::new();
        for set in sets {
            for entry in &set.entries {
                map.insert(entry.destination.clone(), entry.clone());
            }
        }
        FileSet {
            entries: map.into_values().collect(),
        }
    }
}

/// Resolve `patterns` against `base_dir`.
pub fn collect(base_dir: &Path, patterns: &[FilePattern]) -> Result<FileSet> {
    if !base_dir.is_dir() {
        return Err(Error::file_set_resolution(
            base_dir.display().to_string(),
            None,
            "Base directory does not exist or is not a directory",
        ));
    }

    let mut walks: HashMap<(PathBuf, PathBuf), Vec<String>> = HashMap::new();
    let mut literal = Vec::new();
    let mut working: BTreeMap<String, FileEntry> = BTreeMap::new();

    for pattern in patterns {
        validate_glob(base_dir, pattern)?;

        if pattern.exclude {
            working.retain(|_, entry| !excluded_by(pattern, &entry.relative));
            continue;
        }

        let root = match &pattern.base {
            Some(base) => base_dir.join(base),
            None => base_dir.to_path_buf(),
        };

        if !root.is_dir() {
            return Err(Error::file_set_resolution(
                root.display().to_string(),
                Some(pattern.glob.clone()),
                "Base directory does not exist or is not a directory",
            ));
        }

        let candidates: &[String] = if is_literal(&pattern.glob) {
            let relative = normalize_rel(&pattern.glob);
            literal = if root.join(&relative).is_file() {
                vec![relative]
            } else {
                Vec::new()
            };
            &literal
        } else {
            let start = root.join(literal_prefix(&pattern.glob));
            let key = (root.clone(), start);
            if !walks.contains_key(&key) {
                let files = walk_files(&root, &key.1).map_err(|e| {
                    Error::file_set_resolution(
                        root.display().to_string(),
                        Some(pattern.glob.clone()),
                        e,
                    )
                })?;
                walks.insert(key.clone(), files);
            }
            walks.get(&key).map(Vec::as_slice).unwrap_or_default()
        };

        for relative in candidates {
            if !pattern.matches(relative) {
                continue;
            }

            let renamed = match &pattern.rename {
                Some(rule) => rule.apply(relative),
                None => relative.clone(),
            };
            let destination = match &pattern.dest {
                Some(dest) => format!("{}/{}", dest, renamed),
                None => renamed,
            };
            let root_relative = match &pattern.base {
                Some(base) => format!("{}/{}", base, relative),
                None => relative.clone(),
            };

            working.insert(
                destination.clone(),
                FileEntry {
                    source: root.join(relative),
                    destination,
                    relative: root_relative,
                },
            );
        }
    }

    Ok(FileSet {
        entries: working.into_values().collect(),
    })
}

fn excluded_by(pattern: &FilePattern, root_relative: &str) -> bool {
    let relative = match &pattern.base {
        Some(base) => match root_relative
            .strip_prefix(base.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
        {
            Some(rest) => rest,
            None => return false,
        },
        None => root_relative,
    };
    pattern.matches(relative)
}

fn dot_allowed(relative: &str, glob: &str, dot: bool) -> bool {
    if dot {
        return true;
    }
    let hidden = relative.split('/').any(|seg| seg.starts_with('.'));
    !hidden || glob.split('/').any(|seg| seg.starts_with('.') && seg != ".")
}

fn validate_glob(base_dir: &Path, pattern: &FilePattern) -> Result<()> {
    let fail = |problem: &str| {
        Err(Error::file_set_resolution(
            base_dir.display().to_string(),
            Some(pattern.glob.clone()),
            problem,
        ))
    };

    let glob = pattern.glob.as_str();
    if glob.trim().is_empty() {
        return fail("Empty pattern");
    }
    if glob.starts_with('/') || glob.split('/').any(|seg| seg == "..") {
        return fail("Pattern must stay relative to its base directory");
    }
    if glob.matches('[').count() != glob.matches(']').count()
        || glob.matches('{').count() != glob.matches('}').count()
    {
        return fail("Unbalanced brackets in pattern");
    }
    Ok(())
}

fn normalize_rel(path: &str) -> String {
    path.replace('\\', "/")
        .split('/')
        .filter(|seg| !seg.is_empty() && *seg != ".")
        .collect::<Vec<_>>()
        .join("/")
}

fn is_wild(segment: &str) -> bool {
    segment.contains(['*', '?', '[', '{'])
}

fn is_literal(glob: &str) -> bool {
    !is_wild(glob)
}

/// Leading directories of `glob` that contain no wildcards.
fn literal_prefix(glob: &str) -> String {
    let normalized = normalize_rel(glob);
    let segments: Vec<&str> = normalized.split('/').collect();
    let dirs = &segments[..segments.len().saturating_sub(1)];
    dirs.iter()
        .take_while(|seg| !is_wild(seg))
        .copied()
        .collect::<Vec<_>>()
        .join("/")
}

/// Every file beneath `start`, relative to `root` and `/`-separated, in lexical
/// walk order. A missing `start` yields nothing.
fn walk_files(root: &Path, start: &Path) -> std::result::Result<Vec<String>, String> {
    let mut out = Vec::new();
    if start.is_dir() {
        walk_into(root, start, &mut out)?;
    }
    Ok(out)
}

fn walk_into(
    root: &Path,
    dir: &Path,
    out: &mut Vec<String>,
) -> std::result::Result<(), String> {
    let mut children: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(|e| format!("{}: {}", dir.display(), e))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .collect();
    children.sort();

    for path in children {
        if path.is_dir() {
            walk_into(root, &path, out)?;
        } else if let Ok(rel) = path.strip_prefix(root) {
            out.push(parser::to_slash(rel));
        }
    }
    Ok(())
}
