//! Text extraction primitives.
//!
//! Version lookup and command-line rendering are built on these helpers.

use crate::error::{Error, Result};
use regex::Regex;
use std::hash::Hash;
use std::path::{Path, PathBuf};

/// Compile a regex, reporting an invalid pattern against the config key that supplied it.
pub fn compile(pattern: &str, key: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| {
        Error::config_invalid_value(key, Some(pattern.to_string()), e.to_string())
    })
}

/// Extract first match from content using a compiled regex with a capture group.
/// Falls back to the whole match when the pattern has no capture group.
pub fn extract_first(content: &str, re: &Regex) -> Option<String> {
    re.captures(content).and_then(|caps| {
        caps.get(1)
            .or_else(|| caps.get(0))
            .map(|m| m.as_str().to_string())
    })
}

/// Resolve path that may be absolute or relative to base.
pub fn resolve_path(base: &Path, file: &str) -> PathBuf {
    let expanded = shellexpand::tilde(file);
    let candidate = Path::new(expanded.as_ref());
    if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        base.join(candidate)
    }
}

/// Deduplicate preserving first occurrence order.
pub fn dedupe<T>(items: Vec<T>) -> Vec<T>
where
    T: Clone + Eq + Hash,
{
    let mut seen = std::collections::HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

/// Normalize a path to forward slashes.
pub fn to_slash(path: &Path) -> String {
    let text = path.to_string_lossy();
    if cfg!(windows) {
        text.replace('\\', "/")
    } else {
        text.to_string()
    }
}
