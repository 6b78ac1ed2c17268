//! String template rendering utilities.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

static PLACEHOLDER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{([^{}]*)\}\}").unwrap());

pub struct TemplateVars;

impl TemplateVars {
    pub const TOOL: &'static str = "tool";
    pub const OPTIONS: &'static str = "options";
    pub const TARGET: &'static str = "target";
    pub const SOLUTION: &'static str = "solution";
    pub const SOLUTION_FILE: &'static str = "solutionFile";
    pub const SOLUTION_DIR: &'static str = "solutionDir";
    pub const MANIFEST: &'static str = "manifest";
    pub const PACKAGES_DIR: &'static str = "packagesDir";
    pub const PACKAGE: &'static str = "package";
    pub const BUILD_TARGET: &'static str = "buildTarget";
    pub const PRODUCT: &'static str = "product";
    pub const VERSION: &'static str = "version";
}

pub fn render(template: &str, variables: &[(&str, &str)]) -> String {
    let mut result = template.to_string();

    for (key, value) in variables {
        let placeholder = format!("{{{{{}}}}}", key);
        result = result.replace(&placeholder, value);
    }

    result
}

pub fn render_map(template: &str, variables: &BTreeMap<String, String>) -> String {
    let mut result = template.to_string();

    for (key, value) in variables {
        let placeholder = format!("{{{{{}}}}}", key);
        result = result.replace(&placeholder, value);
    }

    result
}

/// Placeholders still present after rendering.
pub fn unresolved(rendered: &str) -> Vec<String> {
    PLACEHOLDER_PATTERN
        .captures_iter(rendered)
        .map(|caps| caps[1].to_string())
        .collect()
}
