use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::utils::parser;
use crate::utils::template::TemplateVars;

/// One buildable solution and the directory that contains it.
///
/// Targets are enumerated once per run and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildTarget {
    name: String,
    solution_file: PathBuf,
    dir: PathBuf,
}

impl BuildTarget {
    pub fn from_solution(solution_file: impl Into<PathBuf>) -> Self {
        let solution_file = solution_file.into();
        let name = solution_file
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let dir = solution_file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        Self {
            name,
            solution_file,
            dir,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn solution_file(&self) -> &Path {
        &self.solution_file
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Solution file name without its directory.
    pub fn solution_name(&self) -> String {
        self.solution_file
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    /// Template variables describing this target.
    pub fn vars(&self) -> BTreeMap<String, String> {
        let mut vars = BTreeMap::new();
        vars.insert(TemplateVars::TARGET.to_string(), self.name.clone());
        vars.insert(TemplateVars::SOLUTION.to_string(), self.solution_name());
        vars.insert(
            TemplateVars::SOLUTION_FILE.to_string(),
            self.solution_file.display().to_string(),
        );
        vars.insert(
            TemplateVars::SOLUTION_DIR.to_string(),
            self.dir.display().to_string(),
        );
        vars
    }
}

/// Targets for `<samples_dir>/<name>/<name>.sln`, in the order given.
pub fn enumerate_samples<S: AsRef<str>>(samples_dir: &Path, names: &[S]) -> Vec<BuildTarget> {
    let names: Vec<String> = names.iter().map(|n| n.as_ref().to_string()).collect();
    parser::dedupe(names)
        .into_iter()
        .map(|name| {
            BuildTarget::from_solution(samples_dir.join(&name).join(format!("{}.sln", name)))
        })
        .collect()
}

/// Targets for solution paths relative to `root`.
pub fn enumerate_solutions<S: AsRef<str>>(root: &Path, solutions: &[S]) -> Vec<BuildTarget> {
    solutions
        .iter()
        .map(|s| BuildTarget::from_solution(parser::resolve_path(root, s.as_ref())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_targets_follow_name_layout() {
        let targets = enumerate_samples(Path::new("/repo/Samples"), &["DocCode", "ToDo"]);
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].name(), "DocCode");
        assert_eq!(
            targets[0].solution_file(),
            Path::new("/repo/Samples/DocCode/DocCode.sln")
        );
        assert_eq!(targets[1].dir(), Path::new("/repo/Samples/ToDo"));
    }

    #[test]
    fn duplicate_sample_names_are_enumerated_once() {
        let targets = enumerate_samples(Path::new("S"), &["A", "B", "A"]);
        let names: Vec<&str> = targets.iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["A", "B"]);
    }

    #[test]
    fn vars_expose_solution_parts() {
        let target = BuildTarget::from_solution("/repo/Build.sln");
        let vars = target.vars();
        assert_eq!(vars["solution"], "Build.sln");
        assert_eq!(vars["solutionDir"], "/repo");
        assert_eq!(vars["target"], "Build");
    }
}
