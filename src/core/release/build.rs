//! Compiler and dependency-manager fan-out.

use heck::ToKebabCase;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::{BuildConfig, DependencyConfig};
use crate::engine::{RunContext, TaskInstance, TaskTemplate};
use crate::error::{Error, Result};
use crate::target::BuildTarget;
use crate::utils::parser;
use crate::utils::template::TemplateVars;

/// Toolchain targets issued per solution, in order. Rebuild never runs without Clean.
pub const BUILD_TARGETS: [&str; 2] = ["Clean", "Rebuild"];

fn task_name(prefix: &str, action: &str) -> String {
    format!("{}-{}", prefix, action.to_kebab_case())
}

pub fn build_templates(build: &BuildConfig) -> Vec<TaskTemplate> {
    BUILD_TARGETS
        .iter()
        .map(|target| {
            TaskTemplate::new(task_name("build", target), &build.command)
                .var(TemplateVars::TOOL, &build.tool)
                .var(TemplateVars::OPTIONS, &build.options)
                .var(TemplateVars::BUILD_TARGET, *target)
                .working_dir(format!("{{{{{}}}}}", TemplateVars::SOLUTION_DIR))
        })
        .collect()
}

/// Queue Clean then Rebuild for each target.
pub fn queue_build(ctx: &mut RunContext, build: &BuildConfig, targets: &[BuildTarget]) -> Vec<TaskInstance> {
    let templates = build_templates(build);
    let mut queued = Vec::with_capacity(targets.len() * templates.len());
    for target in targets {
        for template in &templates {
            queued.extend(ctx.expand(template, std::slice::from_ref(target)));
        }
    }
    queued
}

pub fn install_template(deps: &DependencyConfig) -> TaskTemplate {
    TaskTemplate::new(task_name("deps", "Install"), &deps.install_command)
        .var(TemplateVars::TOOL, &deps.tool)
        .working_dir(format!("{{{{{}}}}}", TemplateVars::SOLUTION_DIR))
}

pub fn update_template(deps: &DependencyConfig) -> TaskTemplate {
    TaskTemplate::new(task_name("deps", "Update"), &deps.update_command)
        .var(TemplateVars::TOOL, &deps.tool)
        .working_dir(format!("{{{{{}}}}}", TemplateVars::SOLUTION_DIR))
}

/// Dependency manifests beneath `dir`, lexically sorted.
pub fn find_manifests(dir: &Path, manifest_name: &str) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let pattern = format!(
        "{}/**/{}",
        glob::Pattern::escape(&parser::to_slash(dir)),
        glob::Pattern::escape(manifest_name)
    );
    let mut manifests: Vec<PathBuf> = glob::glob(&pattern)
        .map_err(|e| {
            Error::file_set_resolution(dir.display().to_string(), Some(pattern.clone()), e.to_string())
        })?
        .filter_map(|entry| entry.ok())
        .filter(|p| p.is_file())
        .collect();
    manifests.sort();
    Ok(manifests)
}

/// Queue, per target, one install per manifest then one update per package.
///
/// Instances run in the queued order, so a failing install halts the run
/// before that target's updates (and every later target) are attempted.
pub fn queue_dependency_refresh(
    ctx: &mut RunContext,
    deps: &DependencyConfig,
    targets: &[BuildTarget],
) -> Result<Vec<TaskInstance>> {
    let install = install_template(deps);
    let update = update_template(deps);
    let mut queued = Vec::new();

    for target in targets {
        let packages_dir = target.dir().join(&deps.packages_dir_name);
        let base = target.vars();

        let installs = find_manifests(target.dir(), &deps.manifest_name)?
            .into_iter()
            .map(|manifest| {
                let mut vars = base.clone();
                vars.insert(TemplateVars::MANIFEST.to_string(), manifest.display().to_string());
                vars.insert(
                    TemplateVars::PACKAGES_DIR.to_string(),
                    packages_dir.display().to_string(),
                );
                vars
            })
            .collect::<Vec<BTreeMap<String, String>>>();
        queued.extend(ctx.expand_with(&install, installs));

        let updates = deps.packages.iter().map(|package| {
            let mut vars = base.clone();
            vars.insert(TemplateVars::PACKAGE.to_string(), package.clone());
            vars
        });
        queued.extend(ctx.expand_with(&update, updates));
    }

    Ok(queued)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReleaseConfig;
    use crate::target::enumerate_samples;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn clean_always_precedes_rebuild() {
        let config = ReleaseConfig::default();
        let targets = enumerate_samples(Path::new("/s"), &["A", "B"]);
        let mut ctx = RunContext::new();

        let queued = queue_build(&mut ctx, &config.build, &targets);
        let names: Vec<&str> = queued.iter().map(|t| t.name.as_str()).collect();

        assert_eq!(
            names,
            vec!["build-clean-0", "build-rebuild-1", "build-clean-2", "build-rebuild-3"]
        );
        assert!(queued[0].command.ends_with("/t:Clean"));
        assert!(queued[1].command.contains("\"A.sln\""));
        assert!(queued[1].command.ends_with("/t:Rebuild"));
        assert_eq!(queued[3].working_dir, Some(PathBuf::from("/s/B")));
    }

    #[test]
    fn install_per_manifest_then_update_per_package() {
        let dir = TempDir::new().unwrap();
        let sample = dir.path().join("ToDo");
        fs::create_dir_all(sample.join("ToDo")).unwrap();
        fs::create_dir_all(sample.join("Tests")).unwrap();
        fs::write(sample.join("ToDo/packages.config"), "<packages/>").unwrap();
        fs::write(sample.join("Tests/packages.config"), "<packages/>").unwrap();
        fs::write(sample.join("ToDo.sln"), "").unwrap();

        let mut deps = ReleaseConfig::default().dependencies;
        deps.packages = vec!["Breeze.Client".to_string(), "Breeze.WebApi".to_string()];
        let targets = enumerate_samples(dir.path(), &["ToDo"]);
        let mut ctx = RunContext::new();

        let queued = queue_dependency_refresh(&mut ctx, &deps, &targets).unwrap();
        let names: Vec<&str> = queued.iter().map(|t| t.template.as_str()).collect();

        assert_eq!(names, vec!["deps-install", "deps-install", "deps-update", "deps-update"]);
        assert!(queued[0].command.contains("Tests"));
        assert!(queued[0]
            .command
            .contains(&format!("-OutputDirectory {}", sample.join("packages").display())));
        assert!(queued[3].command.ends_with("-Id Breeze.WebApi"));
        assert!(queued[2].command.contains("ToDo.sln"));
    }

    #[test]
    fn target_without_manifests_only_updates() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("NoDb")).unwrap();
        let deps = ReleaseConfig::default().dependencies;
        let targets = enumerate_samples(dir.path(), &["NoDb"]);
        let mut ctx = RunContext::new();

        let queued = queue_dependency_refresh(&mut ctx, &deps, &targets).unwrap();
        assert!(queued.iter().all(|t| t.template == "deps-update"));
        assert_eq!(queued.len(), deps.packages.len());
    }
}
