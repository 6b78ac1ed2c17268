use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::path::PathBuf;
use uuid::Uuid;

use crate::target::BuildTarget;
use crate::utils::template;

/// A named command pattern that fans out over a list of targets.
///
/// `command` and `working_dir` may reference `{{var}}` placeholders. Values
/// set on the template are shared by every instance; per-target values win.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskTemplate {
    name: String,
    command: String,
    working_dir: Option<String>,
    vars: BTreeMap<String, String>,
}

impl TaskTemplate {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            working_dir: None,
            vars: BTreeMap::new(),
        }
    }

    pub fn var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    pub fn working_dir(mut self, dir: impl Into<String>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Render command and working directory with `extra` layered over the template vars.
    pub fn render(&self, extra: &BTreeMap<String, String>) -> (String, Option<PathBuf>) {
        let mut vars = self.vars.clone();
        vars.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));

        let command = template::render_map(&self.command, &vars);
        let working_dir = self
            .working_dir
            .as_ref()
            .map(|dir| PathBuf::from(template::render_map(dir, &vars)));
        (command, working_dir)
    }
}

/// One concrete, uniquely-named command scheduled for execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskInstance {
    /// `{template}-{sequence}`
    pub name: String,
    pub template: String,
    pub sequence: u64,
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
}

/// State owned by a single pipeline run.
///
/// Holds the instance counter and the execution queue. A fresh context is
/// created for every run; nothing is shared between runs.
#[derive(Debug)]
pub struct RunContext {
    run_id: String,
    started_at: DateTime<Utc>,
    counter: u64,
    queue: VecDeque<TaskInstance>,
    version: Option<String>,
    dry_run: bool,
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RunContext {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            counter: 0,
            queue: VecDeque::new(),
            version: None,
            dry_run: false,
        }
    }

    /// A context whose steps only report what they would do.
    pub fn dry_run() -> Self {
        Self {
            dry_run: true,
            ..Self::new()
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn set_version(&mut self, version: impl Into<String>) {
        self.version = Some(version.into());
    }

    /// Number of instances created so far in this run.
    pub fn issued(&self) -> u64 {
        self.counter
    }

    /// One instance per target, in target order, each queued for execution.
    ///
    /// An empty target list is a no-op.
    pub fn expand(&mut self, template: &TaskTemplate, targets: &[BuildTarget]) -> Vec<TaskInstance> {
        self.expand_with(template, targets.iter().map(BuildTarget::vars))
    }

    /// Like `expand`, but over arbitrary variable sets.
    pub fn expand_with<I>(&mut self, template: &TaskTemplate, items: I) -> Vec<TaskInstance>
    where
        I: IntoIterator<Item = BTreeMap<String, String>>,
    {
        let instances: Vec<TaskInstance> = items
            .into_iter()
            .map(|vars| self.instantiate(template, &vars))
            .collect();

        self.queue.extend(instances.iter().cloned());
        instances
    }

    fn instantiate(&mut self, template: &TaskTemplate, vars: &BTreeMap<String, String>) -> TaskInstance {
        let sequence = self.counter;
        self.counter += 1;

        let (command, working_dir) = template.render(vars);
        TaskInstance {
            name: format!("{}-{}", template.name, sequence),
            template: template.name.clone(),
            sequence,
            command,
            working_dir,
        }
    }

    /// Pop the next queued instance in submission order.
    pub fn next_task(&mut self) -> Option<TaskInstance> {
        self.queue.pop_front()
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Drop every queued instance. Used when a run aborts.
    pub fn clear_queue(&mut self) -> usize {
        let dropped = self.queue.len();
        self.queue.clear();
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::enumerate_samples;
    use std::collections::HashSet;
    use std::path::Path;

    fn msbuild() -> TaskTemplate {
        TaskTemplate::new("build-rebuild", "msbuild \"{{solution}}\" {{options}} /t:Rebuild")
            .var("options", "/p:Configuration=Release")
            .working_dir("{{solutionDir}}")
    }

    #[test]
    fn empty_target_list_yields_nothing() {
        let mut ctx = RunContext::new();
        let instances = ctx.expand(&msbuild(), &[]);
        assert!(instances.is_empty());
        assert_eq!(ctx.pending(), 0);
        assert_eq!(ctx.issued(), 0);
    }

    #[test]
    fn one_instance_per_target_in_order() {
        let targets = enumerate_samples(Path::new("/s"), &["A", "B", "C"]);
        let mut ctx = RunContext::new();
        let instances = ctx.expand(&msbuild(), &targets);

        assert_eq!(instances.len(), 3);
        assert_eq!(instances[0].name, "build-rebuild-0");
        assert_eq!(instances[2].name, "build-rebuild-2");
        assert_eq!(
            instances[1].command,
            "msbuild \"B.sln\" /p:Configuration=Release /t:Rebuild"
        );
        assert_eq!(instances[1].working_dir, Some(PathBuf::from("/s/B")));
    }

    #[test]
    fn counter_is_shared_across_templates() {
        let targets = enumerate_samples(Path::new("/s"), &["A", "B"]);
        let clean = TaskTemplate::new("build-clean", "msbuild {{solution}} /t:Clean");
        let mut ctx = RunContext::new();

        let mut names = Vec::new();
        for t in [&clean, &msbuild(), &clean] {
            names.extend(ctx.expand(t, &targets).into_iter().map(|i| i.name));
        }

        let unique: HashSet<&String> = names.iter().collect();
        assert_eq!(names.len(), 6);
        assert_eq!(unique.len(), 6);
        assert_eq!(names[4], "build-clean-4");
    }

    #[test]
    fn queue_preserves_submission_order() {
        let targets = enumerate_samples(Path::new("/s"), &["A", "B"]);
        let mut ctx = RunContext::new();
        ctx.expand(&TaskTemplate::new("first", "one {{target}}"), &targets);
        ctx.expand(&TaskTemplate::new("second", "two {{target}}"), &targets);

        let mut order = Vec::new();
        while let Some(task) = ctx.next_task() {
            order.push(task.command);
        }
        assert_eq!(order, vec!["one A", "one B", "two A", "two B"]);
    }

    #[test]
    fn target_vars_override_template_vars() {
        let template = TaskTemplate::new("t", "{{target}}").var("target", "shared");
        let mut ctx = RunContext::new();
        let instances = ctx.expand(&template, &enumerate_samples(Path::new("/s"), &["X"]));
        assert_eq!(instances[0].command, "X");
    }

    #[test]
    fn each_run_has_its_own_id_and_counter() {
        let a = RunContext::new();
        let b = RunContext::dry_run();
        assert_ne!(a.run_id(), b.run_id());
        assert!(b.is_dry_run());
        assert_eq!(b.issued(), 0);
    }
}
