use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::time::Instant;

use crate::error::{Error, Hint, Result};
use crate::process::CommandRunner;
use crate::utils::template;

use super::expand::{RunContext, TaskInstance};

/// Release-specific behavior plugged into the orchestrator.
///
/// `execute_step` performs the step's own filesystem work and queues any
/// external commands on the context; the orchestrator drains that queue
/// before the next step starts. With a dry-run context no side effects are
/// allowed.
pub trait StepHandler {
    fn supports(&self, step: &str) -> bool;

    fn resolve_version(&self) -> Result<String>;

    fn execute_step(&self, step: &str, ctx: &mut RunContext) -> Result<Option<serde_json::Value>>;
}

/// Named pipelines whose steps are leaf tasks or other pipelines.
#[derive(Debug, Clone, Default)]
pub struct PipelineRegistry {
    pipelines: BTreeMap<String, Vec<String>>,
}

impl PipelineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<S: AsRef<str>>(&mut self, name: impl Into<String>, steps: &[S]) -> &mut Self {
        self.pipelines.insert(
            name.into(),
            steps.iter().map(|s| s.as_ref().to_string()).collect(),
        );
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.pipelines.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.pipelines.keys().cloned().collect()
    }

    /// Expand `name` into its ordered leaf steps.
    ///
    /// A bare leaf name flattens to itself when `is_leaf` accepts it.
    pub fn flatten(&self, name: &str, is_leaf: &dyn Fn(&str) -> bool) -> Result<Vec<String>> {
        let mut out = Vec::new();
        let mut stack = Vec::new();
        self.flatten_into(name, is_leaf, &mut stack, &mut out)?;
        Ok(out)
    }

    fn flatten_into(
        &self,
        name: &str,
        is_leaf: &dyn Fn(&str) -> bool,
        stack: &mut Vec<String>,
        out: &mut Vec<String>,
    ) -> Result<()> {
        let Some(steps) = self.pipelines.get(name) else {
            if is_leaf(name) {
                out.push(name.to_string());
                return Ok(());
            }
            return Err(Error::pipeline_not_found(name, self.names()));
        };

        if stack.iter().any(|s| s == name) {
            let mut cycle = stack.clone();
            cycle.push(name.to_string());
            return Err(Error::validation_invalid_argument(
                "pipeline",
                format!("Pipeline '{}' includes itself", name),
                Some(name.to_string()),
                Some(cycle),
            ));
        }

        stack.push(name.to_string());
        for step in steps {
            self.flatten_into(step, is_leaf, stack, out)?;
        }
        stack.pop();
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "state")]
pub enum RunState {
    Idle,
    ResolvingVersion,
    RunningPipeline { step_index: usize },
    Completed,
    Aborted { code: String, message: String },
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PipelineRunStatus {
    Success,
    Failed,
    Skipped,
    Planned,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskResult {
    pub name: String,
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
    pub status: PipelineRunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    pub name: String,
    pub status: PipelineRunStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tasks: Vec<TaskResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<Hint>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub total_steps: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub tasks_run: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub next_actions: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub run_id: String,
    pub pipeline: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub state: RunState,
    pub status: PipelineRunStatus,
    pub steps: Vec<StepResult>,
    pub summary: RunSummary,
    #[serde(skip)]
    pub error: Option<Error>,
}

impl RunReport {
    /// The report on success, or the error that aborted the run.
    pub fn into_result(self) -> Result<RunReport> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }
}

/// Runs flattened pipelines one step at a time.
pub struct Orchestrator<'a> {
    registry: &'a PipelineRegistry,
    handler: &'a dyn StepHandler,
    runner: &'a dyn CommandRunner,
    state: RunState,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        registry: &'a PipelineRegistry,
        handler: &'a dyn StepHandler,
        runner: &'a dyn CommandRunner,
    ) -> Self {
        Self {
            registry,
            handler,
            runner,
            state: RunState::Idle,
        }
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    fn transition(&mut self, next: RunState) {
        if let RunState::RunningPipeline { step_index } = &next {
            log_status!("pipeline", "Step {}", step_index + 1);
        }
        self.state = next;
    }

    /// Ordered leaf steps for `name`, without running anything.
    pub fn plan(&self, name: &str) -> Result<Vec<String>> {
        let handler = self.handler;
        self.registry.flatten(name, &|step| handler.supports(step))
    }

    /// Run pipeline `name` to completion or first failure.
    ///
    /// Resolution failures (unknown pipeline, cycles) are returned as `Err`
    /// before anything runs. Failures after the run starts are recorded in
    /// the report and leave the orchestrator `Aborted`.
    pub fn run(&mut self, name: &str, ctx: &mut RunContext) -> Result<RunReport> {
        let steps = self.plan(name)?;
        let mut results: Vec<StepResult> = Vec::with_capacity(steps.len());

        self.transition(RunState::ResolvingVersion);
        let version_result = self.handler.resolve_version();
        let failure = match version_result {
            Ok(version) => {
                ctx.set_version(version);
                self.run_steps(&steps, ctx, &mut results)
            }
            Err(err) => Some(err),
        };

        if let Some(err) = &failure {
            let dropped = ctx.clear_queue();
            if dropped > 0 {
                log_status!("pipeline", "Dropped {} queued task(s)", dropped);
            }
            for step in steps.iter().skip(results.len()) {
                results.push(skipped_step(step));
            }
            self.transition(RunState::Aborted {
                code: err.code.as_str().to_string(),
                message: err.message.clone(),
            });
        } else {
            self.transition(RunState::Completed);
        }

        let status = match (&failure, ctx.is_dry_run()) {
            (Some(_), _) => PipelineRunStatus::Failed,
            (None, true) => PipelineRunStatus::Planned,
            (None, false) => PipelineRunStatus::Success,
        };
        let summary = build_summary(&results, status);

        Ok(RunReport {
            run_id: ctx.run_id().to_string(),
            pipeline: name.to_string(),
            version: ctx.version().map(str::to_string),
            dry_run: ctx.is_dry_run(),
            started_at: ctx.started_at(),
            finished_at: Utc::now(),
            state: self.state.clone(),
            status,
            steps: results,
            summary,
            error: failure,
        })
    }

    fn run_steps(
        &mut self,
        steps: &[String],
        ctx: &mut RunContext,
        results: &mut Vec<StepResult>,
    ) -> Option<Error> {
        for (step_index, step) in steps.iter().enumerate() {
            self.transition(RunState::RunningPipeline { step_index });
            let started = Instant::now();

            let data = match self.handler.execute_step(step, ctx) {
                Ok(data) => data,
                Err(err) => {
                    results.push(failed_step(step, Vec::new(), &err, started));
                    return Some(err);
                }
            };

            let mut tasks = Vec::new();
            while let Some(task) = ctx.next_task() {
                let dry_run = ctx.is_dry_run();
                let outcome = check_placeholders(&task).and_then(|()| {
                    if dry_run {
                        Ok(None)
                    } else {
                        self.run_task(&task).map(Some)
                    }
                });
                match outcome {
                    Ok(None) => {
                        tasks.push(task_result(&task, PipelineRunStatus::Planned, None));
                    }
                    Ok(Some(exit_code)) => {
                        tasks.push(task_result(&task, PipelineRunStatus::Success, Some(exit_code)));
                    }
                    Err(err) => {
                        let exit_code = err.details["exitCode"].as_i64().map(|c| c as i32);
                        tasks.push(task_result(&task, PipelineRunStatus::Failed, exit_code));
                        results.push(failed_step(step, tasks, &err, started));
                        return Some(err);
                    }
                }
            }

            results.push(StepResult {
                name: step.clone(),
                status: if ctx.is_dry_run() {
                    PipelineRunStatus::Planned
                } else {
                    PipelineRunStatus::Success
                },
                tasks,
                data,
                error: None,
                hints: Vec::new(),
                duration_ms: elapsed_ms(started),
            });
        }
        None
    }

    fn run_task(&self, task: &TaskInstance) -> Result<i32> {
        log_status!("exec", "{}: {}", task.name, task.command);
        let output = self
            .runner
            .run(&task.name, &task.command, task.working_dir.as_deref())?;
        Ok(output.exit_code)
    }
}

/// Reject a rendered command that still carries `{{placeholders}}`.
fn check_placeholders(task: &TaskInstance) -> Result<()> {
    let unresolved = template::unresolved(&task.command);
    if unresolved.is_empty() {
        return Ok(());
    }
    Err(Error::validation_invalid_argument(
        "command",
        format!("Task '{}' has unresolved placeholders", task.name),
        Some(task.command.clone()),
        Some(unresolved),
    ))
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

fn task_result(task: &TaskInstance, status: PipelineRunStatus, exit_code: Option<i32>) -> TaskResult {
    TaskResult {
        name: task.name.clone(),
        command: task.command.clone(),
        working_dir: task.working_dir.as_ref().map(|d| d.display().to_string()),
        status,
        exit_code,
    }
}

fn failed_step(step: &str, tasks: Vec<TaskResult>, err: &Error, started: Instant) -> StepResult {
    StepResult {
        name: step.to_string(),
        status: PipelineRunStatus::Failed,
        tasks,
        data: None,
        error: Some(err.message.clone()),
        hints: err.hints.clone(),
        duration_ms: elapsed_ms(started),
    }
}

fn skipped_step(step: &str) -> StepResult {
    StepResult {
        name: step.to_string(),
        status: PipelineRunStatus::Skipped,
        tasks: Vec::new(),
        data: None,
        error: None,
        hints: Vec::new(),
        duration_ms: 0,
    }
}

fn build_summary(results: &[StepResult], status: PipelineRunStatus) -> RunSummary {
    let count = |s: PipelineRunStatus| results.iter().filter(|r| r.status == s).count();
    let tasks_run = results
        .iter()
        .flat_map(|r| r.tasks.iter())
        .filter(|t| matches!(t.status, PipelineRunStatus::Success | PipelineRunStatus::Failed))
        .count();

    let next_actions = match status {
        PipelineRunStatus::Failed => vec![
            "Fix the failing step and re-run the whole pipeline from the start".to_string(),
        ],
        _ => Vec::new(),
    };

    RunSummary {
        total_steps: results.len(),
        succeeded: count(PipelineRunStatus::Success),
        failed: count(PipelineRunStatus::Failed),
        skipped: count(PipelineRunStatus::Skipped),
        tasks_run,
        next_actions,
    }
}

/// Names of every step that appears in any registered pipeline.
pub fn referenced_steps(registry: &PipelineRegistry) -> HashSet<String> {
    registry
        .pipelines
        .values()
        .flatten()
        .filter(|s| !registry.contains(s))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::expand::TaskTemplate;
    use crate::error::ToolFailureDetails;
    use crate::process::CommandOutput;
    use crate::target::enumerate_samples;
    use std::cell::RefCell;
    use std::path::Path;

    #[derive(Default)]
    struct FakeRunner {
        calls: RefCell<Vec<String>>,
        fail_on: Option<String>,
    }

    impl CommandRunner for FakeRunner {
        fn run(&self, label: &str, command: &str, working_dir: Option<&Path>) -> Result<CommandOutput> {
            self.calls.borrow_mut().push(label.to_string());
            if self.fail_on.as_deref() == Some(label) {
                return Err(Error::tool_failed(ToolFailureDetails {
                    task: Some(label.to_string()),
                    command: command.to_string(),
                    working_dir: working_dir.map(|d| d.display().to_string()),
                    exit_code: 1,
                    stderr_tail: "fatal: broken".to_string(),
                }));
            }
            Ok(CommandOutput::default())
        }
    }

    struct FanOut {
        version: Option<String>,
        executed: RefCell<Vec<String>>,
    }

    impl FanOut {
        fn new() -> Self {
            Self {
                version: Some("1.7.2".to_string()),
                executed: RefCell::new(Vec::new()),
            }
        }
    }

    impl StepHandler for FanOut {
        fn supports(&self, step: &str) -> bool {
            matches!(step, "build" | "pack" | "noop")
        }

        fn resolve_version(&self) -> Result<String> {
            self.version
                .clone()
                .ok_or_else(|| Error::version_not_found("head.js", "version"))
        }

        fn execute_step(&self, step: &str, ctx: &mut RunContext) -> Result<Option<serde_json::Value>> {
            self.executed.borrow_mut().push(step.to_string());
            if step == "noop" {
                return Ok(None);
            }
            let targets = enumerate_samples(Path::new("/s"), &["A", "B"]);
            ctx.expand(&TaskTemplate::new(step, "tool {{target}}"), &targets);
            Ok(None)
        }
    }

    fn registry() -> PipelineRegistry {
        let mut registry = PipelineRegistry::new();
        registry
            .register("first", &["build", "noop"])
            .register("second", &["pack"])
            .register("default", &["first", "second"]);
        registry
    }

    #[test]
    fn flatten_recurses_in_declaration_order() {
        let handler = FanOut::new();
        let runner = FakeRunner::default();
        let registry = registry();
        let orchestrator = Orchestrator::new(&registry, &handler, &runner);
        assert_eq!(orchestrator.plan("default").unwrap(), vec!["build", "noop", "pack"]);
        assert_eq!(orchestrator.plan("pack").unwrap(), vec!["pack"]);
    }

    #[test]
    fn unknown_name_is_pipeline_not_found() {
        let handler = FanOut::new();
        let runner = FakeRunner::default();
        let registry = registry();
        let orchestrator = Orchestrator::new(&registry, &handler, &runner);
        let err = orchestrator.plan("publish").unwrap_err();
        assert_eq!(err.code.as_str(), "pipeline.not_found");
    }

    #[test]
    fn cycles_are_rejected() {
        let mut registry = PipelineRegistry::new();
        registry.register("a", &["b"]).register("b", &["a"]);
        let err = registry.flatten("a", &|_| true).unwrap_err();
        assert_eq!(err.code.as_str(), "validation.invalid_argument");
    }

    #[test]
    fn runs_all_tasks_in_order() {
        let handler = FanOut::new();
        let runner = FakeRunner::default();
        let registry = registry();
        let mut orchestrator = Orchestrator::new(&registry, &handler, &runner);
        let mut ctx = RunContext::new();

        let report = orchestrator.run("default", &mut ctx).unwrap();

        assert_eq!(report.status, PipelineRunStatus::Success);
        assert_eq!(report.state, RunState::Completed);
        assert_eq!(report.version.as_deref(), Some("1.7.2"));
        assert_eq!(
            *runner.calls.borrow(),
            vec!["build-0", "build-1", "pack-2", "pack-3"]
        );
        assert_eq!(report.summary.tasks_run, 4);
        assert_eq!(orchestrator.state(), &RunState::Completed);
    }

    #[test]
    fn failure_stops_before_later_steps() {
        let handler = FanOut::new();
        let runner = FakeRunner {
            fail_on: Some("build-0".to_string()),
            ..Default::default()
        };
        let registry = registry();
        let mut orchestrator = Orchestrator::new(&registry, &handler, &runner);
        let mut ctx = RunContext::new();

        let report = orchestrator.run("default", &mut ctx).unwrap();

        assert_eq!(
            report.state,
            RunState::Aborted {
                code: "process.tool_failed".to_string(),
                message: report.error.as_ref().unwrap().message.clone(),
            }
        );
        assert_eq!(*runner.calls.borrow(), vec!["build-0"]);
        assert_eq!(*handler.executed.borrow(), vec!["build"]);
        assert_eq!(report.steps[0].status, PipelineRunStatus::Failed);
        assert_eq!(report.steps[1].status, PipelineRunStatus::Skipped);
        assert_eq!(report.summary.skipped, 2);
        assert_eq!(ctx.pending(), 0);

        let err = report.into_result().unwrap_err();
        assert_eq!(err.details["stderrTail"], "fatal: broken");
    }

    #[test]
    fn missing_version_aborts_before_any_step() {
        let mut handler = FanOut::new();
        handler.version = None;
        let runner = FakeRunner::default();
        let registry = registry();
        let mut orchestrator = Orchestrator::new(&registry, &handler, &runner);

        let report = orchestrator.run("default", &mut RunContext::new()).unwrap();

        assert!(matches!(
            &report.state,
            RunState::Aborted { code, .. } if code == "version.not_found"
        ));
        assert!(handler.executed.borrow().is_empty());
        assert!(runner.calls.borrow().is_empty());
        assert_eq!(
            report.into_result().unwrap_err().code.as_str(),
            "version.not_found"
        );
    }

    #[test]
    fn dry_run_plans_without_executing() {
        let handler = FanOut::new();
        let runner = FakeRunner::default();
        let registry = registry();
        let mut orchestrator = Orchestrator::new(&registry, &handler, &runner);

        let report = orchestrator.run("first", &mut RunContext::dry_run()).unwrap();

        assert_eq!(report.status, PipelineRunStatus::Planned);
        assert!(runner.calls.borrow().is_empty());
        assert_eq!(report.steps[0].tasks.len(), 2);
        assert_eq!(report.steps[0].tasks[1].command, "tool B");
    }

    struct Broken;

    impl StepHandler for Broken {
        fn supports(&self, _: &str) -> bool {
            true
        }
        fn resolve_version(&self) -> Result<String> {
            Ok("1.0".to_string())
        }
        fn execute_step(&self, _: &str, ctx: &mut RunContext) -> Result<Option<serde_json::Value>> {
            ctx.expand_with(&TaskTemplate::new("x", "tool {{missing}}"), [BTreeMap::new()]);
            Ok(None)
        }
    }

    #[test]
    fn unresolved_placeholders_fail_the_task() {
        let runner = FakeRunner::default();
        let registry = PipelineRegistry::new();
        let mut orchestrator = Orchestrator::new(&registry, &Broken, &runner);
        let report = orchestrator.run("x", &mut RunContext::new()).unwrap();
        assert_eq!(report.status, PipelineRunStatus::Failed);
        assert!(runner.calls.borrow().is_empty());
    }

    #[test]
    fn dry_run_rejects_unresolved_placeholders() {
        let runner = FakeRunner::default();
        let registry = PipelineRegistry::new();
        let mut orchestrator = Orchestrator::new(&registry, &Broken, &runner);

        let report = orchestrator.run("x", &mut RunContext::dry_run()).unwrap();

        assert_eq!(report.status, PipelineRunStatus::Failed);
        assert_eq!(report.steps[0].tasks[0].status, PipelineRunStatus::Failed);
        assert_eq!(
            report.into_result().unwrap_err().code.as_str(),
            "validation.invalid_argument"
        );
    }

    #[test]
    fn referenced_steps_excludes_pipelines() {
        let steps = referenced_steps(&registry());
        assert!(steps.contains("build"));
        assert!(!steps.contains("first"));
    }
}
