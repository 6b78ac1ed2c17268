//! Generic pipeline execution infrastructure.
//!
//! - `expand` - Task templates, per-target instances and the run-scoped queue
//! - `pipeline` - Named pipelines, flattening, sequential fail-fast execution
//!
//! Release-specific steps live in `release` and plug in through `StepHandler`.

pub mod expand;
pub mod pipeline;

pub use expand::{RunContext, TaskInstance, TaskTemplate};
pub use pipeline::{
    Orchestrator, PipelineRegistry, PipelineRunStatus, RunReport, RunState, RunSummary,
    StepHandler, StepResult, TaskResult,
};
