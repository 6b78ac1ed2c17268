//! Release steps for the build-and-package pipelines.
//!
//! - `build` - Compiler and dependency-manager fan-out over build targets
//! - `staging` - Staging tree copy groups and archive file sets
//! - `executor` - `StepHandler` implementation dispatching each step
//! - `pipeline` - Registered pipelines and the run/plan/list entry points

pub mod build;
mod executor;
mod pipeline;
pub mod staging;
mod types;

pub use executor::ReleaseSteps;
pub use pipeline::{default_registry, list_files, plan, run, validate_registry, FileListing};
pub use types::{
    ArchiveOutput, CleanOutput, FanOutOutput, ReleaseStep, StageOutput, DEFAULT_PIPELINE,
    PACKAGE_RELEASE, RELEASE_BUILD, STAGED_SAMPLES_DIR,
};
