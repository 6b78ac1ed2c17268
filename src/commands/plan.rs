use clap::Args;

use shipyard::engine::RunReport;
use shipyard::release::{self, DEFAULT_PIPELINE};

use super::{CmdResult, GlobalArgs};

#[derive(Args)]
pub struct PlanArgs {
    /// Pipeline or step to plan
    #[arg(default_value = DEFAULT_PIPELINE)]
    pub pipeline: String,
}

/// Resolve steps and the commands they would run. Nothing is executed or written.
pub fn run(args: PlanArgs, global: &GlobalArgs) -> CmdResult<RunReport> {
    let config = global.load_config()?;
    let report = release::plan(&global.root, config, &args.pipeline)?;
    Ok((report, 0))
}
