use clap::Args;

use shipyard::engine::RunReport;
use shipyard::process::ShellRunner;
use shipyard::release::{self, DEFAULT_PIPELINE};

use super::{CmdResult, GlobalArgs};

#[derive(Args)]
pub struct RunArgs {
    /// Pipeline or step to run (release-build, package-release, default)
    #[arg(default_value = DEFAULT_PIPELINE)]
    pub pipeline: String,

    /// Capture tool output without streaming it to stderr
    #[arg(long)]
    pub quiet: bool,
}

pub fn run(args: RunArgs, global: &GlobalArgs) -> CmdResult<RunReport> {
    let config = global.load_config()?;
    let runner = ShellRunner { quiet: args.quiet };
    let report = release::run(&global.root, config, &args.pipeline, &runner)?;
    Ok((report, 0))
}
