use std::path::PathBuf;

use shipyard::config::{self, ReleaseConfig};

pub type CmdResult<T> = shipyard::Result<(T, i32)>;

pub(crate) struct GlobalArgs {
    pub root: PathBuf,
    pub config: Option<PathBuf>,
}

impl GlobalArgs {
    pub fn load_config(&self) -> shipyard::Result<ReleaseConfig> {
        config::load(&self.root, self.config.as_deref())
    }
}

pub mod files;
pub mod plan;
pub mod run;
pub mod version;

/// Dispatch a command to its handler and map result to JSON.
macro_rules! dispatch {
    ($args:expr, $global:expr, $module:ident) => {
        crate::output::map_cmd_result_to_json($module::run($args, $global))
    };
}

pub(crate) fn run_json(
    command: crate::Commands,
    global: &GlobalArgs,
) -> (shipyard::Result<serde_json::Value>, i32) {
    crate::tty::status("shipyard is working...");

    match command {
        crate::Commands::Run(args) => dispatch!(args, global, run),
        crate::Commands::Plan(args) => dispatch!(args, global, plan),
        crate::Commands::Files(args) => dispatch!(args, global, files),
        crate::Commands::Version(args) => dispatch!(args, global, version),
    }
}
