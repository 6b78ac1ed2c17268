use clap::Args;

use shipyard::utils::parser;
use shipyard::version::{self, VersionInfo};

use super::{CmdResult, GlobalArgs};

#[derive(Args)]
pub struct VersionArgs {}

pub fn run(_args: VersionArgs, global: &GlobalArgs) -> CmdResult<VersionInfo> {
    let config = global.load_config()?;
    let path = parser::resolve_path(&global.root, &config.version_file);
    let info = version::resolve_version(&path, &config.version_pattern)?;
    Ok((info, 0))
}
