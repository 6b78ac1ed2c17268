use clap::Args;

use shipyard::release::{self, FileListing};

use super::{CmdResult, GlobalArgs};

#[derive(Args)]
pub struct FilesArgs {
    /// List an archive's entries (resolved against the staging directory)
    #[arg(long, value_name = "ID")]
    pub archive: Option<String>,
}

pub fn run(args: FilesArgs, global: &GlobalArgs) -> CmdResult<FileListing> {
    let config = global.load_config()?;
    let listing = release::list_files(&global.root, &config, args.archive.as_deref())?;
    Ok((listing, 0))
}
