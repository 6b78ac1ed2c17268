use clap::{Parser, Subcommand};
use std::path::PathBuf;

use commands::GlobalArgs;

mod commands;
mod output;
mod tty;

use commands::{files, plan, run, version};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "shipyard")]
#[command(version = VERSION)]
#[command(about = "Release build and packaging pipeline")]
struct Cli {
    /// Root of the source tree
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    /// Config file (default: <root>/shipyard.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a pipeline end to end
    Run(run::RunArgs),
    /// Show the steps and commands a pipeline would run
    Plan(plan::PlanArgs),
    /// List resolved file-set entries without copying or compressing
    Files(files::FilesArgs),
    /// Resolve the release version
    Version(version::VersionArgs),
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let global = GlobalArgs {
        root: cli.root,
        config: cli.config,
    };

    let (json_result, exit_code) = commands::run_json(cli.command, &global);
    let _ = output::print_json_result(json_result);

    std::process::ExitCode::from(exit_code_to_u8(exit_code))
}

fn exit_code_to_u8(code: i32) -> u8 {
    if code <= 0 {
        0
    } else if code >= 255 {
        255
    } else {
        code as u8
    }
}
