use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use depscope::cli::commands;
use depscope::cli::{Cli, Commands};
use depscope::logging;

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.log_json);

    let project_path = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

    match cli.command {
        Commands::Resolve { ref entrypoints } => {
            let (output, has_problems) =
                commands::run_resolve(&project_path, entrypoints, &cli.session, &cli.format)?;
            println!("{}", output);
            if has_problems {
                std::process::exit(1);
            }
        }

        Commands::Collect { ref root } => {
            let (output, has_errors) =
                commands::run_collect(&project_path, root, &cli.session, &cli.format)?;
            println!("{}", output);
            if has_errors {
                std::process::exit(1);
            }
        }

        Commands::Workspace { ref path } => {
            let output = commands::run_workspace(&project_path, path, &cli.format)?;
            println!("{}", output);
        }
    }

    Ok(())
}
