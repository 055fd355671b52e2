//! ptable - Flash partition table planner
//!
//! Plans where application images live in a fixed-size flash address
//! space, writes the byte-exact on-device table (with its MD5
//! trailer) into flash image files, and parses existing tables back
//! out for inspection or incremental re-planning.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    let result = match cli.command {
        Commands::Plan { args } => commands::plan::cmd_plan(&args),
        Commands::Gen {
            args,
            output,
            offset,
        } => commands::plan::cmd_gen(&args, &output, offset),
        Commands::Show { input, offset } => commands::show::cmd_show(&input, offset),
        Commands::Verify { input, offset } => commands::show::cmd_verify(&input, offset),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
