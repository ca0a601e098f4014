//! Command-line frontend for the Kulisse script engine.

mod commands;
mod terminal;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "kulisse",
    about = "Kulisse, a visual-novel script engine",
    version,
    propagate_version = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a script, printing its text to the terminal
    Run {
        /// Script file
        script: PathBuf,

        /// Replay events from a JSON trace instead of reading stdin
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Directory for save slots (default: keep saves in memory)
        #[arg(long)]
        saves: Option<PathBuf>,

        /// Asset directory (default: the script's directory)
        #[arg(long)]
        archive: Option<PathBuf>,

        /// RNG seed for `rnd` and `rnd2`
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Milliseconds per character of text animation
        #[arg(long, default_value = "0")]
        text_speed: u32,

        /// Automode delay in milliseconds
        #[arg(long, default_value = "1000")]
        auto_delay: u32,

        /// Stop skipping at text that has never been read
        #[arg(long)]
        kidoku: bool,
    },

    /// Validate a script without running it
    Check {
        /// Script file
        script: PathBuf,
    },

    /// List the labels of a script
    Labels {
        /// Script file
        script: PathBuf,
    },

    /// List occupied save slots
    Slots {
        /// Directory holding the save slots
        #[arg(long, default_value = ".")]
        saves: PathBuf,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            script,
            input,
            saves,
            archive,
            seed,
            text_speed,
            auto_delay,
            kidoku,
        } => commands::run::run(commands::run::RunOptions {
            script,
            input,
            saves,
            archive,
            seed,
            text_speed,
            auto_delay,
            kidoku,
        }),
        Commands::Check { script } => commands::check::run(&script),
        Commands::Labels { script } => commands::labels::run(&script),
        Commands::Slots { saves } => commands::slots::run(&saves),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        process::exit(1);
    }
}
