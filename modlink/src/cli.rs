// modlink/src/cli.rs
//! Defines the command-line argument structure using clap.
use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};
use modlink_common::config::DEFAULT_CONFIG_FILENAME;
use modlink_common::error::Result;
use modlink_common::ImageConfig;

pub mod build;
pub mod describe;
pub mod status;
pub mod suggest;

use crate::cli::build::BuildArgs;
use crate::cli::describe::Describe;
use crate::cli::suggest::SuggestArgs;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, name = "modlink", bin_name = "modlink")]
#[command(propagate_version = true)]
pub struct CliArgs {
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Image configuration file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILENAME)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve, merge and link the runtime image, then write its launchers
    Build(BuildArgs),
    /// Print the merged module or an exclusion template without linking
    Suggest(SuggestArgs),
    /// Print the descriptor resolved for every module path entry as JSON
    Describe(Describe),
}

impl Command {
    pub async fn run(&self, config: &ImageConfig) -> Result<()> {
        match self {
            Self::Build(command) => command.run(config).await,
            Self::Suggest(command) => command.run(config).await,
            Self::Describe(command) => command.run(config).await,
        }
    }
}
