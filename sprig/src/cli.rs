// sprig/src/cli.rs
//! Defines the command-line argument structure using clap.
use std::sync::Arc;

use clap::{ArgAction, Parser, Subcommand};
use sprig_common::error::Result;
use sprig_common::{Cache, Config};

pub mod info;
pub mod install;
pub mod list;
pub mod status;
pub mod uninstall;

use crate::cli::info::Info;
use crate::cli::install::InstallArgs;
use crate::cli::list::List;
use crate::cli::test::TestArgs;
use crate::cli::uninstall::Uninstall;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, name = "sprig", bin_name = "sprig")]
#[command(propagate_version = true)]
pub struct CliArgs {
    /// More output; repeat for debug (-vv) and trace (-vvv) logging
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch, verify and install recipes
    Install(InstallArgs),
    /// Re-run the acceptance checks of an installed recipe
    Test(TestArgs),
    /// Remove the files a recipe installed
    Uninstall(Uninstall),
    /// List installed recipes
    List(List),
    /// Show recipe metadata
    Info(Info),
}

impl Command {
    pub async fn run(&self, config: &Config, cache: Arc<Cache>) -> Result<()> {
        match self {
            Self::Install(command) => command.run(config, cache).await,
            Self::Test(command) => command.run(config).await,
            Self::Uninstall(command) => command.run(config).await,
            Self::List(command) => command.run(config).await,
            Self::Info(command) => command.run(config).await,
        }
    }
}
