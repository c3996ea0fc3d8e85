use std::path::PathBuf;

use blockfall_engine::{Difficulty, EngineConfig, PieceSeed};
use clap::{Parser, Subcommand};

use crate::util;

use self::{simulate::SimulateArg, watch::WatchArg};

mod simulate;
mod watch;

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct CommandArgs {
    /// What mode to run the program in
    #[command(subcommand)]
    mode: Option<Mode>,
}

#[derive(Debug, Clone, Subcommand)]
enum Mode {
    /// Let bots play headless games and print a JSON summary
    Simulate(#[clap(flatten)] SimulateArg),
    /// Print the board after every auto-drop tick for a few seconds
    Watch(#[clap(flatten)] WatchArg),
}

pub fn run() -> anyhow::Result<()> {
    let args = CommandArgs::parse();
    match args.mode.unwrap_or(Mode::Simulate(SimulateArg::default())) {
        Mode::Simulate(arg) => simulate::run(&arg)?,
        Mode::Watch(arg) => watch::run(&arg)?,
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::FromStr)]
pub(crate) enum DifficultyArg {
    Easy,
    Normal,
    Hard,
    Item,
    Versus,
}

impl From<DifficultyArg> for Difficulty {
    fn from(arg: DifficultyArg) -> Self {
        match arg {
            DifficultyArg::Easy => Difficulty::Easy,
            DifficultyArg::Normal => Difficulty::Normal,
            DifficultyArg::Hard => Difficulty::Hard,
            DifficultyArg::Item => Difficulty::Item,
            DifficultyArg::Versus => Difficulty::Versus,
        }
    }
}

/// Engine settings shared by every command.
#[derive(Default, Debug, Clone, clap::Args)]
pub(crate) struct EngineArg {
    /// Engine configuration JSON file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Game mode: easy, normal, hard, item or versus
    #[arg(long)]
    difficulty: Option<DifficultyArg>,
    /// Seed for piece generation and garbage holes
    #[arg(long)]
    seed: Option<u64>,
    /// Turn item pieces on or off regardless of the game mode
    #[arg(long)]
    items: Option<bool>,
}

impl EngineArg {
    /// Reads the configuration file, if any, and applies the command-line overrides.
    pub(crate) fn load_config(&self) -> anyhow::Result<EngineConfig> {
        let mut config = match &self.config {
            Some(path) => util::read_json_file::<EngineConfig, _>("engine config", path)?,
            None => EngineConfig::default(),
        };
        if let Some(difficulty) = self.difficulty {
            config.difficulty = difficulty.into();
        }
        if let Some(seed) = self.seed {
            config.seed = Some(PieceSeed::from_u64(seed));
        }
        if self.items.is_some() {
            config.item_mode = self.items;
        }
        config.validate()?;
        Ok(config)
    }
}
