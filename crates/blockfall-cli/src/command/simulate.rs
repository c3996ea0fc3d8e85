use std::{
    path::PathBuf,
    sync::{Arc, Mutex, PoisonError},
};

use blockfall_engine::{
    Difficulty, EngineConfig, GameEngine, NoopListener, PieceSeed,
    versus::{self, AttackQueue, AttackSender},
};
use serde::Serialize;

use crate::{bot, command::EngineArg, util::Output};

const DEFAULT_PIECES: usize = 500;
const PROGRESS_EVERY: usize = 100;

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, derive_more::FromStr)]
pub(crate) enum MatchMode {
    #[default]
    Single,
    Versus,
}

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct SimulateArg {
    #[command(flatten)]
    engine: EngineArg,
    /// Play alone, or a local versus match between two bots
    #[arg(long, default_value = "single")]
    mode: MatchMode,
    /// Pieces each player may drop before the game is stopped
    #[arg(long, default_value_t = DEFAULT_PIECES)]
    pieces: usize,
    /// Output JSON file path (default: stdout)
    #[arg(long)]
    output: Option<PathBuf>,
}

impl Default for SimulateArg {
    fn default() -> Self {
        Self {
            engine: EngineArg::default(),
            mode: MatchMode::default(),
            pieces: DEFAULT_PIECES,
            output: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct SimulationSummary {
    difficulty: Difficulty,
    seed: Option<PieceSeed>,
    turns: usize,
    players: Vec<PlayerSummary>,
}

#[derive(Debug, Serialize)]
struct PlayerSummary {
    score: u64,
    lines: usize,
    pieces: usize,
    line_clears: [usize; 5],
    attack_sent: usize,
    attack_delivered: usize,
    attack_received: usize,
    game_over: bool,
}

type Outgoing = Arc<Mutex<AttackSender<Arc<AttackQueue>>>>;

struct Player {
    engine: GameEngine,
    outgoing: Option<Outgoing>,
    incoming: Option<Arc<AttackQueue>>,
}

impl Player {
    fn single(config: &EngineConfig) -> anyhow::Result<Self> {
        Ok(Self {
            engine: GameEngine::with_config(config, NoopListener)?,
            outgoing: None,
            incoming: None,
        })
    }

    fn linked(config: &EngineConfig, link: versus::VersusLink) -> anyhow::Result<Self> {
        let outgoing = Arc::new(Mutex::new(link.outgoing));
        let mut engine = GameEngine::with_config(config, Arc::clone(&outgoing))?;
        engine.set_attack_source(Arc::clone(&link.incoming));
        Ok(Self {
            engine,
            outgoing: Some(outgoing),
            incoming: Some(link.incoming),
        })
    }

    fn summary(&self) -> PlayerSummary {
        let stats = self.engine.stats();
        let (attack_sent, attack_delivered) = self.outgoing.as_ref().map_or((0, 0), |outgoing| {
            let sender = outgoing.lock().unwrap_or_else(PoisonError::into_inner);
            (sender.sent_lines(), sender.delivered_lines())
        });
        PlayerSummary {
            score: stats.score(),
            lines: stats.total_cleared_lines(),
            pieces: stats.locked_pieces(),
            line_clears: *stats.line_cleared_counter(),
            attack_sent,
            attack_delivered,
            attack_received: self.incoming.as_ref().map_or(0, |q| q.accepted_lines()),
            game_over: self.engine.is_game_over(),
        }
    }
}

pub(crate) fn run(arg: &SimulateArg) -> anyhow::Result<()> {
    let SimulateArg {
        engine,
        mode,
        pieces,
        output,
    } = arg;

    let config = engine.load_config()?;
    let mut players = match mode {
        MatchMode::Single => vec![Player::single(&config)?],
        MatchMode::Versus => {
            let (first, second) = versus::local_pair(config.width, config.seed);
            vec![
                Player::linked(&config, first)?,
                Player::linked(&config, second)?,
            ]
        }
    };
    eprintln!(
        "Simulating {} player(s) on {} for up to {pieces} pieces...",
        players.len(),
        config.difficulty
    );

    for player in &mut players {
        player.engine.start_new_game();
    }

    let mut turns = 0;
    while turns < *pieces && players.iter().all(|p| !p.engine.is_game_over()) {
        for player in &mut players {
            bot::play_turn(&mut player.engine);
        }
        turns += 1;
        if turns % PROGRESS_EVERY == 0 {
            let scores: Vec<_> = players.iter().map(|p| p.engine.score()).collect();
            eprintln!("  turn {turns}: scores {scores:?}");
        }
    }
    eprintln!("Simulation finished after {turns} turns");

    let summary = SimulationSummary {
        difficulty: config.difficulty,
        seed: config.seed,
        turns,
        players: players.iter().map(Player::summary).collect(),
    };
    Output::save_json(&summary, output.clone())?;
    Ok(())
}
