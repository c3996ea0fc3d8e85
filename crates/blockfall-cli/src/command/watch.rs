use std::{
    fmt::Write as _,
    time::{Duration, Instant},
};

use anyhow::Context as _;
use blockfall_engine::{
    ClearCause, CompositeListener, GameEngine, GameStateListener, PieceKind, core::cell,
};

use crate::{bot, command::EngineArg, util::Output};

#[derive(Default, Debug, Clone, clap::Args)]
pub(crate) struct WatchArg {
    #[command(flatten)]
    engine: EngineArg,
    /// How long to watch, in seconds
    #[arg(long, default_value_t = 5.0)]
    seconds: f64,
    /// Auto-drop interval in seconds, replacing the speed model's value
    #[arg(long)]
    interval: Option<f64>,
    /// Leave pieces where they spawn instead of steering them with the bot
    #[arg(long)]
    idle: bool,
}

/// Reports line clears and the end of the game on stderr.
#[derive(Debug, Default)]
struct EventLog;

impl GameStateListener for EventLog {
    fn on_lines_cleared(&mut self, count: usize, cause: ClearCause) {
        let cause = match cause {
            ClearCause::Placement => "placement",
            ClearCause::GravityOrSplit => "gravity/split",
        };
        eprintln!("Cleared {count} line(s) by {cause}");
    }

    fn on_game_over(&mut self) {
        eprintln!("Game over");
    }
}

fn cell_char(code: i32) -> char {
    if code == cell::EMPTY {
        return '.';
    }
    if cell::item_of(code).is_some() {
        return '*';
    }
    PieceKind::from_id(cell::piece_id(code)).map_or('#', PieceKind::as_char)
}

/// Renders the board with the falling piece drawn on top.
fn render(engine: &GameEngine) -> String {
    let mut cells: Vec<Vec<char>> = engine
        .board()
        .rows()
        .map(|row| row.iter().copied().map(cell_char).collect())
        .collect();
    if let Some(piece) = engine.current() {
        for (row, col) in piece.block_positions() {
            let x = usize::try_from(engine.piece_x()).ok().map(|x| x + col);
            let y = usize::try_from(engine.piece_y()).ok().map(|y| y + row);
            if let Some(cell) = y
                .zip(x)
                .and_then(|(y, x)| cells.get_mut(y).and_then(|r| r.get_mut(x)))
            {
                *cell = piece.kind().as_char().to_ascii_lowercase();
            }
        }
    }

    let next = engine.next().map_or('-', |p| p.kind().as_char());
    let mut frame = format!(
        "score {} lines {} next {next}\n",
        engine.score(),
        engine.total_lines_cleared()
    );
    for row in cells {
        let _ = writeln!(frame, "|{}|", row.into_iter().collect::<String>());
    }
    frame.push('\n');
    frame
}

pub(crate) fn run(arg: &WatchArg) -> anyhow::Result<()> {
    let config = arg.engine.load_config()?;
    let duration = Duration::try_from_secs_f64(arg.seconds)
        .with_context(|| format!("Invalid watch duration: {}", arg.seconds))?;

    let listener = CompositeListener::new().with(EventLog);
    let mut engine = GameEngine::with_config(&config, listener)?;
    engine.start_new_game();
    if let Some(interval) = arg.interval {
        engine.set_drop_interval_seconds(interval)?;
    }
    eprintln!(
        "Watching {} for {:.1}s (drop interval {:?})",
        config.difficulty,
        duration.as_secs_f64(),
        engine.drop_interval()
    );

    let mut output = Output::stdout();
    output.write_frame(&render(&engine))?;

    let mut steered = 0;
    let deadline = Instant::now() + duration;
    engine.start_auto_drop();
    while !engine.is_game_over() {
        if !arg.idle && engine.stats().spawned_pieces() != steered {
            steered = engine.stats().spawned_pieces();
            bot::steer(&mut engine);
        }
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        if engine.wait_auto_drop(deadline - now) {
            output.write_frame(&render(&engine))?;
        }
    }
    engine.shutdown();

    eprintln!(
        "Stopped with score {} after {} pieces",
        engine.score(),
        engine.stats().locked_pieces()
    );
    Ok(())
}
