//! Gameplay state machine and the pieces around it.
//!
//! - [`GameEngine`] - spawn, move, rotate, lock, item effects, line clears and scoring
//! - [`PieceGenerator`] - roulette-wheel piece generation with item milestones
//! - [`PieceSeed`] - seed for deterministic piece generation
//! - [`GameStats`] / [`SpeedModel`] - score, counters and auto-drop cadence
//! - [`DropScheduler`] - background timer producing auto-drop ticks
//! - [`GameStateListener`] / [`CompositeListener`] - gameplay events
//! - [`EngineConfig`] - serializable engine settings
//!
//! # Game Flow
//!
//! 1. Create a [`GameEngine`] with a board (or an [`EngineConfig`]) and a listener
//! 2. [`GameEngine::start_new_game`] spawns the first piece
//! 3. Input moves and rotates the falling piece; auto-drop ticks move it down
//! 4. A piece that cannot fall further locks: item effect, line clear, scoring
//! 5. The next piece spawns, after any pending garbage is pushed in
//! 6. Repeat until a piece cannot spawn
//!
//! # Example
//!
//! ```
//! use blockfall_engine::{Difficulty, EngineConfig, GameEngine, NoopListener, PieceSeed};
//!
//! let config = EngineConfig {
//!     seed: Some(PieceSeed::from_u64(1)),
//!     ..EngineConfig::with_difficulty(Difficulty::Hard)
//! };
//! let mut engine = GameEngine::with_config(&config, NoopListener)?;
//! engine.start_new_game();
//!
//! while !engine.is_game_over() {
//!     engine.hard_drop();
//! }
//! assert!(engine.current().is_none());
//! assert!(engine.stats().locked_pieces() > 0);
//! # Ok::<(), blockfall_engine::ConfigError>(())
//! ```

pub use self::{
    config::*, difficulty::*, game_engine::*, game_stats::*, listener::*, piece_generator::*,
    scheduler::*, speed::*,
};

mod config;
mod difficulty;
mod game_engine;
mod game_stats;
mod listener;
mod piece_generator;
mod scheduler;
mod speed;
