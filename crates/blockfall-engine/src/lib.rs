//! Falling-block puzzle engine with item pieces and versus garbage exchange.
//!
//! - [`core`] - the playfield ([`Board`]), cell codes and pieces ([`Tetromino`])
//! - [`engine`] - the [`GameEngine`] state machine, piece generation, scoring,
//!   the auto-drop scheduler and the listener interface
//! - [`versus`] - attack patterns and the capped attack queue shared between players

pub use self::{core::*, engine::*};

pub mod core;
pub mod engine;
pub mod versus;

/// Invalid construction or configuration argument.
#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error)]
pub enum ConfigError {
    #[display("board dimensions must be positive, got {width}x{height}")]
    InvalidBoardSize { width: usize, height: usize },
    #[display("drop interval must be a positive number of seconds, got {seconds}")]
    InvalidDropInterval { seconds: f64 },
}

/// Why a move or rotation of the falling piece was refused.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, derive_more::Display, derive_more::Error, derive_more::IsVariant,
)]
pub enum MoveError {
    #[display("no piece is falling")]
    Inactive,
    #[display("piece collision")]
    Blocked,
    #[display("piece cannot rotate")]
    NotRotatable,
}
