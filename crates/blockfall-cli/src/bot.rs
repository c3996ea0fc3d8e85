//! Greedy placement bot for the headless commands.
//!
//! Every reachable rotation and column of the falling piece is tried on a copy
//! of the board; the placement whose resulting board scores best is played.
//! The score is a weighted sum of board features:
//!
//! ```text
//! score = -0.51·aggregate_height + 0.76·cleared_lines - 0.36·holes - 0.18·bumpiness
//! ```

use blockfall_engine::{Board, GameEngine, Tetromino};

const AGGREGATE_HEIGHT_WEIGHT: f32 = -0.51;
const CLEARED_LINES_WEIGHT: f32 = 0.76;
const HOLES_WEIGHT: f32 = -0.36;
const BUMPINESS_WEIGHT: f32 = -0.18;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Placement {
    pub(crate) rotation: u8,
    pub(crate) x: i32,
    pub(crate) score: f32,
}

/// Features of the board left behind by a placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PlacementAnalysis {
    cleared_lines: usize,
    aggregate_height: usize,
    holes: usize,
    bumpiness: usize,
}

impl PlacementAnalysis {
    fn from_board(before_placement: &Board, piece: &Tetromino, x: i32, y: i32) -> Self {
        let mut board = before_placement.clone();
        board.place_piece(piece.shape(), x, y, piece.id());
        let cleared_lines = board.clear_full_lines();

        let heights = column_heights(&board);
        Self {
            cleared_lines,
            aggregate_height: heights.iter().sum(),
            holes: count_holes(&board),
            bumpiness: heights.windows(2).map(|w| w[0].abs_diff(w[1])).sum(),
        }
    }

    #[expect(clippy::cast_precision_loss)]
    fn score(&self) -> f32 {
        AGGREGATE_HEIGHT_WEIGHT * self.aggregate_height as f32
            + CLEARED_LINES_WEIGHT * self.cleared_lines as f32
            + HOLES_WEIGHT * self.holes as f32
            + BUMPINESS_WEIGHT * self.bumpiness as f32
    }
}

fn to_i32(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

fn column_heights(board: &Board) -> Vec<usize> {
    let height = board.height();
    (0..to_i32(board.width()))
        .map(|x| {
            (0..to_i32(height))
                .find(|&y| board.is_occupied(x, y))
                .and_then(|y| usize::try_from(y).ok())
                .map_or(0, |top| height - top)
        })
        .collect()
}

fn count_holes(board: &Board) -> usize {
    (0..to_i32(board.width()))
        .map(|x| {
            (0..to_i32(board.height()))
                .skip_while(|&y| !board.is_occupied(x, y))
                .filter(|&y| !board.is_occupied(x, y))
                .count()
        })
        .sum()
}

/// Row where `piece` comes to rest when dropped straight down from the top at column `x`.
fn landing_row(board: &Board, piece: &Tetromino, x: i32) -> Option<i32> {
    if !board.fits(piece.shape(), x, 0) {
        return None;
    }
    let mut y = 0;
    while board.fits(piece.shape(), x, y + 1) {
        y += 1;
    }
    Some(y)
}

/// Finds the best rotation and column for `piece`, counting rotations from its current one.
pub(crate) fn best_placement(board: &Board, piece: &Tetromino) -> Option<Placement> {
    let rotations = if piece.can_rotate() { 4 } else { 1 };
    let mut best: Option<Placement> = None;
    let mut rotated = *piece;
    for rotation in 0..rotations {
        for x in -3..to_i32(board.width()) {
            let Some(y) = landing_row(board, &rotated, x) else {
                continue;
            };
            let score = PlacementAnalysis::from_board(board, &rotated, x, y).score();
            if best.is_none_or(|b| score > b.score) {
                best = Some(Placement { rotation, x, score });
            }
        }
        rotated = rotated.rotate_clockwise();
    }
    best
}

/// Rotates and shifts the falling piece toward the best placement without dropping it.
///
/// Returns `false` when there is no piece to steer.
pub(crate) fn steer(engine: &mut GameEngine) -> bool {
    let Some(piece) = engine.current().copied() else {
        return false;
    };
    let Some(target) = best_placement(engine.board(), &piece) else {
        return true;
    };
    for _ in 0..target.rotation {
        if engine.rotate_cw().is_err() {
            break;
        }
    }
    while engine.piece_x() != target.x {
        let moved = if engine.piece_x() < target.x {
            engine.move_right()
        } else {
            engine.move_left()
        };
        if moved.is_err() {
            break;
        }
    }
    true
}

/// Steers the falling piece and hard-drops it. Returns `false` when there is no piece.
pub(crate) fn play_turn(engine: &mut GameEngine) -> bool {
    if !steer(engine) {
        return false;
    }
    engine.hard_drop();
    true
}
