/// Points for clearing 1 to 4 lines at once. Index 0 is unused.
const SCORE_TABLE: [u64; 5] = [0, 100, 250, 500, 1000];

/// Bonus for every line beyond the fourth in a single clear.
const EXTRA_LINE_SCORE: u64 = 250;

/// Points per row a piece is moved down by a soft drop.
pub const SOFT_DROP_SCORE_PER_ROW: u64 = 1;

/// Points per row a piece falls during a hard drop.
pub const HARD_DROP_SCORE_PER_ROW: u64 = 2;

/// Returns the points awarded for clearing `lines` rows at once.
///
/// # Example
///
/// ```
/// use blockfall_engine::line_clear_score;
///
/// assert_eq!(line_clear_score(4), 1000);
/// assert_eq!(line_clear_score(6), 1500);
/// ```
#[must_use]
pub fn line_clear_score(lines: usize) -> u64 {
    match SCORE_TABLE.get(lines) {
        Some(&score) => score,
        None => SCORE_TABLE[4] + (lines as u64 - 4) * EXTRA_LINE_SCORE,
    }
}

/// Score and counters of one game.
///
/// - **Score**: line clears plus drop bonuses
/// - **Total cleared lines**: drives the speed-up and item milestones
/// - **Pieces**: how many spawned and how many locked
/// - **Line clear distribution**: singles, doubles, triples and quads (or more)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GameStats {
    score: u64,
    total_cleared_lines: usize,
    spawned_pieces: usize,
    locked_pieces: usize,
    line_cleared_counter: [usize; 5],
}

impl GameStats {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            score: 0,
            total_cleared_lines: 0,
            spawned_pieces: 0,
            locked_pieces: 0,
            line_cleared_counter: [0; 5],
        }
    }

    /// Accumulated score.
    #[must_use]
    pub const fn score(&self) -> u64 {
        self.score
    }

    /// Lines cleared so far.
    #[must_use]
    pub const fn total_cleared_lines(&self) -> usize {
        self.total_cleared_lines
    }

    /// Pieces that entered the board.
    #[must_use]
    pub const fn spawned_pieces(&self) -> usize {
        self.spawned_pieces
    }

    /// Pieces locked into the board.
    #[must_use]
    pub const fn locked_pieces(&self) -> usize {
        self.locked_pieces
    }

    /// Histogram of clears by size.
    ///
    /// `[0]` counts locks that cleared nothing; `[4]` counts clears of four lines or more.
    #[must_use]
    pub const fn line_cleared_counter(&self) -> &[usize; 5] {
        &self.line_cleared_counter
    }

    pub(crate) fn record_spawn(&mut self) {
        self.spawned_pieces += 1;
    }

    pub(crate) fn record_lock(&mut self) {
        self.locked_pieces += 1;
    }

    /// Records a clear of `lines` rows and returns the points it earned.
    pub(crate) fn record_line_clear(&mut self, lines: usize) -> u64 {
        self.line_cleared_counter[lines.min(4)] += 1;
        self.total_cleared_lines += lines;
        let points = line_clear_score(lines);
        self.score += points;
        points
    }

    pub(crate) fn add_score(&mut self, points: u64) {
        self.score += points;
    }
}
