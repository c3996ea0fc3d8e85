use std::{
    fmt,
    sync::{
        Arc,
        mpsc::{self, Receiver},
    },
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::{
    ConfigError, MoveError,
    core::{Board, ItemType, PieceKind, Tetromino, cell::OUT_OF_BOUNDS},
    versus::AttackQueue,
};

use super::{
    config::{EngineConfig, WeightMode, drop_interval_from_seconds},
    difficulty::Difficulty,
    game_stats::{GameStats, HARD_DROP_SCORE_PER_ROW, SOFT_DROP_SCORE_PER_ROW, line_clear_score},
    listener::{ClearCause, GameStateListener},
    piece_generator::PieceGenerator,
    scheduler::DropScheduler,
    speed::{DEFAULT_BASE_INTERVAL, SpeedModel},
};

/// Offsets tried, in order, when a rotation does not fit in place.
const ROTATION_KICKS: [(i32, i32); 6] = [(0, 0), (-1, 0), (1, 0), (-2, 0), (2, 0), (0, -1)];

/// Scheduler ticks that may wait for the engine thread; further ticks are dropped.
const TICK_BACKLOG: usize = 8;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, derive_more::IsVariant)]
pub enum SessionState {
    /// Created, no game started yet.
    #[default]
    Ready,
    Playing,
    Paused,
    GameOver,
}

/// Serializable view of an engine, for renderers and remote spectators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardSnapshot {
    pub rows: Vec<Vec<i32>>,
    pub current: Option<PieceKind>,
    pub rotation: u8,
    pub piece_x: i32,
    pub piece_y: i32,
    pub ghost_y: i32,
    pub next: Option<PieceKind>,
    pub score: u64,
    pub total_lines_cleared: usize,
    pub game_over: bool,
}

/// Single-player game state machine.
///
/// A piece spawns at the top center, falls (by input or by the auto-drop
/// scheduler), locks, triggers its item effect when item mode is on, clears full
/// lines and scores them, and the next piece spawns. A piece that cannot spawn
/// ends the game: from then on every mutating call is a no-op.
///
/// The engine does no internal locking. Callers drive it from one thread at a
/// time; the scheduler thread only queues ticks, which
/// [`run_pending_auto_drops`](Self::run_pending_auto_drops) or
/// [`wait_auto_drop`](Self::wait_auto_drop) execute on the caller's thread.
///
/// # Example
///
/// ```
/// use blockfall_engine::{Board, GameEngine, NoopListener};
///
/// let mut engine = GameEngine::new(Board::standard(), NoopListener);
/// engine.start_new_game();
/// assert_eq!(engine.piece_y(), 0);
///
/// let ghost = engine.ghost_y();
/// engine.hard_drop();
/// assert_eq!(engine.score(), 2 * u64::try_from(ghost).unwrap());
/// assert_eq!(engine.stats().locked_pieces(), 1);
/// ```
pub struct GameEngine {
    board: Board,
    listener: Box<dyn GameStateListener>,
    difficulty: Difficulty,
    item_mode_enabled: bool,
    weight_mode: WeightMode,
    base_interval: Duration,
    generator: PieceGenerator,
    current: Option<Tetromino>,
    next: Option<Tetromino>,
    px: i32,
    py: i32,
    stats: GameStats,
    speed: SpeedModel,
    state: SessionState,
    last_locked_cells: Vec<(i32, i32)>,
    last_clear_by_gravity_or_split: bool,
    last_clear_had_items: bool,
    incoming: Option<Arc<AttackQueue>>,
    scheduler: Arc<DropScheduler>,
    ticks: Receiver<()>,
}

impl fmt::Debug for GameEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GameEngine")
            .field("difficulty", &self.difficulty)
            .field("state", &self.state)
            .field("current", &self.current.map(|p| p.kind()))
            .field("px", &self.px)
            .field("py", &self.py)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl GameEngine {
    /// Creates an engine on `board` with NORMAL difficulty.
    pub fn new(board: Board, listener: impl GameStateListener + 'static) -> Self {
        Self::with_difficulty(board, listener, Difficulty::default())
    }

    /// Creates an engine on `board` for the given game mode.
    pub fn with_difficulty(
        board: Board,
        listener: impl GameStateListener + 'static,
        difficulty: Difficulty,
    ) -> Self {
        let config = EngineConfig::with_difficulty(difficulty);
        let generator = PieceGenerator::new(difficulty);
        Self::build(
            board,
            Box::new(listener),
            &config,
            DEFAULT_BASE_INTERVAL,
            generator,
        )
    }

    /// Creates an engine from a validated configuration.
    pub fn with_config(
        config: &EngineConfig,
        listener: impl GameStateListener + 'static,
    ) -> Result<Self, ConfigError> {
        let board = Board::new(config.width, config.height)?;
        let base_interval = config.base_interval()?;
        let generator = match config.seed {
            Some(seed) => PieceGenerator::with_seed(config.difficulty, seed),
            None => PieceGenerator::new(config.difficulty),
        };
        Ok(Self::build(
            board,
            Box::new(listener),
            config,
            base_interval,
            generator,
        ))
    }

    fn build(
        board: Board,
        listener: Box<dyn GameStateListener>,
        config: &EngineConfig,
        base_interval: Duration,
        generator: PieceGenerator,
    ) -> Self {
        let speed = SpeedModel::new(config.difficulty.speed_multiplier(), base_interval);
        let (tick_tx, ticks) = mpsc::sync_channel(TICK_BACKLOG);
        let scheduler = DropScheduler::spawn(speed.interval(), move || {
            // A full backlog means the engine is behind; dropping the tick is fine.
            let _ = tick_tx.try_send(());
        });
        Self {
            board,
            listener,
            difficulty: config.difficulty,
            item_mode_enabled: config.item_mode_enabled(),
            weight_mode: config.weight_mode,
            base_interval,
            generator,
            current: None,
            next: None,
            px: 0,
            py: 0,
            stats: GameStats::new(),
            speed,
            state: SessionState::Ready,
            last_locked_cells: Vec::new(),
            last_clear_by_gravity_or_split: false,
            last_clear_had_items: false,
            incoming: None,
            scheduler: Arc::new(scheduler),
            ticks,
        }
    }

    /// Clears the board and counters and spawns the first piece.
    pub fn start_new_game(&mut self) {
        self.board.clear();
        self.stats = GameStats::new();
        self.speed.reset(self.base_interval);
        self.generator.reset();
        self.last_locked_cells.clear();
        self.last_clear_by_gravity_or_split = false;
        self.last_clear_had_items = false;
        if let Some(incoming) = &self.incoming {
            incoming.clear();
        }
        while self.ticks.try_recv().is_ok() {}
        self.scheduler.set_interval(self.speed.interval());

        self.current = None;
        self.next = Some(self.generator.generate(0, self.item_mode_enabled));
        self.state = SessionState::Playing;
        self.listener.on_score_changed(0);
        self.spawn_next_piece();
    }

    /// Promotes the next piece to the falling piece.
    ///
    /// Pending garbage is injected first. When the new piece does not fit at
    /// its spawn position the game is over. Called after every lock; no-op
    /// unless a game is being played.
    pub fn spawn_next_piece(&mut self) {
        if !self.state.is_playing() {
            return;
        }
        self.inject_pending_attack();

        let lines = self.stats.total_cleared_lines();
        let piece = self
            .next
            .take()
            .unwrap_or_else(|| self.generator.generate(lines, self.item_mode_enabled));
        let next = self.generator.generate(lines, self.item_mode_enabled);
        self.next = Some(next);
        self.px = (to_i32(self.board.width()) - to_i32(piece.size())) / 2;
        self.py = 0;

        if !self.board.fits(piece.shape(), self.px, self.py) {
            self.game_over();
            return;
        }
        self.current = Some(piece);
        self.stats.record_spawn();
        self.listener.on_piece_spawned(&piece, self.px, self.py);
        self.listener.on_next_piece(&next);
        self.listener.on_board_updated(&self.board);
    }

    fn game_over(&mut self) {
        self.current = None;
        self.state = SessionState::GameOver;
        self.scheduler.stop();
        self.listener.on_game_over();
    }

    fn active_piece(&self) -> Result<Tetromino, MoveError> {
        if !self.state.is_playing() {
            return Err(MoveError::Inactive);
        }
        self.current.ok_or(MoveError::Inactive)
    }

    fn try_shift(&mut self, dx: i32) -> Result<(), MoveError> {
        let piece = self.active_piece()?;
        if !self.board.fits(piece.shape(), self.px + dx, self.py) {
            return Err(MoveError::Blocked);
        }
        self.px += dx;
        self.listener.on_board_updated(&self.board);
        Ok(())
    }

    /// Shifts the falling piece one column left.
    pub fn move_left(&mut self) -> Result<(), MoveError> {
        self.try_shift(-1)
    }

    /// Shifts the falling piece one column right.
    pub fn move_right(&mut self) -> Result<(), MoveError> {
        self.try_shift(1)
    }

    /// Rotates clockwise, trying each kick offset until one fits.
    pub fn rotate_cw(&mut self) -> Result<(), MoveError> {
        let piece = self.active_piece()?;
        if !piece.can_rotate() {
            return Err(MoveError::NotRotatable);
        }
        let rotated = piece.rotate_clockwise();
        let (dx, dy) = ROTATION_KICKS
            .into_iter()
            .find(|&(dx, dy)| {
                self.board
                    .fits(rotated.shape(), self.px + dx, self.py + dy)
            })
            .ok_or(MoveError::Blocked)?;
        self.current = Some(rotated);
        self.px += dx;
        self.py += dy;
        self.listener.on_board_updated(&self.board);
        Ok(())
    }

    /// Moves the piece down one row, or locks it when it cannot move.
    ///
    /// Returns `true` when the piece moved.
    pub fn soft_drop(&mut self) -> bool {
        self.step_down(SOFT_DROP_SCORE_PER_ROW)
    }

    fn step_down(&mut self, points: u64) -> bool {
        let Ok(piece) = self.active_piece() else {
            return false;
        };
        if !self.board.fits(piece.shape(), self.px, self.py + 1) {
            self.lock_piece();
            return false;
        }
        self.py += 1;
        if points > 0 {
            self.stats.add_score(points);
            self.listener.on_score_changed(self.stats.score());
        }
        self.listener.on_board_updated(&self.board);
        true
    }

    /// Drops the piece as far as it goes and locks it.
    pub fn hard_drop(&mut self) {
        let Ok(piece) = self.active_piece() else {
            return;
        };
        let target = self.landing_y(&piece);
        let distance = u64::try_from(target - self.py).unwrap_or(0);
        self.py = target;
        if distance > 0 {
            self.stats.add_score(distance * HARD_DROP_SCORE_PER_ROW);
            self.listener.on_score_changed(self.stats.score());
        }
        self.lock_piece();
    }

    fn landing_y(&self, piece: &Tetromino) -> i32 {
        let mut y = self.py;
        while self.board.fits(piece.shape(), self.px, y + 1) {
            y += 1;
        }
        y
    }

    /// Row the falling piece would land on, or `-1` without a falling piece.
    #[must_use]
    pub fn ghost_y(&self) -> i32 {
        self.current.map_or(-1, |piece| self.landing_y(&piece))
    }

    fn lock_piece(&mut self) {
        let Some(piece) = self.current else {
            return;
        };
        let (x, y) = (self.px, self.py);
        let item = piece.item_type().filter(|item| {
            self.item_mode_enabled && (item.marks_whole_piece() || piece.marked_cell().is_some())
        });
        match item {
            Some(item) => self.board.place_item_piece(
                piece.shape(),
                x,
                y,
                piece.id(),
                item,
                piece.marked_cell(),
            ),
            None => self.board.place_piece(piece.shape(), x, y, piece.id()),
        }
        self.last_locked_cells = piece
            .block_positions()
            .iter()
            .map(|&(row, col)| (x + to_i32(col), y + to_i32(row)))
            .filter(|&(cx, cy)| self.board.get_cell(cx, cy) != OUT_OF_BOUNDS)
            .collect();
        self.stats.record_lock();

        self.last_clear_by_gravity_or_split = false;
        let item_lines = item.map_or(0, |item| self.apply_item_effect(item));
        let mut had_items = false;
        let full_lines = self.board.clear_full_lines_with(|| had_items = true);
        self.last_clear_had_items = had_items;

        let lines = item_lines + full_lines;
        self.stats.record_line_clear(lines);
        if lines > 0 {
            let cause = if self.last_clear_by_gravity_or_split {
                ClearCause::GravityOrSplit
            } else {
                ClearCause::Placement
            };
            if self.speed.update(self.stats.total_cleared_lines()) {
                self.scheduler.set_interval(self.speed.interval());
            }
            self.listener.on_lines_cleared(lines, cause);
            self.listener.on_score_changed(self.stats.score());
        }
        self.listener.on_board_updated(&self.board);

        self.current = None;
        self.spawn_next_piece();
    }

    /// Runs the lock-time effect of `item`, returning the rows it removed itself.
    fn apply_item_effect(&mut self, item: ItemType) -> usize {
        match item {
            ItemType::Copy => self.apply_copy_item(),
            ItemType::LineClear => return self.apply_line_clear_item(),
            ItemType::Weight => match self.weight_mode {
                WeightMode::SingleRow => self.apply_weight_single_row(),
                WeightMode::AllRowsBelow => self.apply_weight_all_rows(),
            },
            ItemType::Gravity => self.apply_gravity_item(),
            ItemType::Split => self.apply_split_item(),
        }
        0
    }

    fn current_with_item(&self, item: ItemType) -> Option<Tetromino> {
        self.current.filter(|piece| piece.item_type() == Some(item))
    }

    /// COPY: the next piece becomes a plain copy of the falling piece's kind.
    pub fn apply_copy_item(&mut self) {
        let Some(piece) = self.current_with_item(ItemType::Copy) else {
            return;
        };
        let copy = Tetromino::of(piece.kind()).without_item();
        self.next = Some(copy);
        self.listener.on_next_piece(&copy);
    }

    fn lowest_piece_row(&self, piece: &Tetromino) -> i32 {
        let bottom = piece
            .block_positions()
            .iter()
            .map(|&(row, _)| row)
            .max()
            .unwrap_or(0);
        self.py + to_i32(bottom)
    }

    /// WEIGHT: empties the row directly below the piece.
    pub fn apply_weight_single_row(&mut self) {
        let Some(piece) = self.current_with_item(ItemType::Weight) else {
            return;
        };
        let below = self.lowest_piece_row(&piece) + 1;
        if let Ok(y) = usize::try_from(below) {
            self.board.empty_row(y);
        }
    }

    /// WEIGHT: empties every row below the piece.
    pub fn apply_weight_all_rows(&mut self) {
        let Some(piece) = self.current_with_item(ItemType::Weight) else {
            return;
        };
        let below = usize::try_from(self.lowest_piece_row(&piece) + 1).unwrap_or(0);
        for y in below..self.board.height() {
            self.board.empty_row(y);
        }
    }

    /// GRAVITY: compacts every column of the board.
    pub fn apply_gravity_item(&mut self) {
        if self.current_with_item(ItemType::Gravity).is_none() {
            return;
        }
        self.board.apply_gravity();
        self.last_clear_by_gravity_or_split = true;
    }

    /// SPLIT: compacts only the columns the piece occupies.
    pub fn apply_split_item(&mut self) {
        let Some(piece) = self.current_with_item(ItemType::Split) else {
            return;
        };
        let mut columns: Vec<usize> = piece
            .block_positions()
            .iter()
            .filter_map(|&(_, col)| usize::try_from(self.px + to_i32(col)).ok())
            .collect();
        columns.sort_unstable();
        columns.dedup();
        for x in columns {
            self.board.compact_column(x);
        }
        self.last_clear_by_gravity_or_split = true;
    }

    /// LINE_CLEAR: removes the row holding the marked cell, full or not.
    ///
    /// Returns the number of rows removed (0 or 1).
    pub fn apply_line_clear_item(&mut self) -> usize {
        let Some(piece) = self.current_with_item(ItemType::LineClear) else {
            return 0;
        };
        let row = piece.line_clear_block_row();
        if row < 0 {
            return 0;
        }
        let Ok(y) = usize::try_from(self.py + row) else {
            return 0;
        };
        usize::from(self.board.remove_row(y))
    }

    /// Adds the score for clearing `lines` rows at once and returns it.
    pub fn add_score_for_cleared_lines(&mut self, lines: usize) -> u64 {
        let points = line_clear_score(lines);
        if points > 0 {
            self.stats.add_score(points);
            self.listener.on_score_changed(self.stats.score());
        }
        points
    }

    /// Uses `queue` as the source of garbage injected on spawn.
    pub fn set_attack_source(&mut self, queue: Arc<AttackQueue>) {
        self.incoming = Some(queue);
    }

    /// The queue garbage is taken from, if any.
    #[must_use]
    pub fn attack_source(&self) -> Option<&Arc<AttackQueue>> {
        self.incoming.as_ref()
    }

    /// Pushes the oldest pending garbage pattern into the bottom of the board.
    ///
    /// A falling piece rises with the board content; if it no longer fits
    /// there, the game is over. Returns `true` when a pattern was injected.
    pub fn inject_pending_attack(&mut self) -> bool {
        if self.state.is_game_over() {
            return false;
        }
        let Some(pattern) = self.incoming.as_ref().and_then(|queue| queue.dequeue()) else {
            return false;
        };
        self.board.push_rows_from_bottom(pattern.rows());
        if let Some(piece) = self.current {
            self.py -= to_i32(pattern.lines());
            if !self.board.fits(piece.shape(), self.px, self.py) {
                self.game_over();
                return true;
            }
        }
        self.listener.on_board_updated(&self.board);
        true
    }

    /// Sets the auto-drop interval, in seconds.
    ///
    /// Later speed-ups keep shrinking the interval from this value.
    pub fn set_drop_interval_seconds(&mut self, seconds: f64) -> Result<(), ConfigError> {
        let interval = drop_interval_from_seconds(seconds)?;
        self.speed.override_interval(interval);
        self.scheduler.set_interval(self.speed.interval());
        Ok(())
    }

    /// Current auto-drop interval.
    #[must_use]
    pub fn drop_interval(&self) -> Duration {
        self.speed.interval()
    }

    /// Starts the auto-drop timer. Idempotent.
    pub fn start_auto_drop(&self) {
        self.scheduler.start();
    }

    /// Stops the auto-drop timer. Idempotent.
    pub fn stop_auto_drop(&self) {
        self.scheduler.stop();
    }

    /// Whether the auto-drop scheduler is producing ticks.
    #[must_use]
    pub fn is_auto_drop_running(&self) -> bool {
        self.scheduler.is_running()
    }

    /// Shared handle to the auto-drop timer, for starting and stopping it from other threads.
    #[must_use]
    pub fn drop_scheduler(&self) -> Arc<DropScheduler> {
        Arc::clone(&self.scheduler)
    }

    fn auto_drop(&mut self) -> bool {
        if self.active_piece().is_err() {
            return false;
        }
        self.step_down(0);
        true
    }

    /// Executes every auto-drop tick queued so far.
    ///
    /// Ticks arriving while paused or after game over are discarded. Returns the
    /// number of ticks that moved or locked a piece.
    pub fn run_pending_auto_drops(&mut self) -> usize {
        let mut applied = 0;
        while self.ticks.try_recv().is_ok() {
            if self.auto_drop() {
                applied += 1;
            }
        }
        applied
    }

    /// Blocks until the next auto-drop tick, then executes it and any others queued.
    ///
    /// Returns `false` when no tick arrived within `timeout`.
    pub fn wait_auto_drop(&mut self, timeout: Duration) -> bool {
        if self.ticks.recv_timeout(timeout).is_err() {
            return false;
        }
        self.auto_drop();
        self.run_pending_auto_drops();
        true
    }

    /// Stops the auto-drop timer permanently. Idempotent.
    pub fn shutdown(&self) {
        self.scheduler.shutdown();
    }

    /// Pauses a running game; input and auto-drop ticks are ignored until it resumes.
    pub fn pause(&mut self) {
        if self.state.is_playing() {
            self.state = SessionState::Paused;
        }
    }

    /// Resumes a paused game.
    pub fn resume(&mut self) {
        if self.state.is_paused() {
            self.state = SessionState::Playing;
        }
    }

    /// Pauses a running game, or resumes a paused one.
    pub fn toggle_pause(&mut self) {
        self.state = match self.state {
            SessionState::Playing => SessionState::Paused,
            SessionState::Paused => SessionState::Playing,
            state @ (SessionState::Ready | SessionState::GameOver) => state,
        };
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.state.is_paused()
    }

    /// Whether the last spawn failed.
    #[must_use]
    pub fn is_game_over(&self) -> bool {
        self.state.is_game_over()
    }

    /// Current session state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The locked cells, without the falling piece.
    #[must_use]
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Direct board access, for setting up positions.
    pub fn board_mut(&mut self) -> &mut Board {
        &mut self.board
    }

    /// The falling piece, if any.
    #[must_use]
    pub fn current(&self) -> Option<&Tetromino> {
        self.current.as_ref()
    }

    /// The piece that spawns after the current one.
    #[must_use]
    pub fn next(&self) -> Option<&Tetromino> {
        self.next.as_ref()
    }

    /// Column of the falling piece's shape box.
    #[must_use]
    pub fn piece_x(&self) -> i32 {
        self.px
    }

    /// Row of the falling piece's shape box.
    #[must_use]
    pub fn piece_y(&self) -> i32 {
        self.py
    }

    /// Total score of the game.
    #[must_use]
    pub fn score(&self) -> u64 {
        self.stats.score()
    }

    /// Lines cleared since the game started.
    #[must_use]
    pub fn total_lines_cleared(&self) -> usize {
        self.stats.total_cleared_lines()
    }

    /// Score and counters of the game.
    #[must_use]
    pub fn stats(&self) -> &GameStats {
        &self.stats
    }

    /// The game mode.
    #[must_use]
    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    /// Whether item pieces are generated and applied.
    #[must_use]
    pub fn item_mode_enabled(&self) -> bool {
        self.item_mode_enabled
    }

    /// Turns item pieces on or off.
    pub fn set_item_mode_enabled(&mut self, enabled: bool) {
        self.item_mode_enabled = enabled;
    }

    /// How a locked WEIGHT piece empties the rows below it.
    #[must_use]
    pub fn weight_mode(&self) -> WeightMode {
        self.weight_mode
    }

    /// Changes how a locked WEIGHT piece empties the rows below it.
    pub fn set_weight_mode(&mut self, mode: WeightMode) {
        self.weight_mode = mode;
    }

    /// Board cells written by the most recent lock, as `(x, y)`.
    #[must_use]
    pub fn last_locked_cells(&self) -> &[(i32, i32)] {
        &self.last_locked_cells
    }

    /// Distinct columns of [`Self::last_locked_cells`], left to right.
    #[must_use]
    pub fn last_locked_columns(&self) -> Vec<i32> {
        let mut columns: Vec<_> = self.last_locked_cells.iter().map(|&(x, _)| x).collect();
        columns.sort_unstable();
        columns.dedup();
        columns
    }

    /// Whether the most recent lock ran a GRAVITY or SPLIT effect, so any rows
    /// it cleared do not count as an attack.
    #[must_use]
    pub fn is_last_clear_by_gravity_or_split(&self) -> bool {
        self.last_clear_by_gravity_or_split
    }

    /// Whether the rows cleared by the most recent lock held item cells.
    #[must_use]
    pub fn last_clear_had_items(&self) -> bool {
        self.last_clear_had_items
    }

    /// Copies the visible state into a serializable record.
    #[must_use]
    pub fn snapshot(&self) -> BoardSnapshot {
        BoardSnapshot {
            rows: self.board.snapshot(),
            current: self.current.map(|piece| piece.kind()),
            rotation: self.current.map_or(0, |piece| piece.rotation_index()),
            piece_x: self.px,
            piece_y: self.py,
            ghost_y: self.ghost_y(),
            next: self.next.map(|piece| piece.kind()),
            score: self.stats.score(),
            total_lines_cleared: self.stats.total_cleared_lines(),
            game_over: self.state.is_game_over(),
        }
    }
}

impl Drop for GameEngine {
    fn drop(&mut self) {
        self.scheduler.shutdown();
    }
}

fn to_i32(value: usize) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{Mutex, MutexGuard},
        thread,
    };

    use super::*;
    use crate::{
        PieceSeed,
        core::cell::{self, EMPTY, GARBAGE},
        versus::AttackPattern,
    };

    #[derive(Debug, Default)]
    struct Events {
        log: Vec<&'static str>,
        next: Vec<PieceKind>,
        lines: Vec<(usize, ClearCause)>,
        scores: Vec<u64>,
        game_overs: usize,
    }

    impl GameStateListener for Events {
        fn on_board_updated(&mut self, _board: &Board) {
            self.log.push("board");
        }
        fn on_piece_spawned(&mut self, _piece: &Tetromino, _x: i32, _y: i32) {
            self.log.push("spawned");
        }
        fn on_next_piece(&mut self, piece: &Tetromino) {
            self.log.push("next");
            self.next.push(piece.kind());
        }
        fn on_lines_cleared(&mut self, count: usize, cause: ClearCause) {
            self.lines.push((count, cause));
        }
        fn on_score_changed(&mut self, score: u64) {
            self.scores.push(score);
        }
        fn on_game_over(&mut self) {
            self.game_overs += 1;
        }
    }

    type Shared = Arc<Mutex<Events>>;

    fn engine(config: EngineConfig) -> (GameEngine, Shared) {
        let events = Shared::default();
        let config = EngineConfig {
            seed: Some(PieceSeed::from_u64(7)),
            ..config
        };
        let engine = GameEngine::with_config(&config, Arc::clone(&events)).unwrap();
        (engine, events)
    }

    /// A started game on an empty board.
    fn started(config: EngineConfig) -> (GameEngine, Shared) {
        let (mut engine, events) = engine(config);
        engine.start_new_game();
        *events.lock().unwrap() = Events::default();
        (engine, events)
    }

    fn item_config() -> EngineConfig {
        EngineConfig::with_difficulty(Difficulty::Item)
    }

    fn put(engine: &mut GameEngine, piece: Tetromino, x: i32, y: i32) {
        engine.current = Some(piece);
        engine.px = x;
        engine.py = y;
    }

    fn fill_row(board: &mut Board, y: i32, columns: impl IntoIterator<Item = i32>) {
        for x in columns {
            board.set_cell(x, y, 1);
        }
    }

    fn recorded(shared: &Shared) -> MutexGuard<'_, Events> {
        shared.lock().unwrap()
    }

    fn row_is_empty(board: &Board, y: i32) -> bool {
        (0..to_i32(board.width())).all(|x| board.get_cell(x, y) == EMPTY)
    }

    #[test]
    fn test_new_game_spawns_centered() {
        let (mut engine, events) = engine(EngineConfig::default());
        assert!(engine.state().is_ready());
        assert_eq!(engine.ghost_y(), -1);

        engine.start_new_game();
        let piece = *engine.current().unwrap();
        assert!(engine.next().is_some());
        assert_eq!(engine.piece_x(), (10 - to_i32(piece.size())) / 2);
        assert_eq!(engine.piece_y(), 0);
        assert_eq!(engine.stats().spawned_pieces(), 1);
        assert_eq!(recorded(&events).log, vec!["spawned", "next", "board"]);
        assert_eq!(recorded(&events).scores, vec![0]);
    }

    #[test]
    fn test_seeded_engine_replays_sequence_each_game() {
        let (mut engine, _events) = engine(EngineConfig::default());
        let deal = |engine: &mut GameEngine| {
            engine.start_new_game();
            let mut kinds = Vec::new();
            for _ in 0..8 {
                kinds.push(engine.current().unwrap().kind());
                engine.hard_drop();
            }
            kinds
        };
        let first = deal(&mut engine);
        let second = deal(&mut engine);
        assert_eq!(first, second);
    }

    #[test]
    fn test_moves_stop_at_walls() {
        let (mut engine, _events) = started(EngineConfig::default());
        put(&mut engine, Tetromino::of(PieceKind::O), 4, 0);
        for _ in 0..4 {
            engine.move_left().unwrap();
        }
        assert_eq!(engine.piece_x(), 0);
        assert_eq!(engine.move_left(), Err(MoveError::Blocked));
        for _ in 0..8 {
            engine.move_right().unwrap();
        }
        assert_eq!(engine.move_right(), Err(MoveError::Blocked));
        assert_eq!(engine.piece_x(), 8);
    }

    #[test]
    fn test_rotation_kicks_off_the_wall() {
        let (mut engine, _events) = started(EngineConfig::default());
        let vertical = Tetromino::of(PieceKind::I).rotate_clockwise();
        assert!(engine.board().fits(vertical.shape(), -2, 0));
        put(&mut engine, vertical, -2, 0);

        engine.rotate_cw().unwrap();
        assert_eq!(engine.current().unwrap().rotation_index(), 2);
        assert_eq!(engine.piece_x(), 0);

        put(&mut engine, Tetromino::of(PieceKind::Weight), 3, 0);
        assert_eq!(engine.rotate_cw(), Err(MoveError::NotRotatable));
    }

    #[test]
    fn test_soft_drop_against_filled_bottom_row_locks_and_spawns() {
        let (mut engine, _events) = started(EngineConfig::default());
        fill_row(engine.board_mut(), 19, 0..9);
        put(&mut engine, Tetromino::of(PieceKind::O), 0, 16);

        assert!(engine.soft_drop());
        assert_eq!(engine.score(), 1);
        assert!(!engine.soft_drop());

        assert!(engine.board().is_occupied(0, 17));
        assert!(engine.board().is_occupied(1, 18));
        assert_eq!(engine.stats().locked_pieces(), 1);
        assert_eq!(engine.stats().spawned_pieces(), 2);
        assert_eq!(engine.piece_y(), 0);
        assert_eq!(engine.last_locked_columns(), vec![0, 1]);
        assert_eq!(engine.score(), 1);
    }

    #[test]
    fn test_zero_distance_hard_drop_adds_nothing() {
        let (mut engine, events) = started(EngineConfig::default());
        fill_row(engine.board_mut(), 19, 0..9);
        put(&mut engine, Tetromino::of(PieceKind::O), 0, 17);
        engine.hard_drop();
        assert_eq!(engine.score(), 0);
        assert!(recorded(&events).scores.is_empty());
        assert_eq!(engine.stats().locked_pieces(), 1);
    }

    #[test]
    fn test_hard_drop_scores_per_row() {
        let (mut engine, _events) = started(EngineConfig::default());
        put(&mut engine, Tetromino::of(PieceKind::T), 3, 0);
        let ghost = engine.ghost_y();
        assert_eq!(ghost, 18);
        assert_eq!(engine.piece_y(), 0);
        engine.hard_drop();
        assert_eq!(engine.score(), 36);
        assert_eq!(engine.last_locked_cells().len(), 4);
    }

    #[test]
    fn test_blocked_spawn_is_game_over_once() {
        let (mut engine, events) = started(EngineConfig::default());
        engine.start_auto_drop();
        for y in 0..6 {
            fill_row(engine.board_mut(), y, 0..10);
        }
        engine.spawn_next_piece();
        assert!(engine.current().is_none());
        assert!(engine.is_game_over());
        assert!(!engine.is_auto_drop_running());

        engine.spawn_next_piece();
        engine.hard_drop();
        assert!(!engine.soft_drop());
        assert_eq!(engine.move_left(), Err(MoveError::Inactive));
        assert_eq!(recorded(&events).game_overs, 1);
        assert_eq!(engine.ghost_y(), -1);
    }

    #[test]
    fn test_clearing_row_19_shifts_row_18_down() {
        let (mut engine, events) = started(EngineConfig::default());
        let board = engine.board_mut();
        fill_row(board, 19, 4..10);
        board.set_cell(5, 18, 3);
        board.set_cell(9, 18, GARBAGE);
        let former_row_18 = board.row(18).unwrap().to_vec();

        put(&mut engine, Tetromino::of(PieceKind::I), 0, 0);
        engine.hard_drop();

        assert_eq!(engine.board().row(19).unwrap(), former_row_18.as_slice());
        assert!(row_is_empty(engine.board(), 18));
        assert_eq!(engine.total_lines_cleared(), 1);
        assert_eq!(engine.score(), 36 + 100);
        assert_eq!(recorded(&events).lines, vec![(1, ClearCause::Placement)]);
        assert_eq!(recorded(&events).scores.last(), Some(&136));
    }

    #[test]
    fn test_add_score_for_cleared_lines() {
        let (mut engine, _events) = started(EngineConfig::default());
        let scores: Vec<_> = (1..=6)
            .map(|n| engine.add_score_for_cleared_lines(n))
            .collect();
        assert_eq!(scores, vec![100, 250, 500, 1000, 1250, 1500]);
        assert_eq!(engine.score(), 4600);
    }

    #[test]
    fn test_copy_item_forces_next_piece() {
        let (mut engine, events) = started(item_config());
        put(
            &mut engine,
            Tetromino::item(PieceKind::S, 0, ItemType::Copy, 0),
            3,
            0,
        );
        engine.hard_drop();
        let current = engine.current().unwrap();
        assert_eq!(current.kind(), PieceKind::S);
        assert_eq!(current.item_type(), None);
        assert_eq!(recorded(&events).next.first(), Some(&PieceKind::S));
        // The marked cell is item-coded, the others plain.
        let coded = engine
            .last_locked_cells()
            .iter()
            .filter(|&&(x, y)| cell::item_of(engine.board().get_cell(x, y)) == Some(ItemType::Copy))
            .count();
        assert_eq!(coded, 1);
    }

    #[test]
    fn test_weight_item_modes() {
        let weight = Tetromino::of(PieceKind::Weight);
        for (mode, emptied) in [
            (WeightMode::SingleRow, 13..14),
            (WeightMode::AllRowsBelow, 13..20),
        ] {
            let (mut engine, _events) = started(item_config());
            for y in 12..20 {
                fill_row(engine.board_mut(), y, [0, 5, 8]);
            }
            put(&mut engine, weight, 0, 12);
            match mode {
                WeightMode::SingleRow => engine.apply_weight_single_row(),
                WeightMode::AllRowsBelow => engine.apply_weight_all_rows(),
            }
            for y in 12..20 {
                let empty = row_is_empty(engine.board(), y);
                assert_eq!(empty, emptied.contains(&y), "{mode} row {y}");
            }
        }
    }

    #[test]
    fn test_weight_item_on_lock() {
        let (mut engine, _events) = started(item_config());
        assert_eq!(engine.weight_mode(), WeightMode::AllRowsBelow);
        let board = engine.board_mut();
        board.set_cell(1, 17, 1);
        board.set_cell(6, 18, 1);
        board.set_cell(2, 19, 1);
        put(&mut engine, Tetromino::of(PieceKind::Weight), 0, 0);
        engine.hard_drop();

        let weight_cell = cell::encode(PieceKind::Weight.id(), Some(ItemType::Weight));
        for x in 0..4 {
            assert_eq!(engine.board().get_cell(x, 16), weight_cell);
        }
        for y in 17..20 {
            assert!(row_is_empty(engine.board(), y));
        }
        assert_eq!(engine.total_lines_cleared(), 0);
    }

    #[test]
    fn test_weight_item_single_row_on_lock() {
        let (mut engine, _events) = started(EngineConfig {
            weight_mode: WeightMode::SingleRow,
            ..item_config()
        });
        let board = engine.board_mut();
        board.set_cell(1, 17, 1);
        board.set_cell(6, 18, 1);
        board.set_cell(2, 19, 1);
        put(&mut engine, Tetromino::of(PieceKind::Weight), 0, 0);
        engine.hard_drop();

        // Lands on the block at (1, 17); only row 17 below it is emptied.
        let weight_cell = cell::encode(PieceKind::Weight.id(), Some(ItemType::Weight));
        for x in 0..4 {
            assert_eq!(engine.board().get_cell(x, 16), weight_cell);
        }
        assert!(row_is_empty(engine.board(), 17));
        assert!(engine.board().is_occupied(6, 18));
        assert!(engine.board().is_occupied(2, 19));
        assert_eq!(engine.total_lines_cleared(), 0);
    }

    #[test]
    fn test_gravity_item_clear_is_not_a_placement_clear() {
        let (mut engine, events) = started(item_config());
        let board = engine.board_mut();
        fill_row(board, 19, 1..10);
        board.set_cell(0, 5, 1);
        put(&mut engine, Tetromino::of(PieceKind::Gravity), 4, 0);
        engine.hard_drop();

        assert!(engine.is_last_clear_by_gravity_or_split());
        assert_eq!(recorded(&events).lines, vec![(1, ClearCause::GravityOrSplit)]);
        assert!(!engine.board().is_occupied(0, 5));
        // The cleared row held no gravity cells.
        assert!(!engine.last_clear_had_items());
    }

    #[test]
    fn test_gravity_item_compacts_whole_board() {
        let (mut engine, _events) = started(item_config());
        let board = engine.board_mut();
        board.set_cell(2, 3, 1);
        board.set_cell(7, 9, 4);
        board.set_cell(7, 12, 5);
        let mut expected = engine.board().clone();
        expected.apply_gravity();

        put(&mut engine, Tetromino::of(PieceKind::Gravity), 0, 0);
        engine.apply_gravity_item();
        assert_eq!(engine.board(), &expected);
        assert_eq!(engine.board().get_cell(7, 18), 4);
        assert_eq!(engine.board().get_cell(7, 19), 5);
    }

    #[test]
    fn test_split_item_compacts_only_its_columns() {
        let (mut engine, _events) = started(item_config());
        let board = engine.board_mut();
        board.set_cell(1, 10, 1);
        board.set_cell(7, 10, 1);
        put(&mut engine, Tetromino::of(PieceKind::Split), 1, 0);
        engine.apply_split_item();

        assert!(engine.board().is_occupied(1, 19));
        assert!(!engine.board().is_occupied(1, 10));
        assert!(engine.board().is_occupied(7, 10));
        assert!(engine.is_last_clear_by_gravity_or_split());
    }

    #[test]
    fn test_line_clear_item_removes_its_row() {
        let (mut engine, events) = started(item_config());
        let board = engine.board_mut();
        fill_row(board, 19, [5, 6]);
        board.set_cell(9, 18, GARBAGE);
        put(
            &mut engine,
            Tetromino::line_clear_item(PieceKind::I, 0, 0),
            0,
            0,
        );
        engine.hard_drop();

        assert_eq!(engine.board().get_cell(9, 19), GARBAGE);
        assert_eq!(engine.board().get_cell(5, 19), EMPTY);
        assert_eq!(engine.board().get_cell(0, 19), EMPTY);
        assert_eq!(engine.total_lines_cleared(), 1);
        assert_eq!(engine.score(), 36 + 100);
        assert_eq!(recorded(&events).lines, vec![(1, ClearCause::Placement)]);
    }

    #[test]
    fn test_item_handlers_without_item_are_noops() {
        let (mut engine, _events) = started(item_config());
        fill_row(engine.board_mut(), 19, [0, 3]);
        engine.board_mut().set_cell(4, 2, 1);
        let before = engine.board().clone();
        let next = engine.next().copied();

        put(&mut engine, Tetromino::of(PieceKind::T), 3, 10);
        engine.apply_copy_item();
        engine.apply_weight_single_row();
        engine.apply_weight_all_rows();
        engine.apply_gravity_item();
        engine.apply_split_item();
        assert_eq!(engine.apply_line_clear_item(), 0);

        engine.current = None;
        engine.apply_gravity_item();
        assert_eq!(engine.apply_line_clear_item(), 0);

        assert_eq!(engine.board(), &before);
        assert_eq!(engine.next().copied(), next);
        assert!(!engine.is_last_clear_by_gravity_or_split());
    }

    #[test]
    fn test_items_ignored_when_item_mode_is_off() {
        let (mut engine, _events) = started(EngineConfig::default());
        assert!(!engine.item_mode_enabled());
        engine.board_mut().set_cell(0, 5, 1);
        put(&mut engine, Tetromino::of(PieceKind::Gravity), 4, 0);
        engine.hard_drop();

        assert!(engine.board().is_occupied(0, 5));
        assert_eq!(engine.board().get_cell(4, 19), i32::from(PieceKind::Gravity.id()));
    }

    #[test]
    fn test_ghost_does_not_move_piece() {
        let (mut engine, _events) = started(EngineConfig::default());
        put(&mut engine, Tetromino::of(PieceKind::I), 3, 2);
        fill_row(engine.board_mut(), 15, [4]);
        assert_eq!(engine.ghost_y(), 13);
        assert_eq!(engine.piece_y(), 2);
    }

    #[test]
    fn test_pause_blocks_input() {
        let (mut engine, _events) = started(EngineConfig::default());
        engine.pause();
        assert!(engine.is_paused());
        let y = engine.piece_y();
        assert!(!engine.soft_drop());
        engine.hard_drop();
        assert_eq!(engine.move_right(), Err(MoveError::Inactive));
        assert_eq!(engine.piece_y(), y);
        assert_eq!(engine.stats().locked_pieces(), 0);

        engine.toggle_pause();
        assert!(!engine.is_paused());
        assert!(engine.soft_drop());
        engine.toggle_pause();
        engine.resume();
        assert!(engine.state().is_playing());
    }

    #[test]
    fn test_set_drop_interval() {
        let (mut engine, _events) = started(EngineConfig::default());
        assert_eq!(engine.drop_interval(), Duration::from_secs(1));
        for bad in [0.0, -0.5, f64::NAN] {
            assert!(engine.set_drop_interval_seconds(bad).is_err());
        }
        assert_eq!(engine.drop_interval(), Duration::from_secs(1));
        engine.set_drop_interval_seconds(0.5).unwrap();
        assert_eq!(engine.drop_interval(), Duration::from_millis(500));
    }

    #[test]
    fn test_speed_up_after_three_lines() {
        let (mut engine, _events) = started(EngineConfig::default());
        for y in 17..20 {
            fill_row(engine.board_mut(), y, 0..9);
        }
        put(&mut engine, Tetromino::of(PieceKind::I).rotate_clockwise(), 7, 0);
        engine.hard_drop();
        assert_eq!(engine.total_lines_cleared(), 3);
        assert!(engine.drop_interval() < Duration::from_secs(1));
    }

    #[test]
    fn test_pending_attack_injected_on_spawn() {
        let (mut engine, _events) = started(EngineConfig::default());
        let queue = Arc::new(AttackQueue::new());
        engine.set_attack_source(Arc::clone(&queue));
        engine.board_mut().set_cell(0, 19, 1);

        let mut hole_rows = vec![vec![GARBAGE; 10]; 2];
        hole_rows[0][3] = EMPTY;
        hole_rows[1][6] = EMPTY;
        queue.enqueue(AttackPattern::new(hole_rows.clone()));

        put(&mut engine, Tetromino::of(PieceKind::O), 4, 0);
        engine.hard_drop();

        assert!(queue.is_empty());
        assert_eq!(engine.board().row(18).unwrap(), hole_rows[0].as_slice());
        assert_eq!(engine.board().row(19).unwrap(), hole_rows[1].as_slice());
        // Earlier content was lifted by two rows.
        assert!(engine.board().is_occupied(0, 17));
        assert!(engine.board().is_occupied(4, 16));

        assert!(!engine.inject_pending_attack());
    }

    #[test]
    fn test_injected_garbage_lifts_falling_piece() {
        let (mut engine, events) = started(EngineConfig::default());
        let queue = Arc::new(AttackQueue::new());
        engine.set_attack_source(Arc::clone(&queue));
        engine.board_mut().clear();

        let mut row = vec![GARBAGE; 10];
        row[9] = EMPTY;
        queue.enqueue(AttackPattern::new(vec![row; 2]));
        put(&mut engine, Tetromino::of(PieceKind::O), 0, 18);
        assert!(engine.inject_pending_attack());
        assert_eq!(engine.piece_y(), 16);
        let piece = *engine.current().unwrap();
        assert!(engine.board().fits(piece.shape(), 0, 16));

        let garbage = |board: &Board| board.rows().flatten().filter(|&&c| c == GARBAGE).count();
        assert_eq!(garbage(engine.board()), 18);
        engine.hard_drop();
        assert_eq!(garbage(engine.board()), 18);
        assert!(engine.board().is_occupied(0, 16));
        assert!(engine.board().is_occupied(1, 17));

        // A piece lifted past the top tops out.
        put(&mut engine, Tetromino::of(PieceKind::O), 4, 0);
        queue.enqueue(AttackPattern::new(vec![vec![GARBAGE; 10]]));
        assert!(engine.inject_pending_attack());
        assert!(engine.is_game_over());
        assert!(engine.current().is_none());
        assert_eq!(recorded(&events).game_overs, 1);
    }

    #[test]
    fn test_auto_drop_ticks_run_on_engine_thread() {
        let (mut engine, _events) = started(EngineConfig {
            base_interval_seconds: 0.005,
            ..EngineConfig::default()
        });
        engine.start_auto_drop();
        engine.start_auto_drop();
        assert!(engine.wait_auto_drop(Duration::from_secs(5)));
        assert!(engine.piece_y() > 0);

        engine.pause();
        thread::sleep(Duration::from_millis(30));
        let y = engine.piece_y();
        assert_eq!(engine.run_pending_auto_drops(), 0);
        assert_eq!(engine.piece_y(), y);

        engine.stop_auto_drop();
        assert!(!engine.is_auto_drop_running());
        engine.shutdown();
        engine.shutdown();
        assert!(engine.drop_scheduler().is_shut_down());
        assert_eq!(engine.run_pending_auto_drops(), 0);
        assert!(!engine.wait_auto_drop(Duration::from_millis(10)));
    }

    #[test]
    fn test_snapshot_serializes() {
        let (mut engine, _events) = started(EngineConfig::default());
        put(&mut engine, Tetromino::of(PieceKind::L), 3, 0);
        let snapshot = engine.snapshot();
        assert_eq!(snapshot.current, Some(PieceKind::L));
        assert_eq!(snapshot.rows.len(), 20);
        assert_eq!(snapshot.ghost_y, engine.ghost_y());

        let json = serde_json::to_string(&snapshot).unwrap();
        let decoded: BoardSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, snapshot);
    }
}
