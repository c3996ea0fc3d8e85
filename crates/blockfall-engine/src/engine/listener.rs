use std::{
    any::Any,
    fmt,
    panic::{self, AssertUnwindSafe},
    sync::{Arc, Mutex, PoisonError},
};

use crate::core::{Board, Tetromino};

/// What caused a batch of lines to be cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::IsVariant)]
pub enum ClearCause {
    /// Rows completed by placing a piece, or removed by a LINE_CLEAR item.
    Placement,
    /// Rows completed because a GRAVITY or SPLIT item compacted columns.
    GravityOrSplit,
}

/// Receives gameplay events from a [`GameEngine`](super::GameEngine).
///
/// Every method has an empty default, so implementors only override what they need.
/// Events are delivered synchronously on the thread mutating the engine.
pub trait GameStateListener: Send {
    fn on_board_updated(&mut self, _board: &Board) {}
    fn on_piece_spawned(&mut self, _piece: &Tetromino, _x: i32, _y: i32) {}
    fn on_next_piece(&mut self, _piece: &Tetromino) {}
    fn on_lines_cleared(&mut self, _count: usize, _cause: ClearCause) {}
    fn on_score_changed(&mut self, _score: u64) {}
    fn on_game_over(&mut self) {}
}

/// Listener that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopListener;

impl GameStateListener for NoopListener {}

impl<L> GameStateListener for Box<L>
where
    L: GameStateListener + ?Sized,
{
    fn on_board_updated(&mut self, board: &Board) {
        (**self).on_board_updated(board);
    }
    fn on_piece_spawned(&mut self, piece: &Tetromino, x: i32, y: i32) {
        (**self).on_piece_spawned(piece, x, y);
    }
    fn on_next_piece(&mut self, piece: &Tetromino) {
        (**self).on_next_piece(piece);
    }
    fn on_lines_cleared(&mut self, count: usize, cause: ClearCause) {
        (**self).on_lines_cleared(count, cause);
    }
    fn on_score_changed(&mut self, score: u64) {
        (**self).on_score_changed(score);
    }
    fn on_game_over(&mut self) {
        (**self).on_game_over();
    }
}

/// A shared listener; lets a caller keep a handle to a listener owned by an engine.
impl<L> GameStateListener for Arc<Mutex<L>>
where
    L: GameStateListener + ?Sized,
{
    fn on_board_updated(&mut self, board: &Board) {
        lock(self).on_board_updated(board);
    }
    fn on_piece_spawned(&mut self, piece: &Tetromino, x: i32, y: i32) {
        lock(self).on_piece_spawned(piece, x, y);
    }
    fn on_next_piece(&mut self, piece: &Tetromino) {
        lock(self).on_next_piece(piece);
    }
    fn on_lines_cleared(&mut self, count: usize, cause: ClearCause) {
        lock(self).on_lines_cleared(count, cause);
    }
    fn on_score_changed(&mut self, score: u64) {
        lock(self).on_score_changed(score);
    }
    fn on_game_over(&mut self) {
        lock(self).on_game_over();
    }
}

// A listener that panicked while holding the lock is still usable.
fn lock<L: ?Sized>(listener: &Mutex<L>) -> std::sync::MutexGuard<'_, L> {
    listener.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A listener that panicked during dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerFault {
    /// Position of the listener in registration order.
    pub index: usize,
    /// Name of the event being delivered.
    pub event: &'static str,
    /// Panic message, when it was a string.
    pub message: String,
}

impl fmt::Display for ListenerFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "listener #{} failed handling {}: {}",
            self.index, self.event, self.message
        )
    }
}

/// Callback receiving listener faults.
pub type FaultReporter = Box<dyn FnMut(&ListenerFault) + Send>;

fn report_to_stderr(fault: &ListenerFault) {
    eprintln!("blockfall: {fault}");
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

/// Fans events out to several listeners in registration order.
///
/// Each delivery runs inside its own fault boundary: a listener that panics is
/// reported through the [`FaultReporter`] (stderr by default) and the remaining
/// listeners still receive the event.
///
/// # Example
///
/// ```
/// use std::sync::{Arc, Mutex};
///
/// use blockfall_engine::{ClearCause, CompositeListener, GameStateListener};
///
/// #[derive(Default)]
/// struct Lines(usize);
///
/// impl GameStateListener for Lines {
///     fn on_lines_cleared(&mut self, count: usize, _cause: ClearCause) {
///         self.0 += count;
///     }
/// }
///
/// let lines = Arc::new(Mutex::new(Lines::default()));
/// let mut composite = CompositeListener::new();
/// composite.add(Some(Box::new(lines.clone())));
/// composite.add(None);
/// composite.on_lines_cleared(2, ClearCause::Placement);
/// assert_eq!(lines.lock().unwrap().0, 2);
/// ```
pub struct CompositeListener {
    listeners: Vec<Box<dyn GameStateListener>>,
    reporter: FaultReporter,
}

impl fmt::Debug for CompositeListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeListener")
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

impl Default for CompositeListener {
    fn default() -> Self {
        Self::new()
    }
}

impl CompositeListener {
    #[must_use]
    pub fn new() -> Self {
        Self::with_reporter(Box::new(report_to_stderr))
    }

    /// Creates an empty composite that sends listener faults to `reporter`.
    #[must_use]
    pub fn with_reporter(reporter: FaultReporter) -> Self {
        Self {
            listeners: Vec::new(),
            reporter,
        }
    }

    /// Registers a listener. `None` is ignored; registering the same shared
    /// listener twice delivers every event to it twice.
    pub fn add(&mut self, listener: Option<Box<dyn GameStateListener>>) {
        if let Some(listener) = listener {
            self.listeners.push(listener);
        }
    }

    /// Builder-style [`Self::add`].
    #[must_use]
    pub fn with(mut self, listener: impl GameStateListener + 'static) -> Self {
        self.listeners.push(Box::new(listener));
        self
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    fn dispatch<F>(&mut self, event: &'static str, mut deliver: F)
    where
        F: FnMut(&mut dyn GameStateListener),
    {
        let Self {
            listeners,
            reporter,
        } = self;
        for (index, listener) in listeners.iter_mut().enumerate() {
            let result = panic::catch_unwind(AssertUnwindSafe(|| deliver(listener.as_mut())));
            if let Err(payload) = result {
                reporter(&ListenerFault {
                    index,
                    event,
                    message: panic_message(payload.as_ref()),
                });
            }
        }
    }
}

impl GameStateListener for CompositeListener {
    fn on_board_updated(&mut self, board: &Board) {
        self.dispatch("board_updated", |l| l.on_board_updated(board));
    }
    fn on_piece_spawned(&mut self, piece: &Tetromino, x: i32, y: i32) {
        self.dispatch("piece_spawned", |l| l.on_piece_spawned(piece, x, y));
    }
    fn on_next_piece(&mut self, piece: &Tetromino) {
        self.dispatch("next_piece", |l| l.on_next_piece(piece));
    }
    fn on_lines_cleared(&mut self, count: usize, cause: ClearCause) {
        self.dispatch("lines_cleared", |l| l.on_lines_cleared(count, cause));
    }
    fn on_score_changed(&mut self, score: u64) {
        self.dispatch("score_changed", |l| l.on_score_changed(score));
    }
    fn on_game_over(&mut self) {
        self.dispatch("game_over", |l| l.on_game_over());
    }
}
