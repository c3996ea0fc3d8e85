use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use super::attack_pattern::AttackPattern;

/// Most garbage lines that may wait in one queue.
pub const MAX_QUEUED_LINES: usize = 10;

/// What [`AttackQueue::enqueue`] did with a pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::IsVariant)]
pub enum EnqueueOutcome {
    /// Accepted unchanged.
    Queued { lines: usize },
    /// Cut down to the remaining capacity.
    Truncated { lines: usize, dropped: usize },
    /// Rejected because the queue was already full.
    Dropped { lines: usize },
}

impl EnqueueOutcome {
    /// Lines that actually entered the queue.
    #[must_use]
    pub fn accepted_lines(self) -> usize {
        match self {
            Self::Queued { lines } | Self::Truncated { lines, .. } => lines,
            Self::Dropped { .. } => 0,
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    patterns: VecDeque<AttackPattern>,
    queued_lines: usize,
    accepted_lines: usize,
}

/// Thread-safe FIFO of garbage patterns waiting for one player.
///
/// The total of queued lines never exceeds [`MAX_QUEUED_LINES`]: a pattern
/// that would overflow is cut to the remaining capacity, and a full queue
/// rejects new patterns. Every operation takes the lock once, so it is atomic
/// with respect to the others.
///
/// # Example
///
/// ```
/// use blockfall_engine::versus::{AttackPattern, AttackQueue, EnqueueOutcome};
///
/// let queue = AttackQueue::new();
/// let rows = |n| AttackPattern::new(vec![vec![12, 0]; n]);
///
/// assert!(queue.enqueue(rows(8)).is_queued());
/// assert_eq!(
///     queue.enqueue(rows(4)),
///     EnqueueOutcome::Truncated { lines: 2, dropped: 2 }
/// );
/// assert!(queue.enqueue(rows(1)).is_dropped());
/// assert_eq!(queue.queued_lines(), 10);
/// assert_eq!(queue.dequeue().map(|p| p.lines()), Some(8));
/// ```
#[derive(Debug, Default)]
pub struct AttackQueue {
    inner: Mutex<Inner>,
}

impl AttackQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a pattern at the back, applying the line cap.
    pub fn enqueue(&self, pattern: AttackPattern) -> EnqueueOutcome {
        let mut inner = self.inner();
        let lines = pattern.lines();
        if inner.queued_lines >= MAX_QUEUED_LINES {
            return EnqueueOutcome::Dropped { lines };
        }
        let room = MAX_QUEUED_LINES - inner.queued_lines;
        let (pattern, outcome) = if lines > room {
            (
                pattern.truncated(room),
                EnqueueOutcome::Truncated {
                    lines: room,
                    dropped: lines - room,
                },
            )
        } else {
            (pattern, EnqueueOutcome::Queued { lines })
        };
        if pattern.is_empty() {
            return outcome;
        }
        inner.queued_lines += pattern.lines();
        inner.accepted_lines += pattern.lines();
        inner.patterns.push_back(pattern);
        outcome
    }

    /// Takes the oldest pattern.
    pub fn dequeue(&self) -> Option<AttackPattern> {
        let mut inner = self.inner();
        let pattern = inner.patterns.pop_front()?;
        inner.queued_lines -= pattern.lines();
        Some(pattern)
    }

    /// Total lines waiting in the queue.
    #[must_use]
    pub fn queued_lines(&self) -> usize {
        self.inner().queued_lines
    }

    /// Number of queued patterns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner().patterns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner().patterns.is_empty()
    }

    /// Lines ever accepted, after truncation.
    #[must_use]
    pub fn accepted_lines(&self) -> usize {
        self.inner().accepted_lines
    }

    /// Discards every queued pattern.
    pub fn clear(&self) {
        let mut inner = self.inner();
        inner.patterns.clear();
        inner.queued_lines = 0;
    }
}

/// Destination of outgoing attacks.
///
/// Implemented by the shared queue of a local opponent; a network client
/// implements it to serialize the pattern onto its connection.
pub trait AttackSink: Send {
    fn send_attack(&mut self, pattern: AttackPattern) -> EnqueueOutcome;
}

impl AttackSink for Arc<AttackQueue> {
    fn send_attack(&mut self, pattern: AttackPattern) -> EnqueueOutcome {
        self.enqueue(pattern)
    }
}
