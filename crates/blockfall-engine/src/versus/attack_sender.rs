use std::sync::Arc;

use rand::SeedableRng as _;
use rand_pcg::Pcg32;

use crate::engine::{ClearCause, GameStateListener, PieceSeed};

use super::{
    attack_pattern::AttackPattern,
    attack_queue::{AttackQueue, AttackSink, EnqueueOutcome},
};

/// Smallest clear that sends garbage.
pub const MIN_ATTACK_LINES: usize = 2;

/// Listener turning a player's line clears into attacks on the opponent.
///
/// A clear of `n ≥ 2` lines caused by placing a piece sends an `n`-row
/// pattern; clears caused by GRAVITY or SPLIT items never attack.
#[derive(Debug)]
pub struct AttackSender<S> {
    sink: S,
    width: usize,
    rng: Pcg32,
    sent_lines: usize,
    delivered_lines: usize,
    last_outcome: Option<EnqueueOutcome>,
}

impl<S> AttackSender<S>
where
    S: AttackSink,
{
    /// Creates a sender for an opponent board `width` cells wide.
    pub fn new(sink: S, width: usize) -> Self {
        Self::from_rng(sink, width, Pcg32::from_rng(&mut rand::rng()))
    }

    /// Like [`Self::new`], with deterministic hole columns.
    pub fn with_seed(sink: S, width: usize, seed: PieceSeed) -> Self {
        Self::from_rng(sink, width, Pcg32::from_seed(seed.bytes()))
    }

    fn from_rng(sink: S, width: usize, rng: Pcg32) -> Self {
        Self {
            sink,
            width,
            rng,
            sent_lines: 0,
            delivered_lines: 0,
            last_outcome: None,
        }
    }

    /// Lines of every attack sent, before the opponent's cap.
    #[must_use]
    pub fn sent_lines(&self) -> usize {
        self.sent_lines
    }

    /// Lines the opponent's queue accepted.
    #[must_use]
    pub fn delivered_lines(&self) -> usize {
        self.delivered_lines
    }

    /// What the opponent's queue did with the most recent attack.
    #[must_use]
    pub fn last_outcome(&self) -> Option<EnqueueOutcome> {
        self.last_outcome
    }

    /// The destination attacks are sent to.
    pub fn sink(&self) -> &S {
        &self.sink
    }
}

impl<S> GameStateListener for AttackSender<S>
where
    S: AttackSink,
{
    fn on_lines_cleared(&mut self, count: usize, cause: ClearCause) {
        if cause.is_gravity_or_split() || count < MIN_ATTACK_LINES {
            return;
        }
        let pattern = AttackPattern::generate(count, self.width, &mut self.rng);
        let outcome = self.sink.send_attack(pattern);
        self.sent_lines += count;
        self.delivered_lines += outcome.accepted_lines();
        self.last_outcome = Some(outcome);
    }
}

/// One side of a local versus match.
#[derive(Debug)]
pub struct VersusLink {
    /// Garbage waiting for this player; hand it to the player's engine.
    pub incoming: Arc<AttackQueue>,
    /// This player's attacks, aimed at the other player's queue; register it as a listener.
    pub outgoing: AttackSender<Arc<AttackQueue>>,
}

/// Cross-wires two players on boards `width` cells wide.
#[must_use]
pub fn local_pair(width: usize, seed: Option<PieceSeed>) -> (VersusLink, VersusLink) {
    let queues = [Arc::new(AttackQueue::new()), Arc::new(AttackQueue::new())];
    let sender = |target: &Arc<AttackQueue>, salt: u64| match seed {
        Some(seed) => AttackSender::with_seed(Arc::clone(target), width, salted(seed, salt)),
        None => AttackSender::new(Arc::clone(target), width),
    };
    let first = VersusLink {
        incoming: Arc::clone(&queues[0]),
        outgoing: sender(&queues[1], 1),
    };
    let second = VersusLink {
        incoming: Arc::clone(&queues[1]),
        outgoing: sender(&queues[0], 2),
    };
    (first, second)
}

fn salted(seed: PieceSeed, salt: u64) -> PieceSeed {
    let mut bytes = seed.bytes();
    for (byte, salt) in bytes.iter_mut().zip(salt.to_le_bytes()) {
        *byte ^= salt;
    }
    PieceSeed::from_bytes(bytes)
}
