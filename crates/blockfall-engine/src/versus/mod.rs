//! Garbage exchange between two players.
//!
//! A player's [`AttackSender`] watches its own line clears and pushes
//! [`AttackPattern`]s into the opponent's [`AttackQueue`]; the opponent's
//! engine drains that queue on its next spawn. The queue is the only shared
//! state, so the opponent may be another local engine or a network peer
//! feeding the queue from its receive thread.

pub use self::{attack_pattern::*, attack_queue::*, attack_sender::*};

mod attack_pattern;
mod attack_queue;
mod attack_sender;
