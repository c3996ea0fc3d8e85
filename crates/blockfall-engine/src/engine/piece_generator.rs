use std::fmt::Write as _;

use rand::{
    Rng, SeedableRng as _,
    distr::{Distribution, StandardUniform},
};
use rand_pcg::Pcg32;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::core::{ItemType, PieceKind, Tetromino};

use super::difficulty::Difficulty;

/// Lines that must be cleared between two item pieces in item mode.
pub const LINES_PER_ITEM: usize = 10;

/// Seed for deterministic piece generation.
///
/// A 128-bit seed, serialized as a 32-character hex string. Two generators
/// built from the same seed and difficulty produce the same pieces.
///
/// # Example
///
/// ```
/// use blockfall_engine::{Difficulty, PieceGenerator, PieceSeed};
/// use rand::Rng as _;
///
/// let seed: PieceSeed = rand::rng().random();
/// let mut a = PieceGenerator::with_seed(Difficulty::Normal, seed);
/// let mut b = PieceGenerator::with_seed(Difficulty::Normal, seed);
/// assert_eq!(a.roulette(), b.roulette());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PieceSeed([u8; 16]);

impl PieceSeed {
    /// Expands a small integer into a full seed, for tests and command lines.
    #[must_use]
    pub fn from_u64(value: u64) -> Self {
        Self(u128::from(value).to_be_bytes())
    }

    #[must_use]
    pub(crate) fn bytes(self) -> [u8; 16] {
        self.0
    }

    #[must_use]
    pub(crate) fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }
}

impl Serialize for PieceSeed {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let num = u128::from_be_bytes(self.0);
        let mut hex_str = String::with_capacity(2 * self.0.len());
        write!(&mut hex_str, "{num:032x}").map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&hex_str)
    }
}

impl<'de> Deserialize<'de> for PieceSeed {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let hex_str = String::deserialize(deserializer)?;
        if hex_str.len() != 32 {
            return Err(serde::de::Error::custom(format!(
                "invalid hex: expected 32 characters, got {}",
                hex_str.len()
            )));
        }
        let num = u128::from_str_radix(&hex_str, 16)
            .map_err(|e| serde::de::Error::custom(format!("invalid hex: {hex_str} ({e})")))?;
        Ok(Self(num.to_be_bytes()))
    }
}

impl Distribution<PieceSeed> for StandardUniform {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> PieceSeed {
        let mut seed = [0; 16];
        rng.fill(&mut seed);
        PieceSeed(seed)
    }
}

/// Picks the kind whose cumulative weight first exceeds `draw`.
///
/// `draw` must lie in `0..Σweights`; larger draws fall back to the last kind.
#[must_use]
pub fn select_weighted(weights: &[(PieceKind, u32)], draw: u32) -> PieceKind {
    let mut cumulative = 0;
    for &(kind, weight) in weights {
        cumulative += weight;
        if draw < cumulative {
            return kind;
        }
    }
    weights.last().map_or(PieceKind::T, |&(kind, _)| kind)
}

/// Produces the piece sequence of a game.
///
/// Normal pieces are drawn by roulette-wheel selection over the difficulty's
/// weight table. In item mode, each time the cleared-line total reaches a new
/// multiple of [`LINES_PER_ITEM`], the next generated piece is an item piece.
#[derive(Debug, Clone)]
pub struct PieceGenerator {
    rng: Pcg32,
    seed: Option<PieceSeed>,
    difficulty: Difficulty,
    item_milestones: usize,
}

impl PieceGenerator {
    /// Creates a generator seeded from the OS random source.
    ///
    /// Every game played with it draws a fresh sequence.
    #[must_use]
    pub fn new(difficulty: Difficulty) -> Self {
        let seed: PieceSeed = rand::rng().random();
        Self {
            rng: Pcg32::from_seed(seed.bytes()),
            seed: None,
            difficulty,
            item_milestones: 0,
        }
    }

    /// Like [`Self::new`], but deterministic: every game replays the sequence of `seed`.
    #[must_use]
    pub fn with_seed(difficulty: Difficulty, seed: PieceSeed) -> Self {
        Self {
            rng: Pcg32::from_seed(seed.bytes()),
            seed: Some(seed),
            difficulty,
            item_milestones: 0,
        }
    }

    /// The game mode selecting the weight table.
    #[must_use]
    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    /// Prepares for a new game: forgets the item milestones reached so far
    /// and, for a seeded generator, rewinds to the start of its sequence.
    pub fn reset(&mut self) {
        self.item_milestones = 0;
        if let Some(seed) = self.seed {
            self.rng = Pcg32::from_seed(seed.bytes());
        }
    }

    /// Draws a normal kind by roulette-wheel selection.
    pub fn roulette(&mut self) -> PieceKind {
        let weights = self.difficulty.weights();
        let total: u32 = weights.iter().map(|(_, w)| w).sum();
        let draw = self.rng.random_range(0..total);
        select_weighted(&weights, draw)
    }

    /// Generates the next piece given the lines cleared so far.
    pub fn generate(&mut self, total_lines_cleared: usize, item_mode: bool) -> Tetromino {
        let milestone = total_lines_cleared / LINES_PER_ITEM;
        if item_mode && milestone > self.item_milestones {
            self.item_milestones = milestone;
            return self.item_piece();
        }
        Tetromino::of(self.roulette())
    }

    /// Generates a random item piece.
    ///
    /// COPY and LINE_CLEAR ride on a normal kind with one random marked cell;
    /// the other items use their own kinds.
    pub fn item_piece(&mut self) -> Tetromino {
        let item = ItemType::ALL[self.rng.random_range(0..ItemType::ALL.len())];
        match item {
            ItemType::Copy | ItemType::LineClear => {
                let kind = self.roulette();
                let block_index = self.rng.random_range(0..4);
                Tetromino::item(kind, 0, item, block_index)
            }
            ItemType::Weight => Tetromino::of(PieceKind::Weight),
            ItemType::Gravity => Tetromino::of(PieceKind::Gravity),
            ItemType::Split => Tetromino::of(PieceKind::Split),
        }
    }
}
