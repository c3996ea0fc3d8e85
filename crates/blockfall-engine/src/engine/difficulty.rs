use serde::{Deserialize, Serialize};

use crate::core::PieceKind;

/// Game mode, selecting the piece weights and the speed-up rate.
///
/// ITEM and VERSUS play with the NORMAL tables; ITEM also turns item pieces on.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display,
)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    #[display("easy")]
    Easy,
    #[default]
    #[display("normal")]
    Normal,
    #[display("hard")]
    Hard,
    #[display("item")]
    Item,
    #[display("versus")]
    Versus,
}

impl Difficulty {
    /// Roulette weight of a normal piece kind. Item kinds are never drawn by weight.
    #[must_use]
    pub const fn weight(self, kind: PieceKind) -> u32 {
        if kind.is_item_kind() {
            return 0;
        }
        match (self, kind) {
            (Difficulty::Easy, PieceKind::I) => 12,
            (Difficulty::Hard, PieceKind::I) => 8,
            _ => 10,
        }
    }

    /// Weight table over the seven normal kinds, in [`PieceKind::NORMAL`] order.
    #[must_use]
    pub fn weights(self) -> [(PieceKind, u32); 7] {
        PieceKind::NORMAL.map(|kind| (kind, self.weight(kind)))
    }

    /// Scale applied to every speed-factor increment.
    #[must_use]
    pub const fn speed_multiplier(self) -> f64 {
        match self {
            Difficulty::Easy => 0.8,
            Difficulty::Hard => 1.2,
            Difficulty::Normal | Difficulty::Item | Difficulty::Versus => 1.0,
        }
    }

    /// Whether item pieces are generated and their effects applied by default.
    #[must_use]
    pub const fn has_items(self) -> bool {
        matches!(self, Difficulty::Item)
    }
}
