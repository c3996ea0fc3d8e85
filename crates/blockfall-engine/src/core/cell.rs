use serde::{Deserialize, Serialize};

/// Cell code of an empty board cell.
pub const EMPTY: i32 = 0;

/// Value returned when reading outside of the board.
pub const OUT_OF_BOUNDS: i32 = -1;

/// Filler code used for garbage rows sent by an opponent.
///
/// Lies in the plain band but outside of the piece-kind ids so renderers can tell it apart.
pub const GARBAGE: i32 = 12;

const BAND_WIDTH: i32 = 100;

/// Item carried by a piece, and encoded into the board cells it leaves behind.
///
/// Each item owns a band of one hundred cell codes: `band * 100 + piece_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
pub enum ItemType {
    /// Duplicates the piece kind into the next slot.
    #[display("COPY")]
    Copy,
    /// Clears the row holding the marked cell, full or not.
    #[display("LINE_CLEAR")]
    LineClear,
    /// Destroys rows below the piece.
    #[display("WEIGHT")]
    Weight,
    /// Compacts every column of the board.
    #[display("GRAVITY")]
    Gravity,
    /// Compacts the columns the piece landed on.
    #[display("SPLIT")]
    Split,
}

impl ItemType {
    /// Every item type, in band order.
    pub const ALL: [ItemType; 5] = [
        ItemType::Copy,
        ItemType::LineClear,
        ItemType::Weight,
        ItemType::Gravity,
        ItemType::Split,
    ];

    const fn band(self) -> i32 {
        match self {
            ItemType::Copy => 1,
            ItemType::LineClear => 2,
            ItemType::Weight => 3,
            ItemType::Gravity => 4,
            ItemType::Split => 5,
        }
    }

    const fn from_band(band: i32) -> Option<Self> {
        match band {
            1 => Some(ItemType::Copy),
            2 => Some(ItemType::LineClear),
            3 => Some(ItemType::Weight),
            4 => Some(ItemType::Gravity),
            5 => Some(ItemType::Split),
            _ => None,
        }
    }

    /// Whether every cell of a piece carrying this item is item-coded.
    ///
    /// COPY and LINE_CLEAR mark a single cell of an otherwise normal piece.
    #[must_use]
    pub const fn marks_whole_piece(self) -> bool {
        matches!(self, ItemType::Weight | ItemType::Gravity | ItemType::Split)
    }
}

/// Builds the cell code for a piece id, optionally tagged with an item.
#[must_use]
pub const fn encode(piece_id: u8, item: Option<ItemType>) -> i32 {
    let id = piece_id as i32;
    match item {
        Some(item) => item.band() * BAND_WIDTH + id,
        None => id,
    }
}

/// Returns the piece id owning a cell code, or `0` for empty and out-of-bounds cells.
#[must_use]
pub const fn piece_id(code: i32) -> i32 {
    if code <= EMPTY {
        return 0;
    }
    code % BAND_WIDTH
}

/// Returns the item band a cell code belongs to, if any.
#[must_use]
pub const fn item_of(code: i32) -> Option<ItemType> {
    if code < BAND_WIDTH {
        return None;
    }
    ItemType::from_band(code / BAND_WIDTH)
}

/// Whether the cell code carries any item band (value ≥ 100).
#[must_use]
pub const fn is_item_coded(code: i32) -> bool {
    code >= BAND_WIDTH
}
