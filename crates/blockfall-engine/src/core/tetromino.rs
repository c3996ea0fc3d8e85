use arrayvec::ArrayVec;
use serde::{Deserialize, Serialize};

use super::cell::ItemType;

/// Side length of the square matrix every shape is stored in.
pub const SHAPE_SIZE: usize = 4;

/// Piece shape as a 4×4 occupancy matrix (`1` = occupied), indexed `[row][col]`.
pub type Shape = [[u8; SHAPE_SIZE]; SHAPE_SIZE];

/// Kind of a falling piece.
///
/// The seven classic tetrominoes plus four item kinds with their own shapes.
/// The discriminant is the piece id written into board cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[repr(u8)]
pub enum PieceKind {
    I = 1,
    O = 2,
    T = 3,
    S = 4,
    Z = 5,
    J = 6,
    L = 7,
    Weight = 8,
    Copy = 9,
    Gravity = 10,
    Split = 11,
}

impl PieceKind {
    /// Number of piece kinds, items included.
    pub const LEN: usize = 11;

    /// The seven kinds produced by regular piece generation.
    pub const NORMAL: [PieceKind; 7] = [
        PieceKind::I,
        PieceKind::O,
        PieceKind::T,
        PieceKind::S,
        PieceKind::Z,
        PieceKind::J,
        PieceKind::L,
    ];

    pub const ALL: [PieceKind; Self::LEN] = [
        PieceKind::I,
        PieceKind::O,
        PieceKind::T,
        PieceKind::S,
        PieceKind::Z,
        PieceKind::J,
        PieceKind::L,
        PieceKind::Weight,
        PieceKind::Copy,
        PieceKind::Gravity,
        PieceKind::Split,
    ];

    /// Stable id of the kind, used as the base value of its board cells.
    #[must_use]
    pub const fn id(self) -> u8 {
        self as u8
    }

    /// Looks up the kind whose id is written into board cells.
    #[must_use]
    pub fn from_id(id: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| i32::from(kind.id()) == id)
    }

    /// Whether this is one of the item kinds rather than a classic tetromino.
    #[must_use]
    pub const fn is_item_kind(self) -> bool {
        matches!(
            self,
            PieceKind::Weight | PieceKind::Copy | PieceKind::Gravity | PieceKind::Split
        )
    }

    /// WEIGHT, GRAVITY and SPLIT pieces keep their orientation.
    #[must_use]
    pub const fn can_rotate(self) -> bool {
        !matches!(
            self,
            PieceKind::Weight | PieceKind::Gravity | PieceKind::Split
        )
    }

    /// Item implied by the kind itself, if any.
    #[must_use]
    pub const fn intrinsic_item(self) -> Option<ItemType> {
        match self {
            PieceKind::Weight => Some(ItemType::Weight),
            PieceKind::Copy => Some(ItemType::Copy),
            PieceKind::Gravity => Some(ItemType::Gravity),
            PieceKind::Split => Some(ItemType::Split),
            _ => None,
        }
    }

    /// Size of the square the shape rotates within (4 for I, 2 for O, 3 for most others).
    #[must_use]
    pub const fn size(self) -> usize {
        match self {
            PieceKind::I | PieceKind::Weight | PieceKind::Split => 4,
            PieceKind::O | PieceKind::Gravity => 2,
            PieceKind::T
            | PieceKind::S
            | PieceKind::Z
            | PieceKind::J
            | PieceKind::L
            | PieceKind::Copy => 3,
        }
    }

    /// Returns the shape of this kind in the given rotation state.
    #[must_use]
    pub fn shape(self, rotation: u8) -> Shape {
        PIECE_SHAPES[usize::from(self.id() - 1)][usize::from(rotation % 4)]
    }

    /// Returns the single character representation of this piece kind.
    ///
    /// # Examples
    ///
    /// ```
    /// use blockfall_engine::PieceKind;
    ///
    /// assert_eq!(PieceKind::I.as_char(), 'I');
    /// assert_eq!(PieceKind::Gravity.as_char(), 'G');
    /// ```
    #[must_use]
    pub const fn as_char(self) -> char {
        match self {
            PieceKind::I => 'I',
            PieceKind::O => 'O',
            PieceKind::T => 'T',
            PieceKind::S => 'S',
            PieceKind::Z => 'Z',
            PieceKind::J => 'J',
            PieceKind::L => 'L',
            PieceKind::Weight => 'W',
            PieceKind::Copy => 'C',
            PieceKind::Gravity => 'G',
            PieceKind::Split => 'X',
        }
    }

    /// Parses a piece kind from a single character.
    #[must_use]
    pub const fn from_char(c: char) -> Option<Self> {
        match c {
            'I' => Some(PieceKind::I),
            'O' => Some(PieceKind::O),
            'T' => Some(PieceKind::T),
            'S' => Some(PieceKind::S),
            'Z' => Some(PieceKind::Z),
            'J' => Some(PieceKind::J),
            'L' => Some(PieceKind::L),
            'W' => Some(PieceKind::Weight),
            'C' => Some(PieceKind::Copy),
            'G' => Some(PieceKind::Gravity),
            'X' => Some(PieceKind::Split),
            _ => None,
        }
    }
}

/// A falling piece: kind, rotation state, shape and item metadata.
///
/// Values are immutable; [`Tetromino::rotate_clockwise`] returns a new piece.
/// Item pieces of type COPY or LINE_CLEAR mark exactly one of their four cells,
/// identified by its index in row-major order of the occupied cells. The marked
/// cell is carried through rotations.
///
/// # Example
///
/// ```
/// use blockfall_engine::{ItemType, PieceKind, Tetromino};
///
/// let piece = Tetromino::line_clear_item(PieceKind::L, 0, 3);
/// assert_eq!(piece.item_type(), Some(ItemType::LineClear));
/// assert_eq!(piece.line_clear_block_index(), 3);
///
/// let rotated = piece.rotate_clockwise();
/// assert_eq!(rotated.rotation_index(), 1);
/// assert_eq!(rotated.block_positions().len(), 4);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tetromino {
    kind: PieceKind,
    rotation: u8,
    shape: Shape,
    locked: bool,
    item_type: Option<ItemType>,
    marked_cell: Option<(usize, usize)>,
}

impl Tetromino {
    /// Creates a piece of the given kind in its spawn rotation.
    ///
    /// Item kinds carry their own item; a COPY piece marks its first cell.
    #[must_use]
    pub fn of(kind: PieceKind) -> Self {
        match kind.intrinsic_item() {
            Some(ItemType::Copy) => Self::item(kind, 0, ItemType::Copy, 0),
            item => Self {
                kind,
                rotation: 0,
                shape: kind.shape(0),
                locked: false,
                item_type: item,
                marked_cell: None,
            },
        }
    }

    /// Creates an item piece of the given kind and rotation.
    ///
    /// For COPY and LINE_CLEAR, `block_index` selects the marked cell among the
    /// occupied cells of the rotated shape; an out-of-range index leaves no cell marked.
    /// WEIGHT, GRAVITY and SPLIT mark every cell and ignore the index.
    #[must_use]
    pub fn item(kind: PieceKind, rotation: u8, item_type: ItemType, block_index: i32) -> Self {
        let rotation = if kind.can_rotate() { rotation % 4 } else { 0 };
        let shape = kind.shape(rotation);
        let marked_cell = if item_type.marks_whole_piece() {
            None
        } else {
            usize::try_from(block_index)
                .ok()
                .and_then(|index| occupied_cells(&shape).nth(index))
        };
        Self {
            kind,
            rotation,
            shape,
            locked: false,
            item_type: Some(item_type),
            marked_cell,
        }
    }

    /// Shorthand for a LINE_CLEAR item piece.
    #[must_use]
    pub fn line_clear_item(kind: PieceKind, rotation: u8, block_index: i32) -> Self {
        Self::item(kind, rotation, ItemType::LineClear, block_index)
    }

    /// The piece kind.
    #[must_use]
    pub fn kind(&self) -> PieceKind {
        self.kind
    }

    /// Id written into the board cells this piece locks.
    #[must_use]
    pub fn id(&self) -> u8 {
        self.kind.id()
    }

    /// Clockwise quarter turns from the spawn rotation, `0..4`.
    #[must_use]
    pub fn rotation_index(&self) -> u8 {
        self.rotation
    }

    /// Occupancy matrix for the current rotation.
    #[must_use]
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Width of the piece's bounding square, used to center spawns.
    #[must_use]
    pub fn size(&self) -> usize {
        self.kind.size()
    }

    /// Whether the piece has been locked into the board.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Returns this piece flagged as locked into the board.
    #[must_use]
    pub fn into_locked(self) -> Self {
        Self {
            locked: true,
            ..self
        }
    }

    /// Whether rotation changes this piece.
    #[must_use]
    pub fn can_rotate(&self) -> bool {
        self.kind.can_rotate()
    }

    /// The item carried by the piece, if any.
    #[must_use]
    pub fn item_type(&self) -> Option<ItemType> {
        self.item_type
    }

    /// Returns a plain copy of this piece with no item attached.
    #[must_use]
    pub fn without_item(self) -> Self {
        Self {
            item_type: None,
            marked_cell: None,
            ..self
        }
    }

    /// The `(row, col)` within the shape of the single item-coded cell, if any.
    #[must_use]
    pub fn marked_cell(&self) -> Option<(usize, usize)> {
        self.marked_cell
    }

    /// Index of the COPY cell among the occupied cells, or `-1`.
    #[must_use]
    pub fn copy_block_index(&self) -> i32 {
        self.marked_index_for(ItemType::Copy)
    }

    /// Shape row of the COPY cell, or `-1`.
    #[must_use]
    pub fn copy_block_row(&self) -> i32 {
        self.marked_coord_for(ItemType::Copy).0
    }

    /// Shape column of the COPY cell, or `-1`.
    #[must_use]
    pub fn copy_block_col(&self) -> i32 {
        self.marked_coord_for(ItemType::Copy).1
    }

    /// Index of the LINE_CLEAR cell among the occupied cells, or `-1`.
    #[must_use]
    pub fn line_clear_block_index(&self) -> i32 {
        self.marked_index_for(ItemType::LineClear)
    }

    /// Shape row of the LINE_CLEAR cell, or `-1`.
    #[must_use]
    pub fn line_clear_block_row(&self) -> i32 {
        self.marked_coord_for(ItemType::LineClear).0
    }

    /// Shape column of the LINE_CLEAR cell, or `-1`.
    #[must_use]
    pub fn line_clear_block_col(&self) -> i32 {
        self.marked_coord_for(ItemType::LineClear).1
    }

    fn marked_index_for(&self, item: ItemType) -> i32 {
        match self.marked_cell {
            Some(cell) if self.item_type == Some(item) => occupied_cells(&self.shape)
                .position(|c| c == cell)
                .and_then(|index| i32::try_from(index).ok())
                .unwrap_or(-1),
            _ => -1,
        }
    }

    fn marked_coord_for(&self, item: ItemType) -> (i32, i32) {
        match self.marked_cell {
            Some((row, col)) if self.item_type == Some(item) => (to_i32(row), to_i32(col)),
            _ => (-1, -1),
        }
    }

    /// Returns the `(row, col)` of every occupied cell, in row-major order.
    #[must_use]
    pub fn block_positions(&self) -> ArrayVec<(usize, usize), 4> {
        occupied_cells(&self.shape).collect()
    }

    /// Returns the piece rotated 90° clockwise.
    ///
    /// Non-rotatable kinds come back unchanged. A marked item cell follows
    /// the rotation so its index and coordinates stay valid.
    #[must_use]
    pub fn rotate_clockwise(&self) -> Self {
        if !self.can_rotate() {
            return *self;
        }
        let size = self.kind.size();
        let rotation = (self.rotation + 1) % 4;
        Self {
            rotation,
            shape: self.kind.shape(rotation),
            marked_cell: self
                .marked_cell
                .map(|(row, col)| (col, size - 1 - row)),
            ..*self
        }
    }
}

fn to_i32(value: usize) -> i32 {
    i32::try_from(value).unwrap_or(-1)
}

fn occupied_cells(shape: &Shape) -> impl Iterator<Item = (usize, usize)> + '_ {
    shape.iter().enumerate().flat_map(|(row, cells)| {
        cells
            .iter()
            .enumerate()
            .filter(|(_, cell)| **cell != 0)
            .map(move |(col, _)| (row, col))
    })
}

/// Generates all 4 rotation states of a shape by rotating 90° clockwise.
///
/// Cell `(row, col)` of one state moves to `(col, size - 1 - row)` in the next.
const fn shape_rotations(size: usize, shape: &Shape) -> [Shape; 4] {
    let mut rotates = [*shape; 4];
    let mut i = 1;
    while i < 4 {
        let mut new_shape = [[0; SHAPE_SIZE]; SHAPE_SIZE];
        let mut y = 0;
        while y < size {
            let mut x = 0;
            while x < size {
                new_shape[y][x] = rotates[i - 1][size - 1 - x][y];
                x += 1;
            }
            y += 1;
        }
        rotates[i] = new_shape;
        i += 1;
    }
    rotates
}

const PIECE_SHAPES: [[Shape; 4]; PieceKind::LEN] = {
    const E: [u8; 4] = [0; 4];
    [
        // I
        shape_rotations(4, &[E, [1, 1, 1, 1], E, E]),
        // O
        shape_rotations(2, &[[1, 1, 0, 0], [1, 1, 0, 0], E, E]),
        // T
        shape_rotations(3, &[[0, 1, 0, 0], [1, 1, 1, 0], E, E]),
        // S
        shape_rotations(3, &[[0, 1, 1, 0], [1, 1, 0, 0], E, E]),
        // Z
        shape_rotations(3, &[[1, 1, 0, 0], [0, 1, 1, 0], E, E]),
        // J
        shape_rotations(3, &[[1, 0, 0, 0], [1, 1, 1, 0], E, E]),
        // L
        shape_rotations(3, &[[0, 0, 1, 0], [1, 1, 1, 0], E, E]),
        // WEIGHT: flat slab
        shape_rotations(4, &[[1, 1, 1, 1], E, E, E]),
        // COPY
        shape_rotations(3, &[[1, 1, 0, 0], [0, 1, 1, 0], E, E]),
        // GRAVITY
        shape_rotations(2, &[[1, 1, 0, 0], [1, 1, 0, 0], E, E]),
        // SPLIT: two detached columns
        shape_rotations(4, &[[1, 0, 0, 1], [1, 0, 0, 1], E, E]),
    ]
};
