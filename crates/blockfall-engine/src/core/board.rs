use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

use super::{
    cell::{self, EMPTY, ItemType, OUT_OF_BOUNDS},
    tetromino::{PieceKind, Shape},
};

/// Fixed-size playfield of integer cell codes.
///
/// Rows are stored top to bottom (row 0 is the top), columns left to right.
/// See [`cell`](super::cell) for the meaning of cell codes.
///
/// Coordinates are signed because pieces are positioned by the top-left corner
/// of their 4×4 shape box, which may hang outside the grid. Reads outside the
/// grid return [`OUT_OF_BOUNDS`] and writes outside the grid are ignored.
///
/// # Example
///
/// ```
/// use blockfall_engine::{Board, PieceKind, Tetromino};
///
/// let mut board = Board::standard();
/// let piece = Tetromino::of(PieceKind::O);
/// assert!(board.fits(piece.shape(), 0, 18));
///
/// board.place_piece(piece.shape(), 0, 18, piece.id());
/// assert!(board.is_occupied(0, 19));
/// assert!(!board.fits(piece.shape(), 0, 18));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawBoard")]
pub struct Board {
    width: usize,
    height: usize,
    cells: Vec<i32>,
}

/// Unchecked serialized form of [`Board`].
#[derive(Deserialize)]
struct RawBoard {
    width: usize,
    height: usize,
    cells: Vec<i32>,
}

impl TryFrom<RawBoard> for Board {
    type Error = ConfigError;

    fn try_from(raw: RawBoard) -> Result<Self, Self::Error> {
        let RawBoard {
            width,
            height,
            cells,
        } = raw;
        let mut board = Self::new(width, height)?;
        if cells.len() != board.cells.len() {
            return Err(ConfigError::InvalidBoardSize { width, height });
        }
        board.cells = cells;
        Ok(board)
    }
}

/// Result of removing full rows from the board.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClearedLines {
    /// Indices of the removed rows, as they were before removal (top to bottom).
    pub rows: Vec<usize>,
    /// Item-coded cell values found in the removed rows.
    pub item_cells: Vec<i32>,
}

impl ClearedLines {
    /// Number of rows removed.
    #[must_use]
    pub fn count(&self) -> usize {
        self.rows.len()
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::standard()
    }
}

impl Board {
    pub const STANDARD_WIDTH: usize = 10;
    pub const STANDARD_HEIGHT: usize = 20;

    /// Creates an empty board.
    ///
    /// Both dimensions must be positive.
    pub fn new(width: usize, height: usize) -> Result<Self, ConfigError> {
        if width == 0 || height == 0 || i32::try_from(width.max(height)).is_err() {
            return Err(ConfigError::InvalidBoardSize { width, height });
        }
        Ok(Self {
            width,
            height,
            cells: vec![EMPTY; width * height],
        })
    }

    /// Creates an empty 10×20 board.
    #[must_use]
    pub fn standard() -> Self {
        Self {
            width: Self::STANDARD_WIDTH,
            height: Self::STANDARD_HEIGHT,
            cells: vec![EMPTY; Self::STANDARD_WIDTH * Self::STANDARD_HEIGHT],
        }
    }

    /// Number of columns.
    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of rows.
    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        let x = usize::try_from(x).ok().filter(|x| *x < self.width)?;
        let y = usize::try_from(y).ok().filter(|y| *y < self.height)?;
        Some(y * self.width + x)
    }

    /// Returns the cell code at column `x`, row `y`, or [`OUT_OF_BOUNDS`].
    #[must_use]
    pub fn get_cell(&self, x: i32, y: i32) -> i32 {
        self.index(x, y).map_or(OUT_OF_BOUNDS, |i| self.cells[i])
    }

    /// Writes a cell code. Writes outside the board are ignored.
    pub fn set_cell(&mut self, x: i32, y: i32, value: i32) {
        if let Some(i) = self.index(x, y) {
            self.cells[i] = value;
        }
    }

    /// Whether the cell is filled. Cells outside the board count as occupied.
    #[must_use]
    pub fn is_occupied(&self, x: i32, y: i32) -> bool {
        self.get_cell(x, y) != EMPTY
    }

    /// Whether every occupied cell of `shape`, with its top-left corner at `(x, y)`,
    /// lands on an empty in-bounds cell.
    #[must_use]
    pub fn fits(&self, shape: &Shape, x: i32, y: i32) -> bool {
        shape_cells(shape, x, y).all(|(cx, cy)| !self.is_occupied(cx, cy))
    }

    /// Writes the piece id into every occupied cell of `shape`, clipping to the board.
    pub fn place_piece(&mut self, shape: &Shape, x: i32, y: i32, piece_id: u8) {
        let value = cell::encode(piece_id, None);
        for (cx, cy) in shape_cells(shape, x, y) {
            self.set_cell(cx, cy, value);
        }
    }

    /// Writes an item piece, clipping to the board.
    ///
    /// With `marked` set to a shape-relative `(row, col)`, only that cell is
    /// item-coded and the rest are plain; with `None` every cell is item-coded.
    pub fn place_item_piece(
        &mut self,
        shape: &Shape,
        x: i32,
        y: i32,
        piece_id: u8,
        item: ItemType,
        marked: Option<(usize, usize)>,
    ) {
        let plain = cell::encode(piece_id, None);
        let coded = cell::encode(piece_id, Some(item));
        for (row, cells) in shape.iter().enumerate() {
            for (col, &occupied) in cells.iter().enumerate() {
                if occupied == 0 {
                    continue;
                }
                let value = match marked {
                    Some(pos) if pos != (row, col) => plain,
                    _ => coded,
                };
                self.set_cell(x + to_i32(col), y + to_i32(row), value);
            }
        }
    }

    /// Returns the rows of the board, top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = &[i32]> {
        self.cells.chunks_exact(self.width)
    }

    /// Returns a single row, or `None` when out of range.
    #[must_use]
    pub fn row(&self, y: usize) -> Option<&[i32]> {
        (y < self.height).then(|| &self.cells[y * self.width..][..self.width])
    }

    fn is_row_full(&self, y: usize) -> bool {
        self.row(y)
            .is_some_and(|row| row.iter().all(|&value| value != EMPTY))
    }

    /// Indices of completely filled rows, top to bottom.
    #[must_use]
    pub fn full_line_indices(&self) -> Vec<usize> {
        (0..self.height).filter(|&y| self.is_row_full(y)).collect()
    }

    /// Removes full rows and shifts everything above them down.
    ///
    /// Returns the number of rows removed.
    pub fn clear_full_lines(&mut self) -> usize {
        self.clear_full_lines_detailed().count()
    }

    /// Like [`Self::clear_full_lines`], invoking `on_item_cleared` once if any
    /// removed row contained an item-coded cell.
    pub fn clear_full_lines_with<F>(&mut self, on_item_cleared: F) -> usize
    where
        F: FnOnce(),
    {
        let cleared = self.clear_full_lines_detailed();
        if !cleared.item_cells.is_empty() {
            on_item_cleared();
        }
        cleared.count()
    }

    /// Removes full rows, reporting which rows went and which item cells they held.
    pub fn clear_full_lines_detailed(&mut self) -> ClearedLines {
        let mut cleared = ClearedLines::default();
        let width = self.width;
        let mut count = 0;
        for y in (0..self.height).rev() {
            if self.is_row_full(y) {
                let row = &self.cells[y * width..][..width];
                cleared
                    .item_cells
                    .extend(row.iter().copied().filter(|&v| cell::is_item_coded(v)));
                cleared.rows.push(y);
                count += 1;
                continue;
            }
            if count > 0 {
                self.cells
                    .copy_within(y * width..(y + 1) * width, (y + count) * width);
            }
        }
        self.cells[..count * width].fill(EMPTY);
        cleared.rows.reverse();
        cleared
    }

    /// Removes row `y` whether or not it is full; rows above shift down by one.
    ///
    /// Returns `false` when `y` is out of range.
    pub fn remove_row(&mut self, y: usize) -> bool {
        if y >= self.height {
            return false;
        }
        let width = self.width;
        self.cells.copy_within(..y * width, width);
        self.cells[..width].fill(EMPTY);
        true
    }

    /// Empties row `y` in place without shifting anything.
    pub fn empty_row(&mut self, y: usize) {
        if y < self.height {
            self.cells[y * self.width..][..self.width].fill(EMPTY);
        }
    }

    /// Drops every filled cell of every column as far down as it goes.
    ///
    /// Columns are handled independently and keep the vertical order of their
    /// cells. Applying it twice is the same as applying it once.
    pub fn apply_gravity(&mut self) {
        for x in 0..self.width {
            self.compact_column(x);
        }
    }

    /// Gravity for a single column.
    pub fn compact_column(&mut self, x: usize) {
        if x >= self.width {
            return;
        }
        let mut write = self.height;
        for y in (0..self.height).rev() {
            let value = self.cells[y * self.width + x];
            if value == EMPTY {
                continue;
            }
            write -= 1;
            if write != y {
                self.cells[write * self.width + x] = value;
                self.cells[y * self.width + x] = EMPTY;
            }
        }
    }

    /// Pushes `rows` in at the bottom, lifting existing content.
    ///
    /// The first row of `rows` ends up highest. Content lifted past the top is lost.
    /// Rows are padded with empty cells or truncated to the board width.
    pub fn push_rows_from_bottom(&mut self, rows: &[Vec<i32>]) {
        let width = self.width;
        let n = rows.len().min(self.height);
        if n == 0 {
            return;
        }
        self.cells.copy_within(n * width.., 0);
        let start = (self.height - n) * width;
        for (i, row) in rows[rows.len() - n..].iter().enumerate() {
            let target = &mut self.cells[start + i * width..][..width];
            target.fill(EMPTY);
            let len = row.len().min(width);
            target[..len].copy_from_slice(&row[..len]);
        }
    }

    /// Returns a deep copy of the grid as plain rows.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Vec<i32>> {
        self.rows().map(<[i32]>::to_vec).collect()
    }

    /// Empties every cell.
    pub fn clear(&mut self) {
        self.cells.fill(EMPTY);
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.rows() {
            for &value in row {
                let c = match value {
                    EMPTY => '.',
                    cell::GARBAGE => '#',
                    v => cell::item_of(v).map_or_else(
                        || PieceKind::from_id(cell::piece_id(v)).map_or('?', PieceKind::as_char),
                        |_| '*',
                    ),
                };
                write!(f, "{c}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

fn to_i32(value: usize) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

/// Board coordinates of the occupied cells of `shape` placed at `(x, y)`.
pub(crate) fn shape_cells(shape: &Shape, x: i32, y: i32) -> impl Iterator<Item = (i32, i32)> + '_ {
    shape.iter().enumerate().flat_map(move |(row, cells)| {
        cells
            .iter()
            .enumerate()
            .filter(|(_, cell)| **cell != 0)
            .map(move |(col, _)| (x + to_i32(col), y + to_i32(row)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tetromino::Tetromino;

    fn fill_row(board: &mut Board, y: i32, value: i32) {
        for x in 0..10 {
            board.set_cell(x, y, value);
        }
    }

    #[test]
    fn test_new_rejects_empty_dimensions() {
        assert!(Board::new(0, 20).is_err());
        assert!(Board::new(10, 0).is_err());
        let board = Board::new(6, 12).unwrap();
        assert_eq!((board.width(), board.height()), (6, 12));
        assert!(board.rows().flatten().all(|&v| v == EMPTY));
    }

    #[test]
    fn test_deserialize_checks_dimensions() {
        let board: Board =
            serde_json::from_str(r#"{"width":2,"height":1,"cells":[0,3]}"#).unwrap();
        assert_eq!(board.get_cell(1, 0), 3);
        assert_eq!(board.snapshot(), vec![vec![0, 3]]);

        assert!(serde_json::from_str::<Board>(r#"{"width":0,"height":3,"cells":[]}"#).is_err());
        assert!(serde_json::from_str::<Board>(r#"{"width":10,"height":20,"cells":[0]}"#).is_err());

        let json = serde_json::to_string(&Board::standard()).unwrap();
        assert_eq!(serde_json::from_str::<Board>(&json).unwrap(), Board::standard());
    }

    #[test]
    fn test_out_of_bounds_access() {
        let mut board = Board::standard();
        assert_eq!(board.get_cell(-1, 0), OUT_OF_BOUNDS);
        assert_eq!(board.get_cell(10, 0), OUT_OF_BOUNDS);
        assert_eq!(board.get_cell(0, 20), OUT_OF_BOUNDS);
        assert!(board.is_occupied(-1, 5));
        assert!(board.is_occupied(3, 20));

        board.set_cell(-1, 0, 5);
        board.set_cell(10, 19, 5);
        assert_eq!(board, Board::standard());

        board.set_cell(9, 19, 5);
        assert_eq!(board.get_cell(9, 19), 5);
    }

    #[test]
    fn test_fits_checks_walls_floor_and_blocks() {
        let mut board = Board::standard();
        let i = Tetromino::of(PieceKind::I);
        // Horizontal I sits in shape row 1.
        assert!(board.fits(i.shape(), 0, 0));
        assert!(board.fits(i.shape(), 6, 18));
        assert!(!board.fits(i.shape(), 7, 0));
        assert!(!board.fits(i.shape(), -1, 0));
        assert!(!board.fits(i.shape(), 0, 19));
        // Empty shape rows may hang above the board.
        assert!(board.fits(i.shape(), 0, -1));

        board.set_cell(3, 10, 1);
        assert!(!board.fits(i.shape(), 0, 9));
        assert!(board.fits(i.shape(), 4, 9));
    }

    #[test]
    fn test_place_piece_clips_to_bounds() {
        let mut board = Board::standard();
        let o = Tetromino::of(PieceKind::O);
        board.place_piece(o.shape(), 9, 19, o.id());
        assert_eq!(board.get_cell(9, 19), i32::from(o.id()));
        let filled = board.rows().flatten().filter(|&&v| v != EMPTY).count();
        assert_eq!(filled, 1);
    }

    #[test]
    fn test_place_item_piece_single_and_whole() {
        let mut board = Board::standard();
        let t = Tetromino::item(PieceKind::T, 0, ItemType::Copy, 0);
        board.place_item_piece(t.shape(), 0, 0, t.id(), ItemType::Copy, t.marked_cell());
        assert_eq!(board.get_cell(1, 0), 103);
        assert_eq!(board.get_cell(0, 1), 3);
        assert_eq!(board.get_cell(1, 1), 3);
        assert_eq!(board.get_cell(2, 1), 3);

        let g = Tetromino::of(PieceKind::Gravity);
        board.place_item_piece(g.shape(), 5, 10, g.id(), ItemType::Gravity, None);
        for (x, y) in [(5, 10), (6, 10), (5, 11), (6, 11)] {
            assert_eq!(board.get_cell(x, y), 410);
        }
    }

    #[test]
    fn test_clear_full_lines_shifts_down() {
        let mut board = Board::standard();
        fill_row(&mut board, 19, 1);
        board.set_cell(4, 18, 2);
        board.set_cell(7, 17, 3);

        assert_eq!(board.full_line_indices(), vec![19]);
        assert_eq!(board.clear_full_lines(), 1);
        assert_eq!(board.get_cell(4, 19), 2);
        assert_eq!(board.get_cell(7, 18), 3);
        assert_eq!(board.row(0).unwrap(), &[EMPTY; 10]);
        assert!(board.full_line_indices().is_empty());
    }

    #[test]
    fn test_clear_non_adjacent_lines() {
        let mut board = Board::standard();
        fill_row(&mut board, 19, 1);
        board.set_cell(0, 18, 5);
        fill_row(&mut board, 17, 1);
        board.set_cell(1, 16, 6);

        let cleared = board.clear_full_lines_detailed();
        assert_eq!(cleared.rows, vec![17, 19]);
        assert_eq!(board.get_cell(0, 19), 5);
        assert_eq!(board.get_cell(1, 18), 6);
        assert_eq!(board.rows().flatten().filter(|&&v| v != EMPTY).count(), 2);
    }

    #[test]
    fn test_scenario_row_19_becomes_former_row_18() {
        let mut board = Board::standard();
        fill_row(&mut board, 19, 1);
        let t = Tetromino::of(PieceKind::T);
        board.place_piece(t.shape(), 2, 17, t.id());
        let former_row_18 = board.row(18).unwrap().to_vec();

        assert_eq!(board.clear_full_lines(), 1);
        assert_eq!(board.row(19).unwrap(), former_row_18.as_slice());
    }

    #[test]
    fn test_clear_with_callback_only_for_item_rows() {
        let mut board = Board::standard();
        fill_row(&mut board, 19, 1);
        let mut called = 0;
        assert_eq!(board.clear_full_lines_with(|| called += 1), 1);
        assert_eq!(called, 0);

        fill_row(&mut board, 19, 1);
        fill_row(&mut board, 18, 2);
        board.set_cell(3, 19, 203);
        board.set_cell(4, 18, 105);
        assert_eq!(board.clear_full_lines_with(|| called += 1), 2);
        assert_eq!(called, 1);
    }

    #[test]
    fn test_apply_gravity_compacts_columns() {
        let mut board = Board::new(3, 5).unwrap();
        board.set_cell(0, 0, 1);
        board.set_cell(0, 2, 2);
        board.set_cell(1, 1, 3);
        board.set_cell(1, 4, 4);
        board.set_cell(2, 3, 5);

        board.apply_gravity();
        assert_eq!(
            board.snapshot(),
            vec![
                vec![0, 0, 0],
                vec![0, 0, 0],
                vec![0, 0, 0],
                vec![1, 3, 0],
                vec![2, 4, 5],
            ]
        );
    }

    #[test]
    fn test_apply_gravity_is_idempotent() {
        let mut board = Board::standard();
        for (x, y, v) in [(0, 3, 1), (0, 9, 2), (4, 0, 3), (4, 12, 4), (9, 18, 5), (7, 7, 306)] {
            board.set_cell(x, y, v);
        }
        board.apply_gravity();
        let once = board.clone();
        board.apply_gravity();
        assert_eq!(board, once);
    }

    #[test]
    fn test_compact_single_column() {
        let mut board = Board::new(2, 4).unwrap();
        board.set_cell(0, 0, 1);
        board.set_cell(1, 0, 2);
        board.compact_column(0);
        assert_eq!(board.get_cell(0, 3), 1);
        assert_eq!(board.get_cell(1, 0), 2);
        board.compact_column(5);
    }

    #[test]
    fn test_remove_and_empty_row() {
        let mut board = Board::new(2, 3).unwrap();
        board.set_cell(0, 0, 1);
        board.set_cell(0, 1, 2);
        board.set_cell(1, 2, 3);

        assert!(board.remove_row(1));
        assert_eq!(board.snapshot(), vec![vec![0, 0], vec![1, 0], vec![0, 3]]);
        assert!(!board.remove_row(3));

        board.empty_row(2);
        assert_eq!(board.snapshot(), vec![vec![0, 0], vec![1, 0], vec![0, 0]]);
    }

    #[test]
    fn test_push_rows_from_bottom() {
        let mut board = Board::new(3, 4).unwrap();
        board.set_cell(0, 3, 1);
        board.set_cell(1, 0, 2);
        board.push_rows_from_bottom(&[vec![12, 0, 12], vec![0, 12, 12]]);
        assert_eq!(
            board.snapshot(),
            vec![vec![0, 0, 0], vec![1, 0, 0], vec![12, 0, 12], vec![0, 12, 12]]
        );
    }

    #[test]
    fn test_snapshot_is_independent() {
        let mut board = Board::standard();
        board.set_cell(0, 0, 4);
        let snapshot = board.snapshot();
        board.clear();
        assert_eq!(snapshot[0][0], 4);
        assert_eq!(board.get_cell(0, 0), EMPTY);
    }
}
