use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::core::cell::{EMPTY, GARBAGE};

/// Garbage rows sent to an opponent, top row first.
///
/// Each generated row is filled with [`GARBAGE`] except for one empty column.
/// The struct is a plain wire record: a transport may forward it as JSON.
///
/// # Example
///
/// ```
/// use blockfall_engine::versus::AttackPattern;
/// use rand::SeedableRng as _;
/// use rand_pcg::Pcg32;
///
/// let mut rng = Pcg32::seed_from_u64(5);
/// let pattern = AttackPattern::generate(3, 10, &mut rng);
/// assert_eq!(pattern.lines(), 3);
/// assert!((0..3).all(|row| pattern.hole_column(row).is_some()));
///
/// let json = serde_json::to_string(&pattern).unwrap();
/// let decoded: AttackPattern = serde_json::from_str(&json).unwrap();
/// assert_eq!(decoded, pattern);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackPattern {
    rows: Vec<Vec<i32>>,
}

impl AttackPattern {
    /// Wraps prepared garbage rows, top to bottom.
    #[must_use]
    pub fn new(rows: Vec<Vec<i32>>) -> Self {
        Self { rows }
    }

    /// Builds `lines` garbage rows of `width` cells, each with an independently
    /// chosen hole.
    pub fn generate<R>(lines: usize, width: usize, rng: &mut R) -> Self
    where
        R: Rng + ?Sized,
    {
        let rows = (0..lines)
            .map(|_| {
                let mut row = vec![GARBAGE; width];
                if width > 0 {
                    row[rng.random_range(0..width)] = EMPTY;
                }
                row
            })
            .collect();
        Self { rows }
    }

    /// Number of garbage rows.
    #[must_use]
    pub fn lines(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The garbage rows, top to bottom.
    #[must_use]
    pub fn rows(&self) -> &[Vec<i32>] {
        &self.rows
    }

    /// Column of the first empty cell of `row`.
    #[must_use]
    pub fn hole_column(&self, row: usize) -> Option<usize> {
        self.rows.get(row)?.iter().position(|&cell| cell == EMPTY)
    }

    /// Keeps the top `lines` rows, dropping the rest from the bottom.
    #[must_use]
    pub fn truncated(mut self, lines: usize) -> Self {
        self.rows.truncate(lines);
        self
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng as _;
    use rand_pcg::Pcg32;

    use super::*;

    #[test]
    fn test_generate_leaves_one_hole_per_row() {
        let mut rng = Pcg32::seed_from_u64(11);
        let pattern = AttackPattern::generate(8, 10, &mut rng);
        assert_eq!(pattern.lines(), 8);
        for row in pattern.rows() {
            assert_eq!(row.len(), 10);
            assert_eq!(row.iter().filter(|&&cell| cell == EMPTY).count(), 1);
            assert_eq!(row.iter().filter(|&&cell| cell == GARBAGE).count(), 9);
        }
    }

    #[test]
    fn test_holes_vary_between_rows() {
        let mut rng = Pcg32::seed_from_u64(3);
        let pattern = AttackPattern::generate(40, 10, &mut rng);
        let first = pattern.hole_column(0);
        assert!((1..40).any(|row| pattern.hole_column(row) != first));
    }

    #[test]
    fn test_truncated_keeps_top_rows() {
        let pattern = AttackPattern::new(vec![vec![0, 12], vec![12, 0], vec![0, 12]]);
        let kept = pattern.truncated(2);
        assert_eq!(kept.rows(), &[vec![0, 12], vec![12, 0]]);
        assert_eq!(kept.hole_column(1), Some(1));
        assert_eq!(kept.hole_column(2), None);
        assert!(kept.truncated(0).is_empty());
    }
}
