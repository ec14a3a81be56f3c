//! Maximum-similarity assignment.
//!
//! Thin layer over [`pathfinding::kuhn_munkres`]. Similarities are scaled to
//! fixed-point integers; rectangular groups are transposed so the smaller
//! side indexes rows, and every member of the smaller side is assigned.

use pathfinding::kuhn_munkres::{kuhn_munkres, Weights};

/// Fixed-point scale for similarities.
const SCALE: f64 = 1e9;

/// Similarity matrix in fixed point, `rows <= columns`.
struct Scores {
    data: Vec<Vec<i64>>,
    columns: usize,
}

impl Scores {
    fn new(similarity: &[Vec<f64>], transpose: bool) -> Self {
        let fixed = |s: f64| if s.is_finite() { (s * SCALE).round() as i64 } else { 0 };
        let n = similarity.len();
        let m = similarity.first().map_or(0, Vec::len);
        let data: Vec<Vec<i64>> = if transpose {
            (0..m)
                .map(|j| (0..n).map(|i| fixed(similarity[i][j])).collect())
                .collect()
        } else {
            similarity
                .iter()
                .map(|row| row.iter().map(|&s| fixed(s)).collect())
                .collect()
        };
        let columns = if transpose { n } else { m };
        Self { data, columns }
    }
}

impl Weights<i64> for Scores {
    fn rows(&self) -> usize {
        self.data.len()
    }

    fn columns(&self) -> usize {
        self.columns
    }

    fn at(&self, row: usize, col: usize) -> i64 {
        self.data[row][col]
    }

    fn neg(&self) -> Self {
        Self {
            data: self
                .data
                .iter()
                .map(|row| row.iter().map(|&v| -v).collect())
                .collect(),
            columns: self.columns,
        }
    }
}

/// Maximum-similarity assignment over a rectangular matrix.
///
/// Returns `(row, col)` pairs sorted by row; `min(rows, cols)` pairs are
/// produced.
#[must_use]
pub fn maximize(similarity: &[Vec<f64>]) -> Vec<(usize, usize)> {
    let n = similarity.len();
    let m = similarity.first().map_or(0, Vec::len);
    if n == 0 || m == 0 {
        return Vec::new();
    }
    let transpose = n > m;
    let (_, assignment) = kuhn_munkres(&Scores::new(similarity, transpose));
    let mut pairs: Vec<(usize, usize)> = assignment
        .into_iter()
        .enumerate()
        .map(|(r, c)| if transpose { (c, r) } else { (r, c) })
        .collect();
    pairs.sort_unstable();
    pairs
}

/// Total similarity of an assignment.
#[must_use]
pub fn total(similarity: &[Vec<f64>], pairs: &[(usize, usize)]) -> f64 {
    pairs.iter().map(|&(r, c)| similarity[r][c]).sum()
}
