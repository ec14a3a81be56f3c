//! Property tests for the assignment solver.
//!
//! Small matrices are checked against an exhaustive search over all
//! injective assignments.

use concord::munkres::{maximize, total};
use proptest::prelude::*;

/// Best total over every way of assigning each row of the smaller side.
fn brute_force(sim: &[Vec<f64>]) -> f64 {
    let n = sim.len();
    let m = sim.first().map_or(0, Vec::len);
    if n == 0 || m == 0 {
        return 0.0;
    }
    if n > m {
        let t: Vec<Vec<f64>> = (0..m).map(|j| (0..n).map(|i| sim[i][j]).collect()).collect();
        return brute_force(&t);
    }
    fn go(sim: &[Vec<f64>], row: usize, used: &mut Vec<bool>) -> f64 {
        if row == sim.len() {
            return 0.0;
        }
        let mut best = f64::NEG_INFINITY;
        for j in 0..used.len() {
            if !used[j] {
                used[j] = true;
                best = best.max(sim[row][j] + go(sim, row + 1, used));
                used[j] = false;
            }
        }
        best
    }
    go(sim, 0, &mut vec![false; m])
}

fn matrix() -> impl Strategy<Value = Vec<Vec<f64>>> {
    (1usize..=5, 1usize..=6).prop_flat_map(|(n, m)| {
        prop::collection::vec(prop::collection::vec(0.0f64..=1.0, m), n)
    })
}

proptest! {
    #[test]
    fn assignment_is_optimal(sim in matrix()) {
        let pairs = maximize(&sim);
        let best = brute_force(&sim);
        // Similarities are solved in fixed point.
        prop_assert!((total(&sim, &pairs) - best).abs() < 1e-6);
    }

    #[test]
    fn assignment_is_injective_and_complete(sim in matrix()) {
        let pairs = maximize(&sim);
        let n = sim.len();
        let m = sim[0].len();
        prop_assert_eq!(pairs.len(), n.min(m));
        let rows: std::collections::HashSet<_> = pairs.iter().map(|p| p.0).collect();
        let cols: std::collections::HashSet<_> = pairs.iter().map(|p| p.1).collect();
        prop_assert_eq!(rows.len(), pairs.len());
        prop_assert_eq!(cols.len(), pairs.len());
        prop_assert!(pairs.iter().all(|&(r, c)| r < n && c < m));
    }
}

#[test]
fn ties_still_assign_every_row() {
    let sim = vec![vec![0.5; 4]; 3];
    let pairs = maximize(&sim);
    assert_eq!(pairs.len(), 3);
    assert!((total(&sim, &pairs) - 1.5).abs() < 1e-12);
}
