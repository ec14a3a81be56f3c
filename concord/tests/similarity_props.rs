//! Property tests for the stateless comparison functions.

use concord::similarity::dimension::{set_equality, span_overlap};
use concord_core::{Span, Value};
use proptest::prelude::*;

fn span() -> impl Strategy<Value = Span> {
    (0usize..50, 1usize..20).prop_map(|(s, len)| Span::new(s, s + len))
}

proptest! {
    #[test]
    fn span_overlap_is_bounded_and_symmetric(r in span(), h in span()) {
        let (a, _) = span_overlap(r, h, None, None);
        let (b, _) = span_overlap(h, r, None, None);
        prop_assert!((0.0..=1.0).contains(&a));
        prop_assert!((a - b).abs() < 1e-12);
        prop_assert_eq!(a == 1.0, r == h);
    }

    #[test]
    fn span_overlap_thresholds_snap(r in span(), h in span()) {
        let (raw, _) = span_overlap(r, h, None, None);
        let (snapped, _) = span_overlap(r, h, Some(0.5), Some(0.2));
        if raw > 0.5 {
            prop_assert_eq!(snapped, 1.0);
        } else if raw < 0.2 {
            prop_assert_eq!(snapped, 0.0);
        } else {
            prop_assert_eq!(snapped, raw);
        }
    }

    #[test]
    fn set_equality_is_jaccard(
        r in prop::collection::vec(0i64..6, 0..6),
        h in prop::collection::vec(0i64..6, 0..6),
    ) {
        let rv: Vec<Value> = r.iter().map(|&i| Value::Int(i)).collect();
        let hv: Vec<Value> = h.iter().map(|&i| Value::Int(i)).collect();
        let rr: Vec<&Value> = rv.iter().collect();
        let hr: Vec<&Value> = hv.iter().collect();
        let (score, err) = set_equality(&rr, &hr);
        let (back, _) = set_equality(&hr, &rr);
        prop_assert!((score - back).abs() < 1e-12);

        let rs: std::collections::BTreeSet<i64> = r.into_iter().collect();
        let hs: std::collections::BTreeSet<i64> = h.into_iter().collect();
        let union = rs.union(&hs).count();
        let expected = if union == 0 {
            1.0
        } else {
            rs.intersection(&hs).count() as f64 / union as f64
        };
        prop_assert!((score - expected).abs() < 1e-12);
        prop_assert_eq!(err.is_none(), score == 1.0);
    }
}

#[test]
fn contained_hypothesis_is_undermarked() {
    let (score, err) = span_overlap(Span::new(0, 10), Span::new(2, 5), None, None);
    assert!((score - 0.3).abs() < 1e-12);
    assert_eq!(err, Some(("overmark", "undermark")));
}
