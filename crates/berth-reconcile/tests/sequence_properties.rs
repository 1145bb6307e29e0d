//! Property tests for the containment checks used by the differ.

use berth_reconcile::diff::{contains_all, ends_with};
use proptest::prelude::*;

fn words() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-c]{1,2}", 0..6)
}

proptest! {
    #[test]
    fn subset_holds_iff_every_wanted_element_is_present(have in words(), want in words()) {
        let expected = want.iter().all(|w| have.iter().any(|h| h == w));
        prop_assert_eq!(contains_all(&have, &want), expected);
    }

    #[test]
    fn suffix_holds_iff_trailing_elements_match(have in words(), want in words()) {
        let expected = want.len() <= have.len() && have[have.len() - want.len()..] == want[..];
        prop_assert_eq!(ends_with(&have, &want), expected);
    }

    #[test]
    fn empty_want_is_vacuously_true(have in words()) {
        prop_assert!(contains_all(&have, &[]));
        prop_assert!(ends_with(&have, &[]));
    }

    #[test]
    fn any_sequence_ends_with_its_own_tail(have in words(), cut in 0usize..6) {
        let start = cut.min(have.len());
        prop_assert!(ends_with(&have, &have[start..]));
    }

    #[test]
    fn longer_want_is_never_a_suffix(have in words(), extra in "[a-c]") {
        let mut want = have.clone();
        want.insert(0, extra);
        prop_assert!(!ends_with(&have, &want));
    }
}
