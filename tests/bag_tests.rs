/// Tests for sampling without replacement
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use roster_picker::{BagSampler, PickOutcome};
use std::collections::BTreeSet;

fn names(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_single_entry_completes_every_pick() {
    let source = names(&["Ann"]);
    let mut bag = BagSampler::new();
    let mut rng = StdRng::seed_from_u64(1);

    for _ in 0..3 {
        assert_eq!(
            bag.pick(&source, &mut rng),
            PickOutcome::CycleComplete {
                entry: "Ann".to_string()
            }
        );
        assert_eq!(bag.remaining(), 1);
    }
}

#[test]
fn test_edited_source_starts_new_cycle() {
    let mut bag = BagSampler::new();
    let mut rng = StdRng::seed_from_u64(2);

    bag.pick(&names(&["a", "b", "c", "d"]), &mut rng);
    assert_eq!(bag.remaining(), 3);

    // Reordering counts as an edit
    let outcome = bag.pick(&names(&["d", "c", "b", "a"]), &mut rng);
    assert!(matches!(outcome, PickOutcome::Picked { remaining: 3, .. }));
    assert_eq!(bag.all_entries(), &names(&["d", "c", "b", "a"])[..]);
}

#[test]
fn test_empty_source_keeps_cycle() {
    let source = names(&["a", "b", "c"]);
    let mut bag = BagSampler::new();
    let mut rng = StdRng::seed_from_u64(3);
    bag.pick(&source, &mut rng);

    assert_eq!(bag.pick(&[], &mut rng), PickOutcome::Empty);
    assert_eq!(bag.remaining(), 2);
    assert_eq!(bag.total(), 3);
}

#[test]
fn test_duplicates_are_drawn_separately() {
    let source = names(&["Ann", "Ann", "Bo"]);
    let mut bag = BagSampler::new();
    let mut rng = StdRng::seed_from_u64(4);

    let drawn: Vec<String> = (0..3)
        .filter_map(|_| bag.pick(&source, &mut rng).entry().map(str::to_string))
        .collect();
    let ann = drawn.iter().filter(|name| name.as_str() == "Ann").count();
    assert_eq!(ann, 2);
}

proptest! {
    #[test]
    fn prop_each_cycle_is_a_permutation(
        entries in prop::collection::btree_set("[a-z]{1,6}", 1..12),
        cycles in 1usize..4,
        seed in any::<u64>(),
    ) {
        let source: Vec<String> = entries.iter().cloned().collect();
        let mut bag = BagSampler::new();
        let mut rng = StdRng::seed_from_u64(seed);

        for _ in 0..cycles {
            let mut seen = BTreeSet::new();
            for draw in 0..source.len() {
                let outcome = bag.pick(&source, &mut rng);
                let last = draw + 1 == source.len();
                prop_assert_eq!(outcome.is_cycle_complete(), last);
                if let PickOutcome::Picked { remaining, .. } = &outcome {
                    prop_assert_eq!(*remaining, source.len() - draw - 1);
                }
                let entry = outcome.entry().map(str::to_string);
                prop_assert!(entry.is_some());
                prop_assert!(seen.insert(entry.unwrap_or_default()));
            }
            prop_assert_eq!(&seen, &entries);
            prop_assert_eq!(bag.remaining(), source.len());
        }
    }

    #[test]
    fn prop_same_seed_same_sequence(
        entries in prop::collection::vec("[A-Z][a-z]{0,5}", 1..10),
        seed in any::<u64>(),
    ) {
        let draw = |seed: u64| {
            let mut bag = BagSampler::new();
            let mut rng = StdRng::seed_from_u64(seed);
            (0..entries.len() * 2)
                .map(|_| bag.pick(&entries, &mut rng))
                .collect::<Vec<_>>()
        };
        prop_assert_eq!(draw(seed), draw(seed));
    }
}
