//! Property-based tests for cache keys

use complaint_sync::shared::ListQuery;
use proptest::prelude::*;
use proptest::sample::subsequence;

const STATUSES: &[&str] = &["open", "closed", "pending", "rejected", "reopened"];

fn statuses() -> impl Strategy<Value = Vec<&'static str>> {
    subsequence(STATUSES.to_vec(), 0..=STATUSES.len())
}

proptest! {
    #[test]
    fn test_value_order_does_not_matter(values in statuses(), seed in any::<u64>()) {
        let mut shuffled = values.clone();
        let len = shuffled.len().max(1) as u64;
        shuffled.rotate_left((seed % len) as usize);
        shuffled.reverse();

        let a = ListQuery::new().filter("status", values);
        let b = ListQuery::new().filter("status", shuffled);
        prop_assert_eq!(a.cache_key(), b.cache_key());
    }

    #[test]
    fn test_duplicate_values_do_not_matter(values in statuses()) {
        let doubled: Vec<&str> = values.iter().chain(values.iter()).copied().collect();
        let a = ListQuery::new().filter("status", values);
        let b = ListQuery::new().filter("status", doubled);
        prop_assert_eq!(a.cache_key(), b.cache_key());
    }

    #[test]
    fn test_different_pages_never_collide(page in 1u32..1_000, other in 1u32..1_000, size in 1u32..100) {
        prop_assume!(page != other);
        let a = ListQuery::new().page(page, size);
        let b = ListQuery::new().page(other, size);
        prop_assert_ne!(a.cache_key(), b.cache_key());
    }

    #[test]
    fn test_search_padding_is_ignored(text in "[a-z]{1,12}", pad in 0usize..4) {
        let padded = format!("{}{}{}", " ".repeat(pad), text, " ".repeat(pad));
        let a = ListQuery::new().search(text);
        let b = ListQuery::new().search(padded);
        prop_assert_eq!(a.cache_key(), b.cache_key());
    }
}
