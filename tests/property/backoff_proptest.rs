//! Property-based tests for the retry schedule

use complaint_sync::client::api::retry::{BackoffStrategy, RetryPolicy};
use proptest::prelude::*;
use std::time::Duration;

fn policy(base_ms: u64, max_ms: u64) -> RetryPolicy {
    RetryPolicy {
        max_retries: 5,
        backoff: BackoffStrategy::Exponential {
            base: Duration::from_millis(base_ms),
            max: Duration::from_millis(max_ms),
        },
    }
}

proptest! {
    #[test]
    fn test_first_delay_is_base(base in 1u64..5_000, extra in 0u64..60_000) {
        let policy = policy(base, base + extra);
        prop_assert_eq!(policy.delay_for(1), Duration::from_millis(base));
    }

    #[test]
    fn test_delays_never_shrink(base in 1u64..5_000, max in 1u64..120_000, attempt in 1u32..64) {
        let policy = policy(base, max);
        prop_assert!(policy.delay_for(attempt) <= policy.delay_for(attempt + 1));
    }

    #[test]
    fn test_delays_are_capped(base in 1u64..5_000, max in 1u64..120_000, attempt in 1u32..200) {
        let policy = policy(base, max);
        prop_assert!(policy.delay_for(attempt) <= Duration::from_millis(max));
    }

    #[test]
    fn test_attempt_count(retries in 0u32..20) {
        let policy = RetryPolicy { max_retries: retries, ..RetryPolicy::default() };
        let retried = (1..=retries + 1).filter(|attempt| policy.should_retry(*attempt)).count();
        prop_assert_eq!(retried as u32, retries);
        prop_assert_eq!(policy.max_attempts(), retries + 1);
    }
}
