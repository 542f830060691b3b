//! Property-based tests

pub mod backoff_proptest;
pub mod cache_key_proptest;
