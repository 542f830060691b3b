//! Integration tests against a wiremock backend

pub mod cache_test;
pub mod connectivity_test;
pub mod dispatcher_test;
pub mod offline_test;
