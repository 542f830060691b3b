//! Fixtures shared by the integration and property tests
//!
//! `mock_server` fakes the complaints backend with wiremock, `fixtures`
//! wires clients and databases against it, and `assertions` holds the
//! macros the suites use.

#[macro_use]
pub mod assertions;
pub mod mock_server;

pub use fixtures::*;
pub use mock_server::*;
