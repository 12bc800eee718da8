//! Shared fixtures for unit tests.
//!
//! Integration tests under `tests/` cannot see this module and build their graphs
//! through the public builder instead.


pub use fixtures::*;
