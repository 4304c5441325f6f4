//! Shared test infrastructure: a fully wired in-process gate plus mock
//! collaborators for failure-path tests.

pub mod harness;
pub mod mocks;
pub mod recording;

pub use harness::*;
pub use mocks::*;
pub use recording::*;
