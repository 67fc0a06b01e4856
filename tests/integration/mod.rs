//! Integration tests for athena-relay.

pub mod athena_test;
pub mod runner_test;
pub mod syntax_test;
