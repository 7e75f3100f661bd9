//! Scenario suites for the accept loop, connection tasks, and shutdown.

mod support;
