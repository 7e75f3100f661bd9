//! Test suites for the spindle daemon.

mod support;
