//! Test suites for the sluice daemon lifecycle.

mod support;
