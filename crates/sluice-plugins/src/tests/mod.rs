//! Shared test support and behavioural tests for plugin loading.

mod behaviour;
pub(crate) mod support;
