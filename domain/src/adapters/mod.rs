//! Adapters that live inside the domain crate for convenience.
//!
//! The in-memory store backs the mock client, the dev server and every unit
//! test. A networked backend would live in its own crate.

pub mod fixtures;
pub mod memory_store;
