//! Cross-crate test suite for satchel.
//!
//! Drives the full send pipeline against scripted in-memory backends and
//! against mock HTTP servers, and checks the value and key-hygiene
//! invariants with property tests.

pub mod helpers;
