//! # satchel-core
//! Foundation types and traits for the satchel send pipeline.

pub mod address;
pub mod constants;
pub mod error;
pub mod traits;
pub mod types;
