//! Shared helpers for the drink catalog workspace: logging setup and
//! small response types used by more than one crate.

pub mod types;
pub mod utils;
