//! File-backed document stores.

pub mod calculator;
pub mod catalog;
pub mod images;
