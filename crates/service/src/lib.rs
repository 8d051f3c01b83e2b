//! Persistence layer for the drink catalog server.
//! - `storage`: generic JSON-file map store shared by the document stores.
//! - `file`: the catalog, calculator blob and uploaded image stores.
//! - `runtime`: startup checks for the on-disk layout.

pub mod errors;
pub mod file;
pub mod runtime;
pub mod storage;
