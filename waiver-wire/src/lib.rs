// Library root: re-exports all modules so integration tests and the binary
// share one public API.

pub mod app;
pub mod config;
pub mod db;
pub mod espn;
pub mod history;
pub mod identity;
pub mod mlb;
pub mod predict;
pub mod provider;
pub mod report;
pub mod stats;
