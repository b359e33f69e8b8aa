// Propane: a king-of-the-hill scoreboard that polls target servers for
// `<team>` claims and keeps cumulative scores.

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod ini;
pub mod metrics;
pub mod render;
pub mod worker_pool;
