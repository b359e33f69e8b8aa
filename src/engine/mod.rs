// Scoring engine: polling, claim extraction, allow-list gating and the score
// store, tied together by `cycle`.

pub mod allow_list;
pub mod config;
pub mod cycle;
pub mod extractor;
pub mod poller;
pub mod store;
