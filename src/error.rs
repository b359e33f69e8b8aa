// Error taxonomy for the scoring loop.
//
// Per-target conditions (`TargetError`) are skip reasons that stay inside a
// single target's evaluation. Everything else aborts the current cycle.

use std::path::PathBuf;

use thiserror::Error;

use crate::ini::ParseError;

/// Why a target did not produce a point this cycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TargetError {
    #[error("{target} @ {url} might be down: {reason}")]
    Unreachable {
        target: String,
        url: String,
        reason: String,
    },
    #[error("no ownership claim")]
    NoClaim,
    #[error("{owner} is not in the allow-list")]
    NotAllowed { owner: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse { path: PathBuf, source: ParseError },
    #[error("config is missing section [{0}]")]
    MissingSection(&'static str),
    #[error("config section [{section}] is missing `{key}`")]
    MissingKey {
        section: &'static str,
        key: &'static str,
    },
    #[error("invalid value `{value}` for `{key}` in [{section}]")]
    InvalidValue {
        section: &'static str,
        key: String,
        value: String,
    },
    #[error("target name `{0}` is reserved")]
    ReservedTarget(String),
    #[error("target `{0}` is configured more than once")]
    DuplicateTarget(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read score file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse score file {path}: {source}")]
    Parse { path: PathBuf, source: ParseError },
    #[error("invalid count `{value}` for `{owner}` in [{section}]")]
    InvalidCount {
        section: String,
        owner: String,
        value: String,
    },
    #[error("failed to write score file {path}: {source}")]
    Persistence {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to read template {path}: {source}")]
    Template {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write scoreboard {path}: {source}")]
    Output {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to copy template assets to {path}: {source}")]
    Materialize {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// A failure that aborts the current cycle. The driving loop logs it and
/// tries again on the next cycle.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Render(#[from] RenderError),
}

impl CycleError {
    /// Short label used for the failure metric.
    pub fn kind(&self) -> &'static str {
        match self {
            CycleError::Config(_) => "config",
            CycleError::Store(StoreError::Persistence { .. }) => "persistence",
            CycleError::Store(_) => "score_file",
            CycleError::Render(_) => "render",
        }
    }
}
