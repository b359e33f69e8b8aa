// Game configuration: targets, allow-list and loop settings, read from the
// sectioned config file once per cycle.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::engine::allow_list::AllowList;
use crate::error::ConfigError;
use crate::ini::{Dialect, Document, Section};

pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(10);

/// Scope name shared by the total score table and the `<TOTAL>` template tag.
pub const TOTAL_SCOPE: &str = "Total";

const GENERAL: &str = "General";
const TARGETS: &str = "Targets";
const TIMEOUTS: &str = "Timeouts";
const WHITE_LIST: &str = "WhiteList";

/// One polled service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub name: String,
    pub url: String,
    pub timeout: Option<Duration>,
}

impl Target {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Immutable snapshot of the config file for one cycle.
#[derive(Debug, Clone)]
pub struct GameConfig {
    pub targets: Vec<Target>,
    pub allow_list: AllowList,
    pub allow_list_enabled: bool,
    pub sleep_time: Duration,
    pub poll_timeout: Duration,
    pub outfile: PathBuf,
    pub outdir: PathBuf,
}

impl GameConfig {
    /// Read and validate the config file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text).map_err(|e| match e {
            ParseFailure::Syntax(source) => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            ParseFailure::Config(e) => e,
        })
    }

    /// Parse config text. Syntax errors carry no path here; `load` attaches it.
    pub fn parse(text: &str) -> Result<Self, ParseFailure> {
        let doc = Document::parse(text, Dialect::CONFIG).map_err(ParseFailure::Syntax)?;
        Self::from_document(&doc).map_err(ParseFailure::Config)
    }

    fn from_document(doc: &Document) -> Result<Self, ConfigError> {
        let general = doc
            .section(GENERAL)
            .ok_or(ConfigError::MissingSection(GENERAL))?;

        let sleep_time = Duration::from_secs(parse_seconds(general, "sleepTime")?.ok_or(
            ConfigError::MissingKey {
                section: GENERAL,
                key: "sleepTime",
            },
        )?);
        let poll_timeout = parse_seconds(general, "timeout")?
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_POLL_TIMEOUT);
        let outfile = PathBuf::from(required(general, "outfile")?);
        let outdir = PathBuf::from(required(general, "outdir")?);
        let allow_list_enabled = parse_bool(general, "whiteListOn")?;

        let targets_section = doc
            .section(TARGETS)
            .ok_or(ConfigError::MissingSection(TARGETS))?;
        let timeouts = doc.section(TIMEOUTS);

        let mut targets: Vec<Target> = Vec::with_capacity(targets_section.entries.len());
        for (name, url) in &targets_section.entries {
            if name.eq_ignore_ascii_case(TOTAL_SCOPE) {
                return Err(ConfigError::ReservedTarget(name.clone()));
            }
            if targets.iter().any(|t| t.name.eq_ignore_ascii_case(name)) {
                return Err(ConfigError::DuplicateTarget(name.clone()));
            }
            if url.is_empty() {
                return Err(ConfigError::InvalidValue {
                    section: TARGETS,
                    key: name.clone(),
                    value: url.clone(),
                });
            }
            let mut target = Target::new(name.clone(), url.clone());
            if let Some(section) = timeouts {
                if let Some(secs) = parse_seconds_in(section, TIMEOUTS, name)? {
                    target = target.with_timeout(Duration::from_secs(secs));
                }
            }
            targets.push(target);
        }

        // An absent [WhiteList] is only an error when the feature is on.
        let allow_list = match doc.section(WHITE_LIST) {
            Some(section) => AllowList::from_entries(section.entries.iter().map(|(_, v)| v.as_str())),
            None if allow_list_enabled => return Err(ConfigError::MissingSection(WHITE_LIST)),
            None => AllowList::default(),
        };

        Ok(GameConfig {
            targets,
            allow_list,
            allow_list_enabled,
            sleep_time,
            poll_timeout,
            outfile,
            outdir,
        })
    }

    /// Effective timeout for a target.
    pub fn timeout_for(&self, target: &Target) -> Duration {
        target.timeout.unwrap_or(self.poll_timeout)
    }
}

/// Error from `GameConfig::parse`, before a file path is known.
#[derive(Debug)]
pub enum ParseFailure {
    Syntax(crate::ini::ParseError),
    Config(ConfigError),
}

impl std::fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseFailure::Syntax(e) => write!(f, "{e}"),
            ParseFailure::Config(e) => write!(f, "{e}"),
        }
    }
}

fn required<'a>(section: &'a Section, key: &'static str) -> Result<&'a str, ConfigError> {
    match section.get(key) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ConfigError::MissingKey {
            section: GENERAL,
            key,
        }),
    }
}

fn parse_seconds(general: &Section, key: &'static str) -> Result<Option<u64>, ConfigError> {
    parse_seconds_in(general, GENERAL, key)
}

fn parse_seconds_in(
    section: &Section,
    section_name: &'static str,
    key: &str,
) -> Result<Option<u64>, ConfigError> {
    match section.get(key) {
        None => Ok(None),
        Some(v) => v
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                section: section_name,
                key: key.to_string(),
                value: v.to_string(),
            }),
    }
}

fn parse_bool(general: &Section, key: &'static str) -> Result<bool, ConfigError> {
    let value = general.get(key).ok_or(ConfigError::MissingKey {
        section: GENERAL,
        key,
    })?;
    match value.to_ascii_lowercase().as_str() {
        "1" | "yes" | "true" | "on" => Ok(true),
        "0" | "no" | "false" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            section: GENERAL,
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}
