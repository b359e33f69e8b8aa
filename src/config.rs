// Process configuration, loaded from environment variables and CLI flags.
// Game settings (targets, allow-list, interval) live in the config file and
// are reloaded every cycle; see `engine::config`.

use std::net::SocketAddr;
use std::path::PathBuf;

use crate::render::TEMPLATE_FILE;

/// Process configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Game config file, re-read every cycle.
    pub config_path: PathBuf,
    /// Persisted score file.
    pub scores_path: PathBuf,
    /// Directory holding `template.html` and its static assets.
    pub template_dir: PathBuf,
    /// Address for the built-in HTTP server. `None` disables it.
    pub listen: Option<SocketAddr>,
    /// Maximum concurrent target fetches per cycle.
    pub poll_concurrency: usize,
    /// Run a single cycle and exit.
    pub once: bool,
}

impl Config {
    /// Load configuration from environment variables and CLI arguments.
    ///
    /// Environment variables:
    /// - `PROPANE_CONFIG` - Game config file (default: `propane_config.ini`)
    /// - `PROPANE_SCORES` - Score file (default: `propane_scores.txt`)
    /// - `PROPANE_TEMPLATE_DIR` - Template directory (default: `template`)
    /// - `PROPANE_LISTEN` - Serve the scoreboard on this address, e.g. `0.0.0.0:8080`
    /// - `PROPANE_POLL_CONCURRENCY` - Concurrent fetches (default: 1)
    /// - `PROPANE_ONCE` - Set to `true` to run one cycle and exit
    ///
    /// CLI flags take precedence: `--config`, `--scores`, `--template-dir`,
    /// `--listen`, `--concurrency`, `--once`.
    pub fn load() -> Self {
        let args: Vec<String> = std::env::args().collect();
        Self::from_sources(&args, |key| std::env::var(key).ok())
    }

    /// Build from explicit args and an env lookup, so tests need not touch
    /// the process environment.
    pub fn from_sources(args: &[String], env: impl Fn(&str) -> Option<String>) -> Self {
        let value = |flag: &str, var: &str| Self::parse_cli_value(args, flag).or_else(|| env(var));

        let config_path = value("--config", "PROPANE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("propane_config.ini"));
        let scores_path = value("--scores", "PROPANE_SCORES")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("propane_scores.txt"));
        let template_dir = value("--template-dir", "PROPANE_TEMPLATE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("template"));

        let listen = value("--listen", "PROPANE_LISTEN").and_then(|v| match v.parse() {
            Ok(addr) => Some(addr),
            Err(_) => {
                tracing::warn!("ignoring invalid listen address `{v}`");
                None
            }
        });

        let poll_concurrency = value("--concurrency", "PROPANE_POLL_CONCURRENCY")
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(1)
            .max(1);

        let once = args.iter().any(|a| a == "--once")
            || env("PROPANE_ONCE")
                .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
                .unwrap_or(false);

        Config {
            config_path,
            scores_path,
            template_dir,
            listen,
            poll_concurrency,
            once,
        }
    }

    pub fn template_path(&self) -> PathBuf {
        self.template_dir.join(TEMPLATE_FILE)
    }

    /// Parse a CLI flag value like `--config propane.ini`.
    fn parse_cli_value(args: &[String], flag: &str) -> Option<String> {
        args.windows(2).find_map(|pair| {
            if pair[0] == flag {
                Some(pair[1].clone())
            } else {
                None
            }
        })
    }
}
