use crate::error::{CrawlError, Result};
use clap::Parser;
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str =
    "https://www.basketball-reference.com/friv/teammates_and_opponents.fcgi";
pub const DEFAULT_TABLE_ID: &str = "teammates-and-opponents";

/// Every tunable of a crawl. Durations are stored in seconds so the struct
/// can be read straight from a JSON config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    pub roster_path: PathBuf,
    pub graph_path: PathBuf,
    /// Replaces the bundled override table when set.
    pub overrides_path: Option<PathBuf>,
    pub base_url: String,
    pub table_id: String,
    pub request_delay_secs: f64,
    pub delay_jitter_secs: f64,
    pub fetch_attempts: u32,
    pub retry_delay_secs: f64,
    pub navigation_timeout_secs: f64,
    pub table_timeout_secs: f64,
    pub table_poll_secs: f64,
    pub max_suffix: u32,
    /// Flush after this many newly added players. 0 = only at the end.
    /// The default of 1 keeps every finished player on disk.
    pub checkpoint_every: usize,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        CrawlConfig {
            roster_path: PathBuf::from("all_players.json"),
            graph_path: PathBuf::from("player_map.json"),
            overrides_path: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            table_id: DEFAULT_TABLE_ID.to_string(),
            request_delay_secs: 3.2,
            delay_jitter_secs: 0.0,
            fetch_attempts: 3,
            retry_delay_secs: 5.0,
            navigation_timeout_secs: 60.0,
            table_timeout_secs: 60.0,
            table_poll_secs: 5.0,
            max_suffix: 9,
            checkpoint_every: 1,
        }
    }
}

impl CrawlConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| CrawlError::Config(format!("cannot read {}: {e}", path.display())))?;
        let config: CrawlConfig = serde_json::from_str(&text)
            .map_err(|e| CrawlError::Config(format!("cannot parse {}: {e}", path.display())))?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.fetch_attempts == 0 {
            return Err(CrawlError::Config("fetch_attempts must be at least 1".into()));
        }
        if !(1..=99).contains(&self.max_suffix) {
            return Err(CrawlError::Config(format!(
                "max_suffix must be within 1..=99, got {}",
                self.max_suffix
            )));
        }
        let durations = [
            ("request_delay_secs", self.request_delay_secs),
            ("delay_jitter_secs", self.delay_jitter_secs),
            ("retry_delay_secs", self.retry_delay_secs),
            ("navigation_timeout_secs", self.navigation_timeout_secs),
            ("table_timeout_secs", self.table_timeout_secs),
            ("table_poll_secs", self.table_poll_secs),
        ];
        for (name, secs) in durations {
            Duration::try_from_secs_f64(secs).map_err(|e| {
                CrawlError::Config(format!("{name} must be a non-negative number of seconds, got {secs}: {e}"))
            })?;
        }
        if self.navigation_timeout_secs == 0.0 {
            return Err(CrawlError::Config("navigation_timeout_secs must be positive".into()));
        }
        url::Url::parse(&self.base_url)
            .map_err(|e| CrawlError::Config(format!("base_url {:?}: {e}", self.base_url)))?;
        if self.table_id.is_empty() || !self.table_id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return Err(CrawlError::Config(format!("table_id {:?} is not a plain element id", self.table_id)));
        }
        Ok(())
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_secs_f64(self.request_delay_secs)
    }

    pub fn delay_jitter(&self) -> Duration {
        Duration::from_secs_f64(self.delay_jitter_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs_f64(self.retry_delay_secs)
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.navigation_timeout_secs)
    }

    pub fn table_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.table_timeout_secs)
    }

    pub fn table_poll_interval(&self) -> Duration {
        Duration::from_secs_f64(self.table_poll_secs)
    }
}

/// Command line. Any flag left out falls back to `--config`, then to the
/// built-in defaults.
#[derive(Debug, Parser)]
#[command(name = "teammate-graph", version, about = "Build a teammate graph from basketball-reference.com")]
pub struct Cli {
    /// JSON file with a full or partial configuration
    #[arg(long, env = "TEAMMATE_GRAPH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Roster file: JSON array of names, or CSV with a Player/Name column
    #[arg(long, env = "TEAMMATE_GRAPH_ROSTER")]
    pub roster: Option<PathBuf>,

    /// Graph file to resume from and write to
    #[arg(long, env = "TEAMMATE_GRAPH_OUTPUT")]
    pub graph: Option<PathBuf>,

    /// Override table replacing the bundled one
    #[arg(long, env = "TEAMMATE_GRAPH_OVERRIDES")]
    pub overrides: Option<PathBuf>,

    /// Seconds to wait between players
    #[arg(long, env = "TEAMMATE_GRAPH_DELAY")]
    pub delay: Option<f64>,

    /// Extra random wait of up to this many seconds
    #[arg(long, env = "TEAMMATE_GRAPH_JITTER")]
    pub jitter: Option<f64>,

    /// Navigation attempts per page
    #[arg(long, env = "TEAMMATE_GRAPH_RETRIES")]
    pub retries: Option<u32>,

    /// Seconds between navigation attempts
    #[arg(long, env = "TEAMMATE_GRAPH_RETRY_DELAY")]
    pub retry_delay: Option<f64>,

    /// Seconds to keep waiting for the teammates table
    #[arg(long, env = "TEAMMATE_GRAPH_TABLE_TIMEOUT")]
    pub table_timeout: Option<f64>,

    /// Highest pid suffix to try
    #[arg(long, env = "TEAMMATE_GRAPH_MAX_SUFFIX")]
    pub max_suffix: Option<u32>,

    /// Flush the graph after every N added players
    #[arg(long, env = "TEAMMATE_GRAPH_CHECKPOINT_EVERY")]
    pub checkpoint_every: Option<usize>,

    #[arg(long, default_value = "info", env = "TEAMMATE_GRAPH_LOG_LEVEL")]
    pub log_level: String,
}

impl Cli {
    pub fn into_config(self) -> Result<CrawlConfig> {
        let mut config = match &self.config {
            Some(path) => CrawlConfig::from_file(path)?,
            None => CrawlConfig::default(),
        };

        if let Some(v) = self.roster {
            config.roster_path = v;
        }
        if let Some(v) = self.graph {
            config.graph_path = v;
        }
        if let Some(v) = self.overrides {
            config.overrides_path = Some(v);
        }
        if let Some(v) = self.delay {
            config.request_delay_secs = v;
        }
        if let Some(v) = self.jitter {
            config.delay_jitter_secs = v;
        }
        if let Some(v) = self.retries {
            config.fetch_attempts = v;
        }
        if let Some(v) = self.retry_delay {
            config.retry_delay_secs = v;
        }
        if let Some(v) = self.table_timeout {
            config.table_timeout_secs = v;
        }
        if let Some(v) = self.max_suffix {
            config.max_suffix = v;
        }
        if let Some(v) = self.checkpoint_every {
            config.checkpoint_every = v;
        }

        config.validate()?;
        Ok(config)
    }
}
