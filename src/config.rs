use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Deserializer};
use snafu::ResultExt;

use crate::database::DatabaseConfig;
use crate::error::{ApplicationError, ConfigLoadSnafu};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(rename = "host_address")]
    pub host: SocketAddr,
    #[serde(rename = "log_dir", default = "default_log_dir")]
    pub log_dir: PathBuf,
    #[serde(flatten)]
    pub database: DatabaseConfig,
    #[serde(flatten)]
    pub trending: TrendingConfig,
}

impl Config {
    pub fn from_env() -> Result<Config, ApplicationError> {
        envy::from_env::<Config>().context(ConfigLoadSnafu)
    }
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

/// Knobs for the trending score model. Durations accept humantime syntax
/// (`24h`, `90s`, `5m 30s`).
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct TrendingConfig {
    /// Time for a score to halve with no new views.
    #[serde(
        rename = "trending_half_life",
        default = "default_half_life",
        deserialize_with = "humantime_duration"
    )]
    pub half_life: Duration,

    /// How often the background task folds pending view credits into scores.
    #[serde(
        rename = "trending_recompute_interval",
        default = "default_recompute_interval",
        deserialize_with = "humantime_duration"
    )]
    pub recompute_interval: Duration,

    /// Entries whose decayed score falls below this are dropped at recompute.
    #[serde(rename = "trending_score_floor", default = "default_score_floor")]
    pub score_floor: f64,
}

impl Default for TrendingConfig {
    fn default() -> Self {
        Self {
            half_life: default_half_life(),
            recompute_interval: default_recompute_interval(),
            score_floor: default_score_floor(),
        }
    }
}

fn default_half_life() -> Duration {
    Duration::from_secs(24 * 60 * 60)
}

fn default_recompute_interval() -> Duration {
    Duration::from_secs(2)
}

fn default_score_floor() -> f64 {
    0.4
}

fn humantime_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    humantime::parse_duration(&text).map_err(serde::de::Error::custom)
}
