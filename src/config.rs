use std::path::Path;

use anyhow::{Result, bail};
use chrono::{DateTime, FixedOffset, Local, Offset, Utc};
use serde::Deserialize;
use sha2::{Digest, Sha256};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub run_id: String,
    pub output_timezone: String,
    pub dedup_visits: bool,
}

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: Config,
    pub config_hash: String,
}

/// Zone for the local time column when encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputZone {
    Utc,
    Local,
    Fixed(FixedOffset),
}

impl OutputZone {
    /// Resolve to a fixed offset; `Local` uses the machine's current offset.
    pub fn to_fixed(self) -> FixedOffset {
        match self {
            OutputZone::Utc => Utc.fix(),
            OutputZone::Local => *Local::now().offset(),
            OutputZone::Fixed(offset) => offset,
        }
    }
}

pub fn load_config(path: Option<&Path>) -> Result<LoadedConfig> {
    let bytes: Vec<u8> = if let Some(p) = path {
        std::fs::read(p)?
    } else {
        include_bytes!("../config/default.yml").to_vec()
    };

    let config_hash = config_digest(&bytes);
    let mut config: Config = serde_yaml::from_slice(&bytes)?;
    if config.run_id.trim().is_empty() {
        config.run_id = run_id_at(Utc::now(), &config_hash);
    }
    parse_output_zone(&config.output_timezone)?;

    Ok(LoadedConfig { config, config_hash })
}

/// Parse `UTC`, `local`, or a `±HH:MM` offset.
pub fn parse_output_zone(value: &str) -> Result<OutputZone> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("utc") || value == "Z" {
        return Ok(OutputZone::Utc);
    }
    if value.eq_ignore_ascii_case("local") {
        return Ok(OutputZone::Local);
    }
    let Some(sign) = value.chars().next().filter(|c| *c == '+' || *c == '-') else {
        bail!("unrecognized timezone: {value}");
    };
    let Some((hours, minutes)) = value[1..].split_once(':') else {
        bail!("unrecognized timezone: {value}");
    };
    let (Ok(hours), Ok(minutes)) = (hours.parse::<i32>(), minutes.parse::<i32>()) else {
        bail!("unrecognized timezone: {value}");
    };
    if hours < 0 || !(0..60).contains(&minutes) {
        bail!("timezone offset out of range: {value}");
    }
    let seconds = hours * 3600 + minutes * 60;
    let seconds = if sign == '-' { -seconds } else { seconds };
    match FixedOffset::east_opt(seconds) {
        Some(offset) => Ok(OutputZone::Fixed(offset)),
        None => bail!("timezone offset out of range: {value}"),
    }
}

fn config_digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Run ids sort by start time and name the config they ran with, e.g.
/// `20210608T123000417Z_3fa2c1d0`.
fn run_id_at(now: DateTime<Utc>, config_hash: &str) -> String {
    let short = config_hash.get(..8).unwrap_or(config_hash);
    format!("{}_{short}", now.format("%Y%m%dT%H%M%S%3fZ"))
}
