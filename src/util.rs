use std::path::PathBuf;

use chrono::{Local, NaiveDateTime, SubsecRound};

const HISTORY_PATH: &str = "SYSMON_HISTORY_PATH";

pub fn get_history_path(default: PathBuf) -> PathBuf {
    std::env::var(HISTORY_PATH).map_or(default, PathBuf::from)
}

const INTERVAL_MS: &str = "SYSMON_INTERVAL_MS";

pub fn get_interval_ms(default: u64) -> u64 {
    parse_or(std::env::var(INTERVAL_MS).ok(), default)
}

const THRESHOLD: &str = "SYSMON_THRESHOLD";

pub fn get_threshold(default: f64) -> f64 {
    parse_or(std::env::var(THRESHOLD).ok(), default)
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    match value.map(|res| res.trim().parse()) {
        Some(Ok(parsed)) => parsed,
        _ => default,
    }
}

/// Current local time truncated to whole seconds, the resolution of the history file.
pub fn now_timestamp() -> NaiveDateTime {
    Local::now().naive_local().trunc_subsecs(0)
}

/// `YYYY-MM-DD HH:MM:SS` (de)serialization for history timestamps
pub mod timestamp_format {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub fn serialize<S>(timestamp: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&timestamp.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, FORMAT).map_err(D::Error::custom)
    }
}
