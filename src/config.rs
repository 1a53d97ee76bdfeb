use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::storage::Database;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_INTERVAL_MINUTES: u64 = 30;

/// Process settings read from the environment.
///
/// Credentials (`HEVY_API_KEY`, `NOTION_TOKEN`) are read by the clients
/// themselves so that commands which never call an API do not need them.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub db_path: PathBuf,
    pub port: u16,
    pub sync_interval: Duration,
    pub sync_secret: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let db_path = match get("HEVYSYNC_DB") {
            Some(p) => PathBuf::from(p),
            None => Database::default_path()?,
        };
        let port = parse(get("PORT"), "PORT", DEFAULT_PORT)?;
        let minutes = parse(
            get("SYNC_INTERVAL_MINUTES"),
            "SYNC_INTERVAL_MINUTES",
            DEFAULT_INTERVAL_MINUTES,
        )?;

        Ok(Self {
            db_path,
            port,
            sync_interval: interval_from_minutes(minutes)?,
            sync_secret: get("SYNC_SECRET"),
        })
    }

    /// The bearer secret, required by the HTTP surface.
    pub fn require_secret(&self) -> Result<&str> {
        self.sync_secret
            .as_deref()
            .ok_or_else(|| Error::Config("SYNC_SECRET is not set".into()))
    }
}

/// Scheduler interval for a minute count. Zero and overflowing values are rejected.
pub fn interval_from_minutes(minutes: u64) -> Result<Duration> {
    match minutes.checked_mul(60) {
        Some(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(Error::Config(format!(
            "sync interval must be between 1 and {} minutes, got {minutes}",
            u64::MAX / 60
        ))),
    }
}

fn parse<T: FromStr>(raw: Option<String>, name: &str, default: T) -> Result<T> {
    match raw {
        None => Ok(default),
        Some(v) => v
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{name} has an invalid value: {v}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_explicit_values() {
        let config = Config::from_lookup(lookup(&[
            ("HEVYSYNC_DB", "/tmp/h.db"),
            ("PORT", "9000"),
            ("SYNC_INTERVAL_MINUTES", "5"),
            ("SYNC_SECRET", "s3cret"),
        ]))
        .unwrap();

        assert_eq!(config.db_path, PathBuf::from("/tmp/h.db"));
        assert_eq!(config.port, 9000);
        assert_eq!(config.sync_interval, Duration::from_secs(300));
        assert_eq!(config.require_secret().unwrap(), "s3cret");
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[("HEVYSYNC_DB", "h.db"), ("PORT", "")])).unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.sync_interval, Duration::from_secs(30 * 60));
        assert!(matches!(config.require_secret(), Err(Error::Config(_))));
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            Config::from_lookup(lookup(&[("HEVYSYNC_DB", "h.db"), ("PORT", "eighty")])),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            Config::from_lookup(lookup(&[("HEVYSYNC_DB", "h.db"), ("SYNC_INTERVAL_MINUTES", "0")])),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_interval_overflow_is_config_error() {
        let huge = u64::MAX.to_string();
        assert!(matches!(
            Config::from_lookup(lookup(&[("HEVYSYNC_DB", "h.db"), ("SYNC_INTERVAL_MINUTES", huge.as_str())])),
            Err(Error::Config(_))
        ));
        assert!(matches!(interval_from_minutes(u64::MAX / 60 + 1), Err(Error::Config(_))));
        assert_eq!(
            interval_from_minutes(u64::MAX / 60).unwrap(),
            Duration::from_secs(u64::MAX / 60 * 60)
        );
    }
}
