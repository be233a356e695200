//! Environment-driven configuration
//!
//! Every knob has a default so the monitor starts with nothing but a database
//! path. `.env` files are loaded by `main` through `dotenvy` before this runs.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::models::DEFAULT_MAX_SITES;

const DEFAULT_DATABASE_URL: &str = "sqlite:database/watches.db";
const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Upper bound on the render strategy's settle wait.
pub const MAX_SETTLE_DELAY: Duration = Duration::from_secs(10);
/// Upper bound on the render strategy's initial page load.
pub const MAX_RENDER_LOAD: Duration = Duration::from_secs(60);

/// How pages are loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStrategy {
    /// Plain request/response, for static pages
    Http,
    /// Headless Chromium, for pages rendered client-side
    Render,
}

impl FromStr for FetchStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "http" => Ok(Self::Http),
            "render" | "browser" => Ok(Self::Render),
            other => Err(ConfigError::Env {
                var: "FETCH_STRATEGY".to_string(),
                message: format!("unknown strategy {other:?}, expected \"http\" or \"render\""),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub poll_interval: Duration,
    pub fetch_strategy: FetchStrategy,
    pub fetch_timeout: Duration,
    pub settle_delay: Duration,
    /// Chromium binary for the render strategy; found on `PATH` when unset.
    pub chrome_executable: Option<PathBuf>,
    pub max_sites: usize,
    pub concurrency: usize,
    /// `None` keeps seen records forever.
    pub seen_retention: Option<Duration>,
    pub telegram_token: Option<String>,
    pub user_agent: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let fetch_strategy = match get("FETCH_STRATEGY") {
            Some(raw) => raw.parse::<FetchStrategy>()?,
            None => FetchStrategy::Http,
        };

        let settle_ms: u64 = parse_var(&get, "RENDER_SETTLE_MS", 5_000)?;
        let max_sites: usize = parse_var(&get, "MAX_SITES_PER_WATCH", DEFAULT_MAX_SITES)?;
        let concurrency: usize = parse_var(&get, "MONITOR_CONCURRENCY", 4)?;

        if max_sites == 0 {
            return Err(ConfigError::Env {
                var: "MAX_SITES_PER_WATCH".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        let seen_retention = match get("SEEN_RETENTION_DAYS") {
            Some(raw) => {
                let days: u64 = parse_value("SEEN_RETENTION_DAYS", &raw)?;
                let secs = days.checked_mul(24 * 60 * 60).ok_or_else(|| ConfigError::Env {
                    var: "SEEN_RETENTION_DAYS".to_string(),
                    message: format!("{days} days is too long"),
                })?;
                Some(Duration::from_secs(secs))
            }
            None => None,
        };

        Ok(Self {
            database_url: get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            poll_interval: Duration::from_secs(parse_var(&get, "POLL_INTERVAL_SECS", 60)?),
            fetch_strategy,
            fetch_timeout: Duration::from_secs(parse_var(&get, "FETCH_TIMEOUT_SECS", 30)?),
            settle_delay: Duration::from_millis(settle_ms).min(MAX_SETTLE_DELAY),
            chrome_executable: get("CHROME_EXECUTABLE").map(PathBuf::from),
            max_sites,
            concurrency: concurrency.max(1),
            seen_retention,
            telegram_token: get("TELEGRAM_TOKEN"),
            user_agent: get("USER_AGENT").unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
        })
    }
}

fn parse_var<T, G>(get: &G, var: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    get(var).map_or(Ok(default), |raw| parse_value(var, &raw))
}

fn parse_value<T>(var: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Env {
        var: var.to_string(),
        message: format!("{raw:?}: {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config_from(&[]).unwrap();

        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(config.poll_interval, Duration::from_secs(60));
        assert_eq!(config.fetch_strategy, FetchStrategy::Http);
        assert_eq!(config.max_sites, 5);
        assert_eq!(config.concurrency, 4);
        assert!(config.seen_retention.is_none());
        assert!(config.telegram_token.is_none());
    }

    #[test]
    fn overrides_are_parsed() {
        let config = config_from(&[
            ("POLL_INTERVAL_SECS", "15"),
            ("FETCH_STRATEGY", "render"),
            ("SEEN_RETENTION_DAYS", "30"),
            ("TELEGRAM_TOKEN", "123:abc"),
            ("MONITOR_CONCURRENCY", "0"),
        ])
        .unwrap();

        assert_eq!(config.poll_interval, Duration::from_secs(15));
        assert_eq!(config.fetch_strategy, FetchStrategy::Render);
        assert_eq!(config.seen_retention, Some(Duration::from_secs(30 * 86_400)));
        assert_eq!(config.telegram_token.as_deref(), Some("123:abc"));
        assert_eq!(config.concurrency, 1);
    }

    #[test]
    fn settle_delay_is_capped() {
        let config = config_from(&[("RENDER_SETTLE_MS", "60000")]).unwrap();
        assert_eq!(config.settle_delay, MAX_SETTLE_DELAY);
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let config = config_from(&[("TELEGRAM_TOKEN", "  "), ("POLL_INTERVAL_SECS", "")]).unwrap();
        assert!(config.telegram_token.is_none());
        assert_eq!(config.poll_interval, Duration::from_secs(60));
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(matches!(
            config_from(&[("POLL_INTERVAL_SECS", "soon")]),
            Err(ConfigError::Env { var, .. }) if var == "POLL_INTERVAL_SECS"
        ));
        assert!(config_from(&[("FETCH_STRATEGY", "carrier-pigeon")]).is_err());
        assert!(config_from(&[("MAX_SITES_PER_WATCH", "0")]).is_err());
    }

    #[test]
    fn retention_overflow_is_rejected() {
        assert!(matches!(
            config_from(&[("SEEN_RETENTION_DAYS", "18446744073709551615")]),
            Err(ConfigError::Env { var, .. }) if var == "SEEN_RETENTION_DAYS"
        ));
    }
}
