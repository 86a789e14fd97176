use std::path::PathBuf;

use crate::engine::EngineConfig;
use crate::limits::*;

/// Process configuration, read once from `LOANQ_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    pub max_connections: usize,
    pub metrics_port: Option<u16>,
    /// Hour of day (UTC) at which the daily reset fires.
    pub reset_hour_utc: u32,
    pub seed_file: Option<PathBuf>,
    pub engine: EngineConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: 7878,
            max_connections: 256,
            metrics_port: None,
            reset_hour_utc: 20,
            seed_file: None,
            engine: EngineConfig::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key → value source. Unparseable values keep their default.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let d = Self::default();
        let parsed = |key: &str| get(key).and_then(|s| s.trim().parse::<u64>().ok());

        let notify_limit = parsed("LOANQ_NOTIFY_LIMIT")
            .map(|n| n as usize)
            .filter(|&n| n >= 1)
            .unwrap_or(DEFAULT_NOTIFY_LIMIT);

        Self {
            bind: get("LOANQ_BIND").unwrap_or(d.bind),
            port: parsed("LOANQ_PORT")
                .and_then(|p| u16::try_from(p).ok())
                .unwrap_or(d.port),
            max_connections: parsed("LOANQ_MAX_CONNECTIONS")
                .map(|n| n as usize)
                .filter(|&n| n > 0)
                .unwrap_or(d.max_connections),
            metrics_port: parsed("LOANQ_METRICS_PORT").and_then(|p| u16::try_from(p).ok()),
            reset_hour_utc: parsed("LOANQ_RESET_HOUR_UTC")
                .filter(|&h| h < 24)
                .map(|h| h as u32)
                .unwrap_or(d.reset_hour_utc),
            seed_file: get("LOANQ_SEED_FILE").map(PathBuf::from),
            engine: EngineConfig {
                notify_limit,
                default_hold: DEFAULT_HOLD,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k: &str| map.get(k).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let c = Config::from_lookup(lookup(&[]));
        assert_eq!(c.port, 7878);
        assert_eq!(c.engine.notify_limit, 3);
        assert_eq!(c.reset_hour_utc, 20);
        assert!(c.metrics_port.is_none());
    }

    #[test]
    fn reads_overrides() {
        let c = Config::from_lookup(lookup(&[
            ("LOANQ_PORT", "9000"),
            ("LOANQ_NOTIFY_LIMIT", "5"),
            ("LOANQ_RESET_HOUR_UTC", "6"),
            ("LOANQ_METRICS_PORT", "9100"),
            ("LOANQ_SEED_FILE", "/tmp/seed.json"),
        ]));
        assert_eq!(c.port, 9000);
        assert_eq!(c.engine.notify_limit, 5);
        assert_eq!(c.reset_hour_utc, 6);
        assert_eq!(c.metrics_port, Some(9100));
        assert_eq!(c.seed_file, Some(PathBuf::from("/tmp/seed.json")));
    }

    #[test]
    fn invalid_values_fall_back() {
        let c = Config::from_lookup(lookup(&[
            ("LOANQ_PORT", "70000"),
            ("LOANQ_NOTIFY_LIMIT", "0"),
            ("LOANQ_RESET_HOUR_UTC", "24"),
            ("LOANQ_MAX_CONNECTIONS", "lots"),
        ]));
        assert_eq!(c.port, 7878);
        assert_eq!(c.engine.notify_limit, DEFAULT_NOTIFY_LIMIT);
        assert_eq!(c.reset_hour_utc, 20);
        assert_eq!(c.max_connections, 256);
    }
}
