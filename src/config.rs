use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::latency::aggregator::DEFAULT_FLUSH_INTERVAL;

/// Which aggregate store backend to run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreKind {
    Redis,
    /// Process-local; everything is lost on exit
    Memory,
}

/// Command-line / environment configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "route-latency", about = "Per-route response latency aggregation service")]
pub struct Config {
    /// Address the HTTP server binds to
    #[arg(long, env = "LATENCY_BIND", default_value = "0.0.0.0:3000")]
    pub bind: String,

    /// Aggregate store backend
    #[arg(long, env = "LATENCY_STORE", value_enum, default_value_t = StoreKind::Redis)]
    pub store: StoreKind,

    #[arg(long, env = "REDIS_URL", default_value = "redis://127.0.0.1:6379/")]
    pub redis_url: String,

    /// Namespace for every key the aggregate writes
    #[arg(long, env = "LATENCY_KEY_PREFIX", default_value = "latency")]
    pub key_prefix: String,

    /// Delay between the first staged sample and its flush (ms)
    #[arg(
        long,
        env = "LATENCY_FLUSH_INTERVAL_MS",
        default_value_t = DEFAULT_FLUSH_INTERVAL.as_millis() as u64,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub flush_interval_ms: u64,

    /// Record requests that match no route under this fixed name instead of
    /// their raw path, bounding the number of stored routes
    #[arg(long, env = "LATENCY_UNMATCHED_ROUTE")]
    pub unmatched_route: Option<String>,
}

impl Config {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::try_parse_from(["route-latency"]).unwrap();
        assert_eq!(config.store, StoreKind::Redis);
        assert_eq!(config.key_prefix, "latency");
        assert_eq!(config.flush_interval(), Duration::from_millis(5000));
        assert_eq!(config.unmatched_route, None);
    }

    #[test]
    fn overrides_and_validation() {
        let config = Config::try_parse_from([
            "route-latency",
            "--store",
            "memory",
            "--flush-interval-ms",
            "250",
            "--key-prefix",
            "plugin_latency",
            "--unmatched-route",
            "(unmatched)",
        ])
        .unwrap();
        assert_eq!(config.store, StoreKind::Memory);
        assert_eq!(config.flush_interval(), Duration::from_millis(250));
        assert_eq!(config.key_prefix, "plugin_latency");
        assert_eq!(config.unmatched_route.as_deref(), Some("(unmatched)"));

        assert!(Config::try_parse_from(["route-latency", "--flush-interval-ms", "0"]).is_err());
    }
}
