//! Environment-driven configuration.
//!
//! All knobs come from the environment (optionally via a `.env` file loaded
//! by the binary); missing or unparseable values fall back to their
//! defaults.

use std::fmt;

const ACTIVEMQ_URL: &str = "ACTIVEMQ_URL";
const ACTIVEMQ_URL_SECONDARY: &str = "ACTIVEMQ_URL_SECONDARY";
const ACTIVEMQ_PORT: &str = "ACTIVEMQ_PORT";
const ACTIVEMQ_USERNAME: &str = "ACTIVEMQ_USERNAME";
const ACTIVEMQ_PASSWORD: &str = "ACTIVEMQ_PASSWORD";
const USE_SSL: &str = "USE_SSL";
const SCRAPE_INTERVAL: &str = "SCRAPE_INTERVAL";
const PORT: &str = "PORT";

const DEFAULT_BROKER_PORT: u16 = 61614;
const DEFAULT_SCRAPE_INTERVAL: u64 = 60;
const DEFAULT_HTTP_PORT: u16 = 8000;

/// One broker candidate. The first endpoint in [`Config::endpoints`] is the
/// primary; the rest are failover candidates tried in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerEndpoint {
    pub host: String,
    pub port: u16,
}

impl fmt::Display for BrokerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Pre-provisioned broker credentials.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Ranked broker endpoints, primary first.
    pub endpoints: Vec<BrokerEndpoint>,

    pub credentials: Credentials,

    /// Wrap every candidate endpoint in TLS. There is no per-endpoint
    /// override.
    pub use_tls: bool,

    /// Seconds between collection cycles.
    pub scrape_interval_secs: u64,

    /// Port the metrics HTTP server binds on.
    pub http_port: u16,
}

impl Config {
    pub fn from_env() -> Self {
        let primary_host = get_env_or(ACTIVEMQ_URL, "localhost".to_string());
        let port = parse_env_or(ACTIVEMQ_PORT, DEFAULT_BROKER_PORT);

        let mut endpoints = vec![BrokerEndpoint {
            host: primary_host,
            port,
        }];
        if let Ok(secondary) = std::env::var(ACTIVEMQ_URL_SECONDARY)
            && !secondary.is_empty()
        {
            endpoints.push(BrokerEndpoint {
                host: secondary,
                port,
            });
        }

        Self {
            endpoints,
            credentials: Credentials {
                user: get_env_or(ACTIVEMQ_USERNAME, "monitor".to_string()),
                password: get_env_or(ACTIVEMQ_PASSWORD, "monitor".to_string()),
            },
            use_tls: parse_bool(&get_env_or(USE_SSL, "true".to_string())),
            scrape_interval_secs: parse_env_or(SCRAPE_INTERVAL, DEFAULT_SCRAPE_INTERVAL),
            http_port: parse_env_or(PORT, DEFAULT_HTTP_PORT),
        }
    }
}

fn get_env_or(key: &str, default: String) -> String {
    std::env::var(key).unwrap_or(default)
}

fn parse_env_or<T: std::str::FromStr + Copy>(key: &str, default: T) -> T {
    std::env::var(key).map_or(default, |res| res.parse().unwrap_or(default))
}

fn parse_bool(value: &str) -> bool {
    value.to_lowercase() == "true"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bool_matches_true_case_insensitively() {
        assert!(parse_bool("true"));
        assert!(parse_bool("True"));
        assert!(parse_bool("TRUE"));
        assert!(!parse_bool("false"));
        assert!(!parse_bool("1"));
        assert!(!parse_bool(""));
    }

    #[test]
    fn endpoint_displays_as_host_port() {
        let endpoint = BrokerEndpoint {
            host: "amq.internal".to_string(),
            port: 61614,
        };
        assert_eq!(endpoint.to_string(), "amq.internal:61614");
    }
}
