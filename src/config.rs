//! Configuration parsing and validation for the relay server
//!
//! This module handles command-line argument parsing and validation using clap.
//! It defines the main configuration structure used throughout the application.
use anyhow::anyhow;
use clap::Parser;
use url::Url;

#[derive(Debug, Clone, Parser)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// The port on which the relay will listen.
    #[arg(short = 'p', long, env = "RELAIS_PORT", default_value_t = 8000)]
    pub port: u16,

    /// The chat endpoint of the inference backend.
    #[arg(
        long,
        env = "RELAIS_UPSTREAM_URL",
        default_value = relais::DEFAULT_UPSTREAM_URL
    )]
    pub upstream_url: Url,

    /// The single browser origin allowed to call the relay, with credentials.
    #[arg(
        long,
        env = "RELAIS_ALLOWED_ORIGIN",
        default_value = relais::DEFAULT_ALLOWED_ORIGIN
    )]
    pub allowed_origin: String,
}

impl Config {
    pub fn validate(self) -> Result<Self, anyhow::Error> {
        if !matches!(self.upstream_url.scheme(), "http" | "https") {
            return Err(anyhow!(
                "Upstream URL '{}' must use http or https",
                self.upstream_url
            ));
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_the_stock_deployment() {
        let config = Config::try_parse_from(["relais"]).unwrap();
        assert_eq!(config.port, 8000);
        assert_eq!(config.upstream_url.as_str(), relais::DEFAULT_UPSTREAM_URL);
        assert_eq!(config.allowed_origin, relais::DEFAULT_ALLOWED_ORIGIN);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_non_http_upstreams() {
        let config = Config::try_parse_from([
            "relais",
            "--upstream-url",
            "ftp://localhost:11434/api/chat",
        ])
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_flags_override_the_defaults() {
        let config = Config::try_parse_from([
            "relais",
            "-p",
            "9000",
            "--allowed-origin",
            "http://localhost:3000",
        ])
        .unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.allowed_origin, "http://localhost:3000");
    }
}
