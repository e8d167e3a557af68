//! Unified configuration, loaded the way the teacher's `AppConfig::load`
//! does: an env-var override first, then a small set of conventional
//! search locations, YAML-deserialized.

use serde::{Deserialize, Serialize};
use std::{env, path::PathBuf};
use thiserror::Error;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
  pub server: ServerConfig,
  pub database: DatabaseConfig,
  pub cache: CacheConfig,
  pub auth: AuthConfig,
  pub rate_limiting: RateLimitConfig,
  pub quota: QuotaConfig,
  pub observability: ObservabilityConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
  pub host: String,
  pub port: u16,
  pub request_timeout_ms: u64,
  #[serde(default)]
  pub debug: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DatabaseConfig {
  pub url: String,
  pub max_connections: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CacheConfig {
  pub redis_url: String,
  pub key_prefix: String,
  pub pool_size: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AuthConfig {
  pub rsa_private_key_pem: String,
  pub rsa_public_key_pem: String,
  pub access_token_ttl_secs: i64,
  pub refresh_token_ttl_secs: i64,
  pub lockout_threshold: i32,
  pub lockout_duration_secs: i64,
}

impl iam_core::jwt::TokenConfigProvider for AuthConfig {
  fn encoding_key_pem(&self) -> &str {
    &self.rsa_private_key_pem
  }
  fn decoding_key_pem(&self) -> &str {
    &self.rsa_public_key_pem
  }
  fn access_token_ttl_secs(&self) -> i64 {
    self.access_token_ttl_secs
  }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RateLimitConfig {
  pub default_capacity_per_minute: i32,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct QuotaConfig {
  pub warning_threshold_percent: u8,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ObservabilityConfig {
  pub log_level: String,
  #[serde(default)]
  pub json: bool,
  /// Directory to mirror logs into via `tracing-appender`'s hourly
  /// rolling file writer, in addition to stdout. `None` disables it.
  #[serde(default)]
  pub log_file_path: Option<String>,
  /// Port `metrics-exporter-prometheus` binds its `/metrics` scrape
  /// listener to. `None` disables metrics export entirely.
  #[serde(default)]
  pub metrics_port: Option<u16>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
  #[error("yaml parse error: {0}")]
  Yaml(#[from] serde_yaml::Error),
}

impl AppConfig {
  /// Env var override (`IAM_CONFIG`) first, then a short list of
  /// conventional locations.
  pub fn load() -> anyhow::Result<Self> {
    if let Ok(path) = env::var("IAM_CONFIG") {
      return Ok(Self::from_file(&path)?);
    }

    for path in Self::search_locations() {
      if path.exists() {
        match Self::from_file(path.to_str().unwrap()) {
          Ok(config) => return Ok(config),
          Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to parse config candidate");
            continue;
          }
        }
      }
    }

    anyhow::bail!(
      "no configuration file found; set IAM_CONFIG or place one at ./iam.yml, ./config/iam.yml, or /etc/iam/iam.yml"
    )
  }

  fn search_locations() -> Vec<PathBuf> {
    vec![
      PathBuf::from("./iam.yml"),
      PathBuf::from("./config/iam.yml"),
      PathBuf::from("/etc/iam/iam.yml"),
    ]
  }

  pub fn from_file(path: &str) -> Result<Self, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_yaml::from_str(&content)?)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_a_representative_yaml_document() {
    let yaml = r#"
server:
  host: "0.0.0.0"
  port: 8080
  request_timeout_ms: 30000
  debug: true
database:
  url: "postgres://localhost/iam"
  max_connections: 10
cache:
  redis_url: "redis://localhost"
  key_prefix: "iam"
  pool_size: 10
auth:
  rsa_private_key_pem: "dummy"
  rsa_public_key_pem: "dummy"
  access_token_ttl_secs: 900
  refresh_token_ttl_secs: 604800
  lockout_threshold: 5
  lockout_duration_secs: 900
rate_limiting:
  default_capacity_per_minute: 60
quota:
  warning_threshold_percent: 80
observability:
  log_level: "info"
  json: false
"#;
    let config: AppConfig = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.auth.lockout_threshold, 5);
  }
}
