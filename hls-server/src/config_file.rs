//! Configuration file support
//!
//! Loads server configuration from TOML files, with every section
//! optional so an operator's config file only needs to name the
//! settings it wants to override.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::config::{CoreConfig, LimitsConfig, ServerConfig};

/// Configuration file format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    pub server: ServerSettings,
    pub core: CoreSettings,
    pub logging: Option<LoggingSettings>,
    pub limits: Option<LimitsSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub media_root: String,
    pub cors_enabled: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreSettings {
    pub cache_root: String,
    pub target_segment_duration_seconds: Option<f64>,
    pub encoder_binary_path: String,
    pub probe_binary_path: String,
    pub max_concurrent_encodes: Option<usize>,
    pub segment_filename_digits: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    pub level: String,
    pub json: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsSettings {
    pub rate_limit_rps: Option<u32>,
    pub rate_limit_burst: Option<u32>,
    pub max_connections_per_ip: Option<usize>,
    pub shutdown_grace_seconds: Option<u64>,
}

impl ConfigFile {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: ConfigFile = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }

    pub fn default_config() -> Self {
        let defaults = ServerConfig::default();
        Self {
            server: ServerSettings {
                host: defaults.host,
                port: defaults.port,
                media_root: defaults.media_root,
                cors_enabled: Some(defaults.cors_enabled),
            },
            core: CoreSettings {
                cache_root: defaults.core.cache_root,
                target_segment_duration_seconds: Some(defaults.core.target_segment_duration_seconds),
                encoder_binary_path: defaults.core.encoder_binary_path,
                probe_binary_path: defaults.core.probe_binary_path,
                max_concurrent_encodes: Some(defaults.core.max_concurrent_encodes),
                segment_filename_digits: Some(defaults.core.segment_filename_digits),
            },
            logging: Some(LoggingSettings {
                level: defaults.log_level,
                json: Some(defaults.log_json),
            }),
            limits: Some(LimitsSettings {
                rate_limit_rps: Some(defaults.limits.rate_limit_rps),
                rate_limit_burst: Some(defaults.limits.rate_limit_burst),
                max_connections_per_ip: Some(defaults.limits.max_connections_per_ip),
                shutdown_grace_seconds: Some(defaults.shutdown_grace_seconds),
            }),
        }
    }

    pub fn into_server_config(self) -> ServerConfig {
        let base = ServerConfig::default();
        let limits = self.limits;
        ServerConfig {
            host: self.server.host,
            port: self.server.port,
            media_root: self.server.media_root,
            core: CoreConfig {
                cache_root: self.core.cache_root,
                target_segment_duration_seconds: self
                    .core
                    .target_segment_duration_seconds
                    .unwrap_or(base.core.target_segment_duration_seconds),
                encoder_binary_path: self.core.encoder_binary_path,
                probe_binary_path: self.core.probe_binary_path,
                max_concurrent_encodes: self
                    .core
                    .max_concurrent_encodes
                    .unwrap_or(base.core.max_concurrent_encodes),
                segment_filename_digits: self
                    .core
                    .segment_filename_digits
                    .unwrap_or(base.core.segment_filename_digits),
            },
            limits: LimitsConfig {
                rate_limit_rps: limits
                    .as_ref()
                    .and_then(|l| l.rate_limit_rps)
                    .unwrap_or(base.limits.rate_limit_rps),
                rate_limit_burst: limits
                    .as_ref()
                    .and_then(|l| l.rate_limit_burst)
                    .unwrap_or(base.limits.rate_limit_burst),
                max_connections_per_ip: limits
                    .as_ref()
                    .and_then(|l| l.max_connections_per_ip)
                    .unwrap_or(base.limits.max_connections_per_ip),
            },
            cors_enabled: self.server.cors_enabled.unwrap_or(base.cors_enabled),
            log_level: self
                .logging
                .as_ref()
                .map(|l| l.level.clone())
                .unwrap_or(base.log_level),
            log_json: self
                .logging
                .as_ref()
                .and_then(|l| l.json)
                .unwrap_or(base.log_json),
            shutdown_grace_seconds: limits
                .as_ref()
                .and_then(|l| l.shutdown_grace_seconds)
                .unwrap_or(base.shutdown_grace_seconds),
        }
    }
}

/// Generate default configuration file at the specified path, for
/// operators bootstrapping a deployment.
pub fn generate_default_config<P: AsRef<Path>>(path: P) -> Result<(), Box<dyn std::error::Error>> {
    let config = ConfigFile::default_config();
    config.to_file(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = ConfigFile::default_config();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.core.segment_filename_digits, Some(3));
    }

    #[test]
    fn test_config_file_roundtrip() {
        let config = ConfigFile::default_config();

        let mut temp_file = NamedTempFile::new().unwrap();
        let content = toml::to_string_pretty(&config).unwrap();
        temp_file.write_all(content.as_bytes()).unwrap();

        let loaded = ConfigFile::from_file(temp_file.path()).unwrap();
        assert_eq!(loaded.server.port, config.server.port);
        assert_eq!(loaded.core.cache_root, config.core.cache_root);
    }

    #[test]
    fn test_into_server_config() {
        let config_file = ConfigFile::default_config();
        let server_config = config_file.into_server_config();

        assert_eq!(server_config.port, 3000);
        assert_eq!(server_config.core.target_segment_duration_seconds, 6.0);
    }

    #[test]
    fn test_generate_default_config() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().to_path_buf();

        generate_default_config(&path).unwrap();

        assert!(path.exists());
        let loaded = ConfigFile::from_file(&path).unwrap();
        assert_eq!(loaded.server.port, 3000);
    }
}
