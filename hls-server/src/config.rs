//! Server configuration

use serde::{Deserialize, Serialize};

/// Core streaming options, matching the enumerated configuration in §6.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Filesystem path; must be writable. Root of the on-disk segment cache.
    pub cache_root: String,

    /// Target segment duration in seconds.
    pub target_segment_duration_seconds: f64,

    /// Absolute path to the encoder (ffmpeg-compatible) binary.
    pub encoder_binary_path: String,

    /// Absolute path to the probe (ffprobe-compatible) binary.
    pub probe_binary_path: String,

    /// Bounds how many encoder subprocesses may run at once.
    pub max_concurrent_encodes: usize,

    /// Zero-padded width of the `segment_NNN.ts` index.
    pub segment_filename_digits: usize,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            cache_root: "./cache".to_string(),
            target_segment_duration_seconds: 6.0,
            encoder_binary_path: "/usr/bin/ffmpeg".to_string(),
            probe_binary_path: "/usr/bin/ffprobe".to_string(),
            max_concurrent_encodes: num_cpus_or_default(),
            segment_filename_digits: 3,
        }
    }
}

fn num_cpus_or_default() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// Rate limiting and connection limiting options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Sustained requests-per-second allowed per client IP. Zero disables
    /// rate limiting.
    pub rate_limit_rps: u32,

    /// Burst capacity for the token bucket.
    pub rate_limit_burst: u32,

    /// Maximum concurrent connections per client IP. Zero disables the
    /// connection cap.
    pub max_connections_per_ip: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            rate_limit_rps: 20,
            rate_limit_burst: 40,
            max_connections_per_ip: 16,
        }
    }
}

/// Server configuration: core options plus the ambient HTTP/process
/// concerns the original specification delegates to an external
/// collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Root directory under which `MediaId`s are resolved to source files.
    pub media_root: String,

    /// Core streaming configuration.
    pub core: CoreConfig,

    /// Rate/connection limiting configuration.
    pub limits: LimitsConfig,

    /// Enable CORS
    pub cors_enabled: bool,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Emit structured JSON logs instead of human-readable ones.
    pub log_json: bool,

    /// Grace period before SIGKILL-ing encoder subprocesses on shutdown.
    pub shutdown_grace_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            media_root: "./media".to_string(),
            core: CoreConfig::default(),
            limits: LimitsConfig::default(),
            cors_enabled: true,
            log_level: "info".to_string(),
            log_json: false,
            shutdown_grace_seconds: 5,
        }
    }
}

impl ServerConfig {
    /// Get the socket address string
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: ServerConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file(&self, path: &str) -> Result<(), Box<dyn std::error::Error>> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.core.target_segment_duration_seconds, 6.0);
        assert_eq!(config.core.segment_filename_digits, 3);
    }

    #[test]
    fn test_socket_addr() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Default::default()
        };
        assert_eq!(config.socket_addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_round_trips_through_toml() {
        let config = ServerConfig::default();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        config.to_file(path.to_str().unwrap()).unwrap();
        let loaded = ServerConfig::from_file(path.to_str().unwrap()).unwrap();
        assert_eq!(loaded.port, config.port);
        assert_eq!(loaded.core.cache_root, config.core.cache_root);
    }
}
