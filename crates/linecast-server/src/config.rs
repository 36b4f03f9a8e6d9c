//! Server configuration.
//!
//! Configuration is read from `linecast.toml` inside the directory named by
//! the `LINECAST_CONF_DIR` environment variable. The file must exist and must
//! set `port`; everything else has a default.

use anyhow::{Context, Result};
use linecast_protocol::codec::DEFAULT_MAX_LINE_LENGTH;
use linecast_transport::TcpConfig;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

/// Environment variable naming the configuration directory.
pub const CONF_DIR_ENV: &str = "LINECAST_CONF_DIR";

/// Configuration file name inside the configuration directory.
pub const CONFIG_FILE_NAME: &str = "linecast.toml";

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// IP address to bind to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on.
    pub port: u16,

    /// Resource limits.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Metrics configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Resource limits configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum inbound line length in bytes.
    #[serde(default = "default_max_line_length")]
    pub max_line_length: usize,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable the Prometheus exporter.
    #[serde(default)]
    pub enabled: bool,

    /// Metrics port.
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_max_line_length() -> usize {
    DEFAULT_MAX_LINE_LENGTH
}

fn default_metrics_port() -> u16 {
    9090
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_line_length: default_max_line_length(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

impl Config {
    /// Load configuration from `$LINECAST_CONF_DIR/linecast.toml`.
    ///
    /// # Errors
    ///
    /// Returns an error if the variable is unset or the file cannot be read
    /// or parsed.
    pub fn load() -> Result<Self> {
        let path = Self::default_path()?;
        Self::from_file(path)
    }

    /// Resolve the configuration file path from the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if `LINECAST_CONF_DIR` is not set.
    pub fn default_path() -> Result<PathBuf> {
        let template = format!("${{{}}}/{}", CONF_DIR_ENV, CONFIG_FILE_NAME);
        let expanded = shellexpand::full(&template)
            .with_context(|| format!("Failed to resolve config path from {}", CONF_DIR_ENV))?;
        Ok(PathBuf::from(expanded.as_ref()))
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Get the socket address to bind to.
    ///
    /// # Errors
    ///
    /// Returns an error if `host` is not an IP address.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self
            .host
            .parse()
            .with_context(|| format!("Invalid host address: {}", self.host))?;
        Ok(SocketAddr::new(ip, self.port))
    }

    /// Get the TCP transport configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the bind address is invalid.
    pub fn tcp_config(&self) -> Result<TcpConfig> {
        Ok(TcpConfig {
            bind_addr: self.bind_addr()?,
            max_line_length: self.limits.max_line_length,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
            host = "127.0.0.1"
            port = 9000

            [limits]
            max_line_length = 1024
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 9000);
        assert_eq!(config.limits.max_line_length, 1024);
        assert!(!config.metrics.enabled);
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: Config = toml::from_str("port = 1102").unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.limits.max_line_length, 64 * 1024);
        assert_eq!(config.metrics.port, 9090);

        let tcp = config.tcp_config().unwrap();
        assert_eq!(tcp.bind_addr.port(), 1102);
    }

    #[test]
    fn test_port_is_required() {
        assert!(toml::from_str::<Config>(r#"host = "127.0.0.1""#).is_err());
    }

    #[test]
    fn test_bind_addr_rejects_hostname() {
        let config: Config = toml::from_str(
            r#"
            host = "not an ip"
            port = 1
        "#,
        )
        .unwrap();
        assert!(config.bind_addr().is_err());
    }

    #[test]
    fn test_load_from_conf_dir() {
        let tmp = TempDir::new().expect("create tempdir");
        fs::write(
            tmp.path().join(CONFIG_FILE_NAME),
            "port = 4242\n[metrics]\nenabled = true\n",
        )
        .expect("write config file");

        temp_env::with_var(CONF_DIR_ENV, Some(tmp.path()), || {
            let config = Config::load().expect("load config");
            assert_eq!(config.port, 4242);
            assert!(config.metrics.enabled);
        });
    }

    #[test]
    fn test_load_fails_without_file() {
        let tmp = TempDir::new().expect("create tempdir");
        temp_env::with_var(CONF_DIR_ENV, Some(tmp.path()), || {
            assert!(Config::load().is_err());
        });
    }

    #[test]
    fn test_load_fails_without_env() {
        temp_env::with_var_unset(CONF_DIR_ENV, || {
            assert!(Config::default_path().is_err());
            assert!(Config::load().is_err());
        });
    }
}
