//! Allocator configuration, read from YAML.
//!
//! ```yaml
//! app: zhongcni
//! component: ipam
//! xline_config:
//!   endpoints: ["192.168.5.11:2379"]
//!   dial_timeout_secs: 30
//! tls_config:
//!   enable: true
//!   ca_file: /etc/zhongcni/ca.pem
//!   cert_file: /etc/zhongcni/client.pem
//!   key_file: /etc/zhongcni/client-key.pem
//! retry:
//!   max_retries: 64
//!   timeout_secs: 10
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::backoff::{RetryConfig, RetryPolicy};
use crate::error::{IpamError, Result};
use crate::keys::{DEFAULT_APP, DEFAULT_COMPONENT, Keyspace};
use crate::store::StoreOptions;

#[derive(Debug, Clone, Deserialize)]
pub struct IpamConfig {
    #[serde(default = "default_app")]
    pub app: String,
    #[serde(default = "default_component")]
    pub component: String,
    pub xline_config: XlineConfig,
    #[serde(default)]
    pub tls_config: TlsConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct XlineConfig {
    pub endpoints: Vec<String>,
    #[serde(default = "default_dial_timeout_secs")]
    pub dial_timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TlsConfig {
    #[serde(default)]
    pub enable: bool,
    pub ca_file: Option<PathBuf>,
    pub cert_file: Option<PathBuf>,
    pub key_file: Option<PathBuf>,
}

fn default_app() -> String {
    DEFAULT_APP.to_string()
}

fn default_component() -> String {
    DEFAULT_COMPONENT.to_string()
}

fn default_dial_timeout_secs() -> u64 {
    30
}

impl IpamConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            IpamError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let cfg: IpamConfig = serde_yaml::from_str(content)
            .map_err(|e| IpamError::Config(format!("failed to parse YAML config: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if self.app.is_empty() || self.component.is_empty() {
            return Err(IpamError::Config(
                "app and component must not be empty".to_string(),
            ));
        }
        if self.xline_config.endpoints.is_empty() {
            return Err(IpamError::Config(
                "xline_config.endpoints is empty".to_string(),
            ));
        }
        if self.tls_config.enable {
            let t = &self.tls_config;
            if t.ca_file.is_none() || t.cert_file.is_none() || t.key_file.is_none() {
                return Err(IpamError::Config(
                    "tls_config needs ca_file, cert_file and key_file when enabled".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn keyspace(&self) -> Keyspace {
        Keyspace::new(&self.app, &self.component)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from(&self.retry)
    }

    pub fn allocation_timeout(&self) -> Option<Duration> {
        self.retry.timeout_secs.map(Duration::from_secs)
    }

    /// Build store connection options, reading TLS material from disk.
    pub fn store_options(&self) -> Result<StoreOptions> {
        let mut option = StoreOptions::new(self.xline_config.endpoints.clone())
            .with_connect_timeout(Duration::from_secs(self.xline_config.dial_timeout_secs));

        if let TlsConfig {
            enable: true,
            ca_file: Some(ca),
            cert_file: Some(cert),
            key_file: Some(key),
        } = &self.tls_config
        {
            option = option.with_tls(read_pem(ca)?, read_pem(cert)?, read_pem(key)?);
        }
        Ok(option)
    }
}

fn read_pem(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .map_err(|e| IpamError::Config(format!("failed to read {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let cfg = IpamConfig::from_yaml(
            r#"
xline_config:
  endpoints: ["http://127.0.0.1:2379"]
"#,
        )
        .unwrap();
        assert_eq!(cfg.keyspace(), Keyspace::default());
        assert_eq!(cfg.retry_policy(), RetryPolicy::default());
        assert_eq!(cfg.allocation_timeout(), None);
        assert!(!cfg.tls_config.enable);
        assert_eq!(cfg.xline_config.dial_timeout_secs, 30);
    }

    #[test]
    fn test_full_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
app: rkcni
component: addr
xline_config:
  endpoints: ["10.0.0.1:2379", "10.0.0.2:2379"]
  dial_timeout_secs: 5
retry:
  max_retries: 16
  base_delay_ms: 1
  max_delay_ms: 50
  jitter_ms: 0
  timeout_secs: 3
"#
        )
        .unwrap();

        let cfg = IpamConfig::from_file(file.path()).unwrap();
        assert_eq!(cfg.keyspace().segment_key("10.0.0.0/24"), "/rkcni/addr/10.0.0.0/24");
        let policy = cfg.retry_policy();
        assert_eq!(policy.max_retries, Some(16));
        assert_eq!(policy.max_delay, Duration::from_millis(50));
        assert_eq!(cfg.allocation_timeout(), Some(Duration::from_secs(3)));
        assert_eq!(cfg.xline_config.endpoints.len(), 2);
    }

    #[test]
    fn test_rejects_incomplete_tls() {
        let err = IpamConfig::from_yaml(
            r#"
xline_config:
  endpoints: ["127.0.0.1:2379"]
tls_config:
  enable: true
  ca_file: /tmp/ca.pem
"#,
        )
        .unwrap_err();
        assert!(matches!(err, IpamError::Config(_)));
    }

    #[test]
    fn test_rejects_missing_endpoints() {
        let err = IpamConfig::from_yaml("xline_config:\n  endpoints: []\n").unwrap_err();
        assert!(matches!(err, IpamError::Config(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = IpamConfig::from_file("/nonexistent/ipam.yaml").unwrap_err();
        assert!(matches!(err, IpamError::Config(_)));
    }
}
