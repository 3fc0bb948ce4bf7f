use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, time::Duration};

use fhirgate_client::HttpClientConfig;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GatewayConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub api: ApiConfig,
    /// Attribution service; the job and data endpoints live there too.
    #[serde(default)]
    pub attribution: AttributionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl GatewayConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("server.port must be > 0".into());
        }
        if self.attribution.url.trim().is_empty() {
            return Err("attribution.url must not be empty".into());
        }
        if self.attribution.timeout_ms == 0 {
            return Err("attribution.timeout_ms must be > 0".into());
        }
        if !self.api.route_prefix.starts_with('/') {
            return Err("api.route_prefix must start with '/'".into());
        }
        if self.api.fhir_release().is_none() {
            return Err(format!(
                "api.fhir_version must be one of {:?}",
                FHIR_VERSIONS.map(|(name, _)| name)
            ));
        }
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        Ok(())
    }

    pub fn addr(&self) -> SocketAddr {
        use std::net::{IpAddr, Ipv4Addr};
        let host: IpAddr = self
            .server
            .host
            .parse()
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));
        SocketAddr::from((host, self.server.port))
    }

    /// Route prefix without a trailing slash; `/` becomes empty.
    pub fn route_prefix(&self) -> &str {
        self.api.route_prefix.trim_end_matches('/')
    }

    pub fn client_config(&self) -> HttpClientConfig {
        HttpClientConfig::new(self.attribution.url.clone())
            .with_retries(self.attribution.retries)
            .with_timeout(Duration::from_millis(self.attribution.timeout_ms))
            .with_retry_backoff(Duration::from_millis(self.attribution.retry_backoff_ms))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    3000
}
fn default_body_limit() -> usize {
    1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

/// Supported FHIR versions and the release each one reports.
pub const FHIR_VERSIONS: [(&str, &str); 3] = [("R4", "4.0.1"), ("R4B", "4.3.0"), ("R5", "5.0.0")];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Public base used when building `Content-Location` links.
    #[serde(default = "default_base_path")]
    pub base_path: String,
    #[serde(default = "default_route_prefix")]
    pub route_prefix: String,
    /// Require a provenance header on group creation.
    #[serde(default = "default_strict_provenance")]
    pub strict_provenance: bool,
    #[serde(default = "default_fhir_version")]
    pub fhir_version: String,
}

fn default_base_path() -> String {
    "http://localhost:3000/v2".into()
}
fn default_route_prefix() -> String {
    "/v2".into()
}
fn default_strict_provenance() -> bool {
    true
}
fn default_fhir_version() -> String {
    "R4".into()
}

impl ApiConfig {
    /// Full release number for `fhir_version`, e.g. `4.0.1` for `R4`.
    pub fn fhir_release(&self) -> Option<&'static str> {
        FHIR_VERSIONS
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(self.fhir_version.trim()))
            .map(|(_, release)| *release)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_path: default_base_path(),
            route_prefix: default_route_prefix(),
            strict_provenance: default_strict_provenance(),
            fhir_version: default_fhir_version(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributionConfig {
    #[serde(default = "default_attribution_url")]
    pub url: String,
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

fn default_attribution_url() -> String {
    "http://localhost:3001".into()
}
fn default_retries() -> u32 {
    3
}
fn default_timeout_ms() -> u64 {
    10_000
}
fn default_retry_backoff_ms() -> u64 {
    200
}

impl Default for AttributionConfig {
    fn default() -> Self {
        Self {
            url: default_attribution_url(),
            retries: default_retries(),
            timeout_ms: default_timeout_ms(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}
fn default_log_level() -> String {
    "info".into()
}
impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

pub mod loader {
    use super::GatewayConfig;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    pub const DEFAULT_CONFIG_PATH: &str = "fhirgate.toml";

    pub fn load_config(path: Option<&str>) -> Result<GatewayConfig, String> {
        let mut builder = Config::builder();
        let pathbuf = PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_PATH));
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        }
        // Environment variable overrides, e.g., FHIRGATE__SERVER__PORT=9090
        builder = builder.add_source(
            Environment::with_prefix("FHIRGATE")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: GatewayConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = GatewayConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.addr().port(), 3000);
        assert_eq!(cfg.route_prefix(), "/v2");
        assert!(cfg.api.strict_provenance);
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut cfg = GatewayConfig::default();
        cfg.server.port = 0;
        assert!(cfg.validate().unwrap_err().contains("server.port"));

        let mut cfg = GatewayConfig::default();
        cfg.attribution.url = " ".into();
        assert!(cfg.validate().unwrap_err().contains("attribution.url"));

        let mut cfg = GatewayConfig::default();
        cfg.attribution.timeout_ms = 0;
        assert!(cfg.validate().unwrap_err().contains("timeout_ms"));

        let mut cfg = GatewayConfig::default();
        cfg.api.route_prefix = "v2".into();
        assert!(cfg.validate().unwrap_err().contains("route_prefix"));

        let mut cfg = GatewayConfig::default();
        cfg.api.fhir_version = "DSTU2".into();
        assert!(cfg.validate().unwrap_err().contains("fhir_version"));

        let mut cfg = GatewayConfig::default();
        cfg.logging.level = "loud".into();
        assert!(cfg.validate().unwrap_err().contains("logging.level"));
    }

    #[test]
    fn fhir_release_lookup_ignores_case() {
        let mut cfg = GatewayConfig::default();
        assert_eq!(cfg.api.fhir_release(), Some("4.0.1"));
        cfg.api.fhir_version = "r5".into();
        assert_eq!(cfg.api.fhir_release(), Some("5.0.0"));
    }

    #[test]
    fn client_config_carries_retry_policy() {
        let mut cfg = GatewayConfig::default();
        cfg.attribution.retries = 5;
        cfg.attribution.retry_backoff_ms = 50;
        let client = cfg.client_config();
        assert_eq!(client.retries, 5);
        assert_eq!(client.retry_backoff, Duration::from_millis(50));
        assert_eq!(client.timeout, Duration::from_secs(10));
    }
}
