//! Client configuration

use super::ClientError;
use super::coordinator::DEFAULT_RENEWAL_TIMEOUT;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable prefix, e.g. `HOSTEL_BASE_URL`
pub const ENV_PREFIX: &str = "HOSTEL";

/// Settings for [`HostelClient`](super::HostelClient)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// API origin, without a trailing slash
    pub base_url: String,

    /// Login endpoint; never enters the renewal path
    pub login_path: String,

    /// Logout endpoint; never enters the renewal path
    pub logout_path: String,

    /// Renewal endpoint; never enters the renewal path
    pub renewal_path: String,

    /// Additional targets whose 401/403 must not trigger renewal
    pub exempt_paths: Vec<String>,

    /// Per-request timeout in seconds (0 = none)
    pub request_timeout_secs: u64,

    /// Upper bound on one renewal call in seconds; must be non-zero
    pub renewal_timeout_secs: u64,

    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            login_path: "/api/auth/login".to_string(),
            logout_path: "/api/auth/logout".to_string(),
            renewal_path: "/api/auth/refresh".to_string(),
            exempt_paths: Vec::new(),
            request_timeout_secs: 30,
            renewal_timeout_secs: DEFAULT_RENEWAL_TIMEOUT.as_secs(),
            user_agent: format!("hostel-client/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ClientConfig {
    /// Every target that bypasses renewal
    pub fn exempt_endpoints(&self) -> Vec<String> {
        let mut endpoints = vec![
            self.login_path.clone(),
            self.logout_path.clone(),
            self.renewal_path.clone(),
        ];
        endpoints.extend(self.exempt_paths.iter().cloned());
        endpoints
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }

    pub fn renewal_timeout(&self) -> Duration {
        Duration::from_secs(self.renewal_timeout_secs)
    }

    /// Load configuration from file, overridden by `HOSTEL_*` environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file cannot be read or parsed
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ClientError> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(config::Environment::with_prefix(ENV_PREFIX))
            .build()
            .map_err(config_error)?;

        settings.try_deserialize().map_err(config_error)
    }

    /// Load configuration with defaults and environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if environment variables cannot be parsed
    pub fn from_env() -> Result<Self, ClientError> {
        let defaults = Self::default();

        let settings = config::Config::builder()
            .set_default("base_url", defaults.base_url)
            .and_then(|b| b.set_default("login_path", defaults.login_path))
            .and_then(|b| b.set_default("logout_path", defaults.logout_path))
            .and_then(|b| b.set_default("renewal_path", defaults.renewal_path))
            .and_then(|b| b.set_default("exempt_paths", defaults.exempt_paths))
            .and_then(|b| b.set_default("request_timeout_secs", defaults.request_timeout_secs))
            .and_then(|b| b.set_default("renewal_timeout_secs", defaults.renewal_timeout_secs))
            .and_then(|b| b.set_default("user_agent", defaults.user_agent))
            .map_err(config_error)?
            .add_source(config::Environment::with_prefix(ENV_PREFIX))
            .build()
            .map_err(config_error)?;

        settings.try_deserialize().map_err(config_error)
    }

    /// Load from `path` when given, otherwise from the environment
    pub fn load(path: Option<&Path>) -> Result<Self, ClientError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Self::from_env(),
        }
    }
}

fn config_error(err: config::ConfigError) -> ClientError {
    ClientError::Configuration(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_exempt_endpoints() {
        let config = ClientConfig::default();
        let exempt = config.exempt_endpoints();
        assert!(exempt.contains(&"/api/auth/login".to_string()));
        assert!(exempt.contains(&"/api/auth/refresh".to_string()));
        assert_eq!(config.renewal_timeout(), Duration::from_secs(10));
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_zero_request_timeout_means_none() {
        let config = ClientConfig {
            request_timeout_secs: 0,
            ..ClientConfig::default()
        };
        assert_eq!(config.request_timeout(), None);
    }

    #[test]
    fn test_from_file_fills_missing_fields_with_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
base_url = "https://portal.example.edu"
renewal_path = "/api/token/refresh"
exempt_paths = ["/api/auth/register"]
renewal_timeout_secs = 5
"#
        )
        .unwrap();

        let config = ClientConfig::from_file(file.path()).unwrap();
        assert_eq!(config.base_url, "https://portal.example.edu");
        assert_eq!(config.renewal_timeout(), Duration::from_secs(5));
        assert_eq!(config.login_path, "/api/auth/login");

        let exempt = config.exempt_endpoints();
        assert!(exempt.contains(&"/api/token/refresh".to_string()));
        assert!(exempt.contains(&"/api/auth/register".to_string()));
    }

    #[test]
    fn test_from_file_reports_missing_file() {
        let err = ClientConfig::from_file("/nonexistent/hostel.toml").unwrap_err();
        assert!(matches!(err, ClientError::Configuration(_)));
    }
}
