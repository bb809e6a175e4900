use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub grist: GristConfig,
}

// ---------------------------------------------------------------------------
// Forward-auth listener
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Socket address for the HTTP listener (e.g. `0.0.0.0:4181`).
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Request header the reverse proxy uses to pass the authenticated
    /// user's email.
    #[serde(default = "default_user_header")]
    pub user_header: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            user_header: default_user_header(),
        }
    }
}

fn default_listen() -> String {
    "0.0.0.0:4181".to_string()
}

fn default_user_header() -> String {
    "X-Forwarded-User".to_string()
}

// ---------------------------------------------------------------------------
// Grist
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct GristConfig {
    /// Scheme and host of the Grist server, without port.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    pub port: u16,
    /// Organisation (team site) whose access list is managed.
    pub org: String,
    /// Always allowed; never looked up or granted.
    pub admin_email: String,
    /// Name of the environment variable that holds the Grist API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Treat a non-2xx grant response as a failure instead of logging it.
    #[serde(default)]
    pub strict_grant: bool,
}

fn default_base_url() -> String {
    "http://127.0.0.1".to_string()
}

fn default_api_key_env() -> String {
    "GRIST_API_KEY".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

impl GristConfig {
    /// Read the API key from the configured environment variable.
    pub fn api_key(&self) -> Result<String> {
        let key = std::env::var(&self.api_key_env)
            .with_context(|| format!("environment variable {} is not set", self.api_key_env))?;
        anyhow::ensure!(
            !key.trim().is_empty(),
            "environment variable {} is empty",
            self.api_key_env
        );
        Ok(key)
    }
}

// ---------------------------------------------------------------------------
// Loader
// ---------------------------------------------------------------------------

/// Load and validate a [`Config`] from a YAML file at `path`.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    parse_config(&contents).with_context(|| format!("invalid config file: {}", path.display()))
}

fn parse_config(contents: &str) -> Result<Config> {
    let config: Config = serde_yaml::from_str(contents).context("failed to parse config")?;
    validate_config(&config)?;
    Ok(config)
}

/// Sanity checks that cannot be expressed purely with serde.
fn validate_config(config: &Config) -> Result<()> {
    anyhow::ensure!(config.grist.port != 0, "grist.port must be non-zero");
    anyhow::ensure!(!config.grist.org.trim().is_empty(), "grist.org must be set");
    anyhow::ensure!(
        config.grist.admin_email.contains('@'),
        "grist.admin_email must be an email address"
    );
    anyhow::ensure!(
        config.grist.base_url.starts_with("http://") || config.grist.base_url.starts_with("https://"),
        "grist.base_url must start with http:// or https://"
    );
    anyhow::ensure!(
        config.grist.request_timeout_secs > 0,
        "grist.request_timeout_secs must be greater than zero"
    );
    anyhow::ensure!(
        !config.server.user_header.trim().is_empty(),
        "server.user_header must be set"
    );
    config
        .server
        .listen
        .parse::<std::net::SocketAddr>()
        .with_context(|| format!("invalid server.listen address: {}", config.server.listen))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
grist:
  port: 8484
  org: docs
  admin_email: admin@example.com
"#;

    #[test]
    fn minimal_config_gets_defaults() {
        let config = parse_config(MINIMAL).unwrap();
        assert_eq!(config.server.listen, "0.0.0.0:4181");
        assert_eq!(config.server.user_header, "X-Forwarded-User");
        assert_eq!(config.grist.base_url, "http://127.0.0.1");
        assert_eq!(config.grist.api_key_env, "GRIST_API_KEY");
        assert_eq!(config.grist.request_timeout_secs, 30);
        assert!(!config.grist.strict_grant);
    }

    #[test]
    fn full_config_overrides_defaults() {
        let config = parse_config(
            r#"
server:
  listen: "127.0.0.1:9000"
  user_header: X-Auth-Request-Email
grist:
  base_url: https://grist.internal
  port: 443
  org: team
  admin_email: root@example.com
  api_key_env: TEAM_GRIST_KEY
  request_timeout_secs: 5
  strict_grant: true
"#,
        )
        .unwrap();
        assert_eq!(config.server.listen, "127.0.0.1:9000");
        assert_eq!(config.server.user_header, "X-Auth-Request-Email");
        assert_eq!(config.grist.base_url, "https://grist.internal");
        assert_eq!(config.grist.port, 443);
        assert_eq!(config.grist.api_key_env, "TEAM_GRIST_KEY");
        assert_eq!(config.grist.request_timeout_secs, 5);
        assert!(config.grist.strict_grant);
    }

    #[test]
    fn missing_org_is_rejected() {
        let err = parse_config("grist:\n  port: 8484\n  admin_email: a@b.c\n").unwrap_err();
        assert!(format!("{err:#}").contains("org"), "got: {err:#}");
    }

    #[test]
    fn zero_port_is_rejected() {
        let yaml = MINIMAL.replace("8484", "0");
        assert!(parse_config(&yaml).is_err());
    }

    #[test]
    fn empty_org_is_rejected() {
        let yaml = MINIMAL.replace("org: docs", "org: \"  \"");
        assert!(parse_config(&yaml).is_err());
    }

    #[test]
    fn admin_email_must_look_like_email() {
        let yaml = MINIMAL.replace("admin@example.com", "admin");
        assert!(parse_config(&yaml).is_err());
    }

    #[test]
    fn bad_listen_address_is_rejected() {
        let yaml = format!("server:\n  listen: nowhere\n{MINIMAL}");
        assert!(parse_config(&yaml).is_err());
    }

    #[test]
    fn api_key_read_from_env() {
        let mut config = parse_config(MINIMAL).unwrap();
        config.grist.api_key_env = "GRIST_GATE_TEST_KEY_PRESENT".to_string();
        std::env::set_var("GRIST_GATE_TEST_KEY_PRESENT", "k-123");
        assert_eq!(config.grist.api_key().unwrap(), "k-123");
    }

    #[test]
    fn api_key_missing_env_is_error() {
        let mut config = parse_config(MINIMAL).unwrap();
        config.grist.api_key_env = "GRIST_GATE_TEST_KEY_ABSENT_12345".to_string();
        assert!(config.grist.api_key().is_err());
    }

    #[test]
    fn load_config_reports_missing_file() {
        let err = load_config("/nonexistent/grist-gate.yaml").unwrap_err();
        assert!(err.to_string().contains("failed to read config file"));
    }
}
