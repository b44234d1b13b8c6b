// Configuration module entry point
// Loads server, logging, and framework settings

mod types;

use std::net::SocketAddr;

// Re-export public types
pub use types::{Config, FrameworkConfig, LoggingConfig, ServerConfig};

impl Config {
    /// Load configuration from specified file path (without extension)
    /// Default config file is "config.toml" when no path specified
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let framework = FrameworkConfig::default();
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(config::Environment::with_prefix("WAYMARK").separator("__"))
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.max_body_size", 10_485_760)? // 10MB
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("framework.routes_file", framework.routes_file)?
            .set_default("framework.context_path", framework.context_path)?
            .set_default("framework.controller_mode", "per_request")?
            .set_default("framework.auth_redirect", framework.auth_redirect)?
            .set_default("framework.login_url", framework.login_url)?
            .set_default("framework.session_cookie", framework.session_cookie)?
            .set_default("framework.csrf_field", framework.csrf_field)?
            .set_default("framework.csrf_header", framework.csrf_header)?
            .set_default("framework.csrf_cookie", framework.csrf_cookie)?
            .set_default("framework.static_max_age_days", framework.static_max_age_days)?
            .build()?;

        settings.try_deserialize()
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::ControllerMode;
    use std::fs;

    #[test]
    fn test_defaults_without_file() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("absent");
        let config = Config::load_from(missing.to_str().unwrap()).unwrap();

        assert_eq!(config.server.port, 8080);
        assert!(config.logging.access_log);
        assert_eq!(config.framework, FrameworkConfig::default());
        assert_eq!(
            config.get_socket_addr().unwrap(),
            "127.0.0.1:8080".parse().unwrap()
        );
    }

    #[test]
    fn test_file_overrides() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("app.toml");
        fs::write(
            &path,
            "[server]\nport = 9090\n\n[framework]\ncontext_path = \"/app\"\ncontroller_mode = \"shared\"\nauth_redirect = true\n",
        )
        .unwrap();

        let stem = tmp.path().join("app");
        let config = Config::load_from(stem.to_str().unwrap()).unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.framework.context_path, "/app");
        assert_eq!(config.framework.controller_mode, ControllerMode::Shared);
        assert!(config.framework.auth_redirect);
        assert_eq!(config.framework.csrf_header, "X-CSRFToken");
    }
}
