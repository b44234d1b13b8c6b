// Configuration types module
// Defines all configuration-related data structures

use serde::Deserialize;

use crate::dispatch::ControllerMode;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    #[serde(default)]
    pub framework: FrameworkConfig,
}

/// Server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Blocking pool size for request pipelines
    pub workers: Option<usize>,
    pub max_body_size: u64,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub access_log: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            access_log: true,
        }
    }
}

/// Dispatch framework configuration
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct FrameworkConfig {
    /// Route table file, one rule per line
    pub routes_file: String,
    /// Prefix all routes are mounted under, e.g. `/app`
    pub context_path: String,
    pub controller_mode: ControllerMode,
    /// Redirect to the login page on authentication failure, unless a
    /// route overrides it
    pub auth_redirect: bool,
    pub login_url: String,
    pub session_cookie: String,
    pub csrf_field: String,
    pub csrf_header: String,
    pub csrf_cookie: String,
    pub static_max_age_days: u64,
}

impl Default for FrameworkConfig {
    fn default() -> Self {
        Self {
            routes_file: "routes.conf".to_string(),
            context_path: String::new(),
            controller_mode: ControllerMode::PerRequest,
            auth_redirect: false,
            login_url: "/login".to_string(),
            session_cookie: "session_id".to_string(),
            csrf_field: "csrf_token".to_string(),
            csrf_header: "X-CSRFToken".to_string(),
            csrf_cookie: "csrf_token".to_string(),
            static_max_age_days: 7,
        }
    }
}
