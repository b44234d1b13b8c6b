//! Logger module
//!
//! Provides logging utilities for the server including:
//! - Subscriber setup (`RUST_LOG` wins over the configured level)
//! - Server lifecycle logging
//! - Per-request access logging

use std::net::SocketAddr;
use std::time::Duration;

use hyper::{Method, StatusCode};
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{Config, LoggingConfig};

/// Initialize the global subscriber
///
/// Should be called once at application startup.
pub fn init(config: &LoggingConfig) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str()));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .try_init()
}

pub fn log_server_start(addr: &SocketAddr, config: &Config, routes: usize) {
    info!("======================================");
    info!("Server started successfully");
    info!("Listening on: http://{addr}{}", config.framework.context_path);
    info!("Log level: {}", config.logging.level);
    info!("Routes loaded: {routes}");
    info!("Controller mode: {:?}", config.framework.controller_mode);
    if let Some(workers) = config.server.workers {
        info!("Blocking workers: {workers}");
    }
    info!("======================================");
}

pub fn log_connection_error(peer_addr: &SocketAddr, err: &impl std::fmt::Display) {
    error!(peer = %peer_addr, error = %err, "Failed to serve connection");
}

/// One access log line per request
#[derive(Debug, Clone)]
pub struct AccessLogEntry<'a> {
    pub method: &'a Method,
    pub path: &'a str,
    pub query: Option<&'a str>,
    pub status: StatusCode,
    pub user: Option<&'a str>,
    pub elapsed: Duration,
}

impl AccessLogEntry<'_> {
    pub fn log(&self) {
        info!(
            target: "access",
            method = %self.method,
            path = self.path,
            query = self.query.unwrap_or(""),
            status = self.status.as_u16(),
            user = self.user.unwrap_or("-"),
            elapsed_us = u64::try_from(self.elapsed.as_micros()).unwrap_or(u64::MAX),
            "{} {} {}",
            self.method,
            self.path,
            self.status.as_u16()
        );
    }
}
