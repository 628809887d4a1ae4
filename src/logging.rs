// ABOUTME: Logging configuration and structured logging setup for observability
// ABOUTME: Configures log levels, formatters, and output destinations via tracing
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Embers contributors

//! Structured logging configuration built on `tracing`.

use anyhow::Result;
use std::env;
use std::io;
use tracing::info;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

/// Log output format options.
#[derive(Debug, Clone)]
pub enum LogFormat {
    /// JSON format for production logging.
    Json,
    /// Pretty format for development.
    Pretty,
    /// Compact format for space-constrained environments.
    Compact,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: LogFormat::Pretty,
        }
    }
}

impl LoggingConfig {
    /// Build logging configuration from `RUST_LOG` / `LOG_FORMAT`.
    #[must_use]
    pub fn from_env() -> Self {
        let level = env::var("RUST_LOG").unwrap_or_else(|_| "info".into());
        let format = match env::var("LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            Ok("compact") => LogFormat::Compact,
            _ => LogFormat::Pretty,
        };
        Self { level, format }
    }

    /// Initialize the global tracing subscriber.
    ///
    /// # Errors
    /// Returns an error if a subscriber was already installed.
    pub fn init(&self) -> Result<()> {
        let env_filter = EnvFilter::new(&self.level)
            .add_directive(
                "sqlx=warn"
                    .parse()
                    .unwrap_or_else(|_| tracing::Level::WARN.into()),
            )
            .add_directive(
                "tower_http=info"
                    .parse()
                    .unwrap_or_else(|_| tracing::Level::INFO.into()),
            )
            .add_directive(
                format!("embers={}", self.level)
                    .parse()
                    .unwrap_or_else(|_| tracing::Level::INFO.into()),
            );

        let registry = tracing_subscriber::registry().with(env_filter);

        match self.format {
            LogFormat::Json => {
                registry
                    .with(
                        fmt::layer()
                            .with_target(true)
                            .with_writer(io::stdout)
                            .with_span_events(FmtSpan::NONE)
                            .json(),
                    )
                    .try_init()
                    .map_err(|e| anyhow::anyhow!("failed to init logging: {e}"))?;
            }
            LogFormat::Pretty => {
                registry
                    .with(
                        fmt::layer()
                            .with_target(true)
                            .with_writer(io::stdout)
                            .with_span_events(FmtSpan::NONE),
                    )
                    .try_init()
                    .map_err(|e| anyhow::anyhow!("failed to init logging: {e}"))?;
            }
            LogFormat::Compact => {
                registry
                    .with(
                        fmt::layer()
                            .compact()
                            .with_target(false)
                            .with_writer(io::stdout)
                            .with_span_events(FmtSpan::NONE),
                    )
                    .try_init()
                    .map_err(|e| anyhow::anyhow!("failed to init logging: {e}"))?;
            }
        }

        info!(
            log.level = %self.level,
            log.format = ?self.format,
            "Embers streak engine logging initialized"
        );
        Ok(())
    }
}

/// Initialize logging from environment variables.
///
/// # Errors
/// Returns an error if logging initialization fails.
pub fn init_from_env() -> Result<()> {
    LoggingConfig::from_env().init()
}
