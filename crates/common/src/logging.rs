//! Provides utilities to initialize logging and OpenTelemetry tracing.
use std::env;

use opentelemetry::{trace::TracerProvider, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::Resource;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::*;
use tracing_subscriber::{
    filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};

/// Environment variable names for configuring the logger.
pub const OTLP_URL_ENVVAR: &str = "RELAYER_OTLP_URL";
/// Environment variable name for the service label, which is appended to the
/// whoami string.
pub const SVC_LABEL_ENVVAR: &str = "RELAYER_SVC_LABEL";

/// How chatty the relayer is when `RUST_LOG` is not set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogVerbosity {
    /// Everything, including attestations that matched no route and duplicates.
    All,

    /// Submissions, confirmations and lifecycle events.
    #[default]
    Actionable,

    /// Only failures and anomalies.
    Problems,
}

impl LogVerbosity {
    /// The level filter this tier maps to.
    pub const fn level(&self) -> LevelFilter {
        match self {
            LogVerbosity::All => LevelFilter::DEBUG,
            LogVerbosity::Actionable => LevelFilter::INFO,
            LogVerbosity::Problems => LevelFilter::WARN,
        }
    }
}

/// Errors that can occur while setting up logging.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// The OTLP exporter could not be built.
    #[error("could not initialize otlp exporter: {0}")]
    Exporter(String),

    /// A global subscriber was already installed.
    #[error("could not install subscriber: {0}")]
    Install(String),
}

/// Configuration for the logger.
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// The whoami string, which is used to identify the service in logs.
    whoami: String,

    /// The OpenTelemetry URL for exporting traces.
    otel_url: Option<String>,

    /// Default verbosity when `RUST_LOG` is unset.
    verbosity: LogVerbosity,
}

impl LoggerConfig {
    /// Creates a new empty instance with whoami set.
    pub const fn new(whoami: String) -> Self {
        Self {
            whoami,
            otel_url: None,
            verbosity: LogVerbosity::Actionable,
        }
    }

    /// Creates a new instance with the whoami string set to the provided
    /// string.
    pub fn with_base_name(s: &str) -> Self {
        Self::new(get_whoami_string(s))
    }

    /// Sets the opentelemetry URL to the provided string.
    pub fn set_otlp_url(&mut self, url: String) {
        self.otel_url = Some(url);
    }

    /// Sets the default verbosity tier.
    pub fn set_verbosity(&mut self, verbosity: LogVerbosity) {
        self.verbosity = verbosity;
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self::with_base_name("(attestation-relayer)")
    }
}

/// Initializes the logging subsystem with the provided config.
///
/// `RUST_LOG` takes precedence over the configured verbosity.
pub fn init(config: LoggerConfig) -> Result<(), LoggingError> {
    let filt = EnvFilter::builder()
        .with_default_directive(config.verbosity.level().into())
        .from_env_lossy();

    let log_file = env::var("LOG_FILE").is_ok_and(|v| v == "1");
    let log_line_num = env::var("LOG_LINE_NUM").is_ok_and(|v| v == "1");

    // Stdout logging.
    let stdout_sub = tracing_subscriber::fmt::layer()
        .compact()
        .event_format(
            tracing_subscriber::fmt::format()
                .with_file(log_file)
                .with_line_number(log_line_num),
        )
        .with_filter(filt);

    // OpenTelemetry output.
    if let Some(otel_url) = &config.otel_url {
        let resource = Resource::builder()
            .with_attribute(KeyValue::new("service.name", config.whoami.clone()))
            .build();

        let exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_tonic()
            .with_endpoint(otel_url)
            .build()
            .map_err(|e| LoggingError::Exporter(e.to_string()))?;

        let tp = opentelemetry_sdk::trace::SdkTracerProvider::builder()
            .with_resource(resource)
            .with_batch_exporter(exporter)
            .build();

        let tracer = tp.tracer("attestation-relayer");

        let otel_sub = tracing_opentelemetry::layer().with_tracer(tracer);

        tracing_subscriber::registry()
            .with(stdout_sub)
            .with(otel_sub)
            .try_init()
            .map_err(|e| LoggingError::Install(e.to_string()))?;
    } else {
        tracing_subscriber::registry()
            .with(stdout_sub)
            .try_init()
            .map_err(|e| LoggingError::Install(e.to_string()))?;
    }

    info!(whoami = %config.whoami, verbosity = ?config.verbosity, "logging started");

    Ok(())
}

/// Gets the OTLP URL from the standard envvar.
pub fn get_otlp_url_from_env() -> Option<String> {
    env::var(OTLP_URL_ENVVAR).ok()
}

/// Gets the service label from the standard envvar, which should be included
/// in the whoami string.
pub fn get_service_label_from_env() -> Option<String> {
    env::var(SVC_LABEL_ENVVAR).ok()
}

/// Computes a standard whoami string.
pub fn get_whoami_string(base: &str) -> String {
    match get_service_label_from_env() {
        Some(label) => format!("{base}%{label}"),
        None => base.to_owned(),
    }
}
