//! # Observability Infrastructure
//!
//! Structured logging for the provider core using the tracing ecosystem.
//! Plugin hosts embedding this crate call [`init_logging`] once at startup;
//! everything else instruments its own spans with `#[instrument]` and emits
//! structured fields. Secret material never reaches a log line: plaintext is
//! held in a redacting wrapper whose `Display` and `Debug` are fixed.

use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::errors::Result;

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable single-line output.
    #[default]
    Text,
    /// One JSON object per line, for log aggregation.
    Json,
}

/// Initialize the global tracing subscriber.
///
/// The filter comes from `RUST_LOG` when set, falling back to
/// `default_level`. Installing a second subscriber (as integration tests
/// do) is not an error; the existing one wins.
pub fn init_logging(default_level: &str, format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    let install_result = match format {
        LogFormat::Text => tracing::subscriber::set_global_default(
            FmtSubscriber::builder().with_env_filter(filter).finish(),
        ),
        LogFormat::Json => tracing::subscriber::set_global_default(
            FmtSubscriber::builder().with_env_filter(filter).json().finish(),
        ),
    };

    if install_result.is_err() {
        // Subscriber already set elsewhere (e.g. integration tests); ignore.
    }
    Ok(())
}

/// Create a tracing span for one remote API call.
#[macro_export]
macro_rules! api_span {
    ($operation:expr) => {
        tracing::info_span!(
            "api_operation",
            operation = %$operation,
            request_id = %uuid::Uuid::new_v4()
        )
    };
    ($operation:expr, $($field:tt)*) => {
        tracing::info_span!(
            "api_operation",
            operation = %$operation,
            request_id = %uuid::Uuid::new_v4(),
            $($field)*
        )
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn macros_compile() {
        let _span = api_span!("UpsertEmailSettings");
        let _span = api_span!("GetJiraIntegration", kind = "jira");
    }

    #[test]
    fn init_is_idempotent() {
        init_logging("info", LogFormat::Text).unwrap();
        init_logging("debug", LogFormat::Json).unwrap();
    }
}
