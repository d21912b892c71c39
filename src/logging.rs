//! # Logging
//!
//! One-time tracing subscriber setup for binaries and tests embedding the
//! flow engine, plus helpers that give flow operations and failures a
//! uniform record shape. Output is human readable unless
//! `INTAKE_LOG_FORMAT=json`; `RUST_LOG` overrides the environment default.

use crate::config::ConfigManager;
use chrono::Utc;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGING: OnceLock<()> = OnceLock::new();

/// Install the global subscriber; later calls are no-ops
pub fn init_structured_logging() {
    LOGGING.get_or_init(|| {
        let environment = ConfigManager::detect_environment();
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_directive(&environment)));

        let layer = if json_output_requested() {
            fmt::layer()
                .json()
                .with_current_span(false)
                .with_ansi(false)
                .with_filter(filter)
                .boxed()
        } else {
            fmt::layer().with_target(true).with_filter(filter).boxed()
        };

        // Another subscriber may already own the global slot
        if tracing_subscriber::registry().with(layer).try_init().is_err() {
            tracing::debug!("Tracing subscriber already installed, keeping it");
        }

        tracing::info!(environment = %environment, "Intake logging initialized");
    });
}

fn json_output_requested() -> bool {
    std::env::var("INTAKE_LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json"))
}

/// Filter used when `RUST_LOG` is absent
fn default_directive(environment: &str) -> &'static str {
    match environment {
        "production" | "staging" => "info",
        _ => "debug",
    }
}

/// One record per flow operation, keyed for log search
pub fn log_flow_operation(
    operation: &str,
    flow: &str,
    session_id: Option<&str>,
    segment_id: Option<&str>,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        flow = %flow,
        session_id = session_id,
        segment_id = segment_id,
        status = %status,
        details = details,
        logged_at = %Utc::now().to_rfc3339(),
        "FLOW_OPERATION"
    );
}

pub fn log_error(component: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        context = context,
        logged_at = %Utc::now().to_rfc3339(),
        "FLOW_ERROR"
    );
}
