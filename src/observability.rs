//! Observability module for correlation, tracing spans and logging setup

use serde::{Deserialize, Serialize};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

/// Correlation ID for tracking one signing request across components
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct CorrelationId(String);

impl CorrelationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CorrelationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Trace identifiers for one operation run
///
/// The pipeline opens a span carrying these so every log line of one
/// assembly can be joined with the signing-service response later.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceContext {
    pub trace_id: String,
    pub span_id: String,
    pub correlation_id: CorrelationId,
    pub parent_span_id: Option<String>,
    pub operation: String,
    /// Creation timestamp (Unix epoch milliseconds)
    pub timestamp_ms: i64,
}

impl TraceContext {
    pub fn new(operation: &str) -> Self {
        Self {
            trace_id: Uuid::new_v4().to_string(),
            span_id: Uuid::new_v4().to_string(),
            correlation_id: CorrelationId::new(),
            parent_span_id: None,
            operation: operation.to_string(),
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Create a child span context sharing the trace and correlation IDs
    pub fn child_span(&self, operation: &str) -> Self {
        Self {
            trace_id: self.trace_id.clone(),
            span_id: Uuid::new_v4().to_string(),
            correlation_id: self.correlation_id.clone(),
            parent_span_id: Some(self.span_id.clone()),
            operation: operation.to_string(),
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    pub fn span_id(&self) -> &str {
        &self.span_id
    }

    pub fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }
}

/// Install the global tracing subscriber with human-readable output
///
/// `RUST_LOG` wins when set. Returns an error if a subscriber is already
/// installed.
pub fn init_logging(verbose: bool) -> anyhow::Result<()> {
    install_subscriber(verbose, false)
}

/// Same as [`init_logging`], one JSON object per line
pub fn init_json_logging(verbose: bool) -> anyhow::Result<()> {
    install_subscriber(verbose, true)
}

fn install_subscriber(verbose: bool, json: bool) -> anyhow::Result<()> {
    let env_filter = if verbose {
        "vault_tx=debug,info"
    } else {
        "vault_tx=info,warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(json.then(|| tracing_subscriber::fmt::layer().json().with_target(true)))
        .with((!json).then(|| tracing_subscriber::fmt::layer().with_target(true)))
        .try_init()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trace_context_creation() {
        let ctx = TraceContext::new("open_position");
        assert!(!ctx.trace_id().is_empty());
        assert!(!ctx.span_id().is_empty());
        assert!(!ctx.correlation_id().as_str().is_empty());
        assert_eq!(ctx.operation, "open_position");
        assert!(ctx.parent_span_id.is_none());
    }

    #[test]
    fn test_child_span_inherits_ids() {
        let parent = TraceContext::new("swap");
        let child = parent.child_span("serialize");

        assert_eq!(child.trace_id(), parent.trace_id());
        assert_eq!(child.correlation_id(), parent.correlation_id());
        assert_ne!(child.span_id(), parent.span_id());
        assert_eq!(child.parent_span_id.as_deref(), Some(parent.span_id()));
    }

    #[test]
    fn test_init_logging_only_once() {
        // Whichever call installed the subscriber, a second install must fail
        let _ = init_logging(false);
        assert!(init_logging(true).is_err());
        assert!(init_json_logging(false).is_err());
    }
}
