//! Prometheus metrics endpoint

use prometheus::{Encoder, TextEncoder};

use crate::error::AppError;
use crate::metrics::REGISTRY;

/// GET /metrics
///
/// Prometheus text exposition of the process registry.
pub async fn metrics_handler() -> Result<String, AppError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Metrics encoding failed: {}", e)))?;

    String::from_utf8(buffer)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Metrics encoding failed: {}", e)))
}
