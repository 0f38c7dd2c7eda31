//! Primary/raw call path selection.
//!
//! Read calls first go through the narrowed `tree=` endpoint with strict decoding.
//! When Jenkins rejects that request (400/405/501) or the body does not decode,
//! the same data is fetched once from the raw REST endpoint. A raw-path failure
//! of the same class is reported as a remote fault.

use crate::error::{ErrorContext, UpstreamError, UpstreamResult};
use crate::metrics::UpstreamMetrics;

/// Run `primary`, falling back to `raw` once on a fallback trigger.
pub(crate) fn primary_then_raw<T>(
    context: &ErrorContext,
    metrics: &UpstreamMetrics,
    primary: impl FnOnce() -> UpstreamResult<T>,
    raw: impl FnOnce() -> UpstreamResult<T>,
) -> UpstreamResult<T> {
    match primary() {
        Ok(value) => Ok(value),
        Err(err) if err.is_fallback_trigger() => {
            tracing::debug!(
                operation = %context,
                error = %err,
                "Primary call path failed, using raw REST path"
            );
            metrics.record_fallback();
            raw().map_err(UpstreamError::into_public)
        }
        Err(err) => Err(err.into_public()),
    }
}
