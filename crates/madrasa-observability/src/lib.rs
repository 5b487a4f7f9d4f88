//! Madrasa Observability
//!
//! - Structured logging via `tracing` (console, JSON, rolling file)
//! - HTTP request logging middleware
//! - Prometheus metrics with media lifecycle counters
//!
//! Metrics are compiled in with the `observability` feature (default) and can
//! be switched off at runtime with `OBSERVABILITY_ENABLED=false`. Logging is
//! always available.
//!
//! ```no_run
//! use madrasa_observability::{init_metrics, init_tracing};
//!
//! #[tokio::main]
//! async fn main() {
//!     let _guard = init_tracing();
//!     let _metrics = init_metrics();
//! }
//! ```

pub mod logging;

#[cfg(feature = "observability")]
pub mod metrics;

pub use logging::{init_tracing, logging_middleware};

#[cfg(feature = "observability")]
pub use metrics::{
    PrometheusHandle, init_metrics, is_observability_enabled, metrics_middleware,
    track_side_effect, track_sweep, track_transition, track_upload,
};

// No-op stubs when metrics are compiled out
#[cfg(not(feature = "observability"))]
pub mod stubs {
    use axum::{extract::Request, middleware::Next, response::Response};

    /// Placeholder so callers can hold `Option<PrometheusHandle>` either way.
    #[derive(Clone, Debug)]
    pub struct PrometheusHandle;

    impl PrometheusHandle {
        pub fn render(&self) -> String {
            String::new()
        }
    }

    pub fn is_observability_enabled() -> bool {
        false
    }

    pub fn init_metrics() -> Option<PrometheusHandle> {
        None
    }

    pub async fn metrics_middleware(req: Request, next: Next) -> Response {
        next.run(req).await
    }

    pub fn track_upload(_slot: &str, _success: bool) {}
    pub fn track_transition(_slot: &str, _outcome: &'static str) {}
    pub fn track_side_effect(_kind: &'static str, _success: bool) {}
    pub fn track_sweep(_reclaimed: usize, _failed: usize) {}
}

#[cfg(not(feature = "observability"))]
pub use stubs::*;
