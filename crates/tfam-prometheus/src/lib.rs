//! Prometheus metrics backend for the session core.
//!
//! [`PrometheusMetrics`] implements [`tfam_core::MetricsBackend`] on a private
//! [`Registry`], so several sessions in one process never collide.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use tfam_prometheus::PrometheusMetrics;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let metrics = PrometheusMetrics::new()?;
//! let backend: Arc<dyn tfam_core::MetricsBackend> = Arc::new(metrics.clone());
//! // SessionCoordinator::new(..)?.with_metrics(backend);
//! # let _ = backend;
//! let text = metrics.encode_text()?;
//! assert!(text.is_empty() || text.contains("tfam_"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Metrics
//! - `tfam_containers_granted_total{job}` - Counter
//! - `tfam_tasks_completed_total{job, outcome}` - Counter
//! - `tfam_standby_promotions_total{job}` - Counter
//! - `tfam_cluster_ready_endpoints` - Gauge
//! - `tfam_cluster_published_total` - Counter
//!
//! No HTTP server is provided; serve [`PrometheusMetrics::encode_text`] from
//! the application's own router.

mod backend;
pub use backend::PrometheusMetrics;

pub use prometheus::{Encoder, Registry, TextEncoder};
