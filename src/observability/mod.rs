//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Loads, reloads, saves, failures:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters and gauges)
//!
//! Consumers:
//!     → Log output (stdout)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Library code only emits events; the host decides whether to install
//!   a subscriber or recorder
//! - Metrics are cheap when no recorder is installed

pub mod logging;
pub mod metrics;
