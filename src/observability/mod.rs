//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! engine saves, core patches, sweep, watermark
//!     → logging.rs (structured tracing events, one span per save)
//!     → metrics.rs (counters and gauges)
//!
//! Consumers:
//!     → stdout via the fmt layer
//!     → Prometheus scrape endpoint (daemon only, optional)
//! ```
//!
//! # Design Decisions
//! - Metric calls are no-ops until a recorder is installed, so the CLI and
//!   the tests never need one
//! - `RUST_LOG` always wins over the configured level

pub mod logging;
pub mod metrics;
