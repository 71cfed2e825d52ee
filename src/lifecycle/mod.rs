//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Open store → Pick provisioner → Build engine → Boot core
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Broadcast → Tasks leave their loops → Drain → Stop core
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then store, then core, then tasks
//! - Shutdown has a timeout: tasks still running after it are abandoned

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{build_engine, StartupError};
