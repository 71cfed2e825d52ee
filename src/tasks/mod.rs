//! Background tasks of the daemon.
//!
//! # Responsibilities
//! - Periodically disable depleted clients (`sweep.rs`)
//! - Resync the core after writes made by other processes (`follower.rs`)
//!
//! # Design Decisions
//! - Each task owns an `Arc<Engine>` and a shutdown receiver and exits on
//!   the first shutdown signal
//! - Engine calls block on the store mutex and the core adapter, so every
//!   tick runs them on the blocking pool

pub mod follower;
pub mod sweep;

pub use follower::ChangeFollower;
pub use sweep::SweepMonitor;
