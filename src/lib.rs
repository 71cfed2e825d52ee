//! Proxy control-plane library.
//!
//! Transactional reconciliation of proxy configuration: every change is
//! validated, written to the entity store with its derived data in one
//! transaction, recorded in the change log and hot-patched into the live
//! core.

// Data and persistence
pub mod model;
pub mod settings;
pub mod store;

// Derivation and checks
pub mod assembler;
pub mod links;
pub mod validation;

// External seams
pub mod core;
pub mod provision;

// Orchestration
pub mod engine;
pub mod tasks;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;

pub use config::schema::ControlConfig;
pub use engine::{Action, Engine, EngineError, ObjectClass, SaveOutcome, SaveRequest};
pub use lifecycle::Shutdown;
