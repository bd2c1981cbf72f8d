//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validated config → Route table → Registry client → First snapshot → Gate
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain requests → Stop reconciliation
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then controller, then listeners
//! - Ordered shutdown: stop accept, drain, stop the loop, release the registry

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{build, Gateway, StartupError};
