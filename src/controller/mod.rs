//! Dynamic routing configuration controller.
//!
//! # Data Flow
//! ```text
//! reconcile.rs (timer tick)
//!     → provider.rs update()
//!         → ClusterBuilder (queries RegistryClient)
//!         → snapshot.rs (new immutable ConfigSnapshot)
//!         → atomic swap of Arc<ConfigSnapshot>
//!         → signal.rs fires on the previous snapshot
//!
//! Request handlers:
//!     provider.current() → snapshot.resolve(method, path)
//! ```
//!
//! # Design Decisions
//! - Snapshots are immutable; every cycle produces a new one
//! - Reads are lock-free; the loop is the only writer
//! - Registry failures degrade a cycle, never the process

pub mod provider;
pub mod reconcile;
pub mod signal;
pub mod snapshot;

pub use provider::{ConfigProvider, UpdateOutcome};
pub use reconcile::ReconciliationLoop;
pub use signal::{ChangeSignal, ChangeToken};
pub use snapshot::{ConfigSnapshot, Resolution, RoutingError};
