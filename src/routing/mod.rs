//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (method, path)
//!     → table.rs (route lookup + precedence)
//!     → pattern.rs (evaluate path pattern, capture values)
//!     → Return: matched Route + values, or no match
//!
//! Route Compilation (at startup):
//!     RouteConfig[]
//!     → Compile patterns, templates, method filters, header transforms
//!     → Freeze as immutable RouteTable, shared by every snapshot
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path (segment matching only)
//! - Deterministic: same input always matches same route

pub mod pattern;
pub mod table;

pub use pattern::{PathPattern, PathTemplate, PatternError, RouteValues};
pub use table::{HeaderTransform, Route, RouteError, RouteMatch, RouteTable};
