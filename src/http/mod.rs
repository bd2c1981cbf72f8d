//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, proxy handler)
//!     → request.rs (request ID, forwarding headers)
//!     → [controller snapshot resolves route + destination]
//!     → [auth gate checks the route's policy]
//!     → forward.rs (rewrite URI, send upstream)
//!     → response.rs (strip hop-by-hop, apply header transforms)
//!     → Send to client
//! ```

pub mod error;
pub mod forward;
pub mod request;
pub mod response;
pub mod server;

pub use error::GatewayError;
pub use forward::Forwarder;
pub use request::{MakeGatewayRequestId, X_REQUEST_ID};
pub use server::{build_router, AppState, GatewayServer};
