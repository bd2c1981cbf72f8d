//! Response handling and transformation.
//!
//! # Responsibilities
//! - Strip hop-by-hop headers from the upstream response
//! - Apply the matched route's response header transforms
//!
//! # Design Decisions
//! - Streaming responses avoid buffering the body
//! - Transforms run in declaration order; later ones see earlier results

use axum::http::{HeaderMap, StatusCode};

use crate::http::request::strip_hop_by_hop;
use crate::routing::HeaderTransform;

/// Apply each transform whose condition holds for `status`.
pub fn apply_header_transforms(status: StatusCode, headers: &mut HeaderMap, transforms: &[HeaderTransform]) {
    for transform in transforms.iter().filter(|t| t.applies_to(status)) {
        if transform.overwrite {
            headers.insert(transform.name.clone(), transform.value.clone());
        } else {
            headers.append(transform.name.clone(), transform.value.clone());
        }
    }
}

/// Prepare upstream response headers for the client.
pub fn finalize_headers(status: StatusCode, headers: &mut HeaderMap, transforms: &[HeaderTransform]) {
    strip_hop_by_hop(headers);
    apply_header_transforms(status, headers, transforms);
}
