//! Request handling.
//!
//! # Responsibilities
//! - Turn the `x-request-id` header into a `RequestContext`
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing (SetRequestIdLayer)
//! - Client-supplied IDs that are not UUIDs are replaced, not rejected

use axum::http::HeaderMap;

use crate::setup::{RequestContext, RequestId};

/// Header carrying the per-call request ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Build the call context for an incoming RPC.
pub fn context_from_headers(headers: &HeaderMap) -> RequestContext {
    let supplied = headers.get(X_REQUEST_ID).and_then(|v| v.to_str().ok());

    let request_id = match supplied.map(str::parse::<RequestId>) {
        Some(Ok(id)) => id,
        Some(Err(_)) => {
            let id = RequestId::new();
            tracing::debug!(supplied = ?supplied, request_id = %id, "Replacing non-UUID request ID");
            id
        }
        None => RequestId::new(),
    };

    RequestContext::new(request_id)
}
