//! Response handling.
//!
//! # Responsibilities
//! - Map gate errors to HTTP status codes
//! - Render errors as a JSON body the CLI can decode
//!
//! # Design Decisions
//! - A repeated handshake is 409 Conflict, never a silent success
//! - Initializer errors are opaque: 500 with the message verbatim

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// JSON body of an error response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

/// An RPC failure ready to be sent to the client.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                code: code.to_string(),
                message: message.into(),
            },
        }
    }

    pub fn already_handshaked(message: impl fmt::Display) -> Self {
        Self::new(StatusCode::CONFLICT, "already_handshaked", message.to_string())
    }

    pub fn initializer_failed(message: impl fmt::Display) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "initializer_failed",
            message.to_string(),
        )
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
