//! Error types for session setup.

use thiserror::Error;

/// Errors returned by [`SetupGate::handshake`](crate::setup::SetupGate::handshake).
///
/// `E` is the initializer's own error type. It is carried through untouched.
#[derive(Debug, Error)]
pub enum HandshakeError<E> {
    /// A previous handshake already claimed this session.
    #[error("handshake already completed")]
    AlreadyHandshaked,

    /// The initializer failed.
    #[error(transparent)]
    Initializer(E),
}

impl<E> HandshakeError<E> {
    /// Returns true if the session was already set up by an earlier call.
    pub fn is_already_handshaked(&self) -> bool {
        matches!(self, HandshakeError::AlreadyHandshaked)
    }

    /// Recover the initializer's error, if that is what this is.
    pub fn into_initializer_error(self) -> Option<E> {
        match self {
            HandshakeError::Initializer(e) => Some(e),
            HandshakeError::AlreadyHandshaked => None,
        }
    }
}
