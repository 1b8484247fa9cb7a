//! Shared error type across chatrelay crates.

use thiserror::Error;

/// Client-facing error codes (stable API).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCode {
    /// Invalid input / malformed message.
    BadRequest,
    /// Payload too large.
    PayloadTooLarge,
    /// Read/write failure on the connection.
    Transport,
    /// Delivery to a recipient failed.
    DeliveryFailed,
    /// Invalid configuration.
    Config,
    /// Internal server error.
    Internal,
}

impl ClientCode {
    /// String representation used in JSON error frames.
    pub fn as_str(self) -> &'static str {
        match self {
            ClientCode::BadRequest => "BAD_REQUEST",
            ClientCode::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            ClientCode::Transport => "TRANSPORT",
            ClientCode::DeliveryFailed => "DELIVERY_FAILED",
            ClientCode::Config => "CONFIG",
            ClientCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, RelayError>;

/// Unified error type used by core, gateway and client.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Remote side closed the stream. Normal disconnect path.
    #[error("connection ended")]
    ConnectionEnded,
    /// Read or write failure mid-stream.
    #[error("transport error: {0}")]
    Transport(String),
    /// Send to a single recipient failed during fan-out.
    #[error("delivery failed: {0}")]
    DeliveryFailure(&'static str),
    /// Registry already holds this id. Indicates a broken id generator.
    #[error("duplicate session id: {0}")]
    DuplicateId(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("payload too large")]
    PayloadTooLarge,
    #[error("invalid config: {0}")]
    Config(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl RelayError {
    /// Map internal error to a stable client-facing code.
    pub fn client_code(&self) -> ClientCode {
        match self {
            RelayError::ConnectionEnded | RelayError::Transport(_) => ClientCode::Transport,
            RelayError::DeliveryFailure(_) => ClientCode::DeliveryFailed,
            RelayError::BadRequest(_) => ClientCode::BadRequest,
            RelayError::PayloadTooLarge => ClientCode::PayloadTooLarge,
            RelayError::Config(_) => ClientCode::Config,
            RelayError::DuplicateId(_) | RelayError::Internal(_) => ClientCode::Internal,
        }
    }

    /// True for the expected "remote closed" path, which is not a failure.
    pub fn is_connection_ended(&self) -> bool {
        matches!(self, RelayError::ConnectionEnded)
    }
}
