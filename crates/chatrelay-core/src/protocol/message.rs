//! Chat message and error frame (JSON).

use serde::{Deserialize, Serialize};

use crate::error::{RelayError, Result};

/// One chat line.
///
/// `sender` is a client-chosen display name and is never verified.
/// `timestamp` is seconds since the Unix epoch and is always assigned by the
/// relay on receipt; whatever the client put there is discarded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChatMessage {
    #[serde(alias = "user")]
    pub sender: String,
    pub text: String,
    #[serde(default)]
    pub timestamp: i64,
}

impl ChatMessage {
    pub fn new(sender: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            text: text.into(),
            timestamp: 0,
        }
    }

    /// Overwrite the timestamp with the server-assigned value.
    pub fn stamp(&mut self, now_unix: i64) {
        self.timestamp = now_unix;
    }

    pub fn from_json(s: &str) -> Result<Self> {
        serde_json::from_str(s)
            .map_err(|e| RelayError::BadRequest(format!("invalid chat message json: {e}")))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| RelayError::Internal(format!("json encode failed: {e}")))
    }
}

/// Sent to a client just before the relay closes its connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ErrorFrame {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ErrorBody {
    pub code: String,
    pub msg: String,
}

impl ErrorFrame {
    pub fn from_error(err: &RelayError) -> Self {
        Self {
            error: ErrorBody {
                code: err.client_code().as_str().to_string(),
                msg: err.to_string(),
            },
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| RelayError::Internal(format!("json encode failed: {e}")))
    }
}
