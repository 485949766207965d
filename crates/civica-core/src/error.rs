// SPDX-FileCopyrightText: 2026 Civica Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Civica messaging client.

use thiserror::Error;

/// The primary error type used across all Civica adapter traits and core operations.
#[derive(Debug, Error)]
pub enum CivicaError {
    /// Configuration errors (invalid TOML, missing credential, bad URL).
    #[error("configuration error: {0}")]
    Config(String),

    /// Backend transport failures and server-side errors (connection refused, 5xx, 429).
    #[error("backend error: {message}")]
    Backend {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The backend understood the request and refused it (validation failure,
    /// retrying a message that is not failed, unknown identifier).
    #[error("backend rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// A response or push frame could not be decoded.
    #[error("decode error: {message}")]
    Decode {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Realtime channel errors (handshake failure, socket closed, bad frame).
    #[error("channel error: {message}")]
    Channel {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CivicaError {
    /// Returns true when repeating the same operation later may succeed.
    ///
    /// Backend validation failures are never transient: the backend will
    /// reject the same request again.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CivicaError::Backend { .. } | CivicaError::Channel { .. } | CivicaError::Timeout { .. }
        )
    }
}
