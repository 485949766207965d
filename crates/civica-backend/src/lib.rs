// SPDX-FileCopyrightText: 2026 Civica Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! REST adapter for the municipal WhatsApp messaging backend.
//!
//! This crate implements [`MessageBackend`](civica_core::MessageBackend) over
//! the backend's `/whatsapp/messages` endpoints.

pub mod client;
pub mod types;

pub use client::HttpBackend;

use civica_config::CivicaConfig;
use civica_core::CivicaError;

/// Builds the backend client from the loaded configuration.
///
/// The credential is taken from `auth.token`; without one, requests go out
/// unauthenticated and the backend decides whether to accept them.
pub fn from_config(config: &CivicaConfig) -> Result<HttpBackend, CivicaError> {
    let backend = HttpBackend::new(&config.backend, config.auth.token.clone())?;
    tracing::info!(
        base_url = %config.backend.base_url,
        authenticated = config.auth.token.is_some(),
        "backend client initialized"
    );
    Ok(backend)
}
