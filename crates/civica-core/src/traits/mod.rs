// SPDX-FileCopyrightText: 2026 Civica Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions.
//!
//! The store talks to the REST backend through [`MessageBackend`]; the
//! realtime channel opens sockets through [`EventConnector`]. Both use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod backend;
pub mod connector;

pub use backend::MessageBackend;
pub use connector::{EventConnection, EventConnector};
