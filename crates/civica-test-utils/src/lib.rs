// SPDX-FileCopyrightText: 2026 Civica Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Civica integration tests.
//!
//! Provides mock adapters for fast, deterministic, CI-runnable tests
//! without a live backend or WebSocket server.
//!
//! # Components
//!
//! - [`MockBackend`] - In-memory message backend with held list calls and scripted failures
//! - [`MockConnector`] - Mock push transport with frame injection and capture

pub mod fixtures;
pub mod mock_backend;
pub mod mock_connector;

pub use mock_backend::MockBackend;
pub use mock_connector::{MockConnection, MockConnector, MockPeer};
