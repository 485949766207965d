// SPDX-FileCopyrightText: 2026 Civica Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message store for the Civica messaging client.

pub mod state;
pub mod store;

pub use state::{FetchOutcome, OperationState, StoreSnapshot};
pub use store::MessageStore;
