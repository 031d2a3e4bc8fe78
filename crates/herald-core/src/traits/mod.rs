// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait seams between Herald and its external collaborators.

pub mod storage;
pub mod wire;

pub use storage::StorageAdapter;
pub use wire::{WireConnection, WireConnector, WireEvent, WireLink};
