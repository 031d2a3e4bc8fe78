// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Herald integration tests.
//!
//! Provides a scriptable mock wire connector and test harness infrastructure
//! for fast, deterministic, CI-runnable tests without a real messaging
//! transport.
//!
//! # Components
//!
//! - [`MockWire`] - Mock wire connector with scriptable pairing, failures,
//!   delays, and event injection
//! - [`TestHarness`] - Full stack (storage + manager + dispatcher) on a temp
//!   SQLite database

pub mod harness;
pub mod mock_wire;

pub use harness::TestHarness;
pub use mock_wire::MockWire;
