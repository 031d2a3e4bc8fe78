// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query modules. All functions take `&Database` and go through the
//! single writer thread.

pub mod send_items;
pub mod sessions;
pub mod submissions;
