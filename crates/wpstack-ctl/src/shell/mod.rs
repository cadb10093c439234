// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Shell module - external command backends.

pub mod recording;
pub mod system;
mod traits;

pub use recording::RecordingShell;
pub use system::SystemShell;
pub use traits::*;
