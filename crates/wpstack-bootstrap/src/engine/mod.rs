// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Engine module - database engine backends.

pub mod mariadb;
pub mod mock;
mod traits;

pub use mariadb::MariaDbEngine;
pub use mock::{EngineCall, MockEngine};
pub use traits::*;
