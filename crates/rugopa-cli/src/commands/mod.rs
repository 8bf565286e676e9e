// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! CLI command implementations.
//!
//! - `build`: one production compile packaged into `dist`
//! - `dev`: watch, rebuild, serve and live reload

/// Production build command.
pub mod build;
/// Development mode command.
pub mod dev;
