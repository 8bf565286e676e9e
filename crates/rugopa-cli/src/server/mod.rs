// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Development server components.
//!
//! # Components
//!
//! - `http`: content server answering routes through the service broker
//! - `livereload`: WebSocket server pushing reload notifications

/// HTTP content server implementation using Axum.
pub mod http;
/// Live reload WebSocket server.
pub mod livereload;
