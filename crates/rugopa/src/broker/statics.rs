// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! `static` service: resolves request paths to files under a directory.
//!
//! The service never reads file contents. It answers with the headers to
//! send and a `{ "file": "<absolute path>" }` body reference that the HTTP
//! layer streams.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::{Component, Path, PathBuf};

use super::{require_str, Service};
use crate::error::BrokerError;

const INDEX_FILE: &str = "index.html";

/// Broker service serving files from a directory.
#[derive(Default)]
pub struct StaticService;

impl StaticService {
    /// Creates the service.
    pub fn new() -> Self {
        Self
    }
}

/// Resolves `request_path` inside `from`.
///
/// Empty paths and directories resolve to their `index.html`. Paths that
/// would leave `from` are rejected.
pub fn resolve_file(from: &Path, request_path: &str) -> Result<PathBuf, BrokerError> {
    let mut relative = PathBuf::new();
    for component in Path::new(request_path.trim_start_matches('/')).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(BrokerError::InvalidInput {
                    action: "static.serve".to_string(),
                    message: format!("path escapes the served directory: {}", request_path),
                });
            }
        }
    }

    let mut full = from.join(&relative);
    if full.is_dir() {
        full.push(INDEX_FILE);
    }

    if full.is_file() {
        Ok(full)
    } else {
        Err(BrokerError::NotFound(format!("/{}", request_path.trim_start_matches('/'))))
    }
}

#[async_trait]
impl Service for StaticService {
    fn name(&self) -> &str {
        "static"
    }

    async fn call(&self, action: &str, input: Value) -> Result<Value, BrokerError> {
        if action != "serve" {
            return Err(BrokerError::UnknownAction(format!("static.{}", action)));
        }

        let from = require_str(&input, "from", "static.serve")?;
        let path = input.get("path").and_then(Value::as_str).unwrap_or("");

        let file = resolve_file(Path::new(from), path)?;
        let mime = mime_guess::from_path(&file).first_or_octet_stream();
        tracing::trace!("Serving {} as {}", file.display(), mime);

        Ok(json!({
            "headers": { "Content-Type": mime.essence_str() },
            "body": { "file": file.to_string_lossy() },
        }))
    }
}
