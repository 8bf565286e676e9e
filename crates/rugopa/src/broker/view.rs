// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! `view` service: server-side rendering of views from a drive.
//!
//! Views are rendered with minijinja. Includes and `extends` resolve inside
//! the same drive, so partials compiled by the bundler (for example
//! `parts/header.ejs`) are picked up without further configuration. The
//! environment is rebuilt per call so every request sees the latest build.

use async_trait::async_trait;
use minijinja::{path_loader, Environment, ErrorKind};
use serde_json::Value;

use super::{object_or_empty, require_str, DriveTable, Service};
use crate::error::BrokerError;

const DOCTYPE: &str = "<!DOCTYPE html>";

/// Broker service rendering views.
pub struct ViewService {
    drives: DriveTable,
}

impl ViewService {
    /// Creates the service reading drives from `drives`.
    pub fn new(drives: DriveTable) -> Self {
        Self { drives }
    }

    fn render(&self, input: &Value) -> Result<Value, BrokerError> {
        let space = require_str(input, "spaceId", "view.render")?;
        let drive = require_str(input, "driveName", "view.render")?;
        let entry = require_str(input, "entry", "view.render")?;
        let entry = entry.trim_start_matches("./");
        let locals = object_or_empty(input, "locals");

        let dir = self.drives.resolve(space, drive)?;

        let mut env = Environment::new();
        env.set_loader(path_loader(dir));

        let template = env.get_template(entry).map_err(|e| match e.kind() {
            ErrorKind::TemplateNotFound => BrokerError::NotFound(format!("{}/{}", drive, entry)),
            _ => render_error(entry, &e),
        })?;

        let html = template.render(&locals).map_err(|e| render_error(entry, &e))?;
        tracing::debug!("Rendered {}/{} ({} bytes)", drive, entry, html.len());

        Ok(Value::String(html))
    }
}

fn render_error(entry: &str, error: &minijinja::Error) -> BrokerError {
    let mut message = error.to_string();
    if let Some(detail) = error.detail() {
        if !message.contains(detail) {
            message = format!("{}: {}", message, detail);
        }
    }
    BrokerError::Render {
        entry: entry.to_string(),
        message,
    }
}

/// Normalizes a raw render into a response body.
///
/// Strings are trimmed and full documents get a doctype. `null` becomes an
/// empty body. Any other value is serialized as JSON.
pub fn postprocess(raw: &Value) -> String {
    match raw {
        Value::String(markup) => {
            let markup = markup.trim();
            let lower = markup.get(..5).map(str::to_ascii_lowercase);
            if lower.as_deref() == Some("<html") {
                format!("{}\n{}", DOCTYPE, markup)
            } else {
                markup.to_string()
            }
        }
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[async_trait]
impl Service for ViewService {
    fn name(&self) -> &str {
        "view"
    }

    async fn call(&self, action: &str, input: Value) -> Result<Value, BrokerError> {
        match action {
            "render" => self.render(&input),
            "postprocess" => Ok(Value::String(postprocess(input.get("raw").unwrap_or(&Value::Null)))),
            other => Err(BrokerError::UnknownAction(format!("view.{}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::tempdir;

    fn service(root: &std::path::Path) -> ViewService {
        let drives = DriveTable::new(root);
        drives.enable(".rugopa", "views");
        ViewService::new(drives)
    }

    fn write_view(root: &std::path::Path, name: &str, content: &str) {
        let path = root.join(".rugopa/views").join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn render_input(entry: &str, locals: Value) -> Value {
        json!({ "spaceId": ".rugopa", "driveName": "views", "entry": entry, "locals": locals })
    }

    #[tokio::test]
    async fn test_render_with_locals_and_partials() {
        let dir = tempdir().unwrap();
        write_view(dir.path(), "parts/header.ejs", "<header>{{ title }}</header>");
        write_view(
            dir.path(),
            "index.ejs",
            "{% include \"parts/header.ejs\" %}<p>{{ method }} {{ params.slug }}</p>",
        );

        let out = service(dir.path())
            .call(
                "render",
                render_input("index.ejs", json!({ "title": "Home", "method": "GET", "params": { "slug": "a" } })),
            )
            .await
            .unwrap();

        assert_eq!(out, json!("<header>Home</header><p>GET a</p>"));
    }

    #[tokio::test]
    async fn test_render_missing_view_is_not_found() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join(".rugopa/views")).unwrap();

        let err = service(dir.path())
            .call("render", render_input("missing.ejs", json!({})))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_render_syntax_error() {
        let dir = tempdir().unwrap();
        write_view(dir.path(), "broken.ejs", "{% if %}");

        let err = service(dir.path())
            .call("render", render_input("broken.ejs", json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, BrokerError::Render { .. }));
    }

    #[tokio::test]
    async fn test_render_requires_configured_drive() {
        let dir = tempdir().unwrap();
        let service = ViewService::new(DriveTable::new(dir.path()));

        let err = service
            .call("render", render_input("index.ejs", json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, BrokerError::DriveNotConfigured { .. }));
    }

    #[test]
    fn test_postprocess() {
        assert_eq!(postprocess(&json!("  <p>hi</p>\n")), "<p>hi</p>");
        assert_eq!(
            postprocess(&json!("\n<HTML><body></body></HTML>")),
            "<!DOCTYPE html>\n<HTML><body></body></HTML>"
        );
        assert_eq!(
            postprocess(&json!("<!DOCTYPE html><html></html>")),
            "<!DOCTYPE html><html></html>"
        );
        assert_eq!(postprocess(&json!({ "a": 1 })), "{\"a\":1}");
        assert_eq!(postprocess(&Value::Null), "");
    }
}
