// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! HTTP content server for dev mode.
//!
//! This is a thin adapter: every request is matched against the
//! [`RouteTable`], the matched pipeline runs through the [`ServiceBroker`],
//! and the final pipeline context is converted back to HTTP.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    Router,
};
use rugopa::broker::{
    run_pipeline, DriveTable, RequestContext, ServiceBroker, StaticService, StorageService, ViewService,
};
use rugopa::error::BrokerError;
use rugopa::routes::RouteTable;
use rugopa::workspace::{Drive, Workspace, SPACE_ID};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;

/// Shared state of the content server.
pub struct AppState {
    /// Compiled route table.
    pub table: RouteTable,
    /// Started broker with the storage, view and static services.
    pub broker: ServiceBroker,
}

impl AppState {
    /// Starts a broker with the storage, view and static services and
    /// enables both drives of `workspace`.
    pub async fn start(table: RouteTable, workspace: &Workspace) -> Result<Self, BrokerError> {
        let drives = DriveTable::new(&workspace.work_root);
        let mut broker = ServiceBroker::new();
        broker.register(StorageService::new(drives.clone()));
        broker.register(ViewService::new(drives));
        broker.register(StaticService::new());
        broker.start().await?;
        tracing::debug!("Broker started: {}", broker.services().join(", "));

        for drive in Drive::ALL {
            broker
                .call(
                    "storage.setConfig",
                    json!({ "spaceId": SPACE_ID, "driveName": drive.as_str(), "config": true }),
                )
                .await?;
        }

        Ok(Self { table, broker })
    }
}

/// Builds the content server router.
pub fn create_app(state: Arc<AppState>) -> Router {
    Router::new()
        .fallback(fallback_handler)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serves the content router on `addr` until the task is dropped.
pub async fn create_server(addr: &str, state: Arc<AppState>) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Content server listening on http://{}", addr);
    axum::serve(listener, create_app(state)).await?;
    Ok(())
}

/// Matches the request and runs its pipeline.
async fn fallback_handler(State(state): State<Arc<AppState>>, request: Request<Body>) -> Response {
    let (parts, _body) = request.into_parts();
    let method = parts.method.as_str().to_uppercase();
    let path = parts.uri.path().to_string();

    let Some(matched) = state.table.match_request(&method, &path) else {
        return not_found(&path);
    };

    let context = RequestContext {
        method,
        path: path.clone(),
        params: matched.params.clone(),
        query: parse_query(parts.uri.query().unwrap_or_default()),
        headers: parts
            .headers
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_lowercase(), v.to_string())))
            .collect(),
    };

    match run_pipeline(&state.broker, matched.pipeline, &context).await {
        Ok(result) => context_to_response(&result).await,
        Err(e) if e.is_not_found() => {
            tracing::debug!("{} {}: {}", context.method, path, e);
            not_found(&path)
        }
        Err(e) => {
            tracing::error!("{} {} failed: {}", context.method, path, e);
            error_page(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
        }
    }
}

/// Decodes a query string into key/value pairs. The last value wins.
fn parse_query(query: &str) -> BTreeMap<String, String> {
    form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .filter(|(key, _)| !key.is_empty())
        .collect()
}

/// Converts a finished pipeline context into a response.
async fn context_to_response(context: &Value) -> Response {
    let body = context.get("body").unwrap_or(&Value::Null);
    let headers = context.get("headers").and_then(Value::as_object);

    let mut builder = Response::builder().status(StatusCode::OK);
    if let Some(headers) = headers {
        for (key, value) in headers {
            if let Some(value) = value.as_str() {
                builder = builder.header(key.as_str(), value);
            }
        }
    }

    let has_content_type = headers.is_some_and(|h| h.keys().any(|k| k.eq_ignore_ascii_case("content-type")));

    let built = match body {
        Value::String(html) => {
            if !has_content_type {
                builder = builder.header(header::CONTENT_TYPE, "text/html; charset=utf-8");
            }
            builder.body(Body::from(html.clone()))
        }
        Value::Object(map) if map.get("file").and_then(Value::as_str).is_some() => {
            let file = map.get("file").and_then(Value::as_str).unwrap_or_default();
            match tokio::fs::read(Path::new(file)).await {
                Ok(bytes) => builder.body(Body::from(bytes)),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => return not_found(file),
                Err(e) => return error_page(StatusCode::INTERNAL_SERVER_ERROR, &BrokerError::Io(e).to_string()),
            }
        }
        other => {
            if !has_content_type {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
            }
            builder.body(Body::from(other.to_string()))
        }
    };

    built.unwrap_or_else(|_| (StatusCode::INTERNAL_SERVER_ERROR, "Failed to build response").into_response())
}

fn not_found(path: &str) -> Response {
    error_page(StatusCode::NOT_FOUND, &format!("Not found: {}", path))
}

fn error_page(status: StatusCode, message: &str) -> Response {
    let page = Html(format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>{} - rugopa</title>
    <style>
        body {{ font-family: system-ui, sans-serif; padding: 2rem; background: #1a1a2e; color: #eee; }}
        .error {{ background: #16213e; border-left: 4px solid #e94560; padding: 1rem; border-radius: 4px; }}
        pre {{ background: #0f0f1a; padding: 1rem; overflow-x: auto; border-radius: 4px; }}
    </style>
</head>
<body>
    <h1>{}</h1>
    <div class="error">
        <pre>{}</pre>
    </div>
</body>
</html>"#,
        status.as_u16(),
        status.canonical_reason().unwrap_or("Error"),
        html_escape(message)
    ));

    (status, page).into_response()
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query() {
        let query = parse_query("a=1&b=&=skip&a=2&flag");
        assert_eq!(query.get("a").map(String::as_str), Some("2"));
        assert_eq!(query.get("b").map(String::as_str), Some(""));
        assert_eq!(query.get("flag").map(String::as_str), Some(""));
        assert_eq!(query.len(), 3);
    }

    #[test]
    fn test_parse_query_decodes_values() {
        let query = parse_query("name=hello%20world&q=a+b&caf%C3%A9=%E2%9C%93");
        assert_eq!(query.get("name").map(String::as_str), Some("hello world"));
        assert_eq!(query.get("q").map(String::as_str), Some("a b"));
        assert_eq!(query.get("café").map(String::as_str), Some("✓"));
    }

    #[test]
    fn test_html_escape() {
        assert_eq!(html_escape("<a href=\"x\">"), "&lt;a href=&quot;x&quot;&gt;");
    }

    #[tokio::test]
    async fn test_string_body_is_html() {
        let response = context_to_response(&json!({ "body": "<p>hi</p>" })).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/html; charset=utf-8"
        );
    }

    #[tokio::test]
    async fn test_other_body_is_json() {
        let response = context_to_response(&json!({ "body": { "ok": true } })).await;
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let response = context_to_response(&json!({ "body": { "file": "/definitely/not/here.js" } })).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
