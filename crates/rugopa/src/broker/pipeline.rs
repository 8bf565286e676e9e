// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Execution of route pipelines.

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::ServiceBroker;
use crate::error::BrokerError;
use crate::routes::RoutePipeline;

/// The request part of a pipeline context.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RequestContext {
    /// Upper-case HTTP method.
    pub method: String,
    /// Request path without query string.
    pub path: String,
    /// Parameters captured by the route pattern.
    pub params: BTreeMap<String, String>,
    /// Query string parameters; the last value wins for repeated keys.
    pub query: BTreeMap<String, String>,
    /// Request headers with lower-case names.
    pub headers: BTreeMap<String, String>,
}

/// Runs every step of `pipeline` and returns the final context.
///
/// The context starts as `{ "request": ... }`. Each step's inputs are
/// evaluated against the context, the action is called, and each output
/// binding is evaluated against the action result and stored in the context
/// under its key.
///
/// # Errors
///
/// Stops at the first failing action and returns its error.
pub async fn run_pipeline(
    broker: &ServiceBroker,
    pipeline: &RoutePipeline,
    request: &RequestContext,
) -> Result<Value, BrokerError> {
    let mut context = Map::new();
    context.insert("request".to_string(), serde_json::to_value(request).unwrap_or_default());
    let mut context = Value::Object(context);

    for step in &pipeline.steps {
        let input: Map<String, Value> = step
            .input
            .iter()
            .map(|(key, binding)| (key.clone(), binding.resolve(&context)))
            .collect();

        let result = broker.call(&step.action, Value::Object(input)).await?;

        if let Value::Object(ctx) = &mut context {
            for (key, binding) in &step.output {
                ctx.insert(key.clone(), binding.resolve(&result));
            }
        }
    }

    Ok(context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::{DriveTable, StaticService, StorageService, ViewService};
    use crate::config::{ProjectConfig, RouteSpec};
    use crate::routes::{translate, RouteTable};
    use crate::workspace::Workspace;
    use serde_json::json;
    use std::fs;
    use tempfile::tempdir;

    async fn started_broker(ws: &Workspace) -> ServiceBroker {
        let drives = DriveTable::new(&ws.work_root);
        let mut broker = ServiceBroker::new();
        broker.register(StorageService::new(drives.clone()));
        broker.register(ViewService::new(drives));
        broker.register(StaticService::new());
        broker.start().await.unwrap();

        for drive in ["statics", "views"] {
            broker
                .call(
                    "storage.setConfig",
                    json!({ "spaceId": ".rugopa", "driveName": drive, "config": true }),
                )
                .await
                .unwrap();
        }
        broker
    }

    fn request(table: &RouteTable, method: &str, path: &str) -> (usize, RequestContext) {
        let matched = table.match_request(method, path).unwrap();
        let index = table
            .pipelines()
            .iter()
            .position(|p| std::ptr::eq(p, matched.pipeline))
            .unwrap();
        let context = RequestContext {
            method: method.to_string(),
            path: path.to_string(),
            params: matched.params.clone(),
            ..Default::default()
        };
        (index, context)
    }

    #[tokio::test]
    async fn test_route_renders_view_into_body() {
        let dir = tempdir().unwrap();
        let ws = Workspace::prepare(dir.path()).unwrap();
        fs::write(
            ws.view_dir.join("post.ejs"),
            "<html><body>{{ params.slug }} via {{ http }}</body></html>",
        )
        .unwrap();

        let mut config = ProjectConfig::from_toml("").unwrap();
        config.modules.insert("http".to_string(), "lib/http.js".into());
        config.routes.push(RouteSpec {
            method: "GET".to_string(),
            path: "/posts/:slug".to_string(),
            view: "post.ejs".to_string(),
        });
        let table = RouteTable::new(translate(&config, &ws).unwrap()).unwrap();
        let broker = started_broker(&ws).await;

        let (index, req) = request(&table, "GET", "/posts/hello");
        let context = run_pipeline(&broker, &table.pipelines()[index], &req).await.unwrap();

        let expected = format!(
            "<!DOCTYPE html>\n<html><body>hello via {}</body></html>",
            ws.work_root.join("lib/http.js").display()
        );
        assert_eq!(context["body"], json!(expected));
        assert_eq!(context["request"]["params"]["slug"], json!("hello"));
    }

    #[tokio::test]
    async fn test_catch_all_serves_static_file() {
        let dir = tempdir().unwrap();
        let ws = Workspace::prepare(dir.path()).unwrap();
        fs::write(ws.static_dir.join("main.js"), "console.log(1)").unwrap();

        let config = ProjectConfig::from_toml("").unwrap();
        let table = RouteTable::new(translate(&config, &ws).unwrap()).unwrap();
        let broker = started_broker(&ws).await;

        let (index, req) = request(&table, "GET", "/main.js");
        let context = run_pipeline(&broker, &table.pipelines()[index], &req).await.unwrap();

        assert_eq!(
            context["body"]["file"],
            json!(ws.static_dir.join("main.js").to_string_lossy())
        );
        assert!(context["headers"]["Content-Type"]
            .as_str()
            .unwrap()
            .contains("javascript"));
    }

    #[tokio::test]
    async fn test_failing_step_stops_pipeline() {
        let dir = tempdir().unwrap();
        let ws = Workspace::prepare(dir.path()).unwrap();

        let config = ProjectConfig::from_toml("").unwrap();
        let table = RouteTable::new(translate(&config, &ws).unwrap()).unwrap();
        let broker = started_broker(&ws).await;

        let (index, req) = request(&table, "GET", "/missing.css");
        let err = run_pipeline(&broker, &table.pipelines()[index], &req)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
