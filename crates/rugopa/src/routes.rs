// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Translation of declared routes into broker pipelines.
//!
//! Every declared route becomes a two-step [`RoutePipeline`]:
//!
//! 1. `view.render` renders the route's view from the `views` drive into a
//!    raw result.
//! 2. `view.postprocess` turns the raw result into the response `body`.
//!
//! A catch-all pipeline calling `static.serve` against the `statics` drive is
//! always appended last. Matching walks the pipelines in declaration order
//! and the first match wins.

use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

use crate::config::ProjectConfig;
use crate::error::ConfigError;
use crate::workspace::{Drive, Workspace, SPACE_ID};

/// Broker action rendering a view.
pub const RENDER_ACTION: &str = "view.render";
/// Broker action post-processing a raw render.
pub const POSTPROCESS_ACTION: &str = "view.postprocess";
/// Broker action serving a file from a directory.
pub const SERVE_ACTION: &str = "static.serve";
/// Name of the parameter holding the catch-all remainder.
pub const CATCH_ALL_PARAM: &str = "rest";

/// How a step input or output value is obtained.
///
/// References are dotted paths evaluated against a JSON document: `_` is the
/// document itself, `_.request.params.slug` walks into it. Inputs are
/// evaluated against the pipeline context, outputs against the step result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Binding {
    /// A fixed value.
    Literal(Value),
    /// A dotted path into the document.
    Ref(String),
    /// Shallow merge of several object bindings, later keys win.
    Merge(Vec<Binding>),
}

impl Binding {
    /// Shorthand for [`Binding::Ref`].
    pub fn path(path: &str) -> Self {
        Binding::Ref(path.to_string())
    }

    /// Shorthand for [`Binding::Literal`].
    pub fn literal(value: impl Into<Value>) -> Self {
        Binding::Literal(value.into())
    }

    /// Evaluates the binding against `doc`. Missing paths yield `null`.
    pub fn resolve(&self, doc: &Value) -> Value {
        match self {
            Binding::Literal(value) => value.clone(),
            Binding::Ref(path) => lookup(doc, path).cloned().unwrap_or(Value::Null),
            Binding::Merge(parts) => {
                let mut merged = Map::new();
                for part in parts {
                    if let Value::Object(map) = part.resolve(doc) {
                        merged.extend(map);
                    }
                }
                Value::Object(merged)
            }
        }
    }
}

fn lookup<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    if segments.next() != Some("_") {
        return None;
    }

    segments.try_fold(doc, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// One broker call inside a pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HandlerStep {
    /// Fully-qualified action name (`service.action`).
    pub action: String,
    /// Input fields, evaluated against the pipeline context.
    pub input: Vec<(String, Binding)>,
    /// Context fields written from the action result.
    pub output: Vec<(String, Binding)>,
}

/// URL pattern of a pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum RoutePattern {
    /// A declared path, already converted to matchit syntax.
    Path(String),
    /// Matches every path; the remainder is captured as `rest`.
    CatchAll,
}

/// Ordered chain of broker calls answering one route.
///
/// Every pipeline ends by writing `body` (and optionally `headers`) into
/// the context.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutePipeline {
    /// Upper-case HTTP method.
    pub method: String,
    /// URL pattern.
    pub pattern: RoutePattern,
    /// Steps, executed in order.
    pub steps: Vec<HandlerStep>,
}

impl RoutePipeline {
    /// Returns true for the appended static-file route.
    pub fn is_catch_all(&self) -> bool {
        self.pattern == RoutePattern::CatchAll
    }
}

/// Builds one pipeline per declared route, in declaration order, followed
/// by the catch-all static route.
///
/// # Errors
///
/// Returns [`ConfigError`] for unsupported methods or paths that cannot be
/// converted into a matcher pattern.
pub fn translate(config: &ProjectConfig, workspace: &Workspace) -> Result<Vec<RoutePipeline>, ConfigError> {
    let modules: Map<String, Value> = config
        .modules
        .iter()
        .map(|(name, path)| {
            let resolved = workspace.work_root.join(path);
            (name.clone(), Value::String(resolved.to_string_lossy().into_owned()))
        })
        .collect();

    let mut pipelines = Vec::with_capacity(config.routes.len() + 1);

    for route in &config.routes {
        let method = route.normalized_method()?;
        let pattern = to_matchit_pattern(&route.path)?;

        pipelines.push(RoutePipeline {
            method,
            pattern: RoutePattern::Path(pattern),
            steps: vec![
                HandlerStep {
                    action: RENDER_ACTION.to_string(),
                    input: vec![
                        ("spaceId".to_string(), Binding::literal(SPACE_ID)),
                        ("driveName".to_string(), Binding::literal(Drive::Views.as_str())),
                        ("entry".to_string(), Binding::literal(route.view.as_str())),
                        (
                            "locals".to_string(),
                            Binding::Merge(vec![
                                Binding::Literal(Value::Object(modules.clone())),
                                Binding::path("_.request"),
                            ]),
                        ),
                    ],
                    output: vec![("raw".to_string(), Binding::path("_"))],
                },
                HandlerStep {
                    action: POSTPROCESS_ACTION.to_string(),
                    input: vec![("raw".to_string(), Binding::path("_.raw"))],
                    output: vec![("body".to_string(), Binding::path("_"))],
                },
            ],
        });
    }

    pipelines.push(RoutePipeline {
        method: "GET".to_string(),
        pattern: RoutePattern::CatchAll,
        steps: vec![HandlerStep {
            action: SERVE_ACTION.to_string(),
            input: vec![
                (
                    "from".to_string(),
                    Binding::literal(workspace.static_dir.to_string_lossy().into_owned()),
                ),
                (
                    "path".to_string(),
                    Binding::path(&format!("_.request.params.{}", CATCH_ALL_PARAM)),
                ),
            ],
            output: vec![
                ("headers".to_string(), Binding::path("_.headers")),
                ("body".to_string(), Binding::path("_.body")),
            ],
        }],
    });

    Ok(pipelines)
}

/// Converts an Express-style path (`/posts/:slug`, `/files/*`) into matchit
/// syntax (`/posts/{slug}`, `/files/{*rest}`).
pub fn to_matchit_pattern(path: &str) -> Result<String, ConfigError> {
    let trimmed = path.trim();
    if !trimmed.starts_with('/') {
        return Err(ConfigError::InvalidPattern(path.to_string()));
    }

    let segments: Vec<String> = trimmed
        .split('/')
        .skip(1)
        .map(|segment| {
            if let Some(name) = segment.strip_prefix(':') {
                if name.is_empty() {
                    return Err(ConfigError::InvalidPattern(path.to_string()));
                }
                Ok(format!("{{{}}}", name))
            } else if segment == "*" {
                Ok(format!("{{*{}}}", CATCH_ALL_PARAM))
            } else if segment.contains(['{', '}']) {
                Err(ConfigError::InvalidPattern(path.to_string()))
            } else {
                Ok(segment.to_string())
            }
        })
        .collect::<Result<_, _>>()?;

    Ok(format!("/{}", segments.join("/")))
}

/// A pipeline selected for a request, with its captured parameters.
#[derive(Debug)]
pub struct RouteMatch<'a> {
    /// The matched pipeline.
    pub pipeline: &'a RoutePipeline,
    /// URL parameters extracted from the path.
    pub params: BTreeMap<String, String>,
}

impl RouteMatch<'_> {
    /// Parameters as a JSON object for the pipeline context.
    pub fn params_value(&self) -> Value {
        json!(self.params)
    }
}

enum Matcher {
    Pattern(matchit::Router<()>),
    CatchAll,
}

/// Matches requests against pipelines strictly in declaration order.
pub struct RouteTable {
    pipelines: Vec<RoutePipeline>,
    matchers: Vec<Matcher>,
}

impl RouteTable {
    /// Compiles a matcher per pipeline.
    pub fn new(pipelines: Vec<RoutePipeline>) -> Result<Self, ConfigError> {
        let matchers = pipelines
            .iter()
            .map(|pipeline| match &pipeline.pattern {
                RoutePattern::CatchAll => Ok(Matcher::CatchAll),
                RoutePattern::Path(pattern) => {
                    let mut router = matchit::Router::new();
                    router
                        .insert(pattern.as_str(), ())
                        .map_err(|e| ConfigError::InvalidPattern(format!("{}: {}", pattern, e)))?;
                    Ok(Matcher::Pattern(router))
                }
            })
            .collect::<Result<_, ConfigError>>()?;

        Ok(Self { pipelines, matchers })
    }

    /// All pipelines in match order.
    pub fn pipelines(&self) -> &[RoutePipeline] {
        &self.pipelines
    }

    /// Finds the first pipeline accepting `method` and `path`.
    ///
    /// `HEAD` requests are accepted by `GET` pipelines.
    pub fn match_request(&self, method: &str, path: &str) -> Option<RouteMatch<'_>> {
        let method = method.to_ascii_uppercase();

        for (pipeline, matcher) in self.pipelines.iter().zip(&self.matchers) {
            let method_ok = pipeline.method == method || (method == "HEAD" && pipeline.method == "GET");
            if !method_ok {
                continue;
            }

            match matcher {
                Matcher::CatchAll => {
                    let mut params = BTreeMap::new();
                    params.insert(
                        CATCH_ALL_PARAM.to_string(),
                        path.trim_start_matches('/').to_string(),
                    );
                    return Some(RouteMatch { pipeline, params });
                }
                Matcher::Pattern(router) => {
                    if let Ok(matched) = router.at(path) {
                        let params = matched
                            .params
                            .iter()
                            .map(|(k, v)| (k.to_string(), v.to_string()))
                            .collect();
                        return Some(RouteMatch { pipeline, params });
                    }
                }
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RouteSpec;

    fn config_with_routes(routes: &[(&str, &str, &str)]) -> ProjectConfig {
        let mut config = ProjectConfig::from_toml("").unwrap();
        config.routes = routes
            .iter()
            .map(|(method, path, view)| RouteSpec {
                method: method.to_string(),
                path: path.to_string(),
                view: view.to_string(),
            })
            .collect();
        config
    }

    #[test]
    fn test_one_pipeline_per_route_plus_catch_all() {
        let config = config_with_routes(&[
            ("get", "/", "index.ejs"),
            ("post", "/contact", "contact.ejs"),
            ("GET", "/posts/:slug", "post.ejs"),
        ]);
        let ws = Workspace::layout("/p");

        let pipelines = translate(&config, &ws).unwrap();
        assert_eq!(pipelines.len(), 4);
        assert!(pipelines[..3].iter().all(|p| !p.is_catch_all()));
        assert!(pipelines[3].is_catch_all());

        assert_eq!(pipelines[0].pattern, RoutePattern::Path("/".to_string()));
        assert_eq!(pipelines[1].method, "POST");
        assert_eq!(pipelines[2].pattern, RoutePattern::Path("/posts/{slug}".to_string()));
    }

    #[test]
    fn test_no_routes_still_has_catch_all() {
        let config = config_with_routes(&[]);
        let pipelines = translate(&config, &Workspace::layout("/p")).unwrap();

        assert_eq!(pipelines.len(), 1);
        assert!(pipelines[0].is_catch_all());
        assert_eq!(pipelines[0].steps[0].action, SERVE_ACTION);
    }

    #[test]
    fn test_route_steps_render_then_postprocess() {
        let mut config = config_with_routes(&[("", "/", "index.ejs")]);
        config.modules.insert("http".to_string(), "node_modules/axios/index.js".into());
        let pipelines = translate(&config, &Workspace::layout("/p")).unwrap();

        let route = &pipelines[0];
        assert_eq!(route.method, "GET");
        assert_eq!(route.steps.len(), 2);
        assert_eq!(route.steps[0].action, RENDER_ACTION);
        assert_eq!(route.steps[1].action, POSTPROCESS_ACTION);
        assert_eq!(route.steps[1].output, vec![("body".to_string(), Binding::path("_"))]);

        let context = json!({ "request": { "method": "GET", "params": { "id": "7" } } });
        let locals = &route.steps[0].input[3].1;
        assert_eq!(
            locals.resolve(&context),
            json!({
                "http": "/p/node_modules/axios/index.js",
                "method": "GET",
                "params": { "id": "7" },
            })
        );
    }

    #[test]
    fn test_catch_all_serves_from_static_drive() {
        let pipelines = translate(&config_with_routes(&[]), &Workspace::layout("/p")).unwrap();
        let step = &pipelines[0].steps[0];

        let context = json!({ "request": { "params": { "rest": "css/main.css" } } });
        let input: Map<String, Value> = step
            .input
            .iter()
            .map(|(k, b)| (k.clone(), b.resolve(&context)))
            .collect();

        assert_eq!(input["from"], json!("/p/.rugopa/statics"));
        assert_eq!(input["path"], json!("css/main.css"));
    }

    #[test]
    fn test_binding_resolution() {
        let doc = json!({ "a": { "b": [10, 20] }, "raw": "<p>" });

        assert_eq!(Binding::path("_").resolve(&doc), doc);
        assert_eq!(Binding::path("_.raw").resolve(&doc), json!("<p>"));
        assert_eq!(Binding::path("_.a.b.1").resolve(&doc), json!(20));
        assert_eq!(Binding::path("_.missing.x").resolve(&doc), Value::Null);
        assert_eq!(Binding::path("raw").resolve(&doc), Value::Null);
    }

    #[test]
    fn test_to_matchit_pattern() {
        assert_eq!(to_matchit_pattern("/").unwrap(), "/");
        assert_eq!(to_matchit_pattern("/users/:id/edit").unwrap(), "/users/{id}/edit");
        assert_eq!(to_matchit_pattern("/files/*").unwrap(), "/files/{*rest}");
        assert!(to_matchit_pattern("about").is_err());
        assert!(to_matchit_pattern("/users/:").is_err());
    }

    #[test]
    fn test_declaration_order_wins() {
        let config = config_with_routes(&[
            ("get", "/posts/:slug", "post.ejs"),
            ("get", "/posts/latest", "latest.ejs"),
        ]);
        let table = RouteTable::new(translate(&config, &Workspace::layout("/p")).unwrap()).unwrap();

        let matched = table.match_request("GET", "/posts/latest").unwrap();
        assert_eq!(matched.pipeline.steps[0].input[2].1, Binding::literal("post.ejs"));
        assert_eq!(matched.params.get("slug").map(String::as_str), Some("latest"));
    }

    #[test]
    fn test_unmatched_paths_fall_through_to_catch_all() {
        let config = config_with_routes(&[("get", "/", "index.ejs"), ("post", "/form", "form.ejs")]);
        let table = RouteTable::new(translate(&config, &Workspace::layout("/p")).unwrap()).unwrap();

        let root = table.match_request("GET", "/").unwrap();
        assert!(!root.pipeline.is_catch_all());

        let asset = table.match_request("GET", "/images/logo.png").unwrap();
        assert!(asset.pipeline.is_catch_all());
        assert_eq!(asset.params.get(CATCH_ALL_PARAM).map(String::as_str), Some("images/logo.png"));

        // GET on a POST-only route goes to the static drive
        let form = table.match_request("GET", "/form").unwrap();
        assert!(form.pipeline.is_catch_all());

        assert!(table.match_request("DELETE", "/form").is_none());
        assert!(!table.match_request("HEAD", "/").unwrap().pipeline.is_catch_all());
    }
}
