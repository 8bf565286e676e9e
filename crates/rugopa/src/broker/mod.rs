// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! In-process service broker.
//!
//! Services are registered by name and expose actions addressed as
//! `service.action`. Route pipelines are executed against the broker by
//! [`run_pipeline`]. The built-in services are:
//!
//! | Service   | Actions                  |
//! |-----------|--------------------------|
//! | `storage` | `setConfig`, `getConfig` |
//! | `view`    | `render`, `postprocess`  |
//! | `static`  | `serve`                  |
//!
//! ```rust,ignore
//! let drives = DriveTable::new(work_root);
//! let mut broker = ServiceBroker::new();
//! broker.register(StorageService::new(drives.clone()));
//! broker.register(ViewService::new(drives.clone()));
//! broker.register(StaticService::new());
//! broker.start().await?;
//! broker.call("storage.setConfig", json!({"spaceId": ".rugopa", "driveName": "views", "config": true})).await?;
//! ```

mod pipeline;
mod statics;
mod storage;
mod view;

pub use pipeline::{run_pipeline, RequestContext};
pub use statics::StaticService;
pub use storage::{DriveTable, StorageService};
pub use view::{postprocess, ViewService};

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::BrokerError;

/// A named group of actions.
#[async_trait]
pub trait Service: Send + Sync {
    /// Service name, the part before the dot in an action name.
    fn name(&self) -> &str;

    /// Hook run once by [`ServiceBroker::start`].
    async fn started(&self) -> Result<(), BrokerError> {
        Ok(())
    }

    /// Runs `action` with `input`.
    async fn call(&self, action: &str, input: Value) -> Result<Value, BrokerError>;
}

/// Dispatches `service.action` calls to registered services.
#[derive(Default)]
pub struct ServiceBroker {
    order: Vec<String>,
    services: HashMap<String, Arc<dyn Service>>,
    started: AtomicBool,
}

impl ServiceBroker {
    /// Creates an empty broker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a service. A later registration under the same name
    /// replaces the earlier one.
    pub fn register<S: Service + 'static>(&mut self, service: S) {
        let name = service.name().to_string();
        if self.services.insert(name.clone(), Arc::new(service)).is_some() {
            tracing::warn!("Service '{}' registered twice, keeping the last one", name);
            self.order.retain(|n| n != &name);
        }
        self.order.push(name);
    }

    /// Names of registered services in registration order.
    pub fn services(&self) -> &[String] {
        &self.order
    }

    /// Runs every service's `started` hook in registration order and opens
    /// the broker for calls.
    pub async fn start(&self) -> Result<(), BrokerError> {
        for name in &self.order {
            if let Some(service) = self.services.get(name) {
                service.started().await?;
                tracing::debug!("Service '{}' started", name);
            }
        }
        self.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Returns true once [`start`](Self::start) completed.
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Calls a fully-qualified action.
    ///
    /// # Errors
    ///
    /// Fails when the broker is not started, the name is malformed, the
    /// service is unknown, or the action itself fails.
    pub async fn call(&self, action: &str, input: Value) -> Result<Value, BrokerError> {
        if !self.is_started() {
            return Err(BrokerError::NotStarted);
        }

        let (service_name, local) = action
            .split_once('.')
            .filter(|(s, a)| !s.is_empty() && !a.is_empty())
            .ok_or_else(|| BrokerError::InvalidActionName(action.to_string()))?;

        let service = self
            .services
            .get(service_name)
            .ok_or_else(|| BrokerError::UnknownService(service_name.to_string()))?;

        tracing::trace!("Calling {}", action);
        service.call(local, input).await
    }
}

/// Reads a required string field from an action input.
pub(crate) fn require_str<'a>(input: &'a Value, field: &str, action: &str) -> Result<&'a str, BrokerError> {
    input
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| BrokerError::InvalidInput {
            action: action.to_string(),
            message: format!("missing string field '{}'", field),
        })
}

/// Reads an optional object field, treating `null` as empty.
pub(crate) fn object_or_empty(input: &Value, field: &str) -> Map<String, Value> {
    match input.get(field) {
        Some(Value::Object(map)) => map.clone(),
        _ => Map::new(),
    }
}
