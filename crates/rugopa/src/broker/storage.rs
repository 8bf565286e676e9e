// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! `storage` service: which drives are enabled and where they live.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

use super::{require_str, Service};
use crate::error::BrokerError;

/// Enabled drives, shared between the storage service and its readers.
///
/// A drive `(space, drive)` lives at `<root>/<space>/<drive>` once enabled.
#[derive(Clone)]
pub struct DriveTable {
    root: PathBuf,
    drives: Arc<RwLock<HashMap<(String, String), PathBuf>>>,
}

impl DriveTable {
    /// Creates an empty table rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            drives: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Enables a drive and returns its directory.
    pub fn enable(&self, space: &str, drive: &str) -> PathBuf {
        let dir = self.root.join(space).join(drive);
        self.drives
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((space.to_string(), drive.to_string()), dir.clone());
        dir
    }

    /// Disables a drive. Returns true if it was enabled.
    pub fn disable(&self, space: &str, drive: &str) -> bool {
        self.drives
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&(space.to_string(), drive.to_string()))
            .is_some()
    }

    /// Directory of an enabled drive.
    pub fn get(&self, space: &str, drive: &str) -> Option<PathBuf> {
        self.drives
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(space.to_string(), drive.to_string()))
            .cloned()
    }

    /// Directory of an enabled drive, or [`BrokerError::DriveNotConfigured`].
    pub fn resolve(&self, space: &str, drive: &str) -> Result<PathBuf, BrokerError> {
        self.get(space, drive).ok_or_else(|| BrokerError::DriveNotConfigured {
            space: space.to_string(),
            drive: drive.to_string(),
        })
    }
}

/// Broker service managing the [`DriveTable`].
pub struct StorageService {
    drives: DriveTable,
}

impl StorageService {
    /// Creates the service around a shared table.
    pub fn new(drives: DriveTable) -> Self {
        Self { drives }
    }

    fn set_config(&self, input: &Value) -> Result<Value, BrokerError> {
        let space = require_str(input, "spaceId", "storage.setConfig")?;
        let drive = require_str(input, "driveName", "storage.setConfig")?;

        // Any config other than false/null enables the drive
        let enabled = !matches!(input.get("config"), None | Some(Value::Null) | Some(Value::Bool(false)));

        if enabled {
            let dir = self.drives.enable(space, drive);
            tracing::debug!("Drive {}/{} enabled at {}", space, drive, dir.display());
        } else {
            self.drives.disable(space, drive);
            tracing::debug!("Drive {}/{} disabled", space, drive);
        }

        Ok(self.describe(space, drive))
    }

    fn describe(&self, space: &str, drive: &str) -> Value {
        let path = self.drives.get(space, drive);
        json!({
            "spaceId": space,
            "driveName": drive,
            "config": path.is_some(),
            "path": path.map(|p| p.to_string_lossy().into_owned()),
        })
    }
}

#[async_trait]
impl Service for StorageService {
    fn name(&self) -> &str {
        "storage"
    }

    async fn call(&self, action: &str, input: Value) -> Result<Value, BrokerError> {
        match action {
            "setConfig" => self.set_config(&input),
            "getConfig" => {
                let space = require_str(&input, "spaceId", "storage.getConfig")?;
                let drive = require_str(&input, "driveName", "storage.getConfig")?;
                Ok(self.describe(space, drive))
            }
            other => Err(BrokerError::UnknownAction(format!("storage.{}", other))),
        }
    }
}
