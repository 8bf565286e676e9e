// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! webpack-backed [`Bundler`].

use async_trait::async_trait;
use rugopa::bundler::{BuildStats, Bundler, BundlerConfig};
use rugopa::error::CompileError;
use std::ffi::OsString;
use std::sync::Arc;
use std::time::Instant;

use super::output::OutputFilter;
use super::{collect_stats, run_tool, write_generated, ToolCommand};

const CONFIG_TEMPLATE: &str = include_str!("webpack.config.cjs");
const CONFIG_FILE: &str = "webpack.config.cjs";

/// Runs webpack-cli against a generated `webpack.config.cjs`.
///
/// The generated config loads html-webpack-plugin, copy-webpack-plugin and
/// mini-css-extract-plugin from the project's `node_modules`.
pub struct WebpackBundler {
    command: ToolCommand,
    filter: Arc<OutputFilter>,
}

impl WebpackBundler {
    /// Creates a bundler launching webpack through `command`.
    pub fn new(command: ToolCommand, filter: OutputFilter) -> Self {
        Self {
            command,
            filter: Arc::new(filter),
        }
    }

    fn args(config_path: OsString, config: &BundlerConfig) -> Vec<OsString> {
        vec![
            "--config".into(),
            config_path,
            "--mode".into(),
            config.mode.as_str().into(),
        ]
    }
}

#[async_trait]
impl Bundler for WebpackBundler {
    fn name(&self) -> &str {
        "webpack"
    }

    async fn run(&self, config: &BundlerConfig) -> Result<BuildStats, CompileError> {
        let start = Instant::now();
        let config_path = write_generated(config, CONFIG_TEMPLATE, CONFIG_FILE)?;

        let args = Self::args(config_path.into_os_string(), config);
        let lines = run_tool(&self.command, &args, &config.work_root, &self.filter).await?;

        Ok(collect_stats(config, start, &lines, &self.filter))
    }
}
