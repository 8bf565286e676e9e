// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Output filtering and formatting for external bundlers.
//!
//! This module captures and filters output from webpack and Vite so that
//! repeated rebuilds in dev mode stay readable, while warnings and errors
//! are always shown.

use console::style;
use regex::Regex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

/// Maximum number of lines kept in a failure report when no line looks
/// like an error.
const FAILURE_TAIL: usize = 20;

/// Output filter for bundler processes.
///
/// The first build is shown in full. Later builds only show warnings and
/// errors unless verbose mode is on. Quiet mode shows errors only.
pub struct OutputFilter {
    /// Tool name for prefixing messages
    tool_name: String,
    /// Whether this is the first build (show more info)
    first_build: Arc<AtomicBool>,
    /// Regex for matching completion messages
    done_pattern: Regex,
    /// Regex for matching timing values
    timing_pattern: Regex,
    /// Regex for per-file listings printed on every build
    noise_pattern: Regex,
    /// Whether verbose mode is enabled
    verbose: bool,
    /// Whether quiet mode is enabled
    quiet: bool,
}

impl OutputFilter {
    /// Creates a new output filter for the given tool.
    pub fn new(tool_name: &str, verbose: bool) -> Self {
        Self {
            tool_name: tool_name.to_string(),
            first_build: Arc::new(AtomicBool::new(true)),
            done_pattern: Regex::new(r"(?i)(compiled successfully in|compiled with .* in|built in)\s+[\d.]+")
                .expect("valid regex"),
            timing_pattern: Regex::new(r"([\d.]+)\s*(ms|µs|μs|s)\b").expect("valid regex"),
            noise_pattern: Regex::new(
                r"^\s*(asset |orphan modules|runtime modules|cacheable modules|modules by path|\./|\.\./|\+ \d+ modules|transforming|rendering chunks|computing gzip size|vite v[\d.]+ building|✓ \d+ modules transformed)",
            )
            .expect("valid regex"),
            verbose,
            quiet: false,
        }
    }

    /// Only let errors through.
    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Name shown in front of forwarded lines.
    pub fn tool_name(&self) -> &str {
        &self.tool_name
    }

    /// Returns true for lines that report an error.
    pub fn is_error(&self, line: &str) -> bool {
        let line_lower = line.to_lowercase();
        line_lower.contains("error") || line_lower.contains("failed") || line_lower.contains("err:")
    }

    /// Returns true for lines that report a warning.
    pub fn is_warning(&self, line: &str) -> bool {
        let line_lower = line.to_lowercase();
        line_lower.contains("warning") || line_lower.contains("warn:")
    }

    /// Determines if a line should be suppressed (not shown to user).
    pub fn should_suppress(&self, line: &str) -> bool {
        // Never suppress errors
        if self.is_error(line) {
            return false;
        }

        if self.quiet {
            return true;
        }

        if self.is_warning(line) {
            return false;
        }

        if line.trim().is_empty() {
            return true;
        }

        if self.verbose || self.first_build.load(Ordering::Relaxed) {
            return false;
        }

        // The CLI prints its own rebuild line with timing
        if self.done_pattern.is_match(line) {
            return true;
        }

        self.noise_pattern.is_match(line)
    }

    /// Extracts timing in milliseconds from lines like
    /// "compiled successfully in 1234 ms" or "built in 1.52s".
    pub fn extract_timing_ms(&self, line: &str) -> Option<u64> {
        let caps = self.timing_pattern.captures(line)?;
        let value: f64 = caps.get(1)?.as_str().parse().ok()?;
        let unit = caps.get(2)?.as_str();

        let ms = match unit {
            "s" => value * 1000.0,
            "µs" | "μs" => value / 1000.0,
            _ => value,
        };

        Some(ms.round() as u64)
    }

    /// Formats a line for display with the tool prefix.
    pub fn format_line(&self, line: &str) -> String {
        let line = line.trim_end();

        // Format errors in red
        if self.is_error(line) {
            return format!("  {} {}", style(&self.tool_name).cyan(), style(line).red());
        }

        // Format warnings in yellow
        if self.is_warning(line) {
            return format!("  {} {}", style(&self.tool_name).cyan(), style(line).yellow());
        }

        // Format success/timing messages
        if self.done_pattern.is_match(line) {
            if let Some(ms) = self.extract_timing_ms(line) {
                return format!(
                    "  {} {} {}",
                    style(&self.tool_name).cyan(),
                    style("✓").green(),
                    style(format!("{}ms", ms)).dim()
                );
            }
        }

        // Default: prefix with tool name
        format!("  {} {}", style(&self.tool_name).cyan(), style(line).dim())
    }

    /// Marks the first build as complete (subsequent builds will have filtered output).
    pub fn mark_first_build_complete(&self) {
        self.first_build.store(false, Ordering::Relaxed);
    }

    /// Returns whether this is still the first build.
    pub fn is_first_build(&self) -> bool {
        self.first_build.load(Ordering::Relaxed)
    }

    /// Picks the lines worth reporting for a failed build.
    ///
    /// Returns every error line with the line after it, or the tail of the
    /// output when nothing looks like an error.
    pub fn failure_report(&self, lines: &[String]) -> String {
        let mut report = Vec::new();
        let mut take_next = false;

        for line in lines {
            if self.is_error(line) {
                report.push(line.trim_end());
                take_next = true;
            } else if take_next {
                if !line.trim().is_empty() {
                    report.push(line.trim_end());
                }
                take_next = false;
            }
        }

        if report.is_empty() {
            let start = lines.len().saturating_sub(FAILURE_TAIL);
            report = lines[start..].iter().map(|l| l.trim_end()).collect();
        }

        report.join("\n")
    }

    /// Lines that report warnings.
    pub fn warnings(&self, lines: &[String]) -> Vec<String> {
        lines
            .iter()
            .filter(|l| self.is_warning(l) && !self.is_error(l))
            .map(|l| l.trim().to_string())
            .collect()
    }
}

/// Spawns a task that reads lines from a child's output stream, prints
/// those the filter lets through, and returns every line read.
pub fn spawn_filtered_reader<R>(reader: R, filter: Arc<OutputFilter>) -> tokio::task::JoinHandle<Vec<String>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        let mut captured = Vec::new();

        while let Ok(Some(line)) = lines.next_line().await {
            if !filter.should_suppress(&line) {
                println!("{}", filter.format_line(&line));
            }
            captured.push(line);
        }

        captured
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_timing_ms() {
        let filter = OutputFilter::new("test", false);

        assert_eq!(filter.extract_timing_ms("webpack 5.90.1 compiled successfully in 67 ms"), Some(67));
        assert_eq!(filter.extract_timing_ms("✓ built in 1.52s"), Some(1520));
        assert_eq!(filter.extract_timing_ms("Done in 491µs"), Some(0)); // rounds down
        assert_eq!(filter.extract_timing_ms("no timing here"), None);
    }

    #[test]
    fn test_first_build_is_shown() {
        let filter = OutputFilter::new("webpack", false);

        assert!(!filter.should_suppress("asset main.js 1.2 KiB [emitted] (name: main)"));
        assert!(!filter.should_suppress("webpack 5.90.1 compiled successfully in 67 ms"));
        assert!(filter.should_suppress(""));
    }

    #[test]
    fn test_should_suppress_after_first_build() {
        let filter = OutputFilter::new("webpack", false);
        filter.mark_first_build_complete();

        // Should suppress
        assert!(filter.should_suppress("asset main.js 1.2 KiB [emitted] (name: main)"));
        assert!(filter.should_suppress("./src/assets/style.css 39 bytes [built]"));
        assert!(filter.should_suppress("webpack 5.90.1 compiled successfully in 67 ms"));
        assert!(filter.should_suppress("✓ 12 modules transformed."));

        // Should NOT suppress
        assert!(!filter.should_suppress("ERROR in ./src/assets/style.css"));
        assert!(!filter.should_suppress("WARNING in asset size limit"));
        assert!(!filter.should_suppress("Module not found: Error: Can't resolve './x'"));
    }

    #[test]
    fn test_verbose_mode_shows_all() {
        let filter = OutputFilter::new("webpack", true);
        filter.mark_first_build_complete();

        assert!(!filter.should_suppress("asset main.js 1.2 KiB [emitted]"));
        assert!(!filter.should_suppress("webpack 5.90.1 compiled successfully in 67 ms"));
    }

    #[test]
    fn test_quiet_mode_shows_errors_only() {
        let filter = OutputFilter::new("vite", false).with_quiet(true);

        assert!(filter.should_suppress("vite v5.0.0 building for production..."));
        assert!(filter.should_suppress("warning: chunk size"));
        assert!(!filter.should_suppress("error during build:"));
    }

    #[test]
    fn test_failure_report_prefers_error_lines() {
        let filter = OutputFilter::new("webpack", false);
        let lines: Vec<String> = [
            "asset main.js 1 KiB",
            "ERROR in ./src/assets/style.css",
            "Module build failed (from ./node_modules/css-loader/dist/cjs.js):",
            "CssSyntaxError: Unclosed block",
            "",
            "webpack compiled with 1 error",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let report = filter.failure_report(&lines);
        assert!(report.starts_with("ERROR in ./src/assets/style.css"));
        assert!(report.contains("CssSyntaxError"));
        assert!(!report.contains("asset main.js"));
    }

    #[test]
    fn test_failure_report_falls_back_to_tail() {
        let filter = OutputFilter::new("vite", false);
        let lines: Vec<String> = (0..30).map(|i| format!("line {}", i)).collect();

        let report = filter.failure_report(&lines);
        assert!(report.starts_with("line 10"));
        assert!(report.ends_with("line 29"));
    }
}
