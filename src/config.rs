// Copyright 2025 Webmobix Solutions AG
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUTHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Configuration management for the result sync.
//!
//! A run is fully described by one TOML file: which spreadsheet and worksheet
//! to fill, which header labels anchor the grid, what to select on the result
//! lookup form and which registration numbers to query. The configuration is
//! read once at start-up and never re-read during a run.

use crate::sheets::index::RequiredHeaders;
use crate::utils::errors::SyncError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default config file name looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "result-sheet-sync.toml";

/// Selections submitted on the result lookup form.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LookupConfig {
    /// Address of the lookup page
    pub url: String,
    /// Program option label, matched verbatim
    pub program: String,
    /// Session option label, matched verbatim
    pub session: String,
    /// Exam option label, matched verbatim
    pub exam: String,
    /// Seconds to wait for a result to render before giving up on an id
    #[serde(default = "default_wait_timeout_secs")]
    pub wait_timeout_secs: u64,
    /// Pause after the result heading appears, letting late content render
    #[serde(default = "default_settle_millis")]
    pub settle_millis: u64,
    #[serde(default = "default_true")]
    pub headless: bool,
}

/// Inclusive range of registration numbers to look up.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegistrationRange {
    pub start: u64,
    pub end: u64,
}

impl RegistrationRange {
    pub fn ids(&self) -> impl Iterator<Item = String> + use<> {
        (self.start..=self.end).map(|id| id.to_string())
    }

    pub fn count(&self) -> u64 {
        if self.end < self.start {
            0
        } else {
            self.end - self.start + 1
        }
    }
}

/// Numeric clean-up applied to the GPA and CGPA columns after the loop.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PostProcessConfig {
    pub enabled: bool,
    /// First sheet row (1-based) of the converted block
    pub first_data_row: usize,
    /// Display pattern applied to the converted columns
    pub pattern: String,
}

impl Default for PostProcessConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            first_data_row: 3,
            pattern: "0.00".to_string(),
        }
    }
}

/// Main configuration structure for a sync run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Spreadsheet ID or full Google Sheets URL
    pub spreadsheet: String,
    /// Worksheet (tab) title holding the results grid
    pub worksheet: String,
    /// Service-account key file; searched in default locations when absent
    #[serde(default)]
    pub credentials: Option<PathBuf>,
    /// Single-line file overwritten with the last processed result
    #[serde(default)]
    pub progress_file: Option<PathBuf>,
    /// `;`-delimited file receiving one appended row per extracted result
    #[serde(default)]
    pub results_csv: Option<PathBuf>,
    #[serde(default)]
    pub headers: RequiredHeaders,
    pub lookup: LookupConfig,
    pub range: RegistrationRange,
    #[serde(default)]
    pub post_process: PostProcessConfig,
    /// Preview writes without applying them; set from the command line only
    #[serde(skip)]
    pub dry_run: bool,
}

fn default_wait_timeout_secs() -> u64 {
    15
}

fn default_settle_millis() -> u64 {
    500
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Reads and parses a TOML configuration file.
    ///
    /// # Errors
    ///
    /// * If the file cannot be read
    /// * If the TOML is malformed or misses required keys
    pub fn load(path: &Path) -> Result<Self, SyncError> {
        let content = std::fs::read_to_string(path).map_err(|err| {
            SyncError::Config(format!("Cannot read config file {:?}: {}", path, err))
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, SyncError> {
        Ok(toml::from_str(content)?)
    }

    /// Applies command-line overrides on top of the file values.
    pub fn apply_overrides(
        &mut self,
        start: Option<u64>,
        end: Option<u64>,
        credentials: Option<PathBuf>,
        dry_run: bool,
    ) {
        if let Some(start) = start {
            self.range.start = start;
        }
        if let Some(end) = end {
            self.range.end = end;
        }
        if credentials.is_some() {
            self.credentials = credentials;
        }
        self.dry_run = dry_run;
    }

    /// The spreadsheet ID, extracted from a full URL when one was configured.
    pub fn spreadsheet_id(&self) -> Result<String, SyncError> {
        let value = self.spreadsheet.trim();

        if let Some(captures) = regex!(r"/spreadsheets/d/([A-Za-z0-9_-]+)").captures(value) {
            return Ok(captures[1].to_string());
        }

        if regex!(r"^[A-Za-z0-9_-]+$").is_match(value) {
            return Ok(value.to_string());
        }

        Err(SyncError::Config(format!(
            "Cannot determine a spreadsheet ID from '{}'",
            self.spreadsheet
        )))
    }

    /// Validates the configuration settings.
    ///
    /// # Errors
    ///
    /// * If the spreadsheet reference or worksheet name is empty or unusable
    /// * If any form selection or required header label is empty
    /// * If the registration range is inverted
    /// * If the wait timeout is zero
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.spreadsheet.trim().is_empty() {
            return Err(SyncError::Config("Spreadsheet cannot be empty".to_string()));
        }
        self.spreadsheet_id()?;

        if self.worksheet.trim().is_empty() {
            return Err(SyncError::Config("Worksheet cannot be empty".to_string()));
        }

        if !self.lookup.url.starts_with("http://") && !self.lookup.url.starts_with("https://") {
            return Err(SyncError::Config(format!(
                "Lookup URL must be an http(s) address: '{}'",
                self.lookup.url
            )));
        }

        for (field, value) in [
            ("lookup.program", &self.lookup.program),
            ("lookup.session", &self.lookup.session),
            ("lookup.exam", &self.lookup.exam),
            ("headers.registration", &self.headers.registration),
            ("headers.gpa", &self.headers.gpa),
            ("headers.cgpa", &self.headers.cgpa),
            ("headers.retake", &self.headers.retake),
        ] {
            if value.trim().is_empty() {
                return Err(SyncError::Config(format!("{} cannot be empty", field)));
            }
        }

        if self.lookup.wait_timeout_secs == 0 {
            return Err(SyncError::Config(
                "lookup.wait_timeout_secs must be greater than zero".to_string(),
            ));
        }

        if self.range.start > self.range.end {
            return Err(SyncError::Config(format!(
                "Registration range is inverted: start {} > end {}",
                self.range.start, self.range.end
            )));
        }

        if self.post_process.first_data_row < 2 {
            return Err(SyncError::Config(
                "post_process.first_data_row must be 2 or greater (row 1 holds headers)"
                    .to_string(),
            ));
        }

        Ok(())
    }
}
