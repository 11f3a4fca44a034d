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

//! Local result files: the single-line progress file showing the most
//! recently extracted result, and the results CSV that keeps every one.
//!
//! Both use the same `;`-delimited row: id, name, GPA, CGPA, retake courses.

use crate::results::record::StudentRecord;
use crate::utils::errors::SyncError;
use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

fn result_row(id: &str, record: &StudentRecord) -> [String; 5] {
    [
        id.to_string(),
        record.name.clone().unwrap_or_default(),
        record.gpa.clone(),
        record.cgpa.clone(),
        record.fail_subjects_joined(),
    ]
}

fn row_writer<W: Write>(writer: W) -> csv::Writer<W> {
    csv::WriterBuilder::new()
        .delimiter(b';')
        .has_headers(false)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(writer)
}

fn ensure_parent_dir(path: &Path) -> Result<(), SyncError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

pub struct ProgressFile {
    path: PathBuf,
}

impl ProgressFile {
    /// Creates the writer, making the parent directory when it does not exist.
    pub fn create(path: &Path) -> Result<Self> {
        ensure_parent_dir(path)
            .with_context(|| format!("Failed to create directory for {}", path.display()))?;

        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    /// Overwrites the file with the row for `record`.
    pub fn record(&self, id: &str, record: &StudentRecord) -> Result<()> {
        let file = File::create(&self.path)
            .with_context(|| format!("Failed to write progress file: {}", self.path.display()))?;

        let mut writer = row_writer(file);
        writer
            .write_record(result_row(id, record))
            .with_context(|| format!("Failed to write progress file: {}", self.path.display()))?;
        writer
            .flush()
            .with_context(|| format!("Failed to write progress file: {}", self.path.display()))
    }
}

/// Appends one row per extracted record, keeping rows from earlier runs.
pub struct ResultsCsv {
    path: PathBuf,
    writer: csv::Writer<File>,
}

impl ResultsCsv {
    pub fn open(path: &Path) -> Result<Self> {
        ensure_parent_dir(path)
            .with_context(|| format!("Failed to create directory for {}", path.display()))?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(SyncError::from)
            .with_context(|| format!("Failed to open results CSV: {}", path.display()))?;

        Ok(Self {
            path: path.to_path_buf(),
            writer: row_writer(file),
        })
    }

    pub fn append(&mut self, id: &str, record: &StudentRecord) -> Result<()> {
        self.writer
            .write_record(result_row(id, record))
            .with_context(|| format!("Failed to append to {}", self.path.display()))?;
        // Flushed per row so the file can be watched while the run is going
        self.writer
            .flush()
            .with_context(|| format!("Failed to append to {}", self.path.display()))
    }
}
