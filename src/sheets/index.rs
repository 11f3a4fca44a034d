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

//! Lookup tables built once from the sheet snapshot.

use crate::results::normalize::{first_line, normalize};
use crate::sheets::snapshot::SheetSnapshot;
use crate::utils::errors::SyncError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Header labels that anchor the reconciliation; each must appear verbatim in row 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequiredHeaders {
    pub registration: String,
    pub gpa: String,
    pub cgpa: String,
    pub retake: String,
}

impl Default for RequiredHeaders {
    fn default() -> Self {
        Self {
            registration: "Reg. No.".to_string(),
            gpa: "GPA".to_string(),
            cgpa: "CGPA".to_string(),
            retake: "Retake Courses".to_string(),
        }
    }
}

/// 0-based positions of the required columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequiredColumns {
    pub registration: usize,
    pub gpa: usize,
    pub cgpa: usize,
    pub retake: usize,
}

/// Outcome of a registration lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowLookup {
    /// 0-based position in the snapshot rows.
    Found(usize),
    NotFound,
}

#[derive(Debug, Clone)]
pub struct SheetIndex {
    reg_index: HashMap<String, usize>,
    course_columns: HashMap<String, usize>,
    columns: RequiredColumns,
}

impl SheetIndex {
    /// Builds the registration and course-column indices.
    ///
    /// # Errors
    ///
    /// [`SyncError::MissingColumn`] naming the first required header that is
    /// not present in row 1.
    pub fn build(snapshot: &SheetSnapshot, required: &RequiredHeaders) -> Result<Self, SyncError> {
        let position_of = |label: &str| {
            snapshot
                .headers
                .iter()
                .position(|header| header == label)
                .ok_or_else(|| SyncError::MissingColumn(label.to_string()))
        };

        let columns = RequiredColumns {
            registration: position_of(&required.registration)?,
            gpa: position_of(&required.gpa)?,
            cgpa: position_of(&required.cgpa)?,
            retake: position_of(&required.retake)?,
        };

        let mut reg_index = HashMap::new();
        for position in 0..snapshot.rows.len() {
            let registration = snapshot.cell(position, columns.registration).trim();
            if registration.is_empty() {
                continue;
            }
            if reg_index.contains_key(registration) {
                // First occurrence wins
                warn!(
                    "⚠️  Duplicate registration '{}' on row {}, keeping the earlier row",
                    registration,
                    SheetSnapshot::sheet_row_number(position)
                );
                continue;
            }
            reg_index.insert(registration.to_string(), position);
        }

        let mut course_columns = HashMap::new();
        for (column, header) in snapshot.headers.iter().enumerate() {
            if header.trim().is_empty() {
                continue;
            }
            let key = normalize(first_line(header));
            if key.is_empty() {
                continue;
            }
            if let Some(previous) = course_columns.insert(key, column) {
                debug!(
                    "🔁 Header '{}' shadows column {} with the same normalized name",
                    header.escape_debug(),
                    previous
                );
            }
        }

        debug!(
            "📇 Indexed {} registrations and {} header names",
            reg_index.len(),
            course_columns.len()
        );

        Ok(Self {
            reg_index,
            course_columns,
            columns,
        })
    }

    pub fn columns(&self) -> RequiredColumns {
        self.columns
    }

    pub fn row_of(&self, registration: &str) -> RowLookup {
        match self.reg_index.get(registration.trim()) {
            Some(&position) => RowLookup::Found(position),
            None => RowLookup::NotFound,
        }
    }

    /// Column holding grades for a scraped course name, if the sheet tracks it.
    pub fn course_column(&self, course_name: &str) -> Option<usize> {
        self.course_columns.get(&normalize(course_name)).copied()
    }

    pub fn registration_count(&self) -> usize {
        self.reg_index.len()
    }
}
