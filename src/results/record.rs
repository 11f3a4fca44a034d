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

use serde::Serialize;

/// Grade recorded when the grades table leaves the grade cell blank.
pub const DEFAULT_GRADE: &str = "0.00";

/// One course line from the grades table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CourseGrade {
    pub name: String,
    pub grade: String,
}

impl CourseGrade {
    /// Creates a course entry, substituting [`DEFAULT_GRADE`] for a blank grade.
    pub fn new(name: impl Into<String>, grade: impl Into<String>) -> Self {
        let grade = grade.into();
        let grade = if grade.trim().is_empty() {
            DEFAULT_GRADE.to_string()
        } else {
            grade.trim().to_string()
        };

        Self {
            name: name.into().trim().to_string(),
            grade,
        }
    }
}

/// Everything extracted from one rendered result page.
///
/// The shape is fixed: every field starts at its default and the extractor
/// only ever fills values in, so an incomplete page still yields a complete
/// record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StudentRecord {
    pub name: Option<String>,
    pub registration: Option<String>,
    pub gpa: String,
    pub cgpa: String,
    pub fail_subjects: Vec<String>,
    pub courses: Vec<CourseGrade>,
    /// Whether the result summary block was present ("Absent" pages have none).
    pub summary_found: bool,
}

impl StudentRecord {
    /// A record can only be reconciled when it carries a registration number.
    pub fn is_usable(&self) -> bool {
        self.registration
            .as_deref()
            .is_some_and(|reg| !reg.trim().is_empty())
    }

    /// Fail/retake course codes in the form stored in the sheet.
    pub fn fail_subjects_joined(&self) -> String {
        self.fail_subjects.join(", ")
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("N/A")
    }
}
