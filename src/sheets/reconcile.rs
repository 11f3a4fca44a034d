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

//! Decides which cells of a student's row receive scraped values.
//!
//! A cell is only ever written when it is currently empty: the sheet
//! accumulates results over repeated runs and is the source of truth, so
//! re-running against unchanged data produces no writes.

use crate::results::record::StudentRecord;
use crate::sheets::backend::CellWrite;
use crate::sheets::index::{RowLookup, SheetIndex};
use crate::sheets::snapshot::SheetSnapshot;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub enum Reconciliation {
    /// The record's row was found; `writes` may be empty.
    Writes {
        row_number: usize,
        writes: Vec<CellWrite>,
    },
    /// The registration is not present in the sheet.
    NoMatch { registration: String },
}

pub fn reconcile(
    record: &StudentRecord,
    index: &SheetIndex,
    snapshot: &SheetSnapshot,
) -> Reconciliation {
    let registration = record.registration.as_deref().unwrap_or("").trim();

    let position = match index.row_of(registration) {
        RowLookup::Found(position) if !registration.is_empty() => position,
        _ => {
            return Reconciliation::NoMatch {
                registration: registration.to_string(),
            };
        }
    };

    let row_number = SheetSnapshot::sheet_row_number(position);
    let columns = index.columns();
    let mut planned = RowPlan::new(snapshot, position, row_number);

    if !record.gpa.is_empty() {
        planned.fill(columns.gpa, &record.gpa);
    }
    if !record.cgpa.is_empty() {
        planned.fill(columns.cgpa, &record.cgpa);
    }
    if !record.fail_subjects.is_empty() {
        planned.fill(columns.retake, &record.fail_subjects_joined());
    }

    for course in &record.courses {
        if let Some(column) = index.course_column(&course.name) {
            planned.fill(column, &course.grade);
        }
    }

    Reconciliation::Writes {
        row_number,
        writes: planned.writes,
    }
}

/// Collects writes for one row, at most one per column and only into empty cells.
///
/// A later value for an already planned column replaces the earlier one.
struct RowPlan<'a> {
    snapshot: &'a SheetSnapshot,
    position: usize,
    row_number: usize,
    planned: HashMap<usize, usize>,
    writes: Vec<CellWrite>,
}

impl<'a> RowPlan<'a> {
    fn new(snapshot: &'a SheetSnapshot, position: usize, row_number: usize) -> Self {
        Self {
            snapshot,
            position,
            row_number,
            planned: HashMap::new(),
            writes: Vec::new(),
        }
    }

    fn fill(&mut self, column: usize, value: &str) {
        if !self.snapshot.is_cell_empty(self.position, column) {
            return;
        }
        let write = CellWrite::new(column, self.row_number, value);
        match self.planned.get(&column) {
            Some(&slot) => self.writes[slot] = write,
            None => {
                self.planned.insert(column, self.writes.len());
                self.writes.push(write);
            }
        }
    }
}
