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

/// A single point-in-time read of the worksheet grid.
///
/// Row 1 of the grid becomes `headers`; `rows` holds every following row in
/// order. Rows may be shorter than the header row because the Sheets API trims
/// trailing empty cells, a missing cell reads as empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SheetSnapshot {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl SheetSnapshot {
    pub fn from_grid(grid: Vec<Vec<String>>) -> Self {
        let mut grid = grid.into_iter();
        let headers = grid.next().unwrap_or_default();
        Self {
            headers,
            rows: grid.collect(),
        }
    }

    /// Text of the cell at a 0-based row position and column.
    pub fn cell(&self, position: usize, column: usize) -> &str {
        self.rows
            .get(position)
            .and_then(|row| row.get(column))
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn is_cell_empty(&self, position: usize, column: usize) -> bool {
        self.cell(position, column).trim().is_empty()
    }

    /// 1-based sheet row number of a 0-based position in `rows`.
    pub fn sheet_row_number(position: usize) -> usize {
        position + 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|row| row.iter().map(|cell| cell.to_string()).collect())
            .collect()
    }

    #[test]
    fn splits_headers_from_rows() {
        let snapshot = SheetSnapshot::from_grid(grid(&[
            &["Reg. No.", "GPA"],
            &["745", "3.00"],
            &["746"],
        ]));

        assert_eq!(snapshot.headers, vec!["Reg. No.", "GPA"]);
        assert_eq!(snapshot.rows.len(), 2);
        assert_eq!(snapshot.cell(0, 1), "3.00");
        assert_eq!(snapshot.cell(1, 1), "");
        assert!(snapshot.is_cell_empty(1, 1));
        assert!(snapshot.is_cell_empty(7, 0));
    }

    #[test]
    fn whitespace_only_cell_counts_as_empty() {
        let snapshot = SheetSnapshot::from_grid(grid(&[&["GPA"], &["  "]]));
        assert!(snapshot.is_cell_empty(0, 0));
    }

    #[test]
    fn empty_grid_gives_empty_snapshot() {
        assert_eq!(SheetSnapshot::from_grid(Vec::new()), SheetSnapshot::default());
    }

    #[test]
    fn row_numbers_skip_header() {
        assert_eq!(SheetSnapshot::sheet_row_number(0), 2);
        assert_eq!(SheetSnapshot::sheet_row_number(10), 12);
    }
}
