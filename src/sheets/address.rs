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

//! A1-style addressing helpers.
//!
//! Columns are 0-based everywhere in this crate, rows are the 1-based numbers
//! shown in the spreadsheet UI.

/// Converts a zero-based column index to a column letter (0=A, 25=Z, 26=AA, ...).
pub fn column_letter(index: usize) -> String {
    let mut result = String::new();
    let mut n = index;

    loop {
        result.insert(0, (b'A' + (n % 26) as u8) as char);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }

    result
}

/// Address of a single cell, e.g. `cell_address(4, 12) == "E12"`.
pub fn cell_address(column: usize, row: usize) -> String {
    format!("{}{}", column_letter(column), row)
}

/// Open-ended range covering one column from `first_row` down, e.g. `"E3:E"`.
pub fn column_range(column: usize, first_row: usize) -> String {
    let letter = column_letter(column);
    format!("{letter}{first_row}:{letter}")
}

/// Quotes a worksheet title so it can stand alone as a range covering the whole sheet.
pub fn quote_title(worksheet: &str) -> String {
    format!("'{}'", worksheet.replace('\'', "''"))
}

/// Prefixes a range with a quoted worksheet title (`'My Sheet'!E3:E`).
pub fn qualify(worksheet: &str, range: &str) -> String {
    format!("{}!{}", quote_title(worksheet), range)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_letters() {
        assert_eq!(column_letter(0), "A");
        assert_eq!(column_letter(4), "E");
        assert_eq!(column_letter(25), "Z");
        assert_eq!(column_letter(26), "AA");
        assert_eq!(column_letter(51), "AZ");
        assert_eq!(column_letter(52), "BA");
        assert_eq!(column_letter(701), "ZZ");
        assert_eq!(column_letter(702), "AAA");
    }

    #[test]
    fn cell_and_column_ranges() {
        assert_eq!(cell_address(4, 12), "E12");
        assert_eq!(cell_address(27, 2), "AB2");
        assert_eq!(column_range(5, 3), "F3:F");
    }

    #[test]
    fn qualifies_with_escaped_title() {
        assert_eq!(qualify("PerCourse_L2T2", "E3:E"), "'PerCourse_L2T2'!E3:E");
        assert_eq!(qualify("Bob's tab", "A1"), "'Bob''s tab'!A1");
        assert_eq!(quote_title("Results"), "'Results'");
    }
}
