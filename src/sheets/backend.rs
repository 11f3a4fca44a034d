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

//! The grid-store seam between the sync logic and Google Sheets.

use crate::sheets::address;
use anyhow::Result;
use serde_json::Value;

/// How cell values are rendered when read back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueRenderOption {
    FormattedValue,
    UnformattedValue,
}

impl ValueRenderOption {
    pub fn as_api_str(self) -> &'static str {
        match self {
            ValueRenderOption::FormattedValue => "FORMATTED_VALUE",
            ValueRenderOption::UnformattedValue => "UNFORMATTED_VALUE",
        }
    }
}

/// How written values are interpreted by the sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueInputOption {
    Raw,
    UserEntered,
}

impl ValueInputOption {
    pub fn as_api_str(self) -> &'static str {
        match self {
            ValueInputOption::Raw => "RAW",
            ValueInputOption::UserEntered => "USER_ENTERED",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(f64),
}

impl CellValue {
    pub fn to_json(&self) -> Value {
        match self {
            CellValue::Text(text) => Value::String(text.clone()),
            CellValue::Number(number) => serde_json::Number::from_f64(*number)
                .map(Value::Number)
                .unwrap_or(Value::Null),
        }
    }
}

impl From<&str> for CellValue {
    fn from(text: &str) -> Self {
        CellValue::Text(text.to_string())
    }
}

impl From<String> for CellValue {
    fn from(text: String) -> Self {
        CellValue::Text(text)
    }
}

/// One pending single-cell mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct CellWrite {
    pub address: String,
    pub value: CellValue,
}

impl CellWrite {
    pub fn new(column: usize, row: usize, value: impl Into<CellValue>) -> Self {
        Self {
            address: address::cell_address(column, row),
            value: value.into(),
        }
    }

    pub fn to_range_update(&self) -> RangeUpdate {
        RangeUpdate {
            range: self.address.clone(),
            values: vec![vec![self.value.to_json()]],
        }
    }
}

/// A rectangular block of values written at an unqualified A1 range.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeUpdate {
    pub range: String,
    pub values: Vec<Vec<Value>>,
}

/// One column from `first_row` (1-based) to the bottom of the sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnRange {
    pub column: usize,
    pub first_row: usize,
}

impl ColumnRange {
    pub fn to_a1(self) -> String {
        address::column_range(self.column, self.first_row)
    }
}

/// Reads and writes grid cells of one worksheet by A1 address.
///
/// Ranges are given unqualified; the implementation knows which worksheet it
/// targets.
#[allow(async_fn_in_trait)]
pub trait SheetBackend {
    /// Every row of the worksheet as formatted text, row 1 first.
    async fn get_all_values(&mut self) -> Result<Vec<Vec<String>>>;

    /// Values of several ranges, one 2D array per requested range.
    async fn batch_get(
        &mut self,
        ranges: &[String],
        render: ValueRenderOption,
    ) -> Result<Vec<Vec<Vec<Value>>>>;

    /// Writes all updates in a single request and returns the updated cell count.
    async fn batch_update(
        &mut self,
        updates: &[RangeUpdate],
        input: ValueInputOption,
    ) -> Result<usize>;

    /// Applies a numeric display pattern (e.g. `0.00`) to whole columns.
    async fn format_number(&mut self, columns: &[ColumnRange], pattern: &str) -> Result<()>;
}

/// Renders a JSON cell value the way the sheet would display it as text.
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(num) => num.to_string(),
        Value::Bool(flag) => flag.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn cell_write_becomes_single_cell_update() {
        let write = CellWrite::new(4, 12, "3.75");
        assert_eq!(write.address, "E12");
        assert_eq!(
            write.to_range_update(),
            RangeUpdate {
                range: "E12".to_string(),
                values: vec![vec![json!("3.75")]],
            }
        );
    }

    #[test]
    fn numeric_values_serialize_as_numbers() {
        assert_eq!(CellValue::Number(3.5).to_json(), json!(3.5));
        assert_eq!(CellValue::Number(f64::NAN).to_json(), Value::Null);
    }

    #[test]
    fn value_text_rendering() {
        assert_eq!(value_to_text(&json!("3.00")), "3.00");
        assert_eq!(value_to_text(&json!(4)), "4");
        assert_eq!(value_to_text(&Value::Null), "");
    }

    #[test]
    fn api_option_strings() {
        assert_eq!(ValueRenderOption::UnformattedValue.as_api_str(), "UNFORMATTED_VALUE");
        assert_eq!(ValueInputOption::UserEntered.as_api_str(), "USER_ENTERED");
        assert_eq!(ColumnRange { column: 4, first_row: 3 }.to_a1(), "E3:E");
    }
}
