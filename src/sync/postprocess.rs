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

//! Turns numeric-looking text in the GPA and CGPA columns into real numbers.
//!
//! Per-record writes store scraped values as raw text. Once the loop is done
//! the columns are read back unformatted, any text that parses as a finite
//! number is rewritten as a number and a fixed display pattern is applied.

use crate::sheets::backend::{
    CellValue, ColumnRange, RangeUpdate, SheetBackend, ValueInputOption, ValueRenderOption,
};
use anyhow::Result;
use serde_json::Value;
use tracing::{debug, info};

/// Numeric coercion for a single cell value.
///
/// Text that parses as a finite `f64` after trimming becomes a number.
/// Everything else, including numbers already stored as numbers, is kept.
pub fn coerce_numeric(value: &Value) -> Value {
    if let Value::String(text) = value
        && let Ok(number) = text.trim().parse::<f64>()
        && number.is_finite()
    {
        return CellValue::Number(number).to_json();
    }
    value.clone()
}

/// Rewrites every cell of `columns` with its coerced value and applies `pattern`.
///
/// Returns the number of cells written back.
pub async fn normalize_numeric_columns(
    backend: &mut impl SheetBackend,
    columns: &[usize],
    first_row: usize,
    pattern: &str,
) -> Result<usize> {
    let ranges: Vec<ColumnRange> = columns
        .iter()
        .map(|&column| ColumnRange { column, first_row })
        .collect();
    let a1_ranges: Vec<String> = ranges.iter().map(|range| range.to_a1()).collect();

    info!("🔢 Normalizing numeric cells in {}", a1_ranges.join(", "));

    let blocks = backend
        .batch_get(&a1_ranges, ValueRenderOption::UnformattedValue)
        .await?;

    let updates: Vec<RangeUpdate> = a1_ranges
        .iter()
        .zip(blocks)
        .filter(|(_, rows)| !rows.is_empty())
        .map(|(range, rows)| RangeUpdate {
            range: range.clone(),
            values: rows
                .iter()
                .map(|row| row.iter().take(1).map(coerce_numeric).collect())
                .collect(),
        })
        .collect();

    let written = if updates.is_empty() {
        debug!("No values to normalize");
        0
    } else {
        backend
            .batch_update(&updates, ValueInputOption::UserEntered)
            .await?
    };

    backend.format_number(&ranges, pattern).await?;
    info!("✅ Normalized {} cells, applied format '{}'", written, pattern);

    Ok(written)
}
