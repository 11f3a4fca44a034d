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

use crate::auth::CredentialsManager;
use crate::sheets::address;
use crate::sheets::backend::{
    ColumnRange, RangeUpdate, SheetBackend, ValueInputOption, ValueRenderOption, value_to_text,
};
use crate::utils::errors::SyncError;
use anyhow::{Context, Result};
use google_sheets4::{
    FieldMask, Sheets,
    api::{
        BatchUpdateSpreadsheetRequest, BatchUpdateValuesRequest, CellData, CellFormat, GridRange,
        NumberFormat, RepeatCellRequest, Request, ValueRange,
    },
    hyper_rustls,
};
use hyper_util::{client::legacy::connect::HttpConnector, rt::TokioExecutor};
use serde_json::Value;
use std::future::Future;
use tokio::time::{Duration, sleep};
use tracing::{debug, error, info, warn};

/// Google Sheets access scoped to a single worksheet of one spreadsheet.
pub struct SheetsManager {
    spreadsheet_id: String,
    worksheet: String,
    credentials: CredentialsManager,
    hub: Option<Sheets<hyper_rustls::HttpsConnector<HttpConnector>>>,
    worksheet_id: Option<i32>,
}

const RATE_LIMIT_MAX_RETRIES: usize = 3;

impl SheetsManager {
    fn is_rate_limit_error(error: &google_sheets4::Error) -> bool {
        let message = error.to_string().to_lowercase();
        message.contains("rate")
            || message.contains("quota")
            || message.contains("too many requests")
            || message.contains("429")
    }

    fn rate_limit_delay(attempt: usize) -> Duration {
        let base_ms: u64 = 500;
        let exponent = attempt.saturating_sub(1) as u32;
        let multiplier = 2_u64.saturating_pow(exponent).min(16);
        Duration::from_millis(base_ms * multiplier)
    }

    async fn call_with_rate_limit_retry<T, F, Fut>(description: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, google_sheets4::Error>>,
    {
        let mut attempt = 0usize;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err)
                    if attempt < RATE_LIMIT_MAX_RETRIES
                        && SheetsManager::is_rate_limit_error(&err) =>
                {
                    attempt += 1;
                    let delay = SheetsManager::rate_limit_delay(attempt);
                    warn!(
                        "🔁 {} hit Google rate limit (attempt {}/{}), retrying in {:?}",
                        description, attempt, RATE_LIMIT_MAX_RETRIES, delay
                    );
                    sleep(delay).await;
                }
                Err(err) => {
                    return Err(SyncError::SheetsApi(format!("{} failed: {}", description, err)).into());
                }
            }
        }
    }

    /// Creates a new SheetsManager instance.
    ///
    /// # Arguments
    ///
    /// * `spreadsheet_id` - Google Sheets document ID
    /// * `worksheet` - Title of the worksheet (tab) holding the results grid
    /// * `credentials` - Locator for the service-account key
    pub fn new(spreadsheet_id: String, worksheet: String, credentials: CredentialsManager) -> Self {
        Self {
            spreadsheet_id,
            worksheet,
            credentials,
            hub: None,
            worksheet_id: None,
        }
    }

    /// Initialize the Google Sheets API hub with service-account authentication.
    async fn init_hub(&mut self) -> Result<()> {
        if self.hub.is_some() {
            return Ok(());
        }

        info!("🔑 Initializing Google Sheets API connection...");

        let auth = self
            .credentials
            .build_authenticator()
            .await
            .context("Failed to authenticate with Google Sheets")?;

        let client = hyper_util::client::legacy::Client::builder(TokioExecutor::new()).build(
            hyper_rustls::HttpsConnectorBuilder::new()
                .with_native_roots()?
                .https_or_http()
                .enable_http1()
                .build(),
        );

        self.hub = Some(Sheets::new(client, auth));

        info!("✅ Google Sheets API connection established");
        Ok(())
    }

    /// Get reference to the initialized hub
    async fn get_hub(&mut self) -> Result<&Sheets<hyper_rustls::HttpsConnector<HttpConnector>>> {
        self.init_hub().await?;
        self.hub
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("Failed to initialize Google Sheets hub"))
    }

    /// Connects to the spreadsheet and verifies the configured worksheet exists.
    ///
    /// # Returns
    ///
    /// The spreadsheet title.
    ///
    /// # Errors
    ///
    /// * If authentication fails
    /// * If the spreadsheet ID is wrong or not shared with the service account
    /// * If the worksheet is not present in the spreadsheet
    pub async fn connect(&mut self) -> Result<String> {
        info!("📊 Connecting to Google Sheet: {}", self.spreadsheet_id);

        let spreadsheet_id = self.spreadsheet_id.clone();
        let worksheet = self.worksheet.clone();
        let hub = self.get_hub().await?;

        let result = Self::call_with_rate_limit_retry("fetch spreadsheet metadata", || {
            let hub = hub;
            let spreadsheet_id = spreadsheet_id.clone();
            async move { hub.spreadsheets().get(&spreadsheet_id).doit().await }
        })
        .await;

        let spreadsheet = match result {
            Ok((_, spreadsheet)) => spreadsheet,
            Err(e) => {
                let error_msg = format!(
                    "Failed to access Google Sheet with ID '{}'. Please verify:\n\
                    • The sheet ID is correct\n\
                    • The sheet is shared with the service account's e-mail address\n\
                    • The service-account key is valid",
                    spreadsheet_id
                );
                return Err(SyncError::Auth(format!("{}\n\nOriginal error: {}", error_msg, e)).into());
            }
        };

        let title = spreadsheet
            .properties
            .as_ref()
            .and_then(|p| p.title.clone())
            .unwrap_or_else(|| spreadsheet_id.clone());

        let worksheet_id = spreadsheet
            .sheets
            .unwrap_or_default()
            .into_iter()
            .filter_map(|sheet| sheet.properties)
            .find(|properties| properties.title.as_deref() == Some(worksheet.as_str()))
            .and_then(|properties| properties.sheet_id);

        match worksheet_id {
            Some(id) => {
                info!(
                    "✅ Connected to '{}' and selected worksheet '{}' (ID: {})",
                    title, worksheet, id
                );
                self.worksheet_id = Some(id);
                Ok(title)
            }
            None => Err(SyncError::Config(format!(
                "Worksheet '{}' not found in spreadsheet '{}'",
                worksheet, title
            ))
            .into()),
        }
    }

    async fn worksheet_id(&mut self) -> Result<i32> {
        if let Some(id) = self.worksheet_id {
            return Ok(id);
        }
        self.connect().await?;
        self.worksheet_id
            .ok_or_else(|| anyhow::anyhow!("Worksheet '{}' has no sheet ID", self.worksheet))
    }

    fn qualified(&self, range: &str) -> String {
        address::qualify(&self.worksheet, range)
    }

    /// Builds a repeat-cell request applying `pattern` to one column range.
    fn number_format_request(worksheet_id: i32, column: ColumnRange, pattern: &str) -> Request {
        Request {
            repeat_cell: Some(RepeatCellRequest {
                range: Some(GridRange {
                    sheet_id: Some(worksheet_id),
                    start_row_index: Some(column.first_row.saturating_sub(1) as i32),
                    end_row_index: None,
                    start_column_index: Some(column.column as i32),
                    end_column_index: Some(column.column as i32 + 1),
                    ..Default::default()
                }),
                cell: Some(CellData {
                    user_entered_format: Some(CellFormat {
                        number_format: Some(NumberFormat {
                            type_: Some("NUMBER".to_string()),
                            pattern: Some(pattern.to_string()),
                            ..Default::default()
                        }),
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
                fields: Some(FieldMask::new(&["userEnteredFormat.numberFormat"])),
                ..Default::default()
            }),
            ..Default::default()
        }
    }
}

impl SheetBackend for SheetsManager {
    async fn get_all_values(&mut self) -> Result<Vec<Vec<String>>> {
        info!("📖 Reading all values from worksheet '{}'", self.worksheet);

        let spreadsheet_id = self.spreadsheet_id.clone();
        let range = address::quote_title(&self.worksheet);
        let hub = self.get_hub().await?;

        let (_, value_range) = Self::call_with_rate_limit_retry("read worksheet values", || {
            let hub = hub;
            let spreadsheet_id = spreadsheet_id.clone();
            let range = range.clone();
            async move {
                hub.spreadsheets()
                    .values_get(&spreadsheet_id, &range)
                    .value_render_option(ValueRenderOption::FormattedValue.as_api_str())
                    .major_dimension("ROWS")
                    .doit()
                    .await
            }
        })
        .await?;

        let rows: Vec<Vec<String>> = value_range
            .values
            .unwrap_or_default()
            .iter()
            .map(|row| row.iter().map(value_to_text).collect())
            .collect();

        info!("✅ Read {} rows (including header)", rows.len());
        Ok(rows)
    }

    async fn batch_get(
        &mut self,
        ranges: &[String],
        render: ValueRenderOption,
    ) -> Result<Vec<Vec<Vec<Value>>>> {
        let spreadsheet_id = self.spreadsheet_id.clone();
        let qualified: Vec<String> = ranges.iter().map(|range| self.qualified(range)).collect();
        debug!("📖 Batch reading ranges: {:?}", qualified);
        let hub = self.get_hub().await?;

        let (_, response) = Self::call_with_rate_limit_retry("batch read ranges", || {
            let hub = hub;
            let spreadsheet_id = spreadsheet_id.clone();
            let qualified = qualified.clone();
            async move {
                let mut call = hub
                    .spreadsheets()
                    .values_batch_get(&spreadsheet_id)
                    .value_render_option(render.as_api_str());
                for range in &qualified {
                    call = call.add_ranges(range);
                }
                call.doit().await
            }
        })
        .await?;

        let mut value_ranges: Vec<Vec<Vec<Value>>> = response
            .value_ranges
            .unwrap_or_default()
            .into_iter()
            .map(|range| range.values.unwrap_or_default())
            .collect();
        value_ranges.resize(ranges.len(), Vec::new());

        Ok(value_ranges)
    }

    async fn batch_update(
        &mut self,
        updates: &[RangeUpdate],
        input: ValueInputOption,
    ) -> Result<usize> {
        if updates.is_empty() {
            return Ok(0);
        }

        let spreadsheet_id = self.spreadsheet_id.clone();
        let data: Vec<ValueRange> = updates
            .iter()
            .map(|update| ValueRange {
                range: Some(self.qualified(&update.range)),
                values: Some(update.values.clone()),
                major_dimension: Some("ROWS".to_string()),
                ..Default::default()
            })
            .collect();

        let batch_request = BatchUpdateValuesRequest {
            value_input_option: Some(input.as_api_str().to_string()),
            data: Some(data),
            ..Default::default()
        };

        debug!("🚀 Executing batch update for {} ranges...", updates.len());

        let hub = self.get_hub().await?;
        let result = Self::call_with_rate_limit_retry("batch update worksheet values", || {
            let hub = hub;
            let spreadsheet_id = spreadsheet_id.clone();
            let request = batch_request.clone();
            async move {
                hub.spreadsheets()
                    .values_batch_update(request, &spreadsheet_id)
                    .doit()
                    .await
            }
        })
        .await;

        match result {
            Ok((_, response)) => {
                let updated_cells = response.total_updated_cells.unwrap_or(0);
                debug!("✅ Batch update wrote {} cells", updated_cells);
                Ok(updated_cells.max(0) as usize)
            }
            Err(e) => {
                error!("❌ {}", e);

                let message = e.to_string();
                if message.contains("permission") || message.contains("access") {
                    info!("💡 Tip: Check that the service account has edit access to this sheet.");
                } else if message.contains("not found") {
                    info!("💡 Tip: Verify the sheet ID and worksheet name are correct.");
                }

                Err(e)
            }
        }
    }

    async fn format_number(&mut self, columns: &[ColumnRange], pattern: &str) -> Result<()> {
        if columns.is_empty() {
            return Ok(());
        }

        debug!("🎨 Applying number format '{}' to {:?}", pattern, columns);

        let worksheet_id = self.worksheet_id().await?;
        let spreadsheet_id = self.spreadsheet_id.clone();
        let batch_request = BatchUpdateSpreadsheetRequest {
            requests: Some(
                columns
                    .iter()
                    .map(|column| Self::number_format_request(worksheet_id, *column, pattern))
                    .collect(),
            ),
            ..Default::default()
        };

        let hub = self.get_hub().await?;
        Self::call_with_rate_limit_retry("apply number formatting", || {
            let hub = hub;
            let spreadsheet_id = spreadsheet_id.clone();
            let request = batch_request.clone();
            async move {
                hub.spreadsheets()
                    .batch_update(request, &spreadsheet_id)
                    .doit()
                    .await
            }
        })
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_delay_backs_off_and_caps() {
        assert_eq!(SheetsManager::rate_limit_delay(1), Duration::from_millis(500));
        assert_eq!(SheetsManager::rate_limit_delay(2), Duration::from_millis(1000));
        assert_eq!(SheetsManager::rate_limit_delay(3), Duration::from_millis(2000));
        assert_eq!(SheetsManager::rate_limit_delay(10), Duration::from_millis(8000));
    }

    #[test]
    fn number_format_targets_open_ended_column() {
        let request = SheetsManager::number_format_request(
            42,
            ColumnRange {
                column: 4,
                first_row: 3,
            },
            "0.00",
        );

        let repeat = request.repeat_cell.expect("repeat cell request");
        let range = repeat.range.expect("grid range");
        assert_eq!(range.sheet_id, Some(42));
        assert_eq!(range.start_row_index, Some(2));
        assert_eq!(range.end_row_index, None);
        assert_eq!(range.start_column_index, Some(4));
        assert_eq!(range.end_column_index, Some(5));

        let format = repeat
            .cell
            .and_then(|cell| cell.user_entered_format)
            .and_then(|format| format.number_format)
            .expect("number format");
        assert_eq!(format.type_.as_deref(), Some("NUMBER"));
        assert_eq!(format.pattern.as_deref(), Some("0.00"));
    }

    #[test]
    fn qualifies_ranges_with_worksheet() {
        let manager = SheetsManager::new(
            "sheet".to_string(),
            "PerCourse_L2T2".to_string(),
            CredentialsManager::new(None),
        );
        assert_eq!(manager.qualified("E3:E"), "'PerCourse_L2T2'!E3:E");
    }
}
