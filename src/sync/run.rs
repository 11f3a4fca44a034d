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

//! The sync loop: look up every registration in the configured range and fill
//! the empty cells of its row.

use crate::browser::source::{LookupOutcome, ResultSource};
use crate::config::Config;
use crate::results::extractor::extract;
use crate::results::record::StudentRecord;
use crate::sheets::backend::{RangeUpdate, SheetBackend, ValueInputOption};
use crate::sheets::index::{RequiredColumns, SheetIndex};
use crate::sheets::reconcile::{Reconciliation, reconcile};
use crate::sheets::snapshot::SheetSnapshot;
use crate::sync::postprocess::normalize_numeric_columns;
use crate::sync::progress::{ProgressFile, ResultsCsv};
use crate::utils::errors::SyncError;
use anyhow::{Context, Result};
use tracing::{debug, error, info, warn};

/// Per-run counters, logged at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Registrations looked up
    pub processed: usize,
    /// Records that produced at least one write
    pub updated: usize,
    pub cells_written: usize,
    /// Records whose row needed nothing
    pub unchanged: usize,
    pub no_result: usize,
    pub timed_out: usize,
    /// Records whose registration is not in the sheet
    pub unmatched: usize,
    /// Pages without a registration number
    pub unusable: usize,
    pub failed: usize,
}

impl RunSummary {
    fn count(&mut self, outcome: IdOutcome) {
        match outcome {
            IdOutcome::Updated(cells) => {
                self.updated += 1;
                self.cells_written += cells;
            }
            IdOutcome::Unchanged => self.unchanged += 1,
            IdOutcome::NoResult => self.no_result += 1,
            IdOutcome::TimedOut => self.timed_out += 1,
            IdOutcome::Unmatched => self.unmatched += 1,
            IdOutcome::Unusable => self.unusable += 1,
        }
    }
}

/// Local files every extracted record is written to.
struct ResultFiles {
    progress: Option<ProgressFile>,
    results_csv: Option<ResultsCsv>,
}

impl ResultFiles {
    fn open(config: &Config) -> Result<Self> {
        Ok(Self {
            progress: config
                .progress_file
                .as_deref()
                .map(ProgressFile::create)
                .transpose()?,
            results_csv: config
                .results_csv
                .as_deref()
                .map(ResultsCsv::open)
                .transpose()?,
        })
    }

    fn record(&mut self, id: &str, record: &StudentRecord) {
        if let Some(progress) = &self.progress
            && let Err(err) = progress.record(id, record)
        {
            warn!("⚠️  {:#}", err);
        }
        if let Some(results_csv) = &mut self.results_csv
            && let Err(err) = results_csv.append(id, record)
        {
            warn!("⚠️  {:#}", err);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IdOutcome {
    Updated(usize),
    Unchanged,
    NoResult,
    TimedOut,
    Unmatched,
    Unusable,
}

/// Runs the whole pipeline for `config.range`.
///
/// Reading the sheet and resolving its columns are the only fatal steps.
/// Failures for a single registration are logged and the loop moves on.
/// `source` is closed before this returns, whatever the outcome.
pub async fn run_sync(
    config: &Config,
    source: &mut impl ResultSource,
    backend: &mut impl SheetBackend,
) -> Result<RunSummary> {
    if config.dry_run {
        info!("🔍 Running in dry-run mode - no changes will be made");
    }

    let result = sync_range(config, source, backend).await;
    source.close();
    let (summary, columns) = result?;

    if !config.post_process.enabled {
        info!("⏭️  Numeric post-processing disabled");
    } else if config.dry_run {
        info!("🔍 Dry run - skipping numeric post-processing");
    } else if let Err(err) = normalize_numeric_columns(
        backend,
        &[columns.gpa, columns.cgpa],
        config.post_process.first_data_row,
        &config.post_process.pattern,
    )
    .await
    {
        warn!("⚠️  Numeric post-processing failed: {:#}", err);
    }

    log_summary(&summary, config.dry_run);
    Ok(summary)
}

async fn sync_range(
    config: &Config,
    source: &mut impl ResultSource,
    backend: &mut impl SheetBackend,
) -> Result<(RunSummary, RequiredColumns)> {
    let grid = backend
        .get_all_values()
        .await
        .context("Failed to read the worksheet")?;
    let snapshot = SheetSnapshot::from_grid(grid);
    let index = SheetIndex::build(&snapshot, &config.headers)?;
    info!(
        "📊 Loaded {} rows, {} registrations indexed",
        snapshot.rows.len(),
        index.registration_count()
    );

    let mut files = ResultFiles::open(config)?;

    info!(
        "🔄 Looking up {} registrations ({}..={})",
        config.range.count(),
        config.range.start,
        config.range.end
    );

    let mut summary = RunSummary::default();
    for id in config.range.ids() {
        summary.processed += 1;

        match sync_one(&id, config, source, backend, &index, &snapshot, &mut files).await {
            Ok(outcome) => summary.count(outcome),
            Err(err) => {
                error!("❌ Failed to process {}: {:#}", id, err);
                summary.failed += 1;
            }
        }
    }

    Ok((summary, index.columns()))
}

async fn sync_one(
    id: &str,
    config: &Config,
    source: &mut impl ResultSource,
    backend: &mut impl SheetBackend,
    index: &SheetIndex,
    snapshot: &SheetSnapshot,
    files: &mut ResultFiles,
) -> Result<IdOutcome> {
    let html = match source.fetch_result_page(id).await? {
        LookupOutcome::Page(html) => html,
        LookupOutcome::NoResult => {
            info!("📭 No result published for {}", id);
            return Ok(IdOutcome::NoResult);
        }
        LookupOutcome::TimedOut => {
            warn!("⏱️  {}", SyncError::LookupTimeout(id.to_string()));
            return Ok(IdOutcome::TimedOut);
        }
    };

    let record = extract(&html);
    if !record.summary_found {
        debug!("No result summary on the page for {}", id);
    }

    files.record(id, &record);

    if !record.is_usable() {
        warn!("⚠️  Result page for {} has no registration number, skipping", id);
        return Ok(IdOutcome::Unusable);
    }

    let (row_number, writes) = match reconcile(&record, index, snapshot) {
        Reconciliation::Writes { row_number, writes } => (row_number, writes),
        Reconciliation::NoMatch { registration } => {
            warn!("⚠️  {}", SyncError::NoMatch(registration));
            return Ok(IdOutcome::Unmatched);
        }
    };

    if writes.is_empty() {
        info!("✓ {} ({}) row {} already complete", id, record.display_name(), row_number);
        return Ok(IdOutcome::Unchanged);
    }

    if config.dry_run {
        info!(
            "🔍 Would write {} cells for {} ({}) on row {}",
            writes.len(),
            id,
            record.display_name(),
            row_number
        );
        for write in &writes {
            info!("  {} = {:?}", write.address, write.value);
        }
        return Ok(IdOutcome::Updated(writes.len()));
    }

    let updates: Vec<RangeUpdate> = writes.iter().map(|write| write.to_range_update()).collect();
    let cells = backend
        .batch_update(&updates, ValueInputOption::Raw)
        .await
        .with_context(|| format!("Failed to write row {}", row_number))?;

    info!(
        "✅ {} ({}) row {}: wrote {} cells",
        id,
        record.display_name(),
        row_number,
        cells
    );
    Ok(IdOutcome::Updated(cells))
}

fn log_summary(summary: &RunSummary, dry_run: bool) {
    let verb = if dry_run { "would be written" } else { "written" };
    info!(
        "📋 Processed {} registrations: {} updated ({} cells {}), {} unchanged",
        summary.processed, summary.updated, summary.cells_written, verb, summary.unchanged
    );
    info!(
        "📋 {} without result, {} timed out, {} not in sheet, {} unusable, {} failed",
        summary.no_result, summary.timed_out, summary.unmatched, summary.unusable, summary.failed
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RegistrationRange;
    use crate::config::tests::sample_config;
    use crate::results::extractor::tests::{PageBuilder, grade_row};
    use crate::sheets::backend::memory::MemorySheet;
    use serde_json::json;
    use std::collections::{HashMap, HashSet};
    use std::fs;
    use tempfile::TempDir;

    #[derive(Default)]
    struct FakeSource {
        pages: HashMap<String, LookupOutcome>,
        failing: HashSet<String>,
        requested: Vec<String>,
        closed: bool,
    }

    impl FakeSource {
        fn with_page(mut self, id: &str, page: &PageBuilder) -> Self {
            self.pages
                .insert(id.to_string(), LookupOutcome::Page(page.render()));
            self
        }

        fn with_outcome(mut self, id: &str, outcome: LookupOutcome) -> Self {
            self.pages.insert(id.to_string(), outcome);
            self
        }
    }

    impl ResultSource for FakeSource {
        async fn fetch_result_page(&mut self, registration: &str) -> Result<LookupOutcome> {
            self.requested.push(registration.to_string());
            if self.failing.contains(registration) {
                anyhow::bail!("simulated browser crash");
            }
            Ok(self
                .pages
                .get(registration)
                .cloned()
                .unwrap_or(LookupOutcome::NoResult))
        }

        fn close(&mut self) {
            self.closed = true;
        }
    }

    fn grade_book() -> MemorySheet {
        MemorySheet::from_rows(&[
            &[
                "Name",
                "Reg. No.",
                "Roll",
                "Remarks",
                "GPA",
                "CGPA",
                "Retake Courses",
                "Data Structures\n(CSE-1205)",
                "Calculus\n(MATH-1201)",
            ],
            &["", "", "", "", "out of 4", "out of 4", "", "", ""],
            &["Jane Doe", "745", "1", "", "", "", "", "", ""],
            &["John Roe", "746", "2", "", "3.00", "", "", "", ""],
        ])
    }

    fn config_for(start: u64, end: u64) -> Config {
        let mut config = sample_config();
        config.range = RegistrationRange { start, end };
        config.progress_file = None;
        config.results_csv = None;
        config.post_process.enabled = false;
        config
    }

    fn page(registration: &'static str) -> PageBuilder {
        PageBuilder {
            registration: Some(registration),
            ..PageBuilder::new()
        }
    }

    #[tokio::test]
    async fn fills_empty_cells_and_counts_outcomes() {
        let mut sheet = grade_book();
        let mut source = FakeSource::default()
            .with_page("745", &page("745"))
            .with_outcome("746", LookupOutcome::TimedOut);

        let summary = run_sync(&config_for(745, 747), &mut source, &mut sheet)
            .await
            .unwrap();

        assert_eq!(
            summary,
            RunSummary {
                processed: 3,
                updated: 1,
                cells_written: 3,
                timed_out: 1,
                no_result: 1,
                ..Default::default()
            }
        );
        assert_eq!(source.requested, vec!["745", "746", "747"]);
        assert!(source.closed);

        assert_eq!(sheet.batches.len(), 1);
        assert_eq!(sheet.text("E3"), "3.75");
        assert_eq!(sheet.text("F3"), "3.50");
        assert_eq!(sheet.text("H3"), "3.67");
        assert_eq!(sheet.text("G3"), "");
    }

    #[tokio::test]
    async fn existing_values_are_kept() {
        let mut sheet = grade_book();
        let mut source = FakeSource::default().with_page("746", &page("746"));

        let summary = run_sync(&config_for(746, 746), &mut source, &mut sheet)
            .await
            .unwrap();

        assert_eq!(summary.cells_written, 2);
        assert_eq!(sheet.text("E4"), "3.00");
        assert_eq!(sheet.text("F4"), "3.50");
        assert_eq!(sheet.text("H4"), "3.67");
    }

    #[tokio::test]
    async fn second_run_over_converged_sheet_writes_nothing() {
        let mut sheet = grade_book();
        let config = config_for(745, 745);

        let mut source = FakeSource::default().with_page("745", &page("745"));
        run_sync(&config, &mut source, &mut sheet).await.unwrap();

        let mut source = FakeSource::default().with_page("745", &page("745"));
        let summary = run_sync(&config, &mut source, &mut sheet).await.unwrap();

        assert_eq!(summary.unchanged, 1);
        assert_eq!(summary.cells_written, 0);
        assert_eq!(sheet.batches.len(), 1);
    }

    #[tokio::test]
    async fn retake_courses_are_joined() {
        let mut sheet = grade_book();
        let failing = PageBuilder {
            summary: Some(
                "GPA: 2.10 CGPA: 2.80 <span>Retake: CSE-1205, MATH-1201</span>".to_string(),
            ),
            grade_rows: vec![
                grade_row("CSE-1205", "Data Structures", ""),
                grade_row("MATH-1201", "Calculus", "2.00"),
            ],
            ..page("745")
        };
        let mut source = FakeSource::default().with_page("745", &failing);

        run_sync(&config_for(745, 745), &mut source, &mut sheet)
            .await
            .unwrap();

        assert_eq!(sheet.text("G3"), "CSE-1205, MATH-1201");
        assert_eq!(sheet.text("H3"), "0.00");
        assert_eq!(sheet.text("I3"), "2.00");
    }

    #[tokio::test]
    async fn unmatched_and_unusable_pages_are_skipped() {
        let mut sheet = grade_book();
        let no_registration = PageBuilder {
            registration: None,
            ..PageBuilder::new()
        };
        let mut source = FakeSource::default()
            .with_page("745", &page("999"))
            .with_page("746", &no_registration);

        let summary = run_sync(&config_for(745, 746), &mut source, &mut sheet)
            .await
            .unwrap();

        assert_eq!(summary.unmatched, 1);
        assert_eq!(summary.unusable, 1);
        assert!(sheet.batches.is_empty());
    }

    #[tokio::test]
    async fn per_id_failures_do_not_stop_the_loop() {
        let mut sheet = grade_book();
        let mut source = FakeSource::default()
            .with_page("745", &page("745"))
            .with_page("746", &page("746"))
            .with_page("747", &page("745"));
        source.failing.insert("745".to_string());

        let summary = run_sync(&config_for(745, 747), &mut source, &mut sheet)
            .await
            .unwrap();

        // 747 carries 745's page
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.updated, 2);
        assert_eq!(sheet.text("E3"), "3.75");
        assert!(source.closed);
    }

    #[tokio::test]
    async fn rejected_batch_counts_as_failure() {
        let mut sheet = grade_book();
        sheet.failing_ranges.insert("F3".to_string());
        let mut source = FakeSource::default().with_page("745", &page("745"));

        let summary = run_sync(&config_for(745, 745), &mut source, &mut sheet)
            .await
            .unwrap();

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.updated, 0);
        assert_eq!(sheet.text("E3"), "");
    }

    #[tokio::test]
    async fn dry_run_writes_nothing() {
        let mut sheet = grade_book();
        let mut config = config_for(745, 745);
        config.dry_run = true;
        config.post_process.enabled = true;
        let mut source = FakeSource::default().with_page("745", &page("745"));

        let summary = run_sync(&config, &mut source, &mut sheet).await.unwrap();

        assert_eq!(summary.updated, 1);
        assert_eq!(summary.cells_written, 3);
        assert!(sheet.batches.is_empty());
        assert!(sheet.formats.is_empty());
    }

    #[tokio::test]
    async fn missing_column_is_fatal_and_closes_source() {
        let mut sheet = MemorySheet::from_rows(&[&["Name", "Reg. No.", "GPA", "CGPA"]]);
        let mut source = FakeSource::default();

        let err = run_sync(&config_for(745, 746), &mut source, &mut sheet)
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<SyncError>(),
            Some(SyncError::MissingColumn(header)) if header == "Retake Courses"
        ));
        assert!(source.requested.is_empty());
        assert!(source.closed);
    }

    #[tokio::test]
    async fn unreadable_sheet_is_fatal() {
        let mut sheet = MemorySheet {
            fail_reads: true,
            ..Default::default()
        };
        let mut source = FakeSource::default();

        assert!(
            run_sync(&config_for(745, 745), &mut source, &mut sheet)
                .await
                .is_err()
        );
        assert!(source.closed);
    }

    #[tokio::test]
    async fn post_pass_converts_result_columns() {
        let mut sheet = grade_book();
        let mut config = config_for(745, 745);
        config.post_process.enabled = true;
        let mut source = FakeSource::default().with_page("745", &page("745"));

        run_sync(&config, &mut source, &mut sheet).await.unwrap();

        assert_eq!(sheet.value("E3"), json!(3.75));
        assert_eq!(sheet.value("F3"), json!(3.5));
        assert_eq!(sheet.value("E4"), json!(3.0));
        assert_eq!(sheet.value("E2"), json!("out of 4"));
        assert_eq!(sheet.value("H3"), json!("3.67"));
        assert_eq!(sheet.formats.len(), 1);
        assert_eq!(sheet.formats[0].1, "0.00");
    }

    #[tokio::test]
    async fn post_pass_failure_is_not_fatal() {
        let mut sheet = grade_book();
        sheet.failing_ranges.insert("E3:E".to_string());
        let mut config = config_for(745, 745);
        config.post_process.enabled = true;
        let mut source = FakeSource::default().with_page("745", &page("745"));

        let summary = run_sync(&config, &mut source, &mut sheet).await.unwrap();

        assert_eq!(summary.updated, 1);
        assert_eq!(sheet.value("E3"), json!("3.75"));
    }

    #[tokio::test]
    async fn progress_file_holds_last_extracted_record() {
        let temp_dir = TempDir::new().expect("Failed to create temporary directory");
        let path = temp_dir.path().join("Output").join("ResultFromWebsite.txt");

        let mut sheet = grade_book();
        let mut config = config_for(745, 747);
        config.progress_file = Some(path.clone());
        let mut source = FakeSource::default()
            .with_page("745", &page("745"))
            .with_page("746", &page("746"));

        run_sync(&config, &mut source, &mut sheet).await.unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "746;Jane Doe;3.75;3.50;\n");
    }

    #[tokio::test]
    async fn results_csv_gets_a_row_per_extracted_page() {
        let temp_dir = TempDir::new().expect("Failed to create temporary directory");
        let path = temp_dir.path().join("Output").join("Results.csv");

        let mut sheet = grade_book();
        let mut config = config_for(745, 747);
        config.results_csv = Some(path.clone());
        let absent = PageBuilder {
            name: Some("Doe; John"),
            summary: None,
            ..page("746")
        };
        let mut source = FakeSource::default()
            .with_page("745", &page("745"))
            .with_page("746", &absent)
            .with_outcome("747", LookupOutcome::TimedOut);

        run_sync(&config, &mut source, &mut sheet).await.unwrap();

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "745;Jane Doe;3.75;3.50;\n746;\"Doe; John\";;;\n"
        );
    }
}
