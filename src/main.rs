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

#[macro_use]
mod macros;

mod auth;
mod browser;
mod config;
mod results;
mod sheets;
mod sync;
mod utils;

use anyhow::Context;
use auth::CredentialsManager;
use browser::BrowserDriver;
use clap::{Parser, Subcommand, ValueEnum};
use config::Config;
use sheets::{SheetBackend, SheetIndex, SheetSnapshot, SheetsManager};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn as_env_filter(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Look up every registration in the range and fill empty sheet cells
    Sync {
        /// Path to the TOML configuration file
        #[arg(long, default_value = config::DEFAULT_CONFIG_FILE)]
        config: PathBuf,

        /// First registration number (overrides the config file)
        #[arg(long)]
        start: Option<u64>,

        /// Last registration number, inclusive (overrides the config file)
        #[arg(long)]
        end: Option<u64>,

        /// Service-account key file (overrides the config file)
        #[arg(long)]
        credentials: Option<PathBuf>,

        /// Preview changes without applying them
        #[arg(long)]
        dry_run: bool,
    },
    /// Extract a saved result page and print the record as JSON
    Parse {
        /// HTML file saved from the result page
        html_file: PathBuf,
    },
    /// Verify credentials, worksheet access and required columns
    Check {
        /// Path to the TOML configuration file
        #[arg(long, default_value = config::DEFAULT_CONFIG_FILE)]
        config: PathBuf,

        /// Service-account key file (overrides the config file)
        #[arg(long)]
        credentials: Option<PathBuf>,
    },
}

#[derive(Parser)]
#[command(name = "result-sheet-sync")]
#[command(about = "Fill a Google Sheets grade book with published exam results")]
#[command(version)]
struct Cli {
    /// Controls verbosity of log output (overrides RUST_LOG when provided)
    #[arg(long, value_enum, default_value = "info", global = true)]
    log_level: LogLevel,
    #[command(subcommand)]
    command: Commands,
}

fn init_logging(level: &LogLevel) -> anyhow::Result<()> {
    use tracing_subscriber::{EnvFilter, fmt};

    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level.as_env_filter()))?;

    fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_level(true)
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize default crypto provider for rustls
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    match cli.command {
        Commands::Sync {
            config,
            start,
            end,
            credentials,
            dry_run,
        } => {
            handle_sync_command(&config, start, end, credentials, dry_run).await?;
        }
        Commands::Parse { html_file } => {
            handle_parse_command(&html_file)?;
        }
        Commands::Check {
            config,
            credentials,
        } => {
            handle_check_command(&config, credentials).await?;
        }
    }

    Ok(())
}

fn load_config(
    path: &Path,
    start: Option<u64>,
    end: Option<u64>,
    credentials: Option<PathBuf>,
    dry_run: bool,
) -> anyhow::Result<Config> {
    info!("⚙️  Loading configuration from {}", path.display());

    let mut config = Config::load(path)?;
    config.apply_overrides(start, end, credentials, dry_run);
    config.validate()?;

    Ok(config)
}

async fn connect_sheet(config: &Config) -> anyhow::Result<SheetsManager> {
    let credentials = CredentialsManager::new(config.credentials.clone());
    let mut sheets_manager =
        SheetsManager::new(config.spreadsheet_id()?, config.worksheet.clone(), credentials);
    sheets_manager.connect().await?;
    Ok(sheets_manager)
}

async fn handle_sync_command(
    config_path: &Path,
    start: Option<u64>,
    end: Option<u64>,
    credentials: Option<PathBuf>,
    dry_run: bool,
) -> anyhow::Result<()> {
    let config = load_config(config_path, start, end, credentials, dry_run)?;

    info!("📊 Worksheet: {}", config.worksheet);
    info!("🎓 Exam: {}", config.lookup.exam);

    let mut sheets_manager = connect_sheet(&config).await?;
    let mut driver = BrowserDriver::launch(&config.lookup)?;

    sync::run_sync(&config, &mut driver, &mut sheets_manager).await?;

    Ok(())
}

fn handle_parse_command(html_file: &Path) -> anyhow::Result<()> {
    let html = std::fs::read_to_string(html_file)
        .with_context(|| format!("Failed to read {}", html_file.display()))?;

    let record = results::extract(&html);
    println!("{}", serde_json::to_string_pretty(&record)?);

    Ok(())
}

async fn handle_check_command(
    config_path: &Path,
    credentials: Option<PathBuf>,
) -> anyhow::Result<()> {
    let config = load_config(config_path, None, None, credentials, false)?;

    let mut sheets_manager = connect_sheet(&config).await?;
    let snapshot = SheetSnapshot::from_grid(sheets_manager.get_all_values().await?);
    let index = SheetIndex::build(&snapshot, &config.headers)?;
    let columns = index.columns();

    info!(
        "✅ Required columns found: registration {}, GPA {}, CGPA {}, retake {}",
        sheets::address::column_letter(columns.registration),
        sheets::address::column_letter(columns.gpa),
        sheets::address::column_letter(columns.cgpa),
        sheets::address::column_letter(columns.retake)
    );
    info!(
        "📇 {} data rows, {} registrations indexed",
        snapshot.rows.len(),
        index.registration_count()
    );

    Ok(())
}
