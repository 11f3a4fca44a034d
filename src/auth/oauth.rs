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

//! Service-account authentication for the Google Sheets API.
//!
//! The sync runs unattended, so it authenticates with a service-account key
//! instead of an interactive browser flow. This module locates the key file,
//! validates it and builds the authenticator handed to the Sheets hub.

use crate::utils::errors::SyncError;
use anyhow::{Context, Result};
use google_sheets4::{
    hyper_rustls,
    yup_oauth2::{self, ServiceAccountAuthenticator, ServiceAccountKey},
};
use hyper_util::client::legacy::connect::HttpConnector;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Scopes required for reading and writing spreadsheet values.
const SCOPES: &[&str] = &["https://www.googleapis.com/auth/spreadsheets"];

/// Hidden folder searched for credentials, both locally and in the home directory.
const CONFIG_DIR_NAME: &str = ".result-sheet-sync";
const CREDENTIALS_FILE_NAME: &str = "credentials.json";

pub type SheetsAuthenticator =
    yup_oauth2::authenticator::Authenticator<hyper_rustls::HttpsConnector<HttpConnector>>;

/// Locates service-account credentials and builds authenticators from them.
pub struct CredentialsManager {
    /// Explicit key path from the command line or config file
    credentials_path: Option<PathBuf>,
}

impl CredentialsManager {
    /// Creates a new credentials manager.
    ///
    /// # Arguments
    ///
    /// * `credentials_path` - Optional explicit path to the service-account key file
    pub fn new(credentials_path: Option<PathBuf>) -> Self {
        Self { credentials_path }
    }

    /// Candidate key locations, in search order.
    ///
    /// 1. `./credentials.json`
    /// 2. `./.result-sheet-sync/credentials.json`
    /// 3. `~/.result-sheet-sync/credentials.json` (when a home directory is known)
    pub fn search_candidates(home_dir: Option<&Path>) -> Vec<PathBuf> {
        let mut candidates = vec![
            PathBuf::from(CREDENTIALS_FILE_NAME),
            PathBuf::from(".").join(CONFIG_DIR_NAME).join(CREDENTIALS_FILE_NAME),
        ];
        if let Some(home) = home_dir {
            candidates.push(home.join(CONFIG_DIR_NAME).join(CREDENTIALS_FILE_NAME));
        }
        candidates
    }

    /// Resolves a usable credentials path.
    ///
    /// An explicit path is validated and used as is; otherwise the search
    /// candidates are tried in order.
    ///
    /// # Errors
    ///
    /// [`SyncError::Auth`] with remediation tips when no valid key is found.
    pub fn resolve_credentials_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.credentials_path {
            Self::validate_credentials_file(path)?;
            info!("🔐 Using service-account credentials at: {}", path.display());
            return Ok(path.clone());
        }

        let home_dir = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .ok()
            .map(PathBuf::from);

        let candidates = Self::search_candidates(home_dir.as_deref());
        match Self::first_valid(&candidates) {
            Some(path) => {
                info!("🔐 Using service-account credentials at: {}", path.display());
                Ok(path)
            }
            None => Err(SyncError::Auth(format!(
                "❌ No service-account credentials found.\n\n\
                Create a service account in Google Cloud, share the spreadsheet with its\n\
                e-mail address and place the downloaded JSON key in one of these locations:\n\
                • ./{CREDENTIALS_FILE_NAME}\n\
                • ./{CONFIG_DIR_NAME}/{CREDENTIALS_FILE_NAME}\n\
                • ~/{CONFIG_DIR_NAME}/{CREDENTIALS_FILE_NAME}\n\
                or pass --credentials /path/to/key.json"
            ))
            .into()),
        }
    }

    /// Returns the first candidate that passes validation, warning about invalid ones.
    fn first_valid(candidates: &[PathBuf]) -> Option<PathBuf> {
        for candidate in candidates {
            if !candidate.exists() {
                debug!("🔍 No credentials at {}", candidate.display());
                continue;
            }

            match Self::validate_credentials_file(candidate) {
                Ok(()) => return Some(candidate.clone()),
                Err(err) => warn!(
                    "⚠️  Credentials file {} is invalid: {}",
                    candidate.display(),
                    err
                ),
            }
        }
        None
    }

    fn validate_credentials_file(path: &Path) -> Result<()> {
        if !path.exists() {
            return Err(SyncError::Auth(format!(
                "Credentials file not found at specified path: {:?}",
                path
            ))
            .into());
        }

        if !path.is_file() {
            return Err(SyncError::Auth(format!("Credentials path is not a file: {:?}", path)).into());
        }

        let metadata = fs::metadata(path)
            .with_context(|| format!("Failed to read credentials metadata: {:?}", path))?;

        if metadata.len() == 0 {
            return Err(SyncError::Auth(format!("Credentials file is empty: {:?}", path)).into());
        }

        Ok(())
    }

    /// Reads the service-account key from the resolved credentials file.
    ///
    /// # Errors
    ///
    /// * If no credentials file can be resolved
    /// * If the file is not a service-account key
    pub async fn load_service_account_key(&self) -> Result<ServiceAccountKey> {
        let path = self.resolve_credentials_path()?;

        yup_oauth2::read_service_account_key(&path)
            .await
            .map_err(|err| {
                SyncError::Auth(format!(
                    "Failed to parse service-account key from {:?}: {}. \
                    Ensure the file is the JSON key downloaded for a service account.",
                    path, err
                ))
                .into()
            })
    }

    /// Builds an authenticator and proves it works by fetching a token.
    ///
    /// Fetching eagerly turns bad keys and revoked accounts into a setup
    /// failure instead of an error on the first write.
    pub async fn build_authenticator(&self) -> Result<SheetsAuthenticator> {
        let key = self.load_service_account_key().await?;
        debug!("🔍 Building authenticator for {}", key.client_email);

        let auth = ServiceAccountAuthenticator::builder(key)
            .build()
            .await
            .map_err(|err| SyncError::Auth(format!("Failed to build authenticator: {}", err)))?;

        match auth.token(SCOPES).await {
            Ok(_) => debug!("🔍 Obtained access token for scopes: {:?}", SCOPES),
            Err(err) => {
                return Err(SyncError::Auth(format!(
                    "Service account could not obtain an access token: {}\n\
                    Check that the key is current and the Sheets API is enabled for its project.",
                    err
                ))
                .into());
            }
        }

        Ok(auth)
    }
}
