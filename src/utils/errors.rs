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

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("No result rendered for registration {0} before the wait window expired")]
    LookupTimeout(String),

    #[error("Required column header not found in row 1: '{0}'")]
    MissingColumn(String),

    #[error("Registration '{0}' is not present in the sheet")]
    NoMatch(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Google Sheets API error: {0}")]
    SheetsApi(String),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
