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

//! Canonical form for course labels so sheet headers and scraped names compare
//! equal despite punctuation, case and whitespace drift.

/// Lower-cases `text` and drops every character that is not an ASCII letter or digit.
pub fn normalize(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Returns the first line of a header cell, trimmed.
///
/// Course headers carry the course code on a second line
/// (`"Data Structures\n(CSE-1205)"`), only the title takes part in matching.
pub fn first_line(header: &str) -> &str {
    header.lines().next().unwrap_or("").trim()
}
