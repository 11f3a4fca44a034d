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

use anyhow::Result;

/// What a single registration lookup produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    /// Fully rendered result page.
    Page(String),
    /// The site answered but showed no result for this registration.
    NoResult,
    /// Nothing rendered within the wait window.
    TimedOut,
}

/// Fetches rendered result pages, one registration at a time.
#[allow(async_fn_in_trait)]
pub trait ResultSource {
    async fn fetch_result_page(&mut self, registration: &str) -> Result<LookupOutcome>;

    /// Releases whatever the source holds (browser process, sessions).
    fn close(&mut self) {}
}
