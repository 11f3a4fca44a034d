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

//! Headless Chrome driver for the result lookup form.
//!
//! The form's session and exam dropdowns are filled by the page's own script
//! after the previous selection changes, so the lookup has to run in a real
//! browser rather than as a plain form post.

use crate::browser::source::{LookupOutcome, ResultSource};
use crate::config::LookupConfig;
use crate::utils::errors::SyncError;
use anyhow::{Context, Result};
use headless_chrome::{Browser, LaunchOptionsBuilder, Tab};
use scraper::Html;
use std::sync::Arc;
use std::thread::sleep;
use std::time::Duration;
use tracing::{debug, info};

const PROGRAM_SELECT: &str = "pro_id";
const SESSION_SELECT: &str = "sess_id";
const EXAM_SELECT: &str = "exam_id";
const REGISTRATION_INPUT: &str = "#reg_no";
const SUBMIT_BUTTON: &str = "//button[text()='Submit']";
const RESULT_HEADING: &str = "//h3[contains(text(), 'Result')]";

/// How long the browser may sit idle between lookups before it is torn down.
const IDLE_BROWSER_TIMEOUT: Duration = Duration::from_secs(600);

pub struct BrowserDriver {
    lookup: LookupConfig,
    browser: Option<Browser>,
    tab: Option<Arc<Tab>>,
}

impl BrowserDriver {
    /// Starts a browser and opens the tab used for every lookup.
    ///
    /// # Errors
    ///
    /// [`SyncError::Browser`] when Chrome cannot be found or started.
    pub fn launch(lookup: &LookupConfig) -> Result<Self> {
        info!(
            "🌐 Starting {} Chrome for {}",
            if lookup.headless { "headless" } else { "visible" },
            lookup.url
        );

        let options = LaunchOptionsBuilder::default()
            .headless(lookup.headless)
            .sandbox(false)
            .idle_browser_timeout(IDLE_BROWSER_TIMEOUT)
            .build()
            .map_err(|err| SyncError::Browser(format!("Invalid launch options: {}", err)))?;

        let browser = Browser::new(options)
            .map_err(|err| SyncError::Browser(format!("Failed to start Chrome: {}", err)))?;
        let tab = browser
            .new_tab()
            .map_err(|err| SyncError::Browser(format!("Failed to open a tab: {}", err)))?;
        tab.set_default_timeout(Duration::from_secs(lookup.wait_timeout_secs));

        Ok(Self {
            lookup: lookup.clone(),
            browser: Some(browser),
            tab: Some(tab),
        })
    }

    fn fetch_blocking(&self, tab: &Tab, registration: &str) -> Result<LookupOutcome> {
        let timeout = Duration::from_secs(self.lookup.wait_timeout_secs);

        tab.navigate_to(&self.lookup.url)
            .and_then(|tab| tab.wait_until_navigated())
            .with_context(|| format!("Failed to open {}", self.lookup.url))?;

        let program =
            tab.wait_for_element_with_custom_timeout(&format!("#{PROGRAM_SELECT}"), timeout);
        if waited(program, "program selector", registration).is_none() {
            return Ok(LookupOutcome::TimedOut);
        }
        select_option(tab, PROGRAM_SELECT, &self.lookup.program)?;

        let session =
            tab.wait_for_element_with_custom_timeout(&format!("#{SESSION_SELECT}"), timeout);
        if waited(session, "session selector", registration).is_none() {
            return Ok(LookupOutcome::TimedOut);
        }
        select_option(tab, SESSION_SELECT, &self.lookup.session)?;

        // Exam options are loaded after the session changes
        let exam_option = format!(
            "//select[@id='{EXAM_SELECT}']/option[text()={}]",
            xpath_literal(&self.lookup.exam)
        );
        let exam = tab.wait_for_xpath_with_custom_timeout(&exam_option, timeout);
        if waited(exam, "exam option", registration).is_none() {
            return Ok(LookupOutcome::TimedOut);
        }
        select_option(tab, EXAM_SELECT, &self.lookup.exam)?;

        let input = tab.wait_for_element(REGISTRATION_INPUT);
        let Some(input) = waited(input, "registration input", registration) else {
            return Ok(LookupOutcome::TimedOut);
        };
        input
            .click()
            .and_then(|input| input.type_into(registration))
            .context("Failed to enter the registration number")?;

        let submit = tab.wait_for_xpath(SUBMIT_BUTTON);
        let Some(submit) = waited(submit, "submit button", registration) else {
            return Ok(LookupOutcome::TimedOut);
        };
        submit.click().context("Failed to submit the lookup form")?;

        let heading = tab.wait_for_xpath_with_custom_timeout(RESULT_HEADING, timeout);
        if waited(heading, "result heading", registration).is_none() {
            return Ok(LookupOutcome::TimedOut);
        }
        sleep(Duration::from_millis(self.lookup.settle_millis));

        let content = tab.get_content().context("Failed to read the rendered page")?;
        Ok(classify_page(content))
    }
}

impl ResultSource for BrowserDriver {
    async fn fetch_result_page(&mut self, registration: &str) -> Result<LookupOutcome> {
        let tab = self
            .tab
            .clone()
            .ok_or_else(|| SyncError::Browser("Browser has already been closed".to_string()))?;

        tokio::task::block_in_place(|| self.fetch_blocking(&tab, registration))
    }

    fn close(&mut self) {
        self.tab = None;
        if self.browser.take().is_some() {
            info!("🧹 Browser closed");
        }
    }
}

impl Drop for BrowserDriver {
    fn drop(&mut self) {
        self.close();
    }
}

/// Any failed wait means the page never reached the expected state in time.
fn waited<T>(result: Result<T>, what: &str, registration: &str) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            debug!("⏱️  No {} for {}: {}", what, registration, err);
            None
        }
    }
}

/// A page without the result container is the site's "no result" answer.
fn classify_page(content: String) -> LookupOutcome {
    let has_result = Html::parse_document(&content)
        .select(selector!("div#exam_result"))
        .next()
        .is_some();

    if has_result {
        LookupOutcome::Page(content)
    } else {
        LookupOutcome::NoResult
    }
}

/// Selects the option of `<select id=select_id>` whose visible text is `label`
/// and fires `change` so the page loads dependent dropdowns.
fn select_option(tab: &Tab, select_id: &str, label: &str) -> Result<()> {
    let script = select_option_script(select_id, label);
    let selected = tab
        .evaluate(&script, false)
        .with_context(|| format!("Failed to run option selection on #{}", select_id))?
        .value
        .and_then(|value| value.as_bool())
        .unwrap_or(false);

    if !selected {
        return Err(SyncError::Browser(format!(
            "Option '{}' not found in #{}",
            label, select_id
        ))
        .into());
    }
    Ok(())
}

fn select_option_script(select_id: &str, label: &str) -> String {
    // JSON string literals are valid JavaScript string literals
    let id = serde_json::Value::String(select_id.to_string());
    let label = serde_json::Value::String(label.to_string());
    format!(
        "(function() {{\
            const select = document.getElementById({id});\
            if (!select) return false;\
            const option = Array.from(select.options).find(o => o.text.trim() === {label});\
            if (!option) return false;\
            select.value = option.value;\
            select.dispatchEvent(new Event('change', {{ bubbles: true }}));\
            return true;\
        }})()"
    )
}

/// Quotes text for use inside an XPath expression.
fn xpath_literal(text: &str) -> String {
    if !text.contains('\'') {
        format!("'{}'", text)
    } else if !text.contains('"') {
        format!("\"{}\"", text)
    } else {
        let parts: Vec<String> = text.split('\'').map(|part| format!("'{}'", part)).collect();
        format!("concat({})", parts.join(", \"'\", "))
    }
}
