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

/// Compiles a CSS selector once and hands out a `&'static Selector`.
#[macro_export]
macro_rules! selector {
    ($e: expr) => {{
        use ::scraper::Selector;
        use ::std::sync::LazyLock;
        static SELECTOR: LazyLock<Selector> =
            LazyLock::new(|| Selector::parse($e).expect("hard-coded selector must parse"));
        &*SELECTOR
    }};
}

/// Compiles a regular expression once and hands out a `&'static Regex`.
#[macro_export]
macro_rules! regex {
    ($e: expr) => {{
        use ::regex::Regex;
        use ::std::sync::LazyLock;
        static PATTERN: LazyLock<Regex> =
            LazyLock::new(|| Regex::new($e).expect("hard-coded pattern must compile"));
        &*PATTERN
    }};
}
