// SPDX-License-Identifier: MPL-2.0
//! # wikiwatcher
//!
//! Read-only reporting over the revision histories of Wikimedia pages and users.
//!
//! ## Overview
//!
//! `wikiwatcher` fetches the revision history of an article or the contributions of a user from the MediaWiki Action API, narrows it down by date window, change tags and keyword, and answers with JSON, chart data or a highlighted diff between revisions.
//!
//! **Key Features:**
//!
//! - **Filtered Histories**: Article and user histories restricted to a date window, a set of change tags and a keyword occurring in the changes of a revision.
//! - **Highlighted Diffs**: Comparisons between revisions with inserted and deleted spans marked for display, falling back to the rendered content when the API can't compare.
//! - **Chart Data**: Edits over time and edits per user or article, ready to hand to a plotting front end.
//! - **Pluggable Source**: Everything remote goes through the `RevisionSource` trait, the bundled `MediaWikiClient` talks to any `api.php` endpoint.
//!
//! ## Getting Started
//!
//! ### Fetching a History
//!
//! ```rust,no_run
//! use wikiwatcher::api::{ClientConfig, MediaWikiClient};
//! use wikiwatcher::history::ArticleHistory;
//! use wikiwatcher::query::{DateParts, QuerySpec};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = MediaWikiClient::new(ClientConfig::from_env())?;
//!
//!     // all of December 2022
//!     let december = DateParts { year: Some(2022), month: Some(12), ..DateParts::default() };
//!     let spec = QuerySpec::new(&december, &december)?.with_tags(["mobile edit"]);
//!
//!     let history = ArticleHistory::fetch(&client, "Techno", spec, client.config().max_pages)?;
//!     for revision in history.revisions() {
//!         println!("{:?} by {:?}", revision.revision_id, revision.user);
//!     }
//!     println!("{}", history.revisions_as_json()?);
//!
//!     Ok(())
//! }
//! ```
//!
//! ### Comparing Revisions
//!
//! ```rust,no_run
//! use wikiwatcher::api::{ClientConfig, MediaWikiClient};
//! use wikiwatcher::history::UserHistory;
//! use wikiwatcher::query::QuerySpec;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = MediaWikiClient::new(ClientConfig::default())?;
//!     let history = UserHistory::fetch(&client, "Jimbo Wales", QuerySpec::default().with_keyword("wiki"), 1)?;
//!
//!     if let Some(revision) = history.revisions().first() {
//!         // what this edit changed, compared to its parent
//!         let diff = revision.fetch_diff(&client, None)?;
//!         println!("{diff}");
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ### Serving Requests
//!
//! The `service` module answers request targets of the original web API (`/articleHistory/<title>`, `/userHistory/<username>`, `/getRevision/<title>` and `/compareRevisions/<title>`) and caches successful responses:
//!
//! ```rust,no_run
//! use wikiwatcher::api::{ClientConfig, MediaWikiClient};
//! use wikiwatcher::cache::CacheConfig;
//! use wikiwatcher::service::Service;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = MediaWikiClient::new(ClientConfig::default())?;
//!     let mut service = Service::new(client, CacheConfig::default(), 10);
//!
//!     let response = service.handle("/articleHistory/Cat?tags=[bot]&startyear=2022&visualize=edits_per_time");
//!     println!("{} {}", response.status, response.body);
//!
//!     Ok(())
//! }
//! ```
//!
//! The `wikiwatcher` binary does the same for the request targets given on the command line.
//!
//! ## Modules and API
//!
//! - **`api`**: The `RevisionSource` trait and the blocking `MediaWikiClient`, configured by `ClientConfig`.
//! - **`revision`**: A single revision's metadata, its rendered content and its highlighted diff.
//! - **`query`**: Date windows from partial dates and the `QuerySpec` describing a request.
//! - **`history`**: `ArticleHistory` and `UserHistory`, fetched page by page and filtered once on construction.
//! - **`filter`**: The tag, keyword and title filters.
//! - **`highlight`**: Styling of `<ins>`/`<del>` spans in comparison markup.
//! - **`chart`**: Histogram and pie chart data.
//! - **`cache`** and **`service`**: The response cache and the request router.
//!
//! ## Features and Configuration
//!
//! ### Environment
//!
//! `ClientConfig::from_env()` reads `WIKIWATCHER_API_URL`, `WIKIWATCHER_USER_AGENT`, `WIKIWATCHER_TIMEOUT_MS` and `WIKIWATCHER_MAX_PAGES`, falling back to the English Wikipedia, a 5 second timeout and 10 pages of 500 revisions.
//!
//! ### Logging and Error Handling
//!
//! - Uses the `tracing` crate for logging warnings and errors. The binary logs to stderr, filtered by `WIKIWATCHER_LOG` and formatted as selected by `WIKIWATCHER_LOG_FORMAT` (`compact` or `json`).
//! - Revisions the API returns without tag information are excluded from tag filtering with a warning. Enable the `strict` feature to fail the request instead.
//!
//! **Example**:
//!
//! ```toml
//! [dependencies]
//! wikiwatcher = { version = "0.1.0", features = ["strict"] }
//! ```
//!
//! ## Limitations
//!
//! - **Read-only**: Nothing is ever written to the wiki, there is no authentication.
//! - **Keyword Search Cost**: Every candidate revision costs one `action=compare` request. Narrow the history by date and tags first.
//! - **History Size**: Histories are cut off after the configured number of pages, a warning is logged when that happens.
//!
//! ## Dependencies
//!
//! - **`compact_str`**: Used in the public API for efficient handling of short strings (e.g., page titles, user names).

pub mod api;
pub mod cache;
pub mod chart;
pub mod filter;
pub mod highlight;
pub mod history;
pub mod query;
pub mod revision;
pub mod service;
#[cfg(test)]
mod test_support;
