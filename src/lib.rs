//! # mdbook2pdf
//!
//! A CLI utility to turn mdBook-style documentation websites into one HTML
//! file and a PDF with a table of contents and bookmarks.
//!
//! ## Pipeline
//!
//! - fetch the root page and read the chapter tree from its sidebar
//! - download every chapter, politely and one at a time
//! - strip site chrome and push content headings one level down
//! - concatenate everything behind a cover and a two-column contents page
//! - print the HTML with headless Chromium and add one bookmark per chapter
//!
//! A chapter that fails to download is left out; a PDF that fails to render
//! leaves the HTML file as the result.
//!
//! ## Usage
//!
//! ```bash
//! mdbook2pdf https://rustwiki.org/zh-CN/book/
//! mdbook2pdf https://doc.rust-lang.org/book/ -o ./rust_book --html-only
//! ```

pub mod assemble;
pub mod config;
mod downloader;
pub mod error;
pub mod extract;
pub mod fetcher;
pub mod navigation;
pub mod outline;
mod pdf;

pub use config::CrawlConfig;
pub use downloader::{Downloader, FailedChapter, PdfStatus, RunSummary, SUMMARY_FILE};
pub use error::{Error, Result};
pub use pdf::PdfConverter;
