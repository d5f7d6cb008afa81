use colored::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, error, info, warn};

use crate::assemble::{assemble_document, content_anchor_prefix, ChapterContent, ChapterStatus, OutlineEntry};
use crate::config::{sanitize_file_stem, CrawlConfig};
use crate::error::{Error, Result};
use crate::extract::ContentExtractor;
use crate::fetcher::PageFetcher;
use crate::navigation::{
    linked_pages, parse_navigation, parse_sidebar_entries, toc_frame_url, Navigation, NavigationEntry,
};
use crate::pdf::PdfConverter;

pub const SUMMARY_FILE: &str = "summary.json";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PdfStatus {
    Written { path: PathBuf, bytes: u64 },
    Failed { reason: String },
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedChapter {
    pub title: String,
    pub url: String,
    pub reason: String,
}

/// Outcome of one run, also written to `summary.json`.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub book_title: String,
    pub source_url: String,
    pub html_path: PathBuf,
    pub pdf: PdfStatus,
    pub chapters_total: usize,
    pub chapters_succeeded: usize,
    pub chapters_failed: Vec<FailedChapter>,
}

impl RunSummary {
    pub fn pdf_written(&self) -> bool {
        matches!(self.pdf, PdfStatus::Written { .. })
    }

    fn log(&self) {
        info!(
            "Chapters: {} of {} downloaded, {} failed",
            self.chapters_succeeded.to_string().green(),
            self.chapters_total,
            self.chapters_failed.len().to_string().red()
        );
        for failed in &self.chapters_failed {
            warn!("  \"{}\" ({}): {}", failed.title, failed.url, failed.reason);
        }

        info!("HTML: {}", self.html_path.display().to_string().blue());
        match &self.pdf {
            PdfStatus::Written { path, bytes } => {
                info!(
                    "PDF: {} ({:.1} MB)",
                    path.display().to_string().blue(),
                    *bytes as f64 / (1024.0 * 1024.0)
                );
            }
            PdfStatus::Failed { reason } => {
                warn!("PDF was not generated: {}", reason);
                warn!(
                    "Open {} in a browser and print it to PDF instead",
                    self.html_path.display().to_string().blue()
                );
            }
            PdfStatus::Skipped => info!("PDF conversion skipped (HTML only)"),
        }
    }
}

/// One crawl of one book. Owns the configuration and everything the stages
/// produce along the way.
pub struct Downloader {
    config: CrawlConfig,
    fetcher: PageFetcher,
    extractor: ContentExtractor,
    navigation: Option<Navigation>,
    chapters: Vec<ChapterContent>,
}

impl Downloader {
    pub fn new(config: CrawlConfig) -> Result<Self> {
        let fetcher = PageFetcher::new(&config.fetch)?;
        let extractor = ContentExtractor::new(&config.selectors, config.keep_page_title);

        Ok(Self {
            config,
            fetcher,
            extractor,
            navigation: None,
            chapters: Vec::new(),
        })
    }

    pub fn navigation(&self) -> Option<&Navigation> {
        self.navigation.as_ref()
    }

    pub fn chapters(&self) -> &[ChapterContent] {
        &self.chapters
    }

    /// Runs the whole pipeline. Only a failed root page or a failed HTML
    /// write is an error; chapter and PDF failures end up in the summary.
    pub async fn run(&mut self) -> Result<RunSummary> {
        debug!("Configuration: {:?}", self.config);
        info!("Visiting \"{}\"", self.config.base_url.as_str().green());

        let root_html = self.fetch_root().await?;

        let navigation = self.discover_navigation(&root_html).await;
        info!(
            "Found {} pages in \"{}\"",
            navigation.chapters().len(),
            navigation.title.green()
        );

        let chapters = self.fetch_chapters(&navigation, &root_html).await;
        let assembled = assemble_document(&navigation, &chapters, &self.config.base_url);
        let html_path = self.write_html(&navigation.title, &assembled.html).await?;

        let pdf = if self.config.html_only {
            PdfStatus::Skipped
        } else {
            self.convert_pdf(&html_path, &navigation.title, &assembled.outline).await
        };

        let chapters_failed: Vec<FailedChapter> = chapters
            .iter()
            .filter_map(|c| match &c.status {
                ChapterStatus::Failed { reason } => Some(FailedChapter {
                    title: c.title.clone(),
                    url: c.url.to_string(),
                    reason: reason.clone(),
                }),
                ChapterStatus::Fetched { .. } => None,
            })
            .collect();

        let summary = RunSummary {
            book_title: navigation.title.clone(),
            source_url: self.config.base_url.to_string(),
            html_path,
            pdf,
            chapters_total: chapters.len(),
            chapters_succeeded: chapters.len() - chapters_failed.len(),
            chapters_failed,
        };

        self.navigation = Some(navigation);
        self.chapters = chapters;

        summary.log();
        self.write_summary(&summary).await;

        Ok(summary)
    }

    async fn fetch_root(&mut self) -> Result<String> {
        let url = self.config.base_url.clone();
        self.fetcher.fetch(&url).await.map_err(|e| Error::RootFetch {
            url: url.to_string(),
            source: Box::new(e),
        })
    }

    /// Sidebar first, then the static `toc.html` of script-rendered
    /// sidebars, then every linked page, then the root page alone.
    async fn discover_navigation(&mut self, root_html: &str) -> Navigation {
        let base_url = self.config.base_url.clone();
        let selectors = &self.config.selectors;
        let mut navigation = parse_navigation(root_html, &base_url, selectors);

        if navigation.is_empty() {
            if let Some(toc_url) = toc_frame_url(root_html, &base_url) {
                info!("Sidebar is built by script, reading \"{}\"", toc_url.as_str().green());
                match self.fetcher.fetch(&toc_url).await {
                    Ok(toc_html) => {
                        navigation.entries = parse_sidebar_entries(&toc_html, &toc_url, &self.config.selectors);
                    }
                    Err(e) => warn!("Failed to fetch sidebar page {}: {}", toc_url, e),
                }
            }
        }

        if navigation.is_empty() {
            navigation.entries = linked_pages(root_html, &base_url);
            if !navigation.is_empty() {
                warn!(
                    "No sidebar found, using {} linked pages in page order",
                    navigation.entries.len()
                );
            }
        }

        if navigation.is_empty() {
            warn!("No chapters found, the book will only contain the root page");
            navigation.entries = vec![NavigationEntry::new(navigation.title.clone(), Some(base_url), 0)];
        }

        navigation
    }

    async fn fetch_chapters(&mut self, navigation: &Navigation, root_html: &str) -> Vec<ChapterContent> {
        let pages = navigation.chapters();
        let total = pages.len();
        let mut chapters = Vec::with_capacity(total);

        for (index, page) in pages.into_iter().enumerate() {
            info!("[{}/{}] {}", index + 1, total, page.title);

            let html = if page.url == self.config.base_url {
                Ok(root_html.to_string())
            } else {
                self.fetcher.fetch(&page.url).await.map_err(|e| Error::ChapterFetch {
                    url: page.url.to_string(),
                    source: Box::new(e),
                })
            };

            let status = match html.and_then(|html| {
                self.extractor
                    .extract(&html, &page.url, &content_anchor_prefix(page.position))
            }) {
                Ok(fragment) => ChapterStatus::Fetched { fragment },
                Err(e) => {
                    warn!("Skipping \"{}\": {}", page.title, e);
                    ChapterStatus::Failed {
                        reason: e.to_string(),
                    }
                }
            };

            chapters.push(ChapterContent {
                position: page.position,
                title: page.title,
                url: page.url,
                status,
            });
        }

        chapters
    }

    async fn write_html(&self, title: &str, html: &str) -> Result<PathBuf> {
        let out_dir = &self.config.output_dir;
        fs::create_dir_all(out_dir)
            .await
            .map_err(|e| Error::io(out_dir, e))?;

        let html_path = out_dir.join(format!("{}.html", sanitize_file_stem(title)));
        fs::write(&html_path, html)
            .await
            .map_err(|e| Error::io(&html_path, e))?;

        info!("HTML file saved: {}", html_path.display().to_string().blue());
        Ok(html_path)
    }

    async fn convert_pdf(&self, html_path: &Path, title: &str, outline: &[OutlineEntry]) -> PdfStatus {
        let pdf_path = self
            .config
            .output_dir
            .join(format!("{}.pdf", sanitize_file_stem(title)));

        match PdfConverter::new(&self.config.pdf)
            .convert(html_path, &pdf_path, outline)
            .await
        {
            Ok(bytes) => PdfStatus::Written { path: pdf_path, bytes },
            Err(e) => {
                error!("{}", format!("PDF generation failed: {}", e).red());
                PdfStatus::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn write_summary(&self, summary: &RunSummary) {
        let path = self.config.output_dir.join(SUMMARY_FILE);
        let json = match serde_json::to_string_pretty(summary) {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to serialize run summary: {}", e);
                return;
            }
        };
        if let Err(e) = fs::write(&path, json).await {
            warn!("Failed to write {}: {}", path.display(), e);
        }
    }
}
