use serde::Serialize;
use slug::slugify;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use crate::error::{Error, Result};

pub const DEFAULT_DELAY_SECS: f64 = 0.3;
pub const DEFAULT_TIMEOUT_SECS: f64 = 30.0;
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Where the sidebar usually lives, most specific first.
pub const SIDEBAR_SELECTORS: &[&str] = &[
    "nav.sidebar",
    "div.sidebar",
    "#sidebar",
    "nav.nav-chapters",
    "ol.chapter",
    "ul.chapter",
];

/// Where the chapter body usually lives, most specific first.
pub const CONTENT_SELECTORS: &[&str] = &[
    "main",
    "div.content",
    "#content",
    "article",
    "div.page-wrapper",
];

#[derive(Debug, Clone, Serialize)]
pub struct FetchConfig {
    pub delay: Duration,
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs_f64(DEFAULT_DELAY_SECS),
            timeout: Duration::from_secs_f64(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// CSS selectors tried in order when looking for the sidebar and the content.
#[derive(Debug, Clone, Serialize)]
pub struct Selectors {
    pub sidebar: Vec<String>,
    pub content: Vec<String>,
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            sidebar: SIDEBAR_SELECTORS.iter().map(|s| s.to_string()).collect(),
            content: CONTENT_SELECTORS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PdfConfig {
    /// Browser binary; chromiumoxide looks one up when unset.
    pub chrome_executable: Option<PathBuf>,
    /// Time given to the page to load images and fonts before printing.
    pub settle: Duration,
    /// Timeout of a single DevTools request, printing included.
    pub timeout: Duration,
    /// Chromium refuses to start sandboxed as root, e.g. in containers.
    pub sandbox: bool,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            chrome_executable: None,
            settle: Duration::from_millis(1500),
            timeout: Duration::from_secs(120),
            sandbox: true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CrawlConfig {
    pub base_url: Url,
    pub output_dir: PathBuf,
    pub html_only: bool,
    pub keep_page_title: bool,
    pub fetch: FetchConfig,
    pub selectors: Selectors,
    pub pdf: PdfConfig,
}

impl CrawlConfig {
    /// Configuration with every default applied for the book at `url`.
    pub fn new(url: &str) -> Result<Self> {
        let base_url = normalize_base_url(url)?;
        let output_dir = default_output_dir(&base_url);

        Ok(Self {
            base_url,
            output_dir,
            html_only: false,
            keep_page_title: false,
            fetch: FetchConfig::default(),
            selectors: Selectors::default(),
            pdf: PdfConfig::default(),
        })
    }
}

/// Parses the book URL and makes sure relative links resolve under it.
///
/// A URL naming a directory gets a trailing slash; a URL naming a page
/// (`.../book/index.html`) is kept as is.
pub fn normalize_base_url(url: &str) -> Result<Url> {
    let mut parsed = Url::parse(url.trim()).map_err(|e| Error::InvalidUrl(format!("{url}: {e}")))?;

    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(Error::InvalidUrl(format!("{url}: must be http or https")));
    }
    if parsed.host_str().is_none() {
        return Err(Error::InvalidUrl(format!("{url}: missing host")));
    }

    parsed.set_fragment(None);

    let path = parsed.path().to_string();
    let last = path.rsplit('/').next().unwrap_or("");
    if !path.ends_with('/') && !last.contains('.') {
        parsed.set_path(&format!("{path}/"));
    }

    Ok(parsed)
}

/// `./<last path segment>_pdf`, or `./<host>_pdf` for a site served at `/`.
pub fn default_output_dir(base_url: &Url) -> PathBuf {
    let name = base_url
        .path_segments()
        .and_then(|segments| {
            segments
                .filter(|s| !s.is_empty() && !s.contains('.'))
                .last()
                .map(slugify)
        })
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| base_url.host_str().unwrap_or("book").replace('.', "_"));

    PathBuf::from(".").join(format!("{name}_pdf"))
}

/// Turns a book title into a file stem by replacing characters that are not
/// allowed in file names.
pub fn sanitize_file_stem(title: &str) -> String {
    let sanitized: String = title
        .trim()
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if sanitized.trim_matches(|c| c == '_' || c == '.').is_empty() {
        "book".to_string()
    } else {
        sanitized
    }
}
