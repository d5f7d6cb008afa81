use std::path::PathBuf;

/// Errors raised while turning a book website into HTML and PDF.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("failed to fetch root page {url}: {source}")]
    RootFetch {
        url: String,
        #[source]
        source: Box<Error>,
    },

    #[error("failed to fetch chapter page {url}: {source}")]
    ChapterFetch {
        url: String,
        #[source]
        source: Box<Error>,
    },

    #[error("no content extracted from {url}: {reason}")]
    ContentExtraction { url: String, reason: String },

    #[error("PDF conversion failed: {0}")]
    PdfConversion(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Whether the run has to stop when this error shows up.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::RootFetch { .. } | Error::InvalidUrl(_) | Error::Io { .. }
        )
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
