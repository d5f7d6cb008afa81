use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;
use chromiumoxide::{Browser, BrowserConfig};
use colored::*;
use futures_util::StreamExt;
use std::path::Path;
use tokio::fs;
use tracing::{debug, error, info};
use url::Url;

use crate::assemble::OutlineEntry;
use crate::config::PdfConfig;
use crate::error::{Error, Result};
use crate::outline;

/// Prints the assembled HTML file to PDF with headless Chromium.
///
/// Chromium's own outline generation stays off; bookmarks are added
/// afterwards by [`outline::apply_outline`] from the chapter headings only.
pub struct PdfConverter {
    config: PdfConfig,
}

impl PdfConverter {
    pub fn new(config: &PdfConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Renders `html_path` into `pdf_path` and returns the PDF size in bytes.
    ///
    /// Nothing is written to `pdf_path` unless rendering succeeded.
    pub async fn convert(&self, html_path: &Path, pdf_path: &Path, outline: &[OutlineEntry]) -> Result<u64> {
        let html_url = file_url(html_path).await?;
        info!("Rendering \"{}\" with headless Chromium", html_url.to_string().green());

        let mut builder = BrowserConfig::builder().request_timeout(self.config.timeout);
        if let Some(path) = &self.config.chrome_executable {
            builder = builder.chrome_executable(path);
        }
        if !self.config.sandbox {
            builder = builder.no_sandbox();
        }
        let config = builder
            .build()
            .map_err(|e| Error::PdfConversion(format!("failed to create browser config: {e}")))?;

        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| Error::PdfConversion(format!("failed to launch browser: {e}")))?;

        let handle = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if let Err(err) = h {
                    let err_str = err.to_string();
                    if !err_str.contains("data did not match any variant")
                        && !err_str.contains("untagged enum Message")
                    {
                        error!("Browser handler error: {}", err);
                    } else {
                        debug!("Chrome protocol message ignored: {}", err);
                    }
                }
            }
        });

        let result = self.render(&browser, &html_url).await;

        browser.close().await.ok();
        handle.abort();

        let pdf = outline::apply_outline(&result?, outline)?;

        fs::write(pdf_path, &pdf)
            .await
            .map_err(|e| Error::PdfConversion(format!("failed to write PDF to {}: {}", pdf_path.display(), e)))?;

        Ok(pdf.len() as u64)
    }

    async fn render(&self, browser: &Browser, url: &Url) -> Result<Vec<u8>> {
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| Error::PdfConversion(format!("failed to create new page: {e}")))?;

        page.goto(url.as_str())
            .await
            .map_err(|e| Error::PdfConversion(format!("failed to open {url}: {e}")))?;

        page.wait_for_navigation()
            .await
            .map_err(|e| Error::PdfConversion(format!("failed to wait for navigation: {e}")))?;

        // images and web fonts come from the book site
        tokio::time::sleep(self.config.settle).await;

        let params = PrintToPdfParams {
            print_background: Some(true),
            prefer_css_page_size: Some(true),
            ..Default::default()
        };

        let data = page
            .pdf(params)
            .await
            .map_err(|e| Error::PdfConversion(format!("failed to print PDF: {e}")))?;
        debug!("Chromium produced {} bytes of PDF", data.len());

        Ok(data)
    }
}

async fn file_url(path: &Path) -> Result<Url> {
    let absolute = fs::canonicalize(path).await.map_err(|e| Error::io(path, e))?;
    Url::from_file_path(&absolute)
        .map_err(|_| Error::InvalidUrl(format!("cannot turn {} into a file URL", absolute.display())))
}
