use anyhow::Result;
use clap::Parser;
use colored::*;
use mdbook2pdf::config::{DEFAULT_DELAY_SECS, DEFAULT_TIMEOUT_SECS};
use mdbook2pdf::{CrawlConfig, Downloader};
use std::path::PathBuf;
use std::process;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "mdbook2pdf")]
#[command(about = "Crawl an mdBook-style documentation website into a single HTML file and PDF")]
#[command(version)]
#[command(after_help = "Examples:\n  mdbook2pdf https://rustwiki.org/zh-CN/book/\n  \
    mdbook2pdf https://colobu.com/rust100/ --html-only\n  \
    mdbook2pdf https://doc.rust-lang.org/book/ -o ./rust_book")]
struct Args {
    /// URL of the book's root page
    url: String,

    /// Output directory (default: derived from the URL path)
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Seconds to wait between two requests
    #[arg(short = 'd', long = "delay", default_value_t = DEFAULT_DELAY_SECS, value_parser = parse_seconds)]
    delay: f64,

    /// Request timeout in seconds
    #[arg(short = 't', long = "timeout", default_value_t = DEFAULT_TIMEOUT_SECS, value_parser = parse_seconds)]
    timeout: f64,

    /// Only write the HTML file, skip PDF conversion
    #[arg(long = "html-only")]
    html_only: bool,

    /// CSS selector of the chapter content container (repeatable, tried in order)
    #[arg(long = "content-selector", value_name = "CSS")]
    content_selectors: Vec<String>,

    /// CSS selector of the sidebar navigation (repeatable, tried in order)
    #[arg(long = "sidebar-selector", value_name = "CSS")]
    sidebar_selectors: Vec<String>,

    /// Keep each page's own first h1 instead of replacing it with the chapter title
    #[arg(long = "keep-page-title")]
    keep_page_title: bool,

    /// Chrome/Chromium executable used for PDF rendering
    #[arg(long = "chrome", value_name = "PATH")]
    chrome: Option<PathBuf>,

    /// Start Chromium without its sandbox (needed when running as root)
    #[arg(long = "no-sandbox")]
    no_sandbox: bool,
}

fn parse_seconds(s: &str) -> Result<f64, String> {
    let value = s.parse::<f64>().map_err(|_| "Not a number.")?;
    if !value.is_finite() || value < 0.0 {
        return Err("Must be zero or positive number.".to_string());
    }
    Duration::try_from_secs_f64(value).map_err(|_| "Too large.".to_string())?;
    Ok(value)
}

impl Args {
    fn into_config(self) -> mdbook2pdf::Result<CrawlConfig> {
        let mut config = CrawlConfig::new(&self.url)?;

        if let Some(output) = self.output {
            config.output_dir = output;
        }
        config.html_only = self.html_only;
        config.keep_page_title = self.keep_page_title;
        config.fetch.delay = Duration::from_secs_f64(self.delay);
        config.fetch.timeout = Duration::from_secs_f64(self.timeout);
        if !self.content_selectors.is_empty() {
            config.selectors.content = self.content_selectors;
        }
        if !self.sidebar_selectors.is_empty() {
            config.selectors.sidebar = self.sidebar_selectors;
        }
        config.pdf.chrome_executable = self.chrome;
        config.pdf.sandbox = !self.no_sandbox;

        Ok(config)
    }
}

async fn run(args: Args) -> Result<()> {
    let config = args.into_config()?;
    let mut downloader = Downloader::new(config)?;
    let summary = downloader.run().await?;

    if summary.pdf_written() {
        info!("{}", "Done!".green());
    } else {
        info!("{}", "HTML done.".green());
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    // Set up logging with chromiumoxide errors suppressed
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("mdbook2pdf=info"))
        .add_directive("chromiumoxide::conn=off".parse().unwrap())
        .add_directive("chromiumoxide::handler=off".parse().unwrap());

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let args = Args::parse();

    if let Err(e) = run(args).await {
        error!("{}", format!("Error: {}", e).red());
        process::exit(1);
    }
}
