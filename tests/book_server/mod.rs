//! A tiny mdBook look-alike served over HTTP for end-to-end tests.

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

pub struct BookServer {
    pub base_url: String,
    shutdown_tx: mpsc::Sender<()>,
    handle: Option<thread::JoinHandle<()>>,
}

impl BookServer {
    /// Root URL of the book with a static three-level sidebar.
    pub fn book_url(&self) -> String {
        format!("{}/book/", self.base_url)
    }

    /// Root URL of the book whose part page has nothing but its title.
    #[allow(dead_code)]
    pub fn parts_book_url(&self) -> String {
        format!("{}/parts-book/", self.base_url)
    }

    /// Root URL of the book whose sidebar only exists in `toc.html`.
    #[allow(dead_code)]
    pub fn script_book_url(&self) -> String {
        format!("{}/script-book/", self.base_url)
    }
}

impl Drop for BookServer {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

const SIDEBAR: &str = r#"<nav id="sidebar" class="sidebar" aria-label="Table of contents">
  <div class="sidebar-scrollbox">
    <ol class="chapter">
      <li class="chapter-item expanded affix "><a href="index.html">Introduction</a></li>
      <li class="chapter-item expanded affix "><li class="part-title">Part I</li>
      <li class="chapter-item expanded "><a href="part1/basics.html"><strong aria-hidden="true">1.</strong> Basics</a></li>
      <li><ol class="section">
        <li class="chapter-item expanded "><a href="part1/basics/install.html"><strong aria-hidden="true">1.1.</strong> Install</a></li>
        <li><ol class="section">
          <li class="chapter-item expanded "><a href="part1/basics/install/linux.html"><strong aria-hidden="true">1.1.1.</strong> Linux</a></li>
          <li class="chapter-item expanded "><a href="part1/basics/install/macos.html"><strong aria-hidden="true">1.1.2.</strong> macOS</a></li>
        </ol></li>
      </ol></li>
      <li class="chapter-item expanded "><a href="appendix.html"><strong aria-hidden="true">2.</strong> Appendix</a></li>
    </ol>
  </div>
</nav>"#;

const SCRIPT_SIDEBAR: &str = r#"<nav id="sidebar" class="sidebar" aria-label="Table of contents">
  <mdbook-sidebar-scrollbox class="sidebar-scrollbox"></mdbook-sidebar-scrollbox>
  <noscript><iframe class="sidebar-iframe-outer" src="toc.html"></iframe></noscript>
</nav>"#;

const SCRIPT_TOC: &str = r#"<!DOCTYPE html>
<html lang="en"><head><base target="_parent"></head>
<body class="sidebar-iframe-inner">
<ol class="chapter">
  <li class="chapter-item expanded "><a href="one.html"><strong aria-hidden="true">1.</strong> One</a></li>
  <li class="chapter-item expanded "><a href="two.html"><strong aria-hidden="true">2.</strong> Two</a></li>
</ol>
</body></html>"#;

const PARTS_SIDEBAR: &str = r#"<nav id="sidebar" class="sidebar" aria-label="Table of contents">
  <ol class="chapter">
    <li class="chapter-item expanded "><a href="part2.html"><strong aria-hidden="true">1.</strong> Part II: Advanced</a></li>
    <li><ol class="section">
      <li class="chapter-item expanded "><a href="part2/traits.html"><strong aria-hidden="true">1.1.</strong> Traits</a></li>
    </ol></li>
  </ol>
</nav>"#;

fn page(sidebar: &str, title: &str, body: &str) -> String {
    format!(
        r##"<!DOCTYPE html>
<html lang="en" class="light sidebar-visible">
<head>
  <meta charset="UTF-8">
  <title>{title} - The Example Book</title>
  <script src="toc.js"></script>
</head>
<body>
{sidebar}
<div id="page-wrapper" class="page-wrapper">
  <div class="page">
    <div id="menu-bar" class="menu-bar sticky">
      <div class="left-buttons"><button id="search-toggle" class="icon-button">search</button></div>
      <h1 class="menu-title">The Example Book</h1>
      <div class="right-buttons"><a href="print.html" title="Print this book"><i id="print-button" class="fa fa-print"></i></a></div>
    </div>
    <div id="search-wrapper" class="hidden"><form id="searchbar-outer"><input type="search" id="searchbar"></form></div>
    <div id="content" class="content">
      <main>
        <h1 id="top"><a class="header" href="#top">{title}</a></h1>
        {body}
      </main>
      <nav class="nav-wrapper" aria-label="Page navigation">
        <a rel="prev" href="index.html" class="mobile-nav-chapters previous">prev</a>
      </nav>
    </div>
  </div>
</div>
</body>
</html>"##
    )
}

fn route(path: &str) -> (u16, String) {
    match path {
        "/book/" | "/book/index.html" => (
            200,
            page(SIDEBAR, "Introduction", "<p>Welcome to the example book.</p>"),
        ),
        "/book/part1/basics.html" => (
            200,
            page(
                SIDEBAR,
                "Basics",
                r#"<p>Basics text.</p><h2 id="details">Details</h2><p>See <a href="basics/install.html">install</a>.</p>"#,
            ),
        ),
        "/book/part1/basics/install.html" => (
            200,
            page(
                SIDEBAR,
                "Install",
                r#"<p>Install text.</p><pre><code class="language-console">$ cargo install</code></pre>"#,
            ),
        ),
        "/book/part1/basics/install/linux.html" => (500, "internal server error".to_string()),
        "/book/part1/basics/install/macos.html" => (
            200,
            page(SIDEBAR, "macOS", "<p>macOS text.</p><h3>Homebrew</h3><p>brew.</p>"),
        ),
        "/book/appendix.html" => (200, page(SIDEBAR, "Appendix", "<p>Appendix text.</p>")),
        "/parts-book/" | "/parts-book/index.html" => (
            200,
            page(PARTS_SIDEBAR, "Parts Book", "<p>Root of the parts book.</p>"),
        ),
        "/parts-book/part2.html" => (200, page(PARTS_SIDEBAR, "Part II: Advanced", "")),
        "/parts-book/part2/traits.html" => (
            200,
            page(PARTS_SIDEBAR, "Traits", "<p>Traits text.</p>"),
        ),
        "/script-book/" | "/script-book/index.html" => (
            200,
            page(SCRIPT_SIDEBAR, "Script Book", "<p>Root of the script book.</p>"),
        ),
        "/script-book/toc.html" => (200, SCRIPT_TOC.to_string()),
        "/script-book/one.html" => (200, page(SCRIPT_SIDEBAR, "One", "<p>One text.</p>")),
        "/script-book/two.html" => (200, page(SCRIPT_SIDEBAR, "Two", "<p>Two text.</p>")),
        _ => (404, "not found".to_string()),
    }
}

pub fn spawn() -> BookServer {
    let server = tiny_http::Server::http("127.0.0.1:0").expect("start tiny_http server");
    let addr = server.server_addr();
    let base_url = format!("http://{addr}");

    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

    let handle = thread::spawn(move || loop {
        if shutdown_rx.try_recv().is_ok() {
            break;
        }

        let request = match server.recv_timeout(Duration::from_millis(50)) {
            Ok(Some(req)) => req,
            Ok(None) => continue,
            Err(_) => break,
        };

        let url = request.url().to_string();
        let path = url.split('?').next().unwrap_or(&url);
        let (status, body) = route(path);

        let mut response = tiny_http::Response::from_string(body).with_status_code(status);
        if status == 200 {
            let header = tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"text/html; charset=utf-8"[..])
                .expect("build header");
            response = response.with_header(header);
        }

        let _ = request.respond(response);
    });

    BookServer {
        base_url,
        shutdown_tx,
        handle: Some(handle),
    }
}
