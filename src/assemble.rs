use std::collections::{HashMap, HashSet};
use url::Url;

use crate::extract::escape;
use crate::navigation::{Navigation, NavigationEntry};

/// What happened to one chapter page.
#[derive(Debug, Clone, PartialEq)]
pub enum ChapterStatus {
    Fetched { fragment: String },
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChapterContent {
    /// Pre-order position of the navigation entry this chapter belongs to.
    pub position: usize,
    pub title: String,
    pub url: Url,
    pub status: ChapterStatus,
}

impl ChapterContent {
    pub fn fetch_succeeded(&self) -> bool {
        matches!(self.status, ChapterStatus::Fetched { .. })
    }
}

/// A chapter heading to turn into a PDF bookmark.
#[derive(Debug, Clone, PartialEq)]
pub struct OutlineEntry {
    pub title: String,
    pub anchor: String,
    pub depth: usize,
}

#[derive(Debug, Clone)]
pub struct Assembled {
    pub html: String,
    pub outline: Vec<OutlineEntry>,
}

/// Anchor id of the synthesized heading of the chapter at `position`.
pub fn chapter_anchor(position: usize) -> String {
    format!("chapter-{position}")
}

/// Prefix given to ids inside the chapter at `position`.
pub fn content_anchor_prefix(position: usize) -> String {
    format!("c{position}-")
}

/// Builds the single-file book: cover, two-column contents, then every
/// fetched chapter under its own top-level heading.
///
/// The contents list every navigation entry. Entries without a fetched page
/// (section labels, failed downloads) are listed without a link.
pub fn assemble_document(nav: &Navigation, chapters: &[ChapterContent], source_url: &Url) -> Assembled {
    let entries = nav.flatten();

    let fetched: HashSet<usize> = chapters
        .iter()
        .filter(|c| c.fetch_succeeded())
        .map(|c| c.position)
        .collect();

    let mut first_position: HashMap<&Url, usize> = HashMap::new();
    for (position, entry) in entries.iter().enumerate() {
        if let Some(url) = &entry.url {
            first_position.entry(url).or_insert(position);
        }
    }

    let toc_items: Vec<String> = entries
        .iter()
        .map(|entry| {
            let target = entry
                .url
                .as_ref()
                .and_then(|url| first_position.get(url).copied())
                .filter(|position| fetched.contains(position));
            toc_item(entry, target)
        })
        .collect();

    let mut sections = String::new();
    let mut outline = Vec::new();
    for chapter in chapters {
        let ChapterStatus::Fetched { fragment } = &chapter.status else {
            continue;
        };
        let depth = entries.get(chapter.position).map_or(0, |e| e.depth);
        let anchor = chapter_anchor(chapter.position);

        sections.push_str(&format!(
            "<section class=\"chapter\">\n<h1 class=\"chapter-title bookmark-{}\" id=\"{}\">{}</h1>\n{}\n</section>\n",
            depth.min(2) + 1,
            anchor,
            escape(&chapter.title),
            fragment
        ));

        outline.push(OutlineEntry {
            title: chapter.title.clone(),
            anchor,
            depth,
        });
    }

    let title = escape(&nav.title);
    let source = escape(source_url.as_str());
    let (left, right) = toc_items.split_at(toc_items.len().div_ceil(2));

    let html = format!(
        r#"<!DOCTYPE html>
<html lang="{lang}">
<head>
<meta charset="UTF-8">
<title>{title}</title>
<style>
{css}
</style>
</head>
<body>

<div class="cover">
<h1>{title}</h1>
<p class="source">Source: <a href="{source}">{source}</a></p>
</div>

<div class="toc">
<h1>Contents</h1>
<table class="toc-table"><tr>
<td>
{left}
</td>
<td>
{right}
</td>
</tr></table>
</div>

{sections}
</body>
</html>
"#,
        lang = escape(&nav.lang),
        css = PRINT_CSS,
        left = left.join("\n"),
        right = right.join("\n"),
    );

    Assembled { html, outline }
}

fn toc_item(entry: &NavigationEntry, target: Option<usize>) -> String {
    let level = entry.depth.min(3) + 1;
    let title = escape(&entry.title);

    match target {
        Some(position) => format!(
            "<div class=\"toc-item level-{level}\"><a href=\"#{}\">{title}</a></div>",
            chapter_anchor(position)
        ),
        None if entry.is_label() => format!("<div class=\"toc-item level-{level} label\">{title}</div>"),
        None => format!("<div class=\"toc-item level-{level} missing\">{title}</div>"),
    }
}

const PRINT_CSS: &str = r#"@page {
    size: A4;
    margin: 2cm 1.5cm;
    @bottom-center {
        content: counter(page);
        font-size: 10pt;
        color: #666;
    }
}

@page :first {
    @bottom-center { content: none; }
}

* { box-sizing: border-box; }

body {
    font-family: "PingFang SC", "Microsoft YaHei", "Hiragino Sans GB", "Noto Sans CJK SC",
                 -apple-system, BlinkMacSystemFont, "Segoe UI", sans-serif;
    margin: 0;
    padding: 0;
    line-height: 1.7;
    color: #2c3e50;
    font-size: 11pt;
    background: white;
}

.cover {
    break-after: page;
    page-break-after: always;
    text-align: center;
    padding: 200px 20px 100px;
}

.cover h1 {
    font-size: 32pt;
    color: #c0392b;
    border: none;
    margin-bottom: 20px;
}

.cover .source {
    font-size: 11pt;
    color: #95a5a6;
    margin-top: 60px;
}

.toc {
    break-after: page;
    page-break-after: always;
}

.toc h1 {
    text-align: center;
    border: none;
}

.toc-table {
    width: 100%;
    border: none;
    border-collapse: collapse;
}

.toc-table td {
    width: 50%;
    vertical-align: top;
    padding: 0 10px;
    border: none;
}

.toc-table tr:nth-child(even) { background: none; }

.toc-item {
    margin: 3px 0;
    line-height: 1.5;
    font-size: 9pt;
}

.toc-item a { color: #34495e; }

.toc-item.level-1 {
    font-weight: bold;
    margin-top: 10px;
    font-size: 10pt;
}

.toc-item.level-2 { padding-left: 12px; }

.toc-item.level-3 {
    padding-left: 24px;
    font-size: 8pt;
}

.toc-item.level-4 {
    padding-left: 36px;
    font-size: 8pt;
}

.toc-item.missing { color: #bdc3c7; }

.toc-item.label { color: #7f8c8d; text-transform: uppercase; }

.chapter {
    break-before: page;
    page-break-before: always;
}

h1.bookmark-1 { bookmark-level: 1; bookmark-state: open; }
h1.bookmark-2 { bookmark-level: 2; bookmark-state: closed; }
h1.bookmark-3 { bookmark-level: 3; bookmark-state: closed; }

h1 {
    color: #c0392b;
    font-size: 22pt;
    border-bottom: 3px solid #e74c3c;
    padding-bottom: 10px;
    margin-top: 0;
    break-after: avoid;
}

h2 {
    color: #2980b9;
    font-size: 16pt;
    border-bottom: 2px solid #3498db;
    padding-bottom: 6px;
    margin-top: 1.5em;
    break-after: avoid;
}

h3 {
    color: #27ae60;
    font-size: 13pt;
    margin-top: 1.2em;
    break-after: avoid;
}

h4, h5, h6 {
    color: #8e44ad;
    margin-top: 1em;
}

code {
    background-color: #f4f4f4;
    padding: 2px 5px;
    border-radius: 3px;
    font-family: "JetBrains Mono", "Fira Code", "SF Mono", Consolas, "Liberation Mono", Menlo, monospace;
    font-size: 9.5pt;
    color: #c7254e;
}

pre {
    background-color: #282c34;
    color: #abb2bf;
    padding: 14px;
    border-radius: 6px;
    font-size: 9pt;
    line-height: 1.45;
    break-inside: avoid;
    white-space: pre-wrap;
    word-wrap: break-word;
    margin: 1em 0;
}

pre code {
    background-color: transparent;
    padding: 0;
    color: inherit;
    font-size: inherit;
}

a {
    color: #3498db;
    text-decoration: none;
}

blockquote {
    border-left: 4px solid #f39c12;
    margin: 1em 0;
    padding: 10px 20px;
    background-color: #fef9e7;
    color: #7d6608;
    break-inside: avoid;
}

table {
    border-collapse: collapse;
    width: 100%;
    margin: 1em 0;
    break-inside: avoid;
    font-size: 10pt;
}

th, td {
    border: 1px solid #bdc3c7;
    padding: 8px 10px;
    text-align: left;
}

th {
    background-color: #3498db;
    color: white;
}

tr:nth-child(even) { background-color: #ecf0f1; }

img {
    max-width: 100%;
    height: auto;
    display: block;
    margin: 1em auto;
}

ul, ol { padding-left: 25px; }

li { margin: 4px 0; }

.buttons, .fa, .fa-play, .fa-copy,
button, .play-button, .test-arrow,
.header, .nav-chapters, .chapter-nav {
    display: none !important;
}

a.header { display: inline !important; color: inherit; }

.no-bookmark, .cover h1, .toc h1 { bookmark-level: none; }"#;
