//! Chapter body extraction.
//!
//! scraper trees are read-only, so cleaning happens while serializing: chrome
//! elements are skipped, headings are renamed one level down, and links and
//! ids are rewritten as they are written out.

use scraper::node::{Element, Node};
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::config::Selectors;
use crate::error::{Error, Result};
use crate::navigation::find_first;

const REMOVED_TAGS: &[&str] = &["nav", "header", "footer", "script", "style", "noscript"];

const CHROME_CLASSES: &[&str] = &[
    "nav-wrapper",
    "nav-chapters",
    "sidebar",
    "menu-bar",
    "nav-wide-wrapper",
    "sidetoc",
    "pagetoc",
    "mobile-nav-chapters",
    "buttons",
    "search-wrapper",
    "searchresults-outer",
    "searchresults-header",
    "theme-popup",
    "theme-toggle",
    "search-toggle",
    "print-button",
    "git-link",
    "edit-button",
    "back-to-top",
    "chapter-nav",
];

const CHROME_IDS: &[&str] = &[
    "sidebar",
    "menu-bar",
    "search-wrapper",
    "searchresults-outer",
    "theme-toggle",
    "search-toggle",
    "searchbar",
    "searchresults",
];

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

const MEDIA_ELEMENTS: &[&str] = &["img", "svg", "video", "audio", "iframe", "object", "embed", "canvas", "table"];

/// Marks headings that must stay out of the PDF bookmarks.
pub const NO_BOOKMARK_CLASS: &str = "no-bookmark";

pub struct ContentExtractor {
    content: Vec<String>,
    keep_page_title: bool,
}

impl ContentExtractor {
    pub fn new(selectors: &Selectors, keep_page_title: bool) -> Self {
        Self {
            content: selectors.content.clone(),
            keep_page_title,
        }
    }

    /// Returns the cleaned inner HTML of the page's content container.
    ///
    /// Ids inside the fragment and `#` links pointing at them get
    /// `anchor_prefix` so several chapters can share one document. A page
    /// holding only its dropped title yields an empty fragment.
    pub fn extract(&self, html: &str, page_url: &Url, anchor_prefix: &str) -> Result<String> {
        let document = Html::parse_document(html);

        let container = find_first(&document, &self.content).or_else(|| {
            let body = Selector::parse("body").ok()?;
            document.select(&body).next()
        });
        let Some(container) = container else {
            return Err(Error::ContentExtraction {
                url: page_url.to_string(),
                reason: "no content container found".to_string(),
            });
        };

        let mut writer = FragmentWriter::new(Rules {
            base: page_url,
            demote_headings: true,
            drop_first_h1: !self.keep_page_title,
            anchor_prefix,
        });
        writer.children(container);

        if !writer.has_content {
            // part and section index pages often hold nothing but their title
            if writer.dropped_title {
                return Ok(String::new());
            }
            return Err(Error::ContentExtraction {
                url: page_url.to_string(),
                reason: "content is empty after cleaning".to_string(),
            });
        }

        Ok(writer.out)
    }
}

/// Removes chrome from an HTML fragment and rebases its relative links.
///
/// Headings and ids are left as they are, so applying it twice gives the
/// same result as applying it once.
pub fn clean_fragment(fragment: &str, page_url: &Url) -> String {
    let html = Html::parse_fragment(fragment);
    let mut writer = FragmentWriter::new(Rules {
        base: page_url,
        demote_headings: false,
        drop_first_h1: false,
        anchor_prefix: "",
    });
    writer.children(html.root_element());
    writer.out
}

struct Rules<'a> {
    base: &'a Url,
    demote_headings: bool,
    drop_first_h1: bool,
    anchor_prefix: &'a str,
}

struct FragmentWriter<'a> {
    rules: Rules<'a>,
    dropped_title: bool,
    has_content: bool,
    out: String,
}

impl<'a> FragmentWriter<'a> {
    fn new(rules: Rules<'a>) -> Self {
        Self {
            rules,
            dropped_title: false,
            has_content: false,
            out: String::new(),
        }
    }

    fn children(&mut self, parent: ElementRef) {
        for child in parent.children() {
            match child.value() {
                Node::Text(text) => {
                    if !text.trim().is_empty() {
                        self.has_content = true;
                    }
                    escape_text(text, &mut self.out);
                }
                Node::Element(_) => {
                    if let Some(element) = ElementRef::wrap(child) {
                        self.element(element);
                    }
                }
                _ => {}
            }
        }
    }

    fn element(&mut self, element: ElementRef) {
        let value = element.value();
        if is_chrome(value) {
            return;
        }

        let name = value.name();
        let level = heading_level(name);

        if level == Some(1) && self.rules.drop_first_h1 && !self.dropped_title {
            self.dropped_title = true;
            return;
        }

        let demoted = self.rules.demote_headings && matches!(level, Some(1..=5));
        let tag = match level {
            Some(level) if demoted => format!("h{}", level + 1),
            _ => name.to_string(),
        };

        if MEDIA_ELEMENTS.contains(&name) {
            self.has_content = true;
        }

        self.out.push('<');
        self.out.push_str(&tag);
        self.attributes(value, demoted);
        self.out.push('>');

        if VOID_ELEMENTS.contains(&name) {
            return;
        }

        // the parser eats one newline right after these start tags
        if matches!(name, "pre" | "textarea" | "listing") {
            let leading_newline = element
                .first_child()
                .and_then(|c| c.value().as_text().map(|t| t.starts_with('\n')))
                .unwrap_or(false);
            if leading_newline {
                self.out.push('\n');
            }
        }

        self.children(element);

        self.out.push_str("</");
        self.out.push_str(&tag);
        self.out.push('>');
    }

    fn attributes(&mut self, element: &Element, demoted: bool) {
        let mut attrs: Vec<(String, String)> = element
            .attrs
            .iter()
            .map(|(qual, value)| {
                let local: &str = &qual.local;
                let value: &str = value;
                // SVG keeps namespaced attributes such as xlink:href
                let name = match &qual.prefix {
                    Some(prefix) => format!("{prefix}:{local}"),
                    None => local.to_string(),
                };
                let value = match (local, qual.prefix.is_some()) {
                    ("class", false) if demoted => with_class(value, NO_BOOKMARK_CLASS),
                    ("id" | "name", false) if !self.rules.anchor_prefix.is_empty() => {
                        format!("{}{}", self.rules.anchor_prefix, value)
                    }
                    ("href" | "src", _) => self.rebase(value),
                    _ => value.to_string(),
                };
                (name, value)
            })
            .collect();

        if demoted && !attrs.iter().any(|(name, _)| name == "class") {
            attrs.push(("class".to_string(), NO_BOOKMARK_CLASS.to_string()));
        }
        // attribute order is not stable across parses
        attrs.sort_by(|a, b| a.0.cmp(&b.0));

        for (name, value) in attrs {
            self.out.push(' ');
            self.out.push_str(&name);
            self.out.push_str("=\"");
            escape_attr(&value, &mut self.out);
            self.out.push('"');
        }
    }

    fn rebase(&self, value: &str) -> String {
        let trimmed = value.trim();

        if let Some(fragment) = trimmed.strip_prefix('#') {
            if fragment.is_empty() || self.rules.anchor_prefix.is_empty() {
                return value.to_string();
            }
            return format!("#{}{}", self.rules.anchor_prefix, fragment);
        }

        // absolute URLs, including mailto:, javascript: and data:
        if trimmed.is_empty() || Url::parse(trimmed).is_ok() {
            return value.to_string();
        }

        self.rules
            .base
            .join(trimmed)
            .map(String::from)
            .unwrap_or_else(|_| value.to_string())
    }
}

fn is_chrome(element: &Element) -> bool {
    let name = element.name();

    REMOVED_TAGS.contains(&name)
        || element.classes().any(|c| CHROME_CLASSES.contains(&c))
        || element.id().is_some_and(|id| CHROME_IDS.contains(&id))
        || (matches!(name, "button" | "i")
            && element.attr("class").is_some_and(|class| {
                let class = class.to_lowercase();
                class.contains("play") || class.contains("copy") || class.contains("fa-")
            }))
}

fn with_class(classes: &str, class: &str) -> String {
    if classes.split_whitespace().any(|c| c == class) {
        classes.to_string()
    } else {
        format!("{} {}", classes.trim(), class).trim().to_string()
    }
}

fn heading_level(name: &str) -> Option<u8> {
    match name {
        "h1" => Some(1),
        "h2" => Some(2),
        "h3" => Some(3),
        "h4" => Some(4),
        "h5" => Some(5),
        "h6" => Some(6),
        _ => None,
    }
}

pub(crate) fn escape_text(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            c => out.push(c),
        }
    }
}

pub(crate) fn escape_attr(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            c => out.push(c),
        }
    }
}

/// HTML-escaped copy of `text`, for text content and attribute values alike.
pub(crate) fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => escape_text(c.encode_utf8(&mut [0; 4]), &mut out),
        }
    }
    out
}
