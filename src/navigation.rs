//! Sidebar discovery for mdBook-like sites.
//!
//! The sidebar is a nested `ol`/`ul` list. Each `li` becomes one
//! [`NavigationEntry`]; a list nested in an `li` holds that entry's children.
//! mdBook puts sub-lists in their own otherwise empty `li`
//! (`<li><ol class="section">`), so such a list is attached to the entry
//! right before it.

use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, warn};
use url::Url;

use crate::config::Selectors;

const DEFAULT_BOOK_TITLE: &str = "mdBook";
const DEFAULT_LANG: &str = "en";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NavigationEntry {
    pub title: String,
    /// `None` for section labels that have no page of their own.
    pub url: Option<Url>,
    pub depth: usize,
    pub children: Vec<NavigationEntry>,
}

impl NavigationEntry {
    pub fn new(title: impl Into<String>, url: Option<Url>, depth: usize) -> Self {
        Self {
            title: title.into(),
            url,
            depth,
            children: Vec::new(),
        }
    }

    pub fn is_label(&self) -> bool {
        self.url.is_none()
    }

    /// Number of entries in this subtree, this one included.
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(NavigationEntry::count).sum::<usize>()
    }

    fn collect<'a>(&'a self, out: &mut Vec<&'a NavigationEntry>) {
        out.push(self);
        for child in &self.children {
            child.collect(out);
        }
    }
}

/// A page that has to be downloaded, in sidebar order.
#[derive(Debug, Clone, PartialEq)]
pub struct ChapterRef {
    /// Pre-order index of the entry in the navigation forest.
    pub position: usize,
    pub title: String,
    pub url: Url,
}

#[derive(Debug, Clone, Serialize)]
pub struct Navigation {
    pub title: String,
    pub lang: String,
    pub entries: Vec<NavigationEntry>,
}

impl Navigation {
    pub fn len(&self) -> usize {
        self.entries.iter().map(NavigationEntry::count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Depth-first, pre-order walk: the order entries appear in the sidebar.
    pub fn flatten(&self) -> Vec<&NavigationEntry> {
        let mut out = Vec::with_capacity(self.len());
        for entry in &self.entries {
            entry.collect(&mut out);
        }
        out
    }

    /// Every distinct page, at the position of its first occurrence.
    pub fn chapters(&self) -> Vec<ChapterRef> {
        let mut seen = HashSet::new();
        self.flatten()
            .into_iter()
            .enumerate()
            .filter_map(|(position, entry)| {
                let url = entry.url.as_ref()?;
                seen.insert(url.clone()).then(|| ChapterRef {
                    position,
                    title: entry.title.clone(),
                    url: url.clone(),
                })
            })
            .collect()
    }
}

/// Reads the book title, language and sidebar tree from the root page.
///
/// `entries` is empty when no sidebar matched or the sidebar is filled in by
/// a script; see [`toc_frame_url`] and [`linked_pages`] for those cases.
pub fn parse_navigation(html: &str, base_url: &Url, selectors: &Selectors) -> Navigation {
    let document = Html::parse_document(html);

    Navigation {
        title: book_title(&document),
        lang: document_lang(&document),
        entries: sidebar_entries(&document, base_url, selectors),
    }
}

/// Parses only the sidebar tree of `html`, e.g. of an mdBook `toc.html`.
pub fn parse_sidebar_entries(
    html: &str,
    base_url: &Url,
    selectors: &Selectors,
) -> Vec<NavigationEntry> {
    let document = Html::parse_document(html);
    sidebar_entries(&document, base_url, selectors)
}

fn sidebar_entries(document: &Html, base_url: &Url, selectors: &Selectors) -> Vec<NavigationEntry> {
    let Some(sidebar) = find_first(document, &selectors.sidebar) else {
        debug!("No sidebar matched {:?}", selectors.sidebar);
        return Vec::new();
    };

    let list = if matches!(sidebar.value().name(), "ol" | "ul") {
        Some(sidebar)
    } else {
        parse_selector("ol, ul").and_then(|s| sidebar.select(&s).next())
    };

    let mut entries = Vec::new();
    if let Some(list) = list {
        walk_list(list, 0, base_url, &mut entries);
    }
    debug!("Sidebar yielded {} top-level entries", entries.len());
    entries
}

fn walk_list(list: ElementRef, depth: usize, base_url: &Url, out: &mut Vec<NavigationEntry>) {
    for item in list.children().filter_map(ElementRef::wrap) {
        if item.value().name() != "li" || item.value().classes().any(|c| c == "spacer") {
            continue;
        }

        let nested = nested_lists(item);
        let link = own_link(item);
        let title = match link {
            Some(a) => normalized_text(a),
            None => own_text(item),
        };

        let entry = match link.and_then(|a| a.value().attr("href")) {
            Some(href) => match resolve_chapter_link(href, base_url) {
                Some(url) if !title.is_empty() => Some(NavigationEntry::new(&title, Some(url), depth)),
                // an off-site or anchor link only survives as a label for its children
                _ if !nested.is_empty() && !title.is_empty() => {
                    Some(NavigationEntry::new(&title, None, depth))
                }
                _ => None,
            },
            None if !title.is_empty() => Some(NavigationEntry::new(&title, None, depth)),
            None => None,
        };

        match entry {
            Some(mut entry) => {
                for sub in nested {
                    walk_list(sub, depth + 1, base_url, &mut entry.children);
                }
                out.push(entry);
            }
            None => match out.last_mut() {
                Some(previous) => {
                    let child_depth = previous.depth + 1;
                    for sub in nested {
                        walk_list(sub, child_depth, base_url, &mut previous.children);
                    }
                }
                None => {
                    for sub in nested {
                        walk_list(sub, depth, base_url, out);
                    }
                }
            },
        }
    }
}

/// The first `a[href]` of an item that is not inside one of its sub-lists.
fn own_link(element: ElementRef) -> Option<ElementRef> {
    for child in element.children().filter_map(ElementRef::wrap) {
        match child.value().name() {
            "ol" | "ul" => continue,
            "a" if child.value().attr("href").is_some() => return Some(child),
            _ => {
                if let Some(found) = own_link(child) {
                    return Some(found);
                }
            }
        }
    }
    None
}

/// Outermost `ol`/`ul` elements below `element`.
fn nested_lists(element: ElementRef) -> Vec<ElementRef> {
    let mut lists = Vec::new();
    for child in element.children().filter_map(ElementRef::wrap) {
        if matches!(child.value().name(), "ol" | "ul") {
            lists.push(child);
        } else {
            lists.extend(nested_lists(child));
        }
    }
    lists
}

/// Text of an item without the text of its sub-lists.
fn own_text(element: ElementRef) -> String {
    fn collect(element: ElementRef, out: &mut String) {
        for child in element.children() {
            if let Some(text) = child.value().as_text() {
                out.push_str(text);
            } else if let Some(el) = ElementRef::wrap(child) {
                if !matches!(el.value().name(), "ol" | "ul") {
                    collect(el, out);
                }
            }
        }
    }

    let mut text = String::new();
    collect(element, &mut text);
    collapse_whitespace(&text)
}

fn normalized_text(element: ElementRef) -> String {
    collapse_whitespace(&element.text().collect::<String>())
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Resolves a sidebar `href` to an absolute chapter URL.
///
/// Returns `None` for in-page anchors, other hosts, and links to
/// non-HTML files. The fragment is dropped.
pub fn resolve_chapter_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let mut url = base_url.join(href).ok()?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str() != base_url.host_str() {
        return None;
    }
    url.set_fragment(None);

    let last = url.path().rsplit('/').next().unwrap_or("");
    if last.contains('.') && !last.ends_with(".html") && !last.ends_with(".htm") {
        return None;
    }

    Some(url)
}

/// Where a script-rendered sidebar keeps its static copy.
///
/// Recent mdBook builds the sidebar from `toc.js` and only ships
/// `<noscript><iframe src="toc.html">` in the page.
pub fn toc_frame_url(html: &str, base_url: &Url) -> Option<Url> {
    let document = Html::parse_document(html);
    let iframe = parse_selector("iframe[src]")?;

    let src = document
        .select(&iframe)
        .filter_map(|el| el.value().attr("src"))
        .map(str::to_string)
        .next()
        .or_else(|| {
            // noscript content is raw text to the parser
            let noscript = parse_selector("noscript")?;
            document.select(&noscript).find_map(|el| {
                let inner = Html::parse_fragment(&el.text().collect::<String>());
                let src = inner
                    .select(&iframe)
                    .find_map(|frame| frame.value().attr("src"))
                    .map(str::to_string);
                src
            })
        })?;

    resolve_chapter_link(&src, base_url)
}

/// Flat fallback: every same-site `.html` link on the page, once.
pub fn linked_pages(html: &str, base_url: &Url) -> Vec<NavigationEntry> {
    let document = Html::parse_document(html);
    let Some(anchor) = parse_selector("a[href]") else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    document
        .select(&anchor)
        .filter_map(|a| {
            let href = a.value().attr("href")?;
            let url = resolve_chapter_link(href, base_url)?;
            if !url.path().ends_with(".html") {
                return None;
            }
            let title = normalized_text(a);
            (!title.is_empty() && seen.insert(url.clone()))
                .then(|| NavigationEntry::new(title, Some(url), 0))
        })
        .collect()
}

fn book_title(document: &Html) -> String {
    for selector in ["h1.menu-title", "a.sidebar-logo"] {
        if let Some(el) = parse_selector(selector).and_then(|s| document.select(&s).next()) {
            let title = normalized_text(el);
            if !title.is_empty() {
                return title;
            }
        }
    }

    if let Some(el) = parse_selector("title").and_then(|s| document.select(&s).next()) {
        let text = normalized_text(el);
        let title = text.split(" - ").next().unwrap_or("").trim();
        if !title.is_empty() {
            return title.to_string();
        }
    }

    DEFAULT_BOOK_TITLE.to_string()
}

fn document_lang(document: &Html) -> String {
    parse_selector("html[lang]")
        .and_then(|s| document.select(&s).next())
        .and_then(|el| el.value().attr("lang"))
        .map(str::trim)
        .filter(|lang| !lang.is_empty())
        .unwrap_or(DEFAULT_LANG)
        .to_string()
}

pub(crate) fn find_first<'a>(document: &'a Html, selectors: &[String]) -> Option<ElementRef<'a>> {
    selectors
        .iter()
        .filter_map(|s| parse_selector(s))
        .find_map(|selector| document.select(&selector).next())
}

pub(crate) fn parse_selector(selector: &str) -> Option<Selector> {
    match Selector::parse(selector) {
        Ok(selector) => Some(selector),
        Err(e) => {
            warn!("Ignoring invalid CSS selector {:?}: {}", selector, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://example.com/book/").unwrap()
    }

    const MDBOOK_ROOT: &str = r#"<!DOCTYPE html>
<html lang="zh-CN">
<head><title>Introduction - The Example Book</title></head>
<body>
<nav id="sidebar" class="sidebar" aria-label="Table of contents">
  <div class="sidebar-scrollbox">
    <ol class="chapter">
      <li class="chapter-item expanded affix "><a href="index.html">Introduction</a></li>
      <li class="chapter-item expanded affix "><li class="part-title">Basics</li>
      <li class="chapter-item expanded "><a href="ch01.html"><strong aria-hidden="true">1.</strong> Getting Started</a></li>
      <li><ol class="section">
        <li class="chapter-item expanded "><a href="ch01-01.html"><strong aria-hidden="true">1.1.</strong> Installation</a></li>
        <li><ol class="section">
          <li class="chapter-item expanded "><a href="ch01-01-linux.html#top"><strong aria-hidden="true">1.1.1.</strong> On Linux</a></li>
        </ol></li>
        <li class="chapter-item expanded "><a href="ch01-02.html"><strong aria-hidden="true">1.2.</strong> Hello, World!</a></li>
      </ol></li>
      <li class="spacer"></li>
      <li class="chapter-item expanded "><a href="appendix/index.html"><strong aria-hidden="true">2.</strong> Appendix</a></li>
      <li class="chapter-item expanded "><a href="https://github.com/example/book">GitHub</a></li>
      <li class="chapter-item expanded "><a href="assets/book.zip">Download</a></li>
    </ol>
  </div>
</nav>
<div id="content" class="content"><main><h1>Introduction</h1></main></div>
</body>
</html>"#;

    fn titles(nav: &Navigation) -> Vec<(usize, String)> {
        nav.flatten()
            .into_iter()
            .map(|e| (e.depth, e.title.clone()))
            .collect()
    }

    #[test]
    fn parses_mdbook_sidebar_in_sidebar_order() {
        let nav = parse_navigation(MDBOOK_ROOT, &base(), &Selectors::default());

        assert_eq!(nav.title, "Introduction");
        assert_eq!(nav.lang, "zh-CN");
        assert_eq!(
            titles(&nav),
            vec![
                (0, "Introduction".to_string()),
                (0, "Basics".to_string()),
                (0, "1. Getting Started".to_string()),
                (1, "1.1. Installation".to_string()),
                (2, "1.1.1. On Linux".to_string()),
                (1, "1.2. Hello, World!".to_string()),
                (0, "2. Appendix".to_string()),
            ]
        );
        assert_eq!(nav.len(), 7);
        assert_eq!(nav.entries.len(), 4);
    }

    #[test]
    fn resolves_links_and_drops_fragments() {
        let nav = parse_navigation(MDBOOK_ROOT, &base(), &Selectors::default());
        let urls: Vec<String> = nav
            .flatten()
            .into_iter()
            .filter_map(|e| e.url.as_ref().map(|u| u.to_string()))
            .collect();

        assert_eq!(
            urls,
            vec![
                "https://example.com/book/index.html",
                "https://example.com/book/ch01.html",
                "https://example.com/book/ch01-01.html",
                "https://example.com/book/ch01-01-linux.html",
                "https://example.com/book/ch01-02.html",
                "https://example.com/book/appendix/index.html",
            ]
        );
    }

    #[test]
    fn part_titles_are_labels() {
        let nav = parse_navigation(MDBOOK_ROOT, &base(), &Selectors::default());
        let basics = &nav.entries[1];
        assert_eq!(basics.title, "Basics");
        assert!(basics.is_label());
        assert!(nav.chapters().iter().all(|c| c.title != "Basics"));
    }

    #[test]
    fn nested_lists_inside_items_become_children() {
        let html = r#"<html><body><nav class="sidebar"><ul>
            <li><a href="a.html">A</a>
              <ul>
                <li><a href="a1.html">A1</a>
                  <ul><li><a href="a1x.html">A1x</a></li></ul>
                </li>
              </ul>
            </li>
            <li><span>Group</span><ul><li><a href="b.html">B</a></li></ul></li>
        </ul></nav></body></html>"#;

        let nav = parse_navigation(html, &base(), &Selectors::default());
        assert_eq!(
            titles(&nav),
            vec![
                (0, "A".to_string()),
                (1, "A1".to_string()),
                (2, "A1x".to_string()),
                (0, "Group".to_string()),
                (1, "B".to_string()),
            ]
        );
        assert!(nav.entries[1].is_label());
        assert_eq!(nav.entries[0].count(), 3);
    }

    #[test]
    fn duplicate_links_are_kept_but_fetched_once() {
        let html = r#"<html><body><nav class="sidebar"><ol>
            <li><a href="intro.html">Intro</a></li>
            <li><a href="guide.html">Guide</a></li>
            <li><a href="./intro.html#again">Intro again</a></li>
        </ol></nav></body></html>"#;

        let nav = parse_navigation(html, &base(), &Selectors::default());
        assert_eq!(nav.len(), 3);

        let chapters = nav.chapters();
        assert_eq!(chapters.len(), 2);
        assert_eq!(chapters[0].position, 0);
        assert_eq!(chapters[1].position, 1);
        assert_eq!(chapters[1].title, "Guide");
    }

    #[test]
    fn missing_sidebar_yields_no_entries() {
        let html = "<html><head><title>Plain</title></head><body><p>hi</p></body></html>";
        let nav = parse_navigation(html, &base(), &Selectors::default());
        assert!(nav.is_empty());
        assert_eq!(nav.title, "Plain");
        assert_eq!(nav.lang, "en");
    }

    #[test]
    fn custom_sidebar_selector() {
        let html = r#"<html><body>
            <div class="toc"><ul><li><a href="x.html">X</a></li></ul></div>
        </body></html>"#;
        let selectors = Selectors {
            sidebar: vec!["div.toc".to_string()],
            ..Selectors::default()
        };

        let nav = parse_navigation(html, &base(), &selectors);
        assert_eq!(titles(&nav), vec![(0, "X".to_string())]);
    }

    #[test]
    fn book_title_sources() {
        let html = r#"<html><head><title>Page - Book</title></head><body>
            <h1 class="menu-title">  The   Book </h1></body></html>"#;
        assert_eq!(
            parse_navigation(html, &base(), &Selectors::default()).title,
            "The Book"
        );

        let html = "<html><head><title>Chapter One - The Book</title></head><body></body></html>";
        assert_eq!(
            parse_navigation(html, &base(), &Selectors::default()).title,
            "Chapter One"
        );

        let html = "<html><body></body></html>";
        assert_eq!(
            parse_navigation(html, &base(), &Selectors::default()).title,
            "mdBook"
        );
    }

    #[test]
    fn finds_toc_frame_in_noscript() {
        let html = r#"<html><body>
            <nav id="sidebar" class="sidebar">
              <mdbook-sidebar-scrollbox class="sidebar-scrollbox"></mdbook-sidebar-scrollbox>
              <noscript><iframe class="sidebar-iframe-outer" src="toc.html"></iframe></noscript>
            </nav></body></html>"#;

        let nav = parse_navigation(html, &base(), &Selectors::default());
        assert!(nav.is_empty());
        assert_eq!(
            toc_frame_url(html, &base()).unwrap().as_str(),
            "https://example.com/book/toc.html"
        );
    }

    #[test]
    fn toc_page_parses_like_a_sidebar() {
        let toc = r#"<!DOCTYPE html><html><body class="sidebar-iframe-inner">
            <ol class="chapter">
              <li class="chapter-item expanded "><a href="intro.html" target="_parent">Intro</a></li>
              <li class="chapter-item expanded "><a href="one.html" target="_parent"><strong aria-hidden="true">1.</strong> One</a>
                <a class="toggle"><div>❱</div></a></li>
              <li><ol class="section">
                <li class="chapter-item "><a href="one/a.html" target="_parent"><strong aria-hidden="true">1.1.</strong> A</a></li>
              </ol></li>
            </ol></body></html>"#;

        let entries = parse_sidebar_entries(toc, &base(), &Selectors::default());
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].title, "1. One");
        assert_eq!(entries[1].children[0].title, "1.1. A");
        assert_eq!(
            entries[1].children[0].url.as_ref().unwrap().as_str(),
            "https://example.com/book/one/a.html"
        );
    }

    #[test]
    fn linked_pages_fallback_is_flat_and_unique() {
        let html = r#"<html><body>
            <a href="one.html">One</a>
            <a href="two.html#x">Two</a>
            <a href="one.html">One again</a>
            <a href="https://other.org/x.html">Other</a>
            <a href="style.css">Style</a>
        </body></html>"#;

        let entries = linked_pages(html, &base());
        let titles: Vec<&str> = entries.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["One", "Two"]);
        assert!(entries.iter().all(|e| e.depth == 0));
    }

    #[test]
    fn chapter_link_filter() {
        let base = base();
        assert!(resolve_chapter_link("#top", &base).is_none());
        assert!(resolve_chapter_link("https://other.org/a.html", &base).is_none());
        assert!(resolve_chapter_link("img/logo.png", &base).is_none());
        assert!(resolve_chapter_link("mailto:me@example.com", &base).is_none());
        assert_eq!(
            resolve_chapter_link("../other/", &base).unwrap().as_str(),
            "https://example.com/other/"
        );
        assert_eq!(
            resolve_chapter_link("https://example.com/book/a.html#b", &base)
                .unwrap()
                .as_str(),
            "https://example.com/book/a.html"
        );
    }
}
