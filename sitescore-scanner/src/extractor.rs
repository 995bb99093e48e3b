use crate::page::{Headings, ImageRef, PageRecord};
use chrono::Utc;
use scraper::{Html, Node, Selector};
use std::time::Duration;
use url::Url;

/// Parse fetched markup into a structured page record.
///
/// Total over any input: malformed or missing elements degrade to empty
/// fields, invalid hrefs are silently dropped, and nothing here returns
/// an error.
pub fn extract_page(
    url: &str,
    html: &str,
    status_code: u16,
    load_time: Duration,
    depth: usize,
) -> PageRecord {
    let document = Html::parse_document(html);
    let base = Url::parse(url).ok();

    let title = select_text(&document, "title").or_else(|| meta_content(&document, "og:title"));
    let meta_description = meta_named(&document, "description")
        .or_else(|| meta_content(&document, "og:description"));
    let meta_keywords = meta_named(&document, "keywords");
    let canonical = select_attr(&document, r#"link[rel="canonical"]"#, "href");

    let is_indexable = meta_named(&document, "robots")
        .map(|robots| !robots.to_lowercase().contains("noindex"))
        .unwrap_or(true);

    let headings = Headings {
        h1: heading_texts(&document, "h1"),
        h2: heading_texts(&document, "h2"),
        h3: heading_texts(&document, "h3"),
        h4: heading_texts(&document, "h4"),
    };

    let links = match &base {
        Some(base) => extract_links(&document, base),
        None => Vec::new(),
    };
    let images = match &base {
        Some(base) => extract_images(&document, base),
        None => Vec::new(),
    };

    PageRecord {
        url: url.to_string(),
        title,
        meta_description,
        meta_keywords,
        canonical,
        headings,
        links,
        images,
        raw_text: readable_text(&document),
        status_code,
        load_time_ms: load_time.as_millis() as u64,
        is_indexable,
        depth,
        fetched_at: Utc::now(),
    }
}

/// Resolve an href against the page URL, dropping anything that is not a
/// navigable http(s) target. Fragments are stripped so dedup stays exact.
pub fn resolve_link(base: &Url, href: &str) -> Option<String> {
    if href.is_empty()
        || href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with('#')
    {
        return None;
    }

    let mut resolved = base.join(href).ok()?;
    if resolved.scheme() != "http" && resolved.scheme() != "https" {
        return None;
    }
    resolved.set_fragment(None);
    Some(resolved.to_string())
}

fn extract_links(document: &Html, base: &Url) -> Vec<String> {
    let selector = Selector::parse("a[href]").unwrap();
    document
        .select(&selector)
        .filter_map(|element| element.value().attr("href"))
        .filter_map(|href| resolve_link(base, href))
        .collect()
}

fn extract_images(document: &Html, base: &Url) -> Vec<ImageRef> {
    let selector = Selector::parse("img[src]").unwrap();
    document
        .select(&selector)
        .filter_map(|element| {
            let src = element.value().attr("src")?;
            let resolved = base.join(src).ok()?;
            Some(ImageRef {
                src: resolved.to_string(),
                alt: element.value().attr("alt").map(|a| a.to_string()),
            })
        })
        .collect()
}

fn heading_texts(document: &Html, level: &str) -> Vec<String> {
    let selector = Selector::parse(level).unwrap();
    document
        .select(&selector)
        .map(|element| collapse_whitespace(&element.text().collect::<String>()))
        .filter(|text| !text.is_empty())
        .collect()
}

fn select_text(document: &Html, css: &str) -> Option<String> {
    let selector = Selector::parse(css).ok()?;
    document
        .select(&selector)
        .next()
        .map(|element| collapse_whitespace(&element.text().collect::<String>()))
        .filter(|text| !text.is_empty())
}

fn select_attr(document: &Html, css: &str, attr: &str) -> Option<String> {
    let selector = Selector::parse(css).ok()?;
    document
        .select(&selector)
        .next()
        .and_then(|element| element.value().attr(attr))
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn meta_named(document: &Html, name: &str) -> Option<String> {
    select_attr(document, &format!(r#"meta[name="{}"]"#, name), "content")
}

fn meta_content(document: &Html, property: &str) -> Option<String> {
    select_attr(
        document,
        &format!(r#"meta[property="{}"]"#, property),
        "content",
    )
}

/// Derive the readable body text: prefer an explicit content container,
/// otherwise take every text node that is not inside chrome or code.
fn readable_text(document: &Html) -> String {
    let container = Selector::parse("main, article, #content, .content").unwrap();
    if let Some(element) = document.select(&container).next() {
        return collapse_whitespace(&element.text().collect::<String>());
    }

    const SKIP: [&str; 6] = ["script", "style", "nav", "header", "footer", "aside"];

    let mut out = String::new();
    for node in document.tree.nodes() {
        if let Node::Text(text) = node.value() {
            let skipped = node.ancestors().any(|ancestor| match ancestor.value() {
                Node::Element(element) => SKIP.contains(&element.name()),
                _ => false,
            });
            if !skipped {
                out.push_str(text);
                out.push(' ');
            }
        }
    }
    collapse_whitespace(&out)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
