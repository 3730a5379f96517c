//! Generic content extractor: GET a page, strip boilerplate, keep the prose.
use crate::{ContentExtractor, ExtractError};
use async_trait::async_trait;
use nowhere_http::{HttpClient, RequestOpts};
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use scraper::{ElementRef, Html, Node, Selector};
use std::sync::OnceLock;

const DESKTOP_UA: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";
const MIN_BLOCK_LEN: usize = 100;
const SKIP_TAGS: [&str; 6] = ["script", "style", "nav", "footer", "header", "aside"];

/// Plain GET + HTML-parse extractor, used for any host the extractor
/// factory doesn't have a site-specific extractor for.
pub struct GenericExtractor {
    http: HttpClient,
}

impl GenericExtractor {
    pub fn new() -> Result<Self, ExtractError> {
        let http = HttpClient::new("http://localhost/")
            .map_err(|e| ExtractError::Network(e.to_string()))?;
        Ok(Self { http })
    }
}

impl Default for GenericExtractor {
    fn default() -> Self {
        Self::new().expect("static base URL always parses")
    }
}

#[async_trait]
impl ContentExtractor for GenericExtractor {
    async fn extract_content(&self, url: &str) -> Result<String, ExtractError> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(DESKTOP_UA));
        headers.insert(ACCEPT, HeaderValue::from_static("text/html"));

        let body = self
            .http
            .get_text(
                url,
                RequestOpts {
                    headers: Some(headers),
                    allow_absolute: true,
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| ExtractError::Network(e.to_string()))?;

        Ok(extract_text(&body))
    }
}

/// Parse `body` (full document if it contains a `<html` tag, else a
/// fragment), strip boilerplate subtrees, and return the first text block
/// over [`MIN_BLOCK_LEN`] chars from `article`, then `main`, then `body`.
/// Falls back to a regex tag-stripper if nothing clears the threshold.
fn extract_text(body: &str) -> String {
    let looks_like_document = body.to_ascii_lowercase().contains("<html");
    let doc = if looks_like_document {
        Html::parse_document(body)
    } else {
        Html::parse_fragment(body)
    };

    for selector in ["article", "main", "body"] {
        let sel = Selector::parse(selector).expect("static selector");
        if let Some(candidate) = doc
            .select(&sel)
            .map(|el| collapse_whitespace(&collect_text(el)))
            .find(|text| text.len() > MIN_BLOCK_LEN)
        {
            return candidate;
        }
    }

    collapse_whitespace(&strip_tags(body))
}

/// Walk `root`'s descendants, concatenating text nodes and skipping
/// boilerplate subtrees (`SKIP_TAGS`) entirely.
fn collect_text(root: ElementRef) -> String {
    let mut out = String::new();
    collect_text_into(root, &mut out);
    out
}

fn collect_text_into(root: ElementRef, out: &mut String) {
    for child in root.children() {
        match child.value() {
            Node::Text(text) => {
                out.push_str(text);
                out.push(' ');
            }
            Node::Element(el) => {
                if SKIP_TAGS.contains(&el.name()) {
                    continue;
                }
                if let Some(child_el) = ElementRef::wrap(child) {
                    collect_text_into(child_el, out);
                }
            }
            _ => {}
        }
    }
}

fn tag_stripper_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]+>").unwrap())
}

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").unwrap())
}

fn strip_tags(html: &str) -> String {
    tag_stripper_re().replace_all(html, "").into_owned()
}

fn collapse_whitespace(s: &str) -> String {
    whitespace_re().replace_all(s.trim(), " ").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_article_over_body() {
        let html = r#"
            <html><body>
                <nav>Home | About | Contact</nav>
                <article>This is the real article content and it easily clears the one hundred character minimum threshold required to win.</article>
                <footer>Copyright 2026</footer>
            </body></html>
        "#;
        let text = extract_text(html);
        assert!(text.contains("real article content"));
        assert!(!text.contains("Home | About"));
        assert!(!text.contains("Copyright"));
    }

    #[test]
    fn falls_back_to_main_when_article_too_short() {
        let html = r#"
            <html><body>
                <article>too short</article>
                <main>This main block is the one that actually clears the one hundred character minimum threshold needed to be selected here.</main>
            </body></html>
        "#;
        let text = extract_text(html);
        assert!(text.contains("main block"));
    }

    #[test]
    fn falls_back_to_tag_stripper_when_nothing_clears_threshold() {
        let html = "<html><body><p>short</p></body></html>";
        let text = extract_text(html);
        assert_eq!(text, "short");
    }

    #[test]
    fn collapses_whitespace() {
        assert_eq!(collapse_whitespace("a   b\n\nc\t d"), "a b c d");
    }

    #[test]
    fn parses_fragment_without_html_tag() {
        let fragment = "<div><p>Just a fragment with enough characters inside it to clear the one hundred character extraction threshold easily.</p></div>";
        let text = extract_text(fragment);
        assert!(text.contains("Just a fragment"));
    }
}
