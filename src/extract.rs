use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::fetch::Fetcher;

// ── Constants ────────────────────────────────────────────────────────────────

const NO_TITLE: &str = "No title";

/// Elements removed from the tree before a region is chosen.
const PRUNED_TAGS: &[&str] = &[
    "script", "style", "iframe", "noscript", "nav", "footer", "header", "aside",
];

/// Ordered region rules; the first rule with any match wins.
const REGION_RULES: &[RegionRule] = &[
    RegionRule::Tag("article"),
    RegionRule::Tag("main"),
    RegionRule::TagWithClass {
        tag: "div",
        class_needle: "content",
    },
    RegionRule::Tag("body"),
];

// ── Lazy static selectors ────────────────────────────────────────────────────

static PRUNE_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse(&PRUNED_TAGS.join(", ")).unwrap());

static TITLE_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("title").unwrap());

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("URL is required")]
    MissingUrl,
    #[error("{0}")]
    InvalidUrl(String),
    #[error("{0}")]
    Request(String),
    #[error("HTTP error! status: {0}")]
    Upstream(u16),
    #[error("Response body is not valid UTF-8: {0}")]
    Decode(String),
}

impl ExtractionError {
    /// Whether the caller sent bad input, as opposed to the upstream fetch failing.
    pub fn is_client_error(&self) -> bool {
        matches!(self, ExtractionError::MissingUrl | ExtractionError::InvalidUrl(_))
    }
}

// ── Public result type ───────────────────────────────────────────────────────

#[derive(Debug)]
pub struct ExtractResult {
    pub title: String,
    pub content: String,
    pub text: String,
}

// ── Public API ───────────────────────────────────────────────────────────────

pub async fn extract_article(
    fetcher: &Fetcher,
    url: Option<&str>,
) -> Result<ExtractResult, ExtractionError> {
    let url = require_url(url)?;
    let html = fetcher.fetch_html(&url).await?;
    tracing::debug!(url = %url, bytes = html.len(), "fetched page");
    Ok(extract_from_html(&html))
}

// ── URL validation ───────────────────────────────────────────────────────────

pub fn require_url(url: Option<&str>) -> Result<Url, ExtractionError> {
    let raw = url
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or(ExtractionError::MissingUrl)?;
    let parsed = Url::parse(raw)
        .map_err(|e| ExtractionError::InvalidUrl(format!("Invalid URL: {}", e)))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ExtractionError::InvalidUrl(
            "Only http and https URLs are allowed".to_string(),
        ));
    }
    Ok(parsed)
}

// ── Extraction pipeline ──────────────────────────────────────────────────────

/// Sources without an `<html>` or `<body>` tag are parsed as fragments so no
/// body is synthesized around them.
pub fn extract_from_html(html: &str) -> ExtractResult {
    let document = if has_document_tag(html) {
        Html::parse_document(html)
    } else {
        Html::parse_fragment(html)
    };
    extract_from_document(document)
}

fn has_document_tag(html: &str) -> bool {
    let lower = html.to_ascii_lowercase();
    ["<html", "<body"].iter().any(|tag| lower.contains(tag))
}

fn extract_from_document(mut document: Html) -> ExtractResult {
    prune(&mut document);
    let region = select_region(&document);
    ExtractResult {
        title: page_title(&document),
        content: region.html(),
        text: region.text(),
    }
}

/// Detach every pruned element, subtree included.
fn prune(document: &mut Html) {
    let ids: Vec<_> = document.select(&PRUNE_SEL).map(|el| el.id()).collect();
    for id in ids {
        if let Some(mut node) = document.tree.get_mut(id) {
            node.detach();
        }
    }
}

fn page_title(document: &Html) -> String {
    document
        .select(&TITLE_SEL)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| NO_TITLE.to_string())
}

// ── Region selection ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
enum RegionRule {
    Tag(&'static str),
    /// `class_needle` must be lowercase.
    TagWithClass {
        tag: &'static str,
        class_needle: &'static str,
    },
}

impl RegionRule {
    fn matches(&self, el: ElementRef<'_>) -> bool {
        match *self {
            RegionRule::Tag(tag) => has_tag(el, tag),
            RegionRule::TagWithClass { tag, class_needle } => {
                has_tag(el, tag) && has_class_containing(el, class_needle)
            }
        }
    }
}

enum Region<'a> {
    Element(ElementRef<'a>),
    Document(&'a Html),
}

impl Region<'_> {
    fn html(&self) -> String {
        match self {
            Region::Element(el) => el.html(),
            Region::Document(doc) if doc.tree.root().value().is_fragment() => {
                doc.root_element().inner_html()
            }
            Region::Document(doc) => doc.html(),
        }
    }

    fn text(&self) -> String {
        let nodes = match self {
            Region::Element(el) => el.text(),
            Region::Document(doc) => doc.root_element().text(),
        };
        nodes
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn select_region(document: &Html) -> Region<'_> {
    REGION_RULES
        .iter()
        .find_map(|rule| elements(document).find(|el| rule.matches(*el)))
        .map(Region::Element)
        .unwrap_or(Region::Document(document))
}

// ── DOM utility helpers ──────────────────────────────────────────────────────

/// Every element in the document, in document order.
fn elements(document: &Html) -> impl Iterator<Item = ElementRef<'_>> {
    document.tree.root().descendants().filter_map(ElementRef::wrap)
}

fn has_tag(el: ElementRef<'_>, tag: &str) -> bool {
    el.value().name().eq_ignore_ascii_case(tag)
}

fn has_class_containing(el: ElementRef<'_>, needle: &str) -> bool {
    el.value()
        .attr("class")
        .map(|class| class.to_lowercase().contains(needle))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO_PAGE: &str = "<html><head><title>T</title></head><body><nav>X</nav>\
        <article><p>Hello</p></article></body></html>";

    #[test]
    fn scenario_page_yields_article_fragment() {
        let result = extract_from_html(SCENARIO_PAGE);
        assert_eq!(result.title, "T");
        assert_eq!(result.content, "<article><p>Hello</p></article>");
        assert_eq!(result.text, "Hello");
    }

    #[test]
    fn article_wins_over_main_and_content_div() {
        let html = r#"<html><body>
            <main><p>main text</p></main>
            <div class="content"><p>div text</p></div>
            <article><p>article text</p></article>
        </body></html>"#;
        let result = extract_from_html(html);
        assert_eq!(result.content, "<article><p>article text</p></article>");
        assert_eq!(result.text, "article text");
    }

    #[test]
    fn first_article_is_used() {
        let html = "<body><article>one</article><article>two</article></body>";
        let result = extract_from_html(html);
        assert_eq!(result.content, "<article>one</article>");
    }

    #[test]
    fn main_wins_over_content_div() {
        let html = r#"<body><div class="content">div</div><main>main</main></body>"#;
        assert_eq!(extract_from_html(html).content, "<main>main</main>");
    }

    #[test]
    fn content_div_class_match_is_case_insensitive_substring() {
        let html = r#"<body><div class="wrapper">outer</div>
            <div class="page Main-Content-Area"><p>body copy</p></div></body>"#;
        let result = extract_from_html(html);
        assert_eq!(
            result.content,
            r#"<div class="page Main-Content-Area"><p>body copy</p></div>"#
        );
        assert_eq!(result.text, "body copy");
    }

    #[test]
    fn falls_back_to_body() {
        let html = r#"<html><head><title>Plain</title></head>
            <body><div class="wrapper"><p>first</p><p>second</p></div></body></html>"#;
        let result = extract_from_html(html);
        assert!(result.content.starts_with("<body>"));
        assert!(result.content.ends_with("</body>"));
        assert_eq!(result.text, "first\nsecond");
    }

    #[test]
    fn fragment_without_body_falls_back_to_whole_document() {
        let result = extract_from_html("<p>loose</p><span>bits</span>");
        assert_eq!(result.content, "<p>loose</p><span>bits</span>");
        assert_eq!(result.text, "loose\nbits");
        assert_eq!(result.title, NO_TITLE);
    }

    #[test]
    fn fragment_still_prunes_and_reads_title() {
        let result = extract_from_html("<title>Snippet</title><nav>menu</nav><p>kept</p>");
        assert_eq!(result.title, "Snippet");
        assert!(!result.content.contains("<nav"));
        assert!(result.content.contains("<p>kept</p>"));
    }

    #[test]
    fn document_tag_detection_is_case_insensitive() {
        assert!(has_document_tag("<!DOCTYPE html><HTML><p>x</p></HTML>"));
        assert!(has_document_tag("<Body class=\"a\">x</Body>"));
        assert!(!has_document_tag("<div class=\"content\">x</div>"));
    }

    #[test]
    fn explicit_body_is_still_selected() {
        let result = extract_from_html("<BODY><p>x</p></BODY>");
        assert_eq!(result.content, "<body><p>x</p></body>");
    }

    #[test]
    fn pruned_elements_are_removed_from_content_and_text() {
        let html = r#"<html><head><style>.x{}</style><script>var a = 1;</script></head><body>
            <header>Site header</header>
            <nav>Menu</nav>
            <article>
                <p>Keep me</p>
                <script>alert("x")</script>
                <style>p { color: red }</style>
                <iframe src="https://ads.example"></iframe>
                <noscript>Enable JS</noscript>
                <aside>Related</aside>
                <footer>Article footer</footer>
            </article>
            <footer>Site footer</footer>
        </body></html>"#;
        let result = extract_from_html(html);
        for tag in PRUNED_TAGS {
            assert!(
                !result.content.contains(&format!("<{}", tag)),
                "<{}> left in content: {}",
                tag,
                result.content
            );
        }
        for leaked in ["alert", "color: red", "Enable JS", "Related", "Article footer", "Menu"] {
            assert!(!result.text.contains(leaked), "{:?} leaked into text", leaked);
        }
        assert_eq!(result.text, "Keep me");
    }

    #[test]
    fn pruning_happens_before_region_selection() {
        let html = "<body><aside><article>sidebar</article></aside><main>real</main></body>";
        let result = extract_from_html(html);
        assert_eq!(result.content, "<main>real</main>");
    }

    #[test]
    fn missing_or_blank_title_uses_placeholder() {
        assert_eq!(extract_from_html("<body><p>x</p></body>").title, "No title");
        assert_eq!(
            extract_from_html("<head><title>   </title></head><body></body>").title,
            "No title"
        );
    }

    #[test]
    fn title_is_trimmed() {
        let result = extract_from_html("<head><title>\n  Spaced Out \n</title></head>");
        assert_eq!(result.title, "Spaced Out");
    }

    #[test]
    fn text_nodes_are_trimmed_and_joined_by_newline() {
        let html = "<article><h1> Heading </h1>\n<p>One <b>bold</b> two</p>\n\n<p>   </p></article>";
        let result = extract_from_html(html);
        assert_eq!(result.text, "Heading\nOne\nbold\ntwo");
    }

    #[test]
    fn extraction_is_idempotent() {
        let html = r#"<html><head><title>Same</title></head><body>
            <div class="post-content"><p>a</p><script>b()</script><p>c</p></div></body></html>"#;
        let first = extract_from_html(html);
        let second = extract_from_html(html);
        assert_eq!(first.content, second.content);
        assert_eq!(first.text, second.text);
    }

    #[test]
    fn require_url_rejects_missing_and_blank() {
        assert!(matches!(require_url(None), Err(ExtractionError::MissingUrl)));
        assert!(matches!(require_url(Some("  ")), Err(ExtractionError::MissingUrl)));
        assert_eq!(ExtractionError::MissingUrl.to_string(), "URL is required");
    }

    #[test]
    fn require_url_rejects_malformed_and_non_http() {
        let err = require_url(Some("not a url")).unwrap_err();
        assert!(matches!(err, ExtractionError::InvalidUrl(_)));
        assert!(err.is_client_error());

        let err = require_url(Some("file:///etc/passwd")).unwrap_err();
        assert!(matches!(err, ExtractionError::InvalidUrl(_)));
    }

    #[test]
    fn require_url_accepts_http_and_https() {
        assert_eq!(
            require_url(Some("http://example.com/a")).unwrap().as_str(),
            "http://example.com/a"
        );
        assert!(require_url(Some(" https://example.com ")).is_ok());
    }

    #[test]
    fn fetch_failures_are_not_client_errors() {
        assert!(!ExtractionError::Upstream(404).is_client_error());
        assert!(!ExtractionError::Request("refused".into()).is_client_error());
        assert!(!ExtractionError::Decode("bad".into()).is_client_error());
    }
}
