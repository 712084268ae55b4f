use crate::result::{CandidateLink, LinkAttribute};
use scraper::{Html, Selector};
use std::sync::LazyLock;
use tracing::debug;

static ANCHOR_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("anchor selector is valid"));
static IMAGE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("img[src]").expect("image selector is valid"));

/// A content item's markup after a lenient HTML parse.
///
/// Parsing never fails: broken markup simply yields fewer (or no) candidates.
pub struct ParsedMarkup {
    course_id: String,
    document: Html,
}

impl ParsedMarkup {
    pub fn parse(course_id: &str, markup: &str) -> Self {
        Self {
            course_id: course_id.to_string(),
            document: Html::parse_fragment(markup),
        }
    }

    pub fn course_id(&self) -> &str {
        &self.course_id
    }

    /// Anchor `href` values first, then image `src` values, in document order.
    /// Each call walks the parsed tree again, so the sequence can be restarted.
    pub fn candidates(&self) -> impl Iterator<Item = CandidateLink> + '_ {
        let anchors = self
            .document
            .select(&ANCHOR_SELECTOR)
            .filter_map(|element| element.value().attr("href"))
            .map(move |url| self.candidate(url, LinkAttribute::Href));

        let images = self
            .document
            .select(&IMAGE_SELECTOR)
            .filter_map(|element| element.value().attr("src"))
            .map(move |url| self.candidate(url, LinkAttribute::Src));

        anchors.chain(images)
    }

    fn candidate(&self, url: &str, attribute: LinkAttribute) -> CandidateLink {
        debug!("Found {} candidate in {}: {}", attribute.as_str(), self.course_id, url);
        CandidateLink {
            url: url.to_string(),
            attribute,
            origin_course_id: self.course_id.clone(),
        }
    }
}

pub fn extract_candidates(course_id: &str, markup: &str) -> Vec<CandidateLink> {
    ParsedMarkup::parse(course_id, markup).candidates().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urls(links: &[CandidateLink]) -> Vec<&str> {
        links.iter().map(|l| l.url.as_str()).collect()
    }

    #[test]
    fn test_anchors_before_images() {
        let html = r#"<img src="/pic.png"><a href="/one">1</a><p><a href="/two">2</a></p>"#;
        let links = extract_candidates("C1", html);

        assert_eq!(urls(&links), vec!["/one", "/two", "/pic.png"]);
        assert_eq!(links[0].attribute, LinkAttribute::Href);
        assert_eq!(links[2].attribute, LinkAttribute::Src);
        assert!(links.iter().all(|l| l.origin_course_id == "C1"));
    }

    #[test]
    fn test_missing_attribute_is_skipped() {
        let html = r#"<a name="anchor">no href</a><img alt="no src">"#;
        assert!(extract_candidates("C1", html).is_empty());
    }

    #[test]
    fn test_empty_attribute_yields_empty_url() {
        let html = r#"<a href="">empty</a><img src>"#;
        let links = extract_candidates("C1", html);
        assert_eq!(urls(&links), vec!["", ""]);
    }

    #[test]
    fn test_malformed_markup_is_tolerated() {
        let html = r#"<div><a href="/still-found">unterminated <b><img src="x.png" <p></div></span>"#;
        let links = extract_candidates("C1", html);
        assert!(urls(&links).contains(&"/still-found"));

        assert!(extract_candidates("C1", "<<<>>> &&& </a>").is_empty());
        assert!(extract_candidates("C1", "").is_empty());
    }

    #[test]
    fn test_candidates_are_restartable() {
        let markup = ParsedMarkup::parse("C9", r#"<a href="a">a</a><img src="b">"#);
        let first: Vec<CandidateLink> = markup.candidates().collect();
        let second: Vec<CandidateLink> = markup.candidates().collect();
        assert_eq!(first, second);
        assert_eq!(markup.course_id(), "C9");
    }

    #[test]
    fn test_entities_are_decoded() {
        let links = extract_candidates("C1", r#"<a href="/x?a=1&amp;b=2">x</a>"#);
        assert_eq!(urls(&links), vec!["/x?a=1&b=2"]);
    }
}
