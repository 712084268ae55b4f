//! The hardlink rule chain.
//!
//! Rules are evaluated in a fixed order and the first one that matches decides.
//! The string constants below were tuned against one LMS deployment and are kept verbatim.

use crate::result::ClassificationResult;
use regex::Regex;
use std::sync::LazyLock;

pub const DEFAULT_HOST_PREFIX: &str = "https://bblearn.nau.edu/";
pub const DEFAULT_HOST_MARKER: &str = "bblearn";

static TEMPLATE_HOST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@X@.*?@X@").expect("template host pattern is valid"));

static DEFAULT_CLASSIFIER: LazyLock<Classifier> = LazyLock::new(Classifier::default);

const RISKY_FRAGMENTS: [&str; 3] = ["courses", "webapp", "bbcswebdav"];

const SAFE_INTERNAL_FRAGMENTS: [&str; 6] = [
    "execute/viewDocumentation?",
    "wvms-bb-BBLEARN",
    "bb-collaborate-BBLEARN",
    "/xid-",
    "webapps/vtbe-tinymce/tiny_mce",
    "webapps/login",
];

const SCHEMED_PREFIXES: [&str; 5] = ["https://", "http://", "javascript:", "mailto:", "#"];

/// Classifies URLs for one LMS deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classifier {
    host_prefix: String,
    host_marker: String,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(DEFAULT_HOST_PREFIX, DEFAULT_HOST_MARKER)
    }
}

impl Classifier {
    /// `host_prefix` replaces templated `@X@...@X@` placeholders; `host_marker` is the
    /// substring that identifies the LMS's own host in absolute URLs.
    pub fn new(host_prefix: impl Into<String>, host_marker: impl Into<String>) -> Self {
        Self {
            host_prefix: host_prefix.into(),
            host_marker: host_marker.into(),
        }
    }

    pub fn host_prefix(&self) -> &str {
        &self.host_prefix
    }

    pub fn host_marker(&self) -> &str {
        &self.host_marker
    }

    /// Expands templated host placeholders and drops one leading `%20`.
    pub fn normalize(&self, url: &str) -> String {
        let expanded = TEMPLATE_HOST.replace_all(url, regex::NoExpand(self.host_prefix.as_str()));
        match expanded.strip_prefix("%20") {
            Some(rest) => rest.to_string(),
            None => expanded.into_owned(),
        }
    }

    pub fn is_hardlink(&self, url: &str, aggressive: bool) -> bool {
        let url = self.normalize(url);

        if url.contains("xid") && url.contains("bbcswebdav") {
            return false;
        }

        if (url.starts_with("http://") || url.starts_with("https://") || url.starts_with("www"))
            && !url.contains(&self.host_marker)
        {
            return false;
        }

        if url.starts_with("/images/ci/") {
            return false;
        }

        if !SCHEMED_PREFIXES.iter().any(|prefix| url.starts_with(prefix)) {
            return aggressive;
        }

        RISKY_FRAGMENTS.iter().any(|fragment| url.contains(fragment))
            && !SAFE_INTERNAL_FRAGMENTS
                .iter()
                .any(|fragment| url.contains(fragment))
    }

    pub fn evaluate(&self, url: &str, aggressive: bool) -> ClassificationResult {
        ClassificationResult {
            url: url.to_string(),
            is_hardlink: self.is_hardlink(url, aggressive),
        }
    }
}

/// Classifies `url` with the default deployment settings.
pub fn classify(url: &str, aggressive: bool) -> bool {
    DEFAULT_CLASSIFIER.is_hardlink(url, aggressive)
}
