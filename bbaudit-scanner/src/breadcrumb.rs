use crate::error::Result;
use crate::source::RowSource;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Title the LMS stores for the "Course Content" organizer page.
pub const ORGANIZER_PAGES_LABEL: &str = "VISTA_ORGANIZER_PAGES.label";
/// Title the LMS stores for the default "Content" area link.
pub const CONTENT_LINK_LABEL: &str = "COURSE_DEFAULT.Content.CONTENT_LINK.label";

pub const SEPARATOR: &str = " > ";

/// Synthetic root plus the course organizer placeholder.
const HIDDEN_ROOT_LEVELS: usize = 2;

/// Root-to-leaf display titles of a content item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Breadcrumb(Vec<String>);

impl Breadcrumb {
    pub fn titles(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Display for Breadcrumb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(SEPARATOR))
    }
}

/// Swaps the two reserved LMS label keys for what users actually see.
pub fn display_title(title: String) -> String {
    match title.as_str() {
        ORGANIZER_PAGES_LABEL => "Course Content".to_string(),
        CONTENT_LINK_LABEL => "Content".to_string(),
        _ => title,
    }
}

/// Builds a breadcrumb from ancestor titles ordered leaf first.
///
/// A chain with fewer than three titles has nothing below the course root and
/// produces an empty breadcrumb.
pub fn breadcrumb_from_ancestors(mut leaf_first: Vec<String>) -> Breadcrumb {
    leaf_first.reverse();
    let root_first = leaf_first;

    if root_first.len() <= HIDDEN_ROOT_LEVELS {
        return Breadcrumb::default();
    }

    Breadcrumb(
        root_first
            .into_iter()
            .skip(HIDDEN_ROOT_LEVELS)
            .map(display_title)
            .collect(),
    )
}

pub fn resolve_path<S: RowSource + ?Sized>(source: &S, leaf: i64) -> Result<Breadcrumb> {
    let ancestors = source.query_ancestor_titles(leaf)?;
    debug!("Content node {} has {} ancestors", leaf, ancestors.len());
    Ok(breadcrumb_from_ancestors(ancestors))
}
