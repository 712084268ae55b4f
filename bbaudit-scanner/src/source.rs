//! The storage-facing side of the engine.
//!
//! Everything the scan and path resolution need from the LMS database goes through
//! `RowSource`, so the engine never sees SQL.

use crate::error::Result;
use crate::result::TermCode;
use serde::{Deserialize, Serialize};

/// Content item markup belonging to one course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRecord {
    pub course_id: String,
    pub raw_markup: String,
}

/// A deployed test with Force Completion turned on, plus its primary instructor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForceCompletionItem {
    pub user_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub course_id: String,
    pub course_name: String,
    pub test_title: String,
    pub content_id: i64,
}

/// An e-reserve media page deployed in a course, e.g. `VT1234_casablanca.html`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryMovieFile {
    pub course_id: String,
    pub file_name: String,
    pub content_id: i64,
}

/// One slice of a term-wide query, keyed by a single leading letter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub term: TermCode,
    pub letter: char,
    /// SQL `LIKE` pattern for course identifiers.
    pub course_pattern: String,
    /// SQL `LIKE` pattern for instructor usernames.
    pub user_pattern: String,
}

impl Partition {
    /// Courses whose prefix starts with `letter`, e.g. `1157-NAU00-E%`.
    pub fn by_course_prefix(term: TermCode, institution: &str, letter: char) -> Self {
        Self {
            term,
            letter,
            course_pattern: format!("{}-{}-{}%", term, institution, letter),
            user_pattern: "%".to_string(),
        }
    }

    /// Every course in the term, restricted to instructors whose username starts with `letter`.
    pub fn by_username(term: TermCode, institution: &str, letter: char) -> Self {
        Self {
            term,
            letter,
            course_pattern: format!("{}-{}-%", term, institution),
            user_pattern: format!("{}%", letter),
        }
    }
}

pub trait RowSource {
    /// Content records whose markup may contain links, for courses matching the partition.
    fn query_content_by_prefix(&self, partition: &Partition) -> Result<Vec<ContentRecord>>;

    /// Course ids owning a deployed HTML file that breaks the institutional naming convention.
    fn query_unconventional_html_files(&self, partition: &Partition) -> Result<Vec<String>>;

    /// Titles from `leaf` up to the root, leaf first.
    fn query_ancestor_titles(&self, leaf: i64) -> Result<Vec<String>>;

    fn query_force_completion_items(&self, partition: &Partition)
    -> Result<Vec<ForceCompletionItem>>;

    /// Deployed files whose name follows the e-reserve naming convention exactly.
    fn query_library_movie_files(&self, partition: &Partition) -> Result<Vec<LibraryMovieFile>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_course_prefix_partition_pattern() {
        let partition = Partition::by_course_prefix(TermCode::new(1157), "NAU00", 'E');
        assert_eq!(partition.course_pattern, "1157-NAU00-E%");
        assert_eq!(partition.user_pattern, "%");
        assert_eq!(partition.letter, 'E');
    }

    #[test]
    fn test_username_partition_pattern() {
        let partition = Partition::by_username(TermCode::new(1174), "NAU00", 'q');
        assert_eq!(partition.course_pattern, "1174-NAU00-%");
        assert_eq!(partition.user_pattern, "q%");
    }
}
