pub mod breadcrumb;
pub mod classifier;
pub mod error;
pub mod extractor;
pub mod result;
pub mod scan;
pub mod source;

pub use breadcrumb::{Breadcrumb, breadcrumb_from_ancestors, resolve_path};
pub use classifier::{Classifier, classify};
pub use error::{AuditError, Result};
pub use extractor::{ParsedMarkup, extract_candidates};
pub use result::{
    CandidateLink, ClassificationResult, Evidence, FlaggedCourseSet, LinkAttribute, TermCode,
};
pub use scan::{
    COURSE_PREFIX_LETTERS, DEFAULT_INSTITUTION, ForceCompletionLocator, LibraryMovieFinder,
    LibraryMovieOutcome, LocatedFile, LocatedItem, LocatorOutcome, PartitionFailure,
    ProgressCallback, ScanOutcome, ScanPass, TermScanner, USERNAME_LETTERS,
    flag_hardlink_courses,
};
pub use source::{ContentRecord, ForceCompletionItem, LibraryMovieFile, Partition, RowSource};
