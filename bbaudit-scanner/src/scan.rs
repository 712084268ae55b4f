use crate::breadcrumb::{Breadcrumb, resolve_path};
use crate::classifier::Classifier;
use crate::error::AuditError;
use crate::extractor::ParsedMarkup;
use crate::result::{Evidence, FlaggedCourseSet, TermCode};
use crate::source::{ContentRecord, ForceCompletionItem, LibraryMovieFile, Partition, RowSource};
use serde::Serialize;
use std::ops::RangeInclusive;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const COURSE_PREFIX_LETTERS: RangeInclusive<char> = 'A'..='Z';
pub const USERNAME_LETTERS: RangeInclusive<char> = 'a'..='z';

pub const DEFAULT_INSTITUTION: &str = "NAU00";

pub type ProgressCallback = Arc<dyn Fn(char, String) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanPass {
    ContentLinks,
    DeployedHtmlFiles,
    ForceCompletion,
    LibraryMovies,
}

impl ScanPass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanPass::ContentLinks => "content links",
            ScanPass::DeployedHtmlFiles => "deployed HTML files",
            ScanPass::ForceCompletion => "force completion",
            ScanPass::LibraryMovies => "library movies",
        }
    }
}

/// A partition whose query failed and whose rows are missing from the result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartitionFailure {
    pub letter: char,
    pub pass: ScanPass,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanOutcome {
    pub term: TermCode,
    pub aggressive: bool,
    pub flagged: FlaggedCourseSet,
    pub partitions_scanned: usize,
    pub failures: Vec<PartitionFailure>,
}

impl ScanOutcome {
    /// False when at least one partition was skipped, so an empty result is not conclusive.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Flags every course with at least one hardlink among `records`.
///
/// Once a course is flagged its remaining candidates and records are not looked at.
/// The recorded evidence is the normalized form of the first offending URL.
pub fn flag_hardlink_courses(
    classifier: &Classifier,
    records: &[ContentRecord],
    aggressive: bool,
) -> FlaggedCourseSet {
    let mut flagged = FlaggedCourseSet::new();

    for record in records {
        if flagged.contains(&record.course_id) {
            continue;
        }

        let markup = ParsedMarkup::parse(&record.course_id, &record.raw_markup);
        if let Some(hit) = markup
            .candidates()
            .find(|candidate| classifier.is_hardlink(&candidate.url, aggressive))
        {
            let url = classifier.normalize(&hit.url);
            debug!("Flagged {} for {}", record.course_id, url);
            flagged.insert(record.course_id.clone(), Evidence::Hardlink(url));
        }
    }

    flagged
}

/// Walks a whole term one course-prefix letter at a time.
pub struct TermScanner<'a, S: RowSource + ?Sized> {
    source: &'a S,
    classifier: Classifier,
    institution: String,
    letters: Vec<char>,
    progress_callback: Option<ProgressCallback>,
}

impl<'a, S: RowSource + ?Sized> TermScanner<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self {
            source,
            classifier: Classifier::default(),
            institution: DEFAULT_INSTITUTION.to_string(),
            letters: COURSE_PREFIX_LETTERS.collect(),
            progress_callback: None,
        }
    }

    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_institution(mut self, institution: impl Into<String>) -> Self {
        self.institution = institution.into();
        self
    }

    /// Overrides the partition letters and the order they are visited in.
    pub fn with_letters(mut self, letters: impl IntoIterator<Item = char>) -> Self {
        self.letters = letters.into_iter().collect();
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn scan_term(&self, term: TermCode, aggressive: bool) -> ScanOutcome {
        info!(
            "Scanning {} for hardlinks across {} partitions (aggressive: {})",
            term,
            self.letters.len(),
            aggressive
        );

        let mut outcome = ScanOutcome {
            term,
            aggressive,
            flagged: FlaggedCourseSet::new(),
            partitions_scanned: 0,
            failures: Vec::new(),
        };

        for &letter in &self.letters {
            let partition = Partition::by_course_prefix(term, &self.institution, letter);

            if let Some(ref callback) = self.progress_callback {
                callback(
                    letter,
                    format!("Checking courses matching {}", partition.course_pattern),
                );
            }

            match self.scan_partition(&partition, aggressive) {
                Ok(flagged) => {
                    info!(
                        "Partition '{}' returned {} flagged course(s)",
                        letter,
                        flagged.len()
                    );
                    outcome.flagged.merge(flagged);
                    outcome.partitions_scanned += 1;
                }
                Err((pass, e)) => {
                    warn!("Skipping partition '{}' ({}): {}", letter, pass.as_str(), e);
                    outcome.failures.push(PartitionFailure {
                        letter,
                        pass,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            "Scan of {} complete. {} course(s) flagged, {} partition(s) failed",
            term,
            outcome.flagged.len(),
            outcome.failures.len()
        );
        outcome
    }

    fn scan_partition(
        &self,
        partition: &Partition,
        aggressive: bool,
    ) -> std::result::Result<FlaggedCourseSet, (ScanPass, AuditError)> {
        let records = self
            .source
            .query_content_by_prefix(partition)
            .map_err(|e| (ScanPass::ContentLinks, e))?;
        debug!(
            "Partition '{}' returned {} content record(s)",
            partition.letter,
            records.len()
        );

        let mut flagged = flag_hardlink_courses(&self.classifier, &records, aggressive);

        if aggressive {
            let course_ids = self
                .source
                .query_unconventional_html_files(partition)
                .map_err(|e| (ScanPass::DeployedHtmlFiles, e))?;
            for course_id in course_ids {
                flagged.insert(course_id, Evidence::DeployedHtmlFile);
            }
        }

        Ok(flagged)
    }
}

/// A force-completion test and where to find it inside its course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocatedItem {
    #[serde(flatten)]
    pub item: ForceCompletionItem,
    pub path: Breadcrumb,
}

#[derive(Debug, Clone, Serialize)]
pub struct LocatorOutcome {
    pub term: TermCode,
    pub items: Vec<LocatedItem>,
    pub failures: Vec<PartitionFailure>,
}

impl LocatorOutcome {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Finds Force Completion tests one instructor-username letter at a time and
/// resolves the breadcrumb for each.
pub struct ForceCompletionLocator<'a, S: RowSource + ?Sized> {
    source: &'a S,
    institution: String,
    letters: Vec<char>,
    progress_callback: Option<ProgressCallback>,
}

impl<'a, S: RowSource + ?Sized> ForceCompletionLocator<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self {
            source,
            institution: DEFAULT_INSTITUTION.to_string(),
            letters: USERNAME_LETTERS.collect(),
            progress_callback: None,
        }
    }

    pub fn with_institution(mut self, institution: impl Into<String>) -> Self {
        self.institution = institution.into();
        self
    }

    pub fn with_letters(mut self, letters: impl IntoIterator<Item = char>) -> Self {
        self.letters = letters.into_iter().collect();
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn locate(&self, term: TermCode) -> LocatorOutcome {
        info!("Querying {} for tests with Force Completion", term);

        let mut outcome = LocatorOutcome {
            term,
            items: Vec::new(),
            failures: Vec::new(),
        };

        for &letter in &self.letters {
            let partition = Partition::by_username(term, &self.institution, letter);

            if let Some(ref callback) = self.progress_callback {
                callback(
                    letter,
                    format!("Checking instructors matching {}", partition.user_pattern),
                );
            }

            let items = match self.source.query_force_completion_items(&partition) {
                Ok(items) => items,
                Err(e) => {
                    warn!("Skipping usernames starting with '{}': {}", letter, e);
                    outcome.failures.push(PartitionFailure {
                        letter,
                        pass: ScanPass::ForceCompletion,
                        error: e.to_string(),
                    });
                    continue;
                }
            };

            info!(
                "Force Completion results for usernames starting with '{}' returned {} test(s)",
                letter,
                items.len()
            );

            for item in items {
                let path = path_or_empty(self.source, item.content_id);
                outcome.items.push(LocatedItem { item, path });
            }
        }

        outcome
    }
}

fn path_or_empty<S: RowSource + ?Sized>(source: &S, content_id: i64) -> Breadcrumb {
    match resolve_path(source, content_id) {
        Ok(path) => path,
        Err(e) => {
            warn!("Could not resolve path to content {}: {}", content_id, e);
            Breadcrumb::default()
        }
    }
}

/// An e-reserve media page and the content item it is deployed under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocatedFile {
    #[serde(flatten)]
    pub file: LibraryMovieFile,
    pub path: Breadcrumb,
}

#[derive(Debug, Clone, Serialize)]
pub struct LibraryMovieOutcome {
    pub term: TermCode,
    pub files: Vec<LocatedFile>,
    pub failures: Vec<PartitionFailure>,
}

impl LibraryMovieOutcome {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Lists library e-reserve movie pages course-prefix letter by letter, so the
/// library can check which licensed titles a term still links to.
pub struct LibraryMovieFinder<'a, S: RowSource + ?Sized> {
    source: &'a S,
    institution: String,
    letters: Vec<char>,
    progress_callback: Option<ProgressCallback>,
}

impl<'a, S: RowSource + ?Sized> LibraryMovieFinder<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self {
            source,
            institution: DEFAULT_INSTITUTION.to_string(),
            letters: COURSE_PREFIX_LETTERS.collect(),
            progress_callback: None,
        }
    }

    pub fn with_institution(mut self, institution: impl Into<String>) -> Self {
        self.institution = institution.into();
        self
    }

    pub fn with_letters(mut self, letters: impl IntoIterator<Item = char>) -> Self {
        self.letters = letters.into_iter().collect();
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Files come back sorted by course id, then file name.
    pub fn find(&self, term: TermCode) -> LibraryMovieOutcome {
        info!("Checking {} courses for e-reserve files", term);

        let mut outcome = LibraryMovieOutcome {
            term,
            files: Vec::new(),
            failures: Vec::new(),
        };

        for &letter in &self.letters {
            let partition = Partition::by_course_prefix(term, &self.institution, letter);

            if let Some(ref callback) = self.progress_callback {
                callback(
                    letter,
                    format!("Checking files in {}", partition.course_pattern),
                );
            }

            match self.source.query_library_movie_files(&partition) {
                Ok(files) => {
                    debug!(
                        "Partition '{}' returned {} e-reserve file(s)",
                        letter,
                        files.len()
                    );
                    for file in files {
                        let path = path_or_empty(self.source, file.content_id);
                        outcome.files.push(LocatedFile { file, path });
                    }
                }
                Err(e) => {
                    warn!("Skipping partition '{}' (library movies): {}", letter, e);
                    outcome.failures.push(PartitionFailure {
                        letter,
                        pass: ScanPass::LibraryMovies,
                        error: e.to_string(),
                    });
                }
            }
        }

        outcome.files.sort_by(|a, b| {
            (&a.file.course_id, &a.file.file_name).cmp(&(&b.file.course_id, &b.file.file_name))
        });

        info!(
            "Found {} e-reserve file(s) in {}, {} partition(s) failed",
            outcome.files.len(),
            term,
            outcome.failures.len()
        );
        outcome
    }
}
