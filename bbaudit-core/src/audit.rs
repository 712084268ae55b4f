use crate::config::Config;
use crate::data::Database;
use bbaudit_scanner::{
    AuditError, Breadcrumb, Classifier, ForceCompletionLocator, LibraryMovieFinder,
    LibraryMovieOutcome, LocatorOutcome, Result, ScanOutcome, TermCode, TermScanner,
    resolve_path,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::info;

/// Options for a single audit run
pub struct AuditOptions {
    pub term: TermCode,
    pub aggressive: bool,
    pub show_progress_bars: bool,
}

/// Callback for reporting audit progress
pub type AuditProgressCallback = Arc<dyn Fn(String) + Send + Sync>;

/// One open snapshot plus the settings every audit in this run shares.
///
/// The connection is released when the session is dropped; `close` does the same
/// but reports errors.
pub struct AuditSession {
    db: Database,
    path: PathBuf,
    classifier: Classifier,
    institution: String,
}

impl AuditSession {
    /// Opens the snapshot named in `config` read-only.
    pub fn open(config: &Config) -> Result<Self> {
        let path = config.database_path();
        if !Database::exists(&path) {
            return Err(AuditError::Other(format!(
                "Database not found at {}. Run `bbaudit init` first",
                path.display()
            )));
        }

        let db = Database::open(&path).map_err(AuditError::row_source)?;
        Self::with_database(db, &path, config)
    }

    /// Wraps an already open database, e.g. one just built by a test.
    pub fn with_database(db: Database, path: &Path, config: &Config) -> Result<Self> {
        let db = db.with_html_naming_pattern(&config.institution.html_naming_pattern)?;
        info!("Opened audit session on {}", path.display());

        Ok(Self {
            db,
            path: path.to_path_buf(),
            classifier: config.classifier(),
            institution: config.institution.code.clone(),
        })
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn institution(&self) -> &str {
        &self.institution
    }

    pub fn scanner(&self) -> TermScanner<'_, Database> {
        TermScanner::new(&self.db)
            .with_classifier(self.classifier.clone())
            .with_institution(self.institution.clone())
    }

    pub fn locator(&self) -> ForceCompletionLocator<'_, Database> {
        ForceCompletionLocator::new(&self.db).with_institution(self.institution.clone())
    }

    pub fn library_movie_finder(&self) -> LibraryMovieFinder<'_, Database> {
        LibraryMovieFinder::new(&self.db).with_institution(self.institution.clone())
    }

    pub fn close(self) -> Result<()> {
        info!("Closing audit session on {}", self.path.display());
        self.db.close().map_err(AuditError::row_source)
    }
}

fn progress_spinner(show: bool, message: &str) -> Option<Arc<ProgressBar>> {
    if !show {
        return None;
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    Some(Arc::new(pb))
}

/// Builds the per-partition callback handed to the engine: ticks the spinner and
/// forwards the message to the caller.
fn partition_callback(
    progress_bar: Option<Arc<ProgressBar>>,
    progress_callback: Option<AuditProgressCallback>,
    total: usize,
) -> bbaudit_scanner::ProgressCallback {
    let processed = Arc::new(AtomicUsize::new(0));

    Arc::new(move |letter: char, message: String| {
        let count = processed.fetch_add(1, Ordering::Relaxed) + 1;
        if let Some(ref pb) = progress_bar {
            pb.set_message(format!("[{}/{}] {}", count, total, message));
            pb.tick();
        }
        if let Some(ref callback) = progress_callback {
            callback(format!("Partition '{}': {}", letter, message));
        }
    })
}

/// Runs the hardlink audit for one term.
pub fn execute_hardlink_audit(
    session: &AuditSession,
    options: &AuditOptions,
    progress_callback: Option<AuditProgressCallback>,
) -> ScanOutcome {
    let progress_bar = progress_spinner(options.show_progress_bars, "Starting hardlink audit...");
    let total = bbaudit_scanner::COURSE_PREFIX_LETTERS.count();

    let outcome = session
        .scanner()
        .with_progress_callback(partition_callback(
            progress_bar.clone(),
            progress_callback,
            total,
        ))
        .scan_term(options.term, options.aggressive);

    if let Some(ref pb) = progress_bar {
        pb.finish_with_message(format!(
            "Hardlink audit complete! {} course(s) flagged",
            outcome.flagged.len()
        ));
    }

    outcome
}

/// Runs the force-completion audit for one term.
pub fn execute_force_completion_audit(
    session: &AuditSession,
    options: &AuditOptions,
    progress_callback: Option<AuditProgressCallback>,
) -> LocatorOutcome {
    let progress_bar =
        progress_spinner(options.show_progress_bars, "Starting force completion audit...");
    let total = bbaudit_scanner::USERNAME_LETTERS.count();

    let outcome = session
        .locator()
        .with_progress_callback(partition_callback(
            progress_bar.clone(),
            progress_callback,
            total,
        ))
        .locate(options.term);

    if let Some(ref pb) = progress_bar {
        pb.finish_with_message(format!(
            "Force completion audit complete! {} test(s) found",
            outcome.items.len()
        ));
    }

    outcome
}

/// Lists library e-reserve movie pages deployed in one term.
pub fn execute_library_movie_audit(
    session: &AuditSession,
    options: &AuditOptions,
    progress_callback: Option<AuditProgressCallback>,
) -> LibraryMovieOutcome {
    let progress_bar = progress_spinner(options.show_progress_bars, "Starting e-reserve audit...");
    let total = bbaudit_scanner::COURSE_PREFIX_LETTERS.count();

    let outcome = session
        .library_movie_finder()
        .with_progress_callback(partition_callback(
            progress_bar.clone(),
            progress_callback,
            total,
        ))
        .find(options.term);

    if let Some(ref pb) = progress_bar {
        pb.finish_with_message(format!(
            "E-reserve audit complete! {} file(s) found",
            outcome.files.len()
        ));
    }

    outcome
}

/// Breadcrumb for a single content node.
pub fn locate_content(session: &AuditSession, node_id: i64) -> Result<Breadcrumb> {
    resolve_path(session.database(), node_id)
}
