// Report rendering for audit outcomes

use bbaudit_scanner::{
    LibraryMovieOutcome, LocatedItem, LocatorOutcome, PartitionFailure, ScanOutcome, TermCode,
};
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n";

pub const HARDLINK_TSV_HEADER: &str = "Course_ID\tEvidence";
pub const FORCE_COMPLETION_TSV_HEADER: &str =
    "PI_UserID\tPI_FirstName\tPI_LastName\tPI_Email\tCourseID\tCourseName\tTestName\tPathToTest";
pub const LIBRARY_MOVIES_TSV_HEADER: &str = "CourseID\tFileName\tPathToFile";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    Text,
    Tsv,
    Json,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Some(ReportFormat::Text),
            "tsv" => Some(ReportFormat::Tsv),
            "json" => Some(ReportFormat::Json),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Text => "txt",
            ReportFormat::Tsv => "tsv",
            ReportFormat::Json => "json",
        }
    }
}

/// Local time with `:` replaced so the stamp is safe in file names, e.g. `2015-08-21T14-03-59`.
pub fn file_timestamp(now: DateTime<Local>) -> String {
    now.format("%Y-%m-%dT%H-%M-%S").to_string()
}

pub fn hardlink_report_filename(
    term: TermCode,
    aggressive: bool,
    format: ReportFormat,
    timestamp: &str,
) -> String {
    let mode = if aggressive { "aggressive" } else { "unaggressive" };
    format!(
        "hardlink_courses_report_{}_{}_{}.{}",
        mode,
        term,
        timestamp,
        format.extension()
    )
}

pub fn force_completion_report_filename(
    term: TermCode,
    format: ReportFormat,
    timestamp: &str,
) -> String {
    format!(
        "force_completion_report_{}_{}.{}",
        term,
        timestamp,
        format.extension()
    )
}

pub fn library_movies_report_filename(
    term: TermCode,
    format: ReportFormat,
    timestamp: &str,
) -> String {
    format!(
        "library_movies_report_{}_{}.{}",
        term,
        timestamp,
        format.extension()
    )
}

/// Tabs and line breaks inside a field would shift the columns.
fn tsv_field(value: &str) -> String {
    value.replace(['\t', '\r', '\n'], " ")
}

pub fn render_hardlink_report(
    outcome: &ScanOutcome,
    format: ReportFormat,
) -> Result<String, serde_json::Error> {
    match format {
        ReportFormat::Text => Ok(generate_hardlink_text(outcome)),
        ReportFormat::Tsv => Ok(generate_hardlink_tsv(outcome)),
        ReportFormat::Json => generate_hardlink_json(outcome),
    }
}

pub fn render_force_completion_report(
    outcome: &LocatorOutcome,
    format: ReportFormat,
) -> Result<String, serde_json::Error> {
    match format {
        ReportFormat::Text => Ok(generate_force_completion_text(outcome)),
        ReportFormat::Tsv => Ok(generate_force_completion_tsv(outcome)),
        ReportFormat::Json => generate_force_completion_json(outcome),
    }
}

/// One sorted course id per line under a `Course_ID` header.
pub fn generate_hardlink_text(outcome: &ScanOutcome) -> String {
    let mut report = String::from("Course_ID\n");
    for course_id in outcome.flagged.course_ids() {
        report.push_str(course_id);
        report.push('\n');
    }
    report
}

pub fn generate_hardlink_tsv(outcome: &ScanOutcome) -> String {
    let mut report = format!("{}\n", HARDLINK_TSV_HEADER);
    for (course_id, evidence) in outcome.flagged.iter() {
        report.push_str(&format!(
            "{}\t{}\n",
            tsv_field(course_id),
            tsv_field(&evidence.to_string())
        ));
    }
    report
}

pub fn generate_hardlink_json(outcome: &ScanOutcome) -> Result<String, serde_json::Error> {
    let json_report = serde_json::json!({
        "report": {
            "metadata": metadata("hardlinks"),
            "audit": {
                "term": outcome.term,
                "aggressive": outcome.aggressive,
                "complete": outcome.is_complete(),
                "partitions_scanned": outcome.partitions_scanned,
                "failed_partitions": outcome.failures,
            },
            "summary": {
                "flagged_courses": outcome.flagged.len(),
            },
            "courses": outcome.flagged,
        }
    });

    serde_json::to_string_pretty(&json_report)
}

pub fn generate_force_completion_tsv(outcome: &LocatorOutcome) -> String {
    let mut report = format!("{}\n", FORCE_COMPLETION_TSV_HEADER);
    for located in &outcome.items {
        report.push_str(&tsv_row(located));
        report.push('\n');
    }
    report
}

fn tsv_row(located: &LocatedItem) -> String {
    let item = &located.item;
    let path = located.path.to_string();
    [
        item.user_id.as_str(),
        item.first_name.as_str(),
        item.last_name.as_str(),
        item.email.as_str(),
        item.course_id.as_str(),
        item.course_name.as_str(),
        item.test_title.as_str(),
        path.as_str(),
    ]
    .iter()
    .map(|field| tsv_field(field))
    .collect::<Vec<_>>()
    .join("\t")
}

pub fn generate_force_completion_text(outcome: &LocatorOutcome) -> String {
    let mut report = String::new();

    report.push_str(RULE);
    report.push_str(&format!("FORCE COMPLETION TESTS - TERM {}\n", outcome.term));
    report.push_str(RULE);
    report.push('\n');
    report.push_str(&format!("Tests found: {}\n\n", outcome.items.len()));

    for (idx, located) in outcome.items.iter().enumerate() {
        let item = &located.item;
        report.push_str(&format!("[{}] {}\n", idx + 1, item.test_title));
        report.push_str(&format!("Course:       {} ({})\n", item.course_id, item.course_name));
        report.push_str(&format!(
            "Instructor:   {} {} <{}> ({})\n",
            item.first_name, item.last_name, item.email, item.user_id
        ));
        let path = if located.path.is_empty() {
            "(unknown)".to_string()
        } else {
            located.path.to_string()
        };
        report.push_str(&format!("Path:         {}\n\n", path));
    }

    if !outcome.failures.is_empty() {
        report.push_str(&format_failures(&outcome.failures));
    }

    report
}

pub fn generate_force_completion_json(
    outcome: &LocatorOutcome,
) -> Result<String, serde_json::Error> {
    let json_report = serde_json::json!({
        "report": {
            "metadata": metadata("force_completion"),
            "audit": {
                "term": outcome.term,
                "complete": outcome.is_complete(),
                "failed_partitions": outcome.failures,
            },
            "summary": {
                "tests": outcome.items.len(),
            },
            "items": outcome.items,
        }
    });

    serde_json::to_string_pretty(&json_report)
}

pub fn render_library_movie_report(
    outcome: &LibraryMovieOutcome,
    format: ReportFormat,
) -> Result<String, serde_json::Error> {
    match format {
        ReportFormat::Text => Ok(generate_library_movie_text(outcome)),
        ReportFormat::Tsv => Ok(generate_library_movie_tsv(outcome)),
        ReportFormat::Json => generate_library_movie_json(outcome),
    }
}

pub fn generate_library_movie_tsv(outcome: &LibraryMovieOutcome) -> String {
    let mut report = format!("{}\n", LIBRARY_MOVIES_TSV_HEADER);
    for located in &outcome.files {
        report.push_str(&format!(
            "{}\t{}\t{}\n",
            tsv_field(&located.file.course_id),
            tsv_field(&located.file.file_name),
            tsv_field(&located.path.to_string())
        ));
    }
    report
}

pub fn generate_library_movie_text(outcome: &LibraryMovieOutcome) -> String {
    let mut report = String::new();

    report.push_str(RULE);
    report.push_str(&format!("LIBRARY E-RESERVE FILES - TERM {}\n", outcome.term));
    report.push_str(RULE);
    report.push('\n');
    report.push_str(&format!("Files found: {}\n\n", outcome.files.len()));

    for located in &outcome.files {
        report.push_str(&format!(
            "{}  {}\n",
            located.file.course_id, located.file.file_name
        ));
        if !located.path.is_empty() {
            report.push_str(&format!("    {}\n", located.path));
        }
    }

    if !outcome.failures.is_empty() {
        report.push('\n');
        report.push_str(&format_failures(&outcome.failures));
    }

    report
}

pub fn generate_library_movie_json(
    outcome: &LibraryMovieOutcome,
) -> Result<String, serde_json::Error> {
    let json_report = serde_json::json!({
        "report": {
            "metadata": metadata("library_movies"),
            "audit": {
                "term": outcome.term,
                "complete": outcome.is_complete(),
                "failed_partitions": outcome.failures,
            },
            "summary": {
                "files": outcome.files.len(),
            },
            "files": outcome.files,
        }
    });

    serde_json::to_string_pretty(&json_report)
}

fn metadata(kind: &str) -> serde_json::Value {
    serde_json::json!({
        "generator": "bbaudit",
        "version": env!("CARGO_PKG_VERSION"),
        "generated_at": Utc::now().to_rfc3339(),
        "audit": kind,
    })
}

/// Lists skipped partitions so a reader knows the result is partial.
pub fn format_failures(failures: &[PartitionFailure]) -> String {
    let mut out = String::new();
    out.push_str(RULE);
    out.push_str("INCOMPLETE: the following partitions could not be queried\n");
    out.push_str(RULE);
    for failure in failures {
        out.push_str(&format!(
            "  '{}' ({}): {}\n",
            failure.letter,
            failure.pass.as_str(),
            failure.error
        ));
    }
    out
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

/// `explicit` if given, otherwise `default_name` inside `directory`.
pub fn resolve_report_path(
    explicit: Option<&Path>,
    directory: &Path,
    default_name: &str,
) -> PathBuf {
    match explicit {
        Some(path) => path.to_path_buf(),
        None => directory.join(default_name),
    }
}
