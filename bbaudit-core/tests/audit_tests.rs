// Tests for audit sessions and the audit drivers

use bbaudit_core::audit::{
    AuditOptions, AuditProgressCallback, AuditSession, execute_force_completion_audit,
    execute_hardlink_audit, execute_library_movie_audit, locate_content,
};
use bbaudit_core::config::Config;
use bbaudit_core::data::{ContentNode, Database, PRIMARY_INSTRUCTOR_ROLE};
use bbaudit_scanner::{AuditError, Evidence, TermCode};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

fn config_for(db_path: &Path) -> Config {
    let mut config = Config::default();
    config.database.path = db_path.to_string_lossy().to_string();
    config
}

/// Builds a small snapshot for term 1157 and returns the content id of the force-completion test.
fn seed_snapshot(db_path: &Path) -> i64 {
    let db = Database::new(db_path).unwrap();

    let eng = db.insert_course("1157-NAU00-ENG-105-SEC01", "English").unwrap();
    let root = db.insert_content(&ContentNode::folder(eng, None, "--TOP--")).unwrap();
    let placeholder = db
        .insert_content(&ContentNode::folder(eng, Some(root), "COURSE_ORGANIZER"))
        .unwrap();
    let organizer = db
        .insert_content(&ContentNode::folder(
            eng,
            Some(placeholder),
            "VISTA_ORGANIZER_PAGES.label",
        ))
        .unwrap();
    let content = db
        .insert_content(&ContentNode::folder(
            eng,
            Some(organizer),
            "COURSE_DEFAULT.Content.CONTENT_LINK.label",
        ))
        .unwrap();
    db.insert_content(&ContentNode::document(
        eng,
        Some(content),
        "Week 1",
        r#"<a href="https://bblearn.nau.edu/bbcswebdav/courses/ENG/notes.pdf">notes</a>"#,
    ))
    .unwrap();

    let art = db.insert_course("1157-NAU00-ART-101-SEC01", "Art").unwrap();
    db.insert_content(&ContentNode::document(
        art,
        None,
        "Gallery",
        r#"<a href="https://www.moma.org/">MoMA</a><a href="gallery/room1.html">room</a>"#,
    ))
    .unwrap();

    let his = db.insert_course("1157-NAU00-HIS-100-SEC01", "History").unwrap();
    db.insert_file_item(his, None, "timeline.html").unwrap();
    db.insert_file_item(eng, Some(content), "DVD1017_hamlet.html")
        .unwrap();

    let other_term = db.insert_course("1161-NAU00-ENG-105-SEC01", "English").unwrap();
    db.insert_content(&ContentNode::document(
        other_term,
        None,
        "Week 1",
        r#"<a href="https://bblearn.nau.edu/webapps/blackboard/content">x</a>"#,
    ))
    .unwrap();

    let instructor = db.insert_user("jdoe", "Jane", "Doe", "jane.doe@nau.edu").unwrap();
    db.enroll(eng, instructor, PRIMARY_INSTRUCTOR_ROLE).unwrap();
    let test = db
        .insert_assessment(eng, Some(content), "Final Exam", true)
        .unwrap();

    db.close().unwrap();
    test
}

fn open_session() -> (TempDir, AuditSession, i64) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("snapshot.sqlite3");
    let test = seed_snapshot(&db_path);
    let session = AuditSession::open(&config_for(&db_path)).unwrap();
    (temp_dir, session, test)
}

fn options(aggressive: bool) -> AuditOptions {
    AuditOptions {
        term: TermCode::new(1157),
        aggressive,
        show_progress_bars: false,
    }
}

// ============================================================================
// Session Tests
// ============================================================================

#[test]
fn test_open_missing_snapshot() {
    let temp_dir = TempDir::new().unwrap();
    let config = config_for(&temp_dir.path().join("missing.sqlite3"));

    let result = AuditSession::open(&config);
    assert!(matches!(result, Err(AuditError::Other(ref msg)) if msg.contains("bbaudit init")));
}

#[test]
fn test_open_rejects_bad_naming_pattern() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("snapshot.sqlite3");
    seed_snapshot(&db_path);

    let mut config = config_for(&db_path);
    config.institution.html_naming_pattern = "(".to_string();
    assert!(matches!(
        AuditSession::open(&config),
        Err(AuditError::InvalidPattern(_))
    ));
}

#[test]
fn test_session_close() {
    let (_temp_dir, session, _) = open_session();
    assert_eq!(session.institution(), "NAU00");
    assert!(session.close().is_ok());
}

// ============================================================================
// Hardlink Audit Tests
// ============================================================================

#[test]
fn test_unaggressive_hardlink_audit() {
    let (_temp_dir, session, _) = open_session();
    let outcome = execute_hardlink_audit(&session, &options(false), None);

    assert!(outcome.is_complete());
    let ids: Vec<&str> = outcome.flagged.course_ids().collect();
    assert_eq!(ids, vec!["1157-NAU00-ENG-105-SEC01"]);
    assert_eq!(
        outcome.flagged.evidence("1157-NAU00-ENG-105-SEC01"),
        Some(&Evidence::Hardlink(
            "https://bblearn.nau.edu/bbcswebdav/courses/ENG/notes.pdf".to_string()
        ))
    );
}

#[test]
fn test_aggressive_hardlink_audit() {
    let (_temp_dir, session, _) = open_session();
    let outcome = execute_hardlink_audit(&session, &options(true), None);

    let ids: Vec<&str> = outcome.flagged.course_ids().collect();
    assert_eq!(
        ids,
        vec![
            "1157-NAU00-ART-101-SEC01",
            "1157-NAU00-ENG-105-SEC01",
            "1157-NAU00-HIS-100-SEC01"
        ]
    );
    assert_eq!(
        outcome.flagged.evidence("1157-NAU00-HIS-100-SEC01"),
        Some(&Evidence::DeployedHtmlFile)
    );
}

#[test]
fn test_aggressive_is_superset() {
    let (_temp_dir, session, _) = open_session();
    let lazy = execute_hardlink_audit(&session, &options(false), None);
    let greedy = execute_hardlink_audit(&session, &options(true), None);

    for course_id in lazy.flagged.course_ids() {
        assert!(greedy.flagged.contains(course_id));
    }
}

#[test]
fn test_audit_progress_callback() {
    let (_temp_dir, session, _) = open_session();
    let messages = Arc::new(Mutex::new(Vec::new()));
    let sink = messages.clone();
    let callback: AuditProgressCallback =
        Arc::new(move |msg: String| sink.lock().unwrap().push(msg));

    execute_hardlink_audit(&session, &options(false), Some(callback));

    let messages = messages.lock().unwrap();
    assert_eq!(messages.len(), 26);
    assert!(messages[0].contains("1157-NAU00-A%"));
}

// ============================================================================
// Force Completion Tests
// ============================================================================

#[test]
fn test_force_completion_audit() {
    let (_temp_dir, session, test) = open_session();
    let outcome = execute_force_completion_audit(&session, &options(false), None);

    assert!(outcome.is_complete());
    assert_eq!(outcome.items.len(), 1);

    let located = &outcome.items[0];
    assert_eq!(located.item.user_id, "jdoe");
    assert_eq!(located.item.content_id, test);
    assert_eq!(located.path.to_string(), "Course Content > Content > Final Exam");
}

#[test]
fn test_library_movie_audit() {
    let (_temp_dir, session, _) = open_session();
    let outcome = execute_library_movie_audit(&session, &options(false), None);

    assert!(outcome.is_complete());
    assert_eq!(outcome.files.len(), 1);
    assert_eq!(outcome.files[0].file.course_id, "1157-NAU00-ENG-105-SEC01");
    assert_eq!(outcome.files[0].file.file_name, "DVD1017_hamlet.html");
    assert_eq!(
        outcome.files[0].path.to_string(),
        "Course Content > Content > DVD1017_hamlet.html"
    );
}

#[test]
fn test_locate_content() {
    let (_temp_dir, session, test) = open_session();
    let path = locate_content(&session, test).unwrap();
    assert_eq!(path.len(), 3);

    assert!(matches!(
        locate_content(&session, 99_999),
        Err(AuditError::NodeNotFound(99_999))
    ));
}
