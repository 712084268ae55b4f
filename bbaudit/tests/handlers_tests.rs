use bbaudit::commands::command_argument_builder;
use bbaudit::handlers::*;
use bbaudit_core::config::Config;
use bbaudit_core::data::{ContentNode, Database, PRIMARY_INSTRUCTOR_ROLE};
use bbaudit_scanner::TermCode;
use clap::ArgMatches;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn subcommand_matches(argv: &[&str]) -> ArgMatches {
    let matches = command_argument_builder()
        .try_get_matches_from(argv)
        .unwrap();
    let (_, sub) = matches.subcommand().unwrap();
    sub.clone()
}

/// A workspace with a config pointing at a seeded snapshot; returns the leaf content id.
fn seeded_context(dir: &Path) -> (RunContext, i64) {
    let config_path = init_workspace(dir, false).unwrap();
    let config = Config::load(&config_path).unwrap();

    let db = Database::new(&config.database_path()).unwrap();
    let course = db.insert_course("1157-NAU00-CHM-151-SEC01", "Chemistry").unwrap();
    let root = db.insert_content(&ContentNode::folder(course, None, "--TOP--")).unwrap();
    let placeholder = db
        .insert_content(&ContentNode::folder(course, Some(root), "COURSE_ORGANIZER"))
        .unwrap();
    let organizer = db
        .insert_content(&ContentNode::folder(
            course,
            Some(placeholder),
            "VISTA_ORGANIZER_PAGES.label",
        ))
        .unwrap();
    db.insert_content(&ContentNode::document(
        course,
        Some(organizer),
        "Lab Safety",
        r##"<a href="#top">top</a><img src="@X@EmbeddedFile.requestUrlStub@X@bbcswebdav/courses/CHM/goggles.png">"##,
    ))
    .unwrap();
    let user = db.insert_user("mcurie", "Marie", "Curie", "mc@nau.edu").unwrap();
    db.enroll(course, user, PRIMARY_INSTRUCTOR_ROLE).unwrap();
    let test = db
        .insert_assessment(course, Some(organizer), "Lab Quiz", true)
        .unwrap();
    db.insert_file_item(course, Some(organizer), "VT2040_lab_safety.html")
        .unwrap();
    db.close().unwrap();

    (RunContext::new(config, true), test)
}

#[test]
fn test_cli_requires_term() {
    let result = command_argument_builder().try_get_matches_from(["bbaudit", "hardlinks"]);
    assert!(result.is_err());
}

#[test]
fn test_cli_rejects_unknown_format() {
    let result = command_argument_builder().try_get_matches_from([
        "bbaudit", "hardlinks", "--term", "1157", "--format", "xls",
    ]);
    assert!(result.is_err());
}

#[test]
fn test_cli_quiet_conflicts_with_verbose() {
    let result =
        command_argument_builder().try_get_matches_from(["bbaudit", "-q", "-v", "path", "-n", "1"]);
    assert!(result.is_err());
}

#[test]
fn test_parse_term_validates() {
    let config = Config::default();
    let good = subcommand_matches(&["bbaudit", "hardlinks", "--term", "1157"]);
    assert_eq!(parse_term(&good, &config).unwrap(), TermCode::new(1157));

    let bad = subcommand_matches(&["bbaudit", "hardlinks", "--term", "99"]);
    assert!(parse_term(&bad, &config).is_err());
}

#[test]
fn test_init_workspace_creates_files() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path().join("bbaudit");

    let config_path = init_workspace(&dir, false).unwrap();
    assert!(config_path.exists());
    assert!(dir.join(DATABASE_FILE_NAME).exists());

    let config = Config::load(&config_path).unwrap();
    assert_eq!(config.database_path(), dir.join(DATABASE_FILE_NAME));
}

#[test]
fn test_init_keeps_existing_without_force() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    let config_path = init_workspace(dir, false).unwrap();

    fs::write(&config_path, "[institution]\ncode = \"FLG01\"\n").unwrap();
    init_workspace(dir, false).unwrap();
    assert_eq!(Config::load(&config_path).unwrap().institution.code, "FLG01");

    init_workspace(dir, true).unwrap();
    assert_eq!(Config::load(&config_path).unwrap().institution.code, "NAU00");
}

#[test]
fn test_handle_hardlinks_writes_report() {
    let temp_dir = TempDir::new().unwrap();
    let (ctx, _) = seeded_context(temp_dir.path());
    let output = temp_dir.path().join("out.tsv");

    let args = subcommand_matches(&[
        "bbaudit",
        "hardlinks",
        "--term",
        "1157",
        "--format",
        "tsv",
        "--output",
        output.to_str().unwrap(),
    ]);
    let code = handle_hardlinks(&args, &ctx).unwrap();

    assert_eq!(code, 0);
    let report = fs::read_to_string(&output).unwrap();
    assert!(report.contains("1157-NAU00-CHM-151-SEC01\thttps://bblearn.nau.edu/bbcswebdav/"));
}

#[test]
fn test_handle_hardlinks_default_report_name() {
    let temp_dir = TempDir::new().unwrap();
    let (ctx, _) = seeded_context(temp_dir.path());

    let args = subcommand_matches(&["bbaudit", "hardlinks", "--term", "1157", "--aggressive"]);
    handle_hardlinks(&args, &ctx).unwrap();

    let names: Vec<String> = fs::read_dir(ctx.config.reports_dir())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(names.len(), 1);
    assert!(names[0].starts_with("hardlink_courses_report_aggressive_1157_"));
    assert!(names[0].ends_with(".txt"));
}

#[test]
fn test_handle_force_completion() {
    let temp_dir = TempDir::new().unwrap();
    let (ctx, _) = seeded_context(temp_dir.path());
    let output = temp_dir.path().join("fc.tsv");

    let args = subcommand_matches(&[
        "bbaudit",
        "force-completion",
        "--term",
        "1157",
        "-f",
        "tsv",
        "-o",
        output.to_str().unwrap(),
    ]);
    assert_eq!(handle_force_completion(&args, &ctx).unwrap(), 0);

    let report = fs::read_to_string(&output).unwrap();
    let lines: Vec<&str> = report.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[1].starts_with("mcurie\tMarie\tCurie\tmc@nau.edu\t1157-NAU00-CHM-151-SEC01"));
    assert!(lines[1].ends_with("\tLab Quiz\tCourse Content > Lab Quiz"));
}

#[test]
fn test_handle_library_movies() {
    let temp_dir = TempDir::new().unwrap();
    let (ctx, _) = seeded_context(temp_dir.path());
    let output = temp_dir.path().join("movies.tsv");

    let args = subcommand_matches(&[
        "bbaudit",
        "library-movies",
        "--term",
        "1157",
        "-f",
        "tsv",
        "-o",
        output.to_str().unwrap(),
    ]);
    assert_eq!(handle_library_movies(&args, &ctx).unwrap(), 0);

    let report = fs::read_to_string(&output).unwrap();
    let lines: Vec<&str> = report.lines().collect();
    assert_eq!(
        lines,
        vec![
            "CourseID\tFileName\tPathToFile",
            "1157-NAU00-CHM-151-SEC01\tVT2040_lab_safety.html\tCourse Content > VT2040_lab_safety.html",
        ]
    );
}

#[test]
fn test_handle_path() {
    let temp_dir = TempDir::new().unwrap();
    let (ctx, test) = seeded_context(temp_dir.path());

    let id = test.to_string();
    let args = subcommand_matches(&["bbaudit", "path", "--node", &id]);
    assert_eq!(
        handle_path(&args, &ctx).unwrap(),
        "Course Content > Lab Quiz"
    );

    let missing = subcommand_matches(&["bbaudit", "path", "--node", "987654"]);
    assert!(handle_path(&missing, &ctx).is_err());
}

#[test]
fn test_handlers_fail_without_snapshot() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.database.path = temp_dir
        .path()
        .join("absent.sqlite3")
        .to_string_lossy()
        .to_string();
    let ctx = RunContext::new(config, true);

    let args = subcommand_matches(&["bbaudit", "hardlinks", "--term", "1157"]);
    assert!(handle_hardlinks(&args, &ctx).is_err());
}
