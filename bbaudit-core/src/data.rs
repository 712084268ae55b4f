use bbaudit_scanner::{
    AuditError, ContentRecord, ForceCompletionItem, LibraryMovieFile, Partition, RowSource,
};
use regex::{Regex, RegexBuilder};
use rusqlite::{Connection, OpenFlags, Result, params};
use std::fs;
use std::path::Path;
use std::sync::LazyLock;
use tracing::debug;

/// File names the institution's media workflow generates, e.g. `VT1234_lecture.html`.
pub const DEFAULT_HTML_NAMING_PATTERN: &str = r"(DVD|VT|T)[0-9]{2,5}_(.+).html";

/// Deepest content tree the ancestor walk will follow.
pub const MAX_CONTENT_DEPTH: i64 = 64;

static DEFAULT_HTML_NAMING: LazyLock<Regex> = LazyLock::new(|| {
    naming_regex(DEFAULT_HTML_NAMING_PATTERN).expect("default naming pattern is valid")
});

/// Exact, case-sensitive form of the naming convention, used for library e-reserve pages.
pub const LIBRARY_MOVIE_PATTERN: &str = r"^(DVD|VT|T)[0-9]{2,5}_(.+)\.html$";

static LIBRARY_MOVIE_NAMING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(LIBRARY_MOVIE_PATTERN).expect("library movie pattern is valid")
});

pub const FILE_HANDLER: &str = "resource/x-bb-file";
pub const ASSESSMENT_SOURCE_TABLE: &str = "COURSE_ASSESSMENT";
pub const PRIMARY_INSTRUCTOR_ROLE: &str = "P";

/// A local snapshot of the LMS tables the audits read.
pub struct Database {
    conn: Connection,
    html_naming: Regex,
}

/// A content item to insert with [`Database::insert_content`].
#[derive(Debug, Clone)]
pub struct ContentNode {
    pub course_pk1: i64,
    pub parent_pk1: Option<i64>,
    pub title: String,
    pub main_data: Option<String>,
    pub handler: String,
}

impl ContentNode {
    pub fn folder(course_pk1: i64, parent_pk1: Option<i64>, title: &str) -> Self {
        Self {
            course_pk1,
            parent_pk1,
            title: title.to_string(),
            main_data: None,
            handler: "resource/x-bb-folder".to_string(),
        }
    }

    pub fn document(course_pk1: i64, parent_pk1: Option<i64>, title: &str, html: &str) -> Self {
        Self {
            course_pk1,
            parent_pk1,
            title: title.to_string(),
            main_data: Some(html.to_string()),
            handler: "resource/x-bb-document".to_string(),
        }
    }
}

fn naming_regex(pattern: &str) -> std::result::Result<Regex, regex::Error> {
    RegexBuilder::new(pattern).case_insensitive(true).build()
}

impl Database {
    pub fn remove(path: &Path) -> std::io::Result<()> {
        fs::remove_file(path)
    }

    pub fn exists(path: &Path) -> bool {
        path.exists()
    }

    /// Creates (or reopens) a writable snapshot and makes sure the schema exists.
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA case_sensitive_like = ON;
            ",
        )?;

        let db = Database::with_connection(conn);
        db.init_schema()?;
        Ok(db)
    }

    /// Opens an existing snapshot read-only.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        conn.execute_batch(
            "
            PRAGMA cache_size = -64000;  -- 64MB cache
            PRAGMA temp_store = MEMORY;
            PRAGMA case_sensitive_like = ON;
            ",
        )?;

        Ok(Database::with_connection(conn))
    }

    fn with_connection(conn: Connection) -> Self {
        Database {
            conn,
            html_naming: DEFAULT_HTML_NAMING.clone(),
        }
    }

    /// Replaces the file naming convention used by the deployed HTML file check.
    pub fn with_html_naming_pattern(
        mut self,
        pattern: &str,
    ) -> std::result::Result<Self, regex::Error> {
        self.html_naming = naming_regex(pattern)?;
        Ok(self)
    }

    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, e)| e)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "
CREATE TABLE IF NOT EXISTS course_main (
    pk1 INTEGER PRIMARY KEY AUTOINCREMENT,
    course_id TEXT NOT NULL UNIQUE,
    course_name TEXT NOT NULL
);

-- Content tree; parent_pk1 is NULL at the root
CREATE TABLE IF NOT EXISTS course_contents (
    pk1 INTEGER PRIMARY KEY AUTOINCREMENT,
    crsmain_pk1 INTEGER NOT NULL,
    parent_pk1 INTEGER,
    title TEXT NOT NULL,
    main_data TEXT,
    cnthndlr_handle TEXT NOT NULL,
    available_ind TEXT NOT NULL DEFAULT 'Y' CHECK(available_ind IN ('Y', 'N')),
    FOREIGN KEY(crsmain_pk1) REFERENCES course_main(pk1) ON DELETE CASCADE,
    FOREIGN KEY(parent_pk1) REFERENCES course_contents(pk1) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_course_contents_course ON course_contents(crsmain_pk1);
CREATE INDEX IF NOT EXISTS idx_course_contents_parent ON course_contents(parent_pk1);

CREATE TABLE IF NOT EXISTS files (
    pk1 INTEGER PRIMARY KEY AUTOINCREMENT,
    link_name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS course_contents_files (
    course_contents_pk1 INTEGER NOT NULL,
    files_pk1 INTEGER NOT NULL,
    PRIMARY KEY(course_contents_pk1, files_pk1),
    FOREIGN KEY(course_contents_pk1) REFERENCES course_contents(pk1) ON DELETE CASCADE,
    FOREIGN KEY(files_pk1) REFERENCES files(pk1) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS users (
    pk1 INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL UNIQUE,
    firstname TEXT NOT NULL,
    lastname TEXT NOT NULL,
    email TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS course_users (
    crsmain_pk1 INTEGER NOT NULL,
    users_pk1 INTEGER NOT NULL,
    role TEXT NOT NULL,
    PRIMARY KEY(crsmain_pk1, users_pk1),
    FOREIGN KEY(crsmain_pk1) REFERENCES course_main(pk1) ON DELETE CASCADE,
    FOREIGN KEY(users_pk1) REFERENCES users(pk1) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS course_assessment (
    pk1 INTEGER PRIMARY KEY AUTOINCREMENT,
    crsmain_pk1 INTEGER NOT NULL,
    force_completion_ind TEXT NOT NULL DEFAULT 'N' CHECK(force_completion_ind IN ('Y', 'N')),
    FOREIGN KEY(crsmain_pk1) REFERENCES course_main(pk1) ON DELETE CASCADE
);

-- Ties a deployed content item to the object it presents
CREATE TABLE IF NOT EXISTS link (
    course_contents_pk1 INTEGER NOT NULL,
    link_source_table TEXT NOT NULL,
    link_source_pk1 INTEGER NOT NULL,
    FOREIGN KEY(course_contents_pk1) REFERENCES course_contents(pk1) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_link_source ON link(link_source_table, link_source_pk1);
            ",
        )?;
        Ok(())
    }

    // Fixture builders
    pub fn insert_course(&self, course_id: &str, course_name: &str) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO course_main (course_id, course_name) VALUES (?1, ?2)",
            params![course_id, course_name],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn insert_content(&self, node: &ContentNode) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO course_contents (crsmain_pk1, parent_pk1, title, main_data, cnthndlr_handle)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                node.course_pk1,
                node.parent_pk1,
                &node.title,
                &node.main_data,
                &node.handler,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Adds a file item under `parent_pk1` carrying an uploaded file called `link_name`.
    pub fn insert_file_item(
        &self,
        course_pk1: i64,
        parent_pk1: Option<i64>,
        link_name: &str,
    ) -> Result<i64> {
        let content_pk1 = self.insert_content(&ContentNode {
            course_pk1,
            parent_pk1,
            title: link_name.to_string(),
            main_data: None,
            handler: FILE_HANDLER.to_string(),
        })?;

        self.conn.execute(
            "INSERT INTO files (link_name) VALUES (?1)",
            params![link_name],
        )?;
        let file_pk1 = self.conn.last_insert_rowid();

        self.conn.execute(
            "INSERT INTO course_contents_files (course_contents_pk1, files_pk1) VALUES (?1, ?2)",
            params![content_pk1, file_pk1],
        )?;

        Ok(content_pk1)
    }

    pub fn insert_user(
        &self,
        user_id: &str,
        first_name: &str,
        last_name: &str,
        email: &str,
    ) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO users (user_id, firstname, lastname, email) VALUES (?1, ?2, ?3, ?4)",
            params![user_id, first_name, last_name, email],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Marks a content item hidden from (or visible to) students.
    pub fn set_available(&self, content_pk1: i64, available: bool) -> Result<()> {
        self.conn.execute(
            "UPDATE course_contents SET available_ind = ?1 WHERE pk1 = ?2",
            params![if available { "Y" } else { "N" }, content_pk1],
        )?;
        Ok(())
    }

    pub fn enroll(&self, course_pk1: i64, user_pk1: i64, role: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO course_users (crsmain_pk1, users_pk1, role) VALUES (?1, ?2, ?3)",
            params![course_pk1, user_pk1, role],
        )?;
        Ok(())
    }

    /// Deploys a test as content item `title` under `parent_pk1`.
    pub fn insert_assessment(
        &self,
        course_pk1: i64,
        parent_pk1: Option<i64>,
        title: &str,
        force_completion: bool,
    ) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO course_assessment (crsmain_pk1, force_completion_ind) VALUES (?1, ?2)",
            params![course_pk1, if force_completion { "Y" } else { "N" }],
        )?;
        let assessment_pk1 = self.conn.last_insert_rowid();

        let content_pk1 = self.insert_content(&ContentNode {
            course_pk1,
            parent_pk1,
            title: title.to_string(),
            main_data: None,
            handler: "resource/x-bb-asmt-test-link".to_string(),
        })?;

        self.conn.execute(
            "INSERT INTO link (course_contents_pk1, link_source_table, link_source_pk1)
             VALUES (?1, ?2, ?3)",
            params![content_pk1, ASSESSMENT_SOURCE_TABLE, assessment_pk1],
        )?;

        Ok(content_pk1)
    }

    // Audit queries
    pub fn content_by_prefix(&self, course_like: &str) -> Result<Vec<ContentRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT cc.pk1, cm.course_id, cc.main_data
             FROM course_contents cc
             JOIN course_main cm ON cc.crsmain_pk1 = cm.pk1
             WHERE cc.main_data LIKE '%<a%'
               AND cm.course_id LIKE ?1
             ORDER BY cc.pk1",
        )?;

        let records = stmt
            .query_map(params![course_like], |row| {
                Ok(ContentRecord {
                    course_id: row.get(1)?,
                    raw_markup: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>>>()?;

        Ok(records)
    }

    /// Course ids with an available `.htm*` file item whose name breaks the naming convention.
    pub fn unconventional_html_files(&self, course_like: &str) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT cm.course_id, f.link_name
             FROM course_main cm
             JOIN course_contents cc ON cc.crsmain_pk1 = cm.pk1
             JOIN course_contents_files ccf ON ccf.course_contents_pk1 = cc.pk1
             JOIN files f ON f.pk1 = ccf.files_pk1
             WHERE f.link_name LIKE '%.htm%'
               AND cc.cnthndlr_handle = ?1
               AND cc.available_ind = 'Y'
               AND cm.course_id LIKE ?2
             ORDER BY cm.course_id",
        )?;

        let rows = stmt
            .query_map(params![FILE_HANDLER, course_like], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>>>()?;

        let mut course_ids: Vec<String> = rows
            .into_iter()
            .filter(|(_, link_name)| !self.html_naming.is_match(link_name))
            .map(|(course_id, _)| course_id)
            .collect();
        course_ids.dedup();

        Ok(course_ids)
    }

    /// Titles from `leaf` up to the root, leaf first. Empty when `leaf` does not exist.
    pub fn ancestor_titles(&self, leaf: i64) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "WITH RECURSIVE ancestors(pk1, parent_pk1, title, depth) AS (
                SELECT pk1, parent_pk1, title, 0 FROM course_contents WHERE pk1 = ?1
                UNION ALL
                SELECT cc.pk1, cc.parent_pk1, cc.title, a.depth + 1
                FROM course_contents cc
                JOIN ancestors a ON cc.pk1 = a.parent_pk1
                WHERE a.depth < ?2
             )
             SELECT title FROM ancestors ORDER BY depth",
        )?;

        let titles = stmt
            .query_map(params![leaf, MAX_CONTENT_DEPTH], |row| row.get(0))?
            .collect::<Result<Vec<String>>>()?;

        Ok(titles)
    }

    pub fn force_completion_items(
        &self,
        course_like: &str,
        user_like: &str,
    ) -> Result<Vec<ForceCompletionItem>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT
                u.user_id, u.firstname, u.lastname, u.email,
                cm.course_id, cm.course_name, cc.title, cc.pk1
             FROM course_assessment ca
             JOIN course_main cm ON ca.crsmain_pk1 = cm.pk1
             JOIN link l ON l.link_source_pk1 = ca.pk1
             JOIN course_contents cc ON cc.pk1 = l.course_contents_pk1
             JOIN course_users cu ON cu.crsmain_pk1 = cm.pk1
             JOIN users u ON u.pk1 = cu.users_pk1
             WHERE cc.cnthndlr_handle LIKE 'resource/x-bb-asmt-%-link'
               AND l.link_source_table = ?1
               AND ca.force_completion_ind = 'Y'
               AND cu.role = ?2
               AND cm.course_id LIKE ?3
               AND u.user_id LIKE ?4
             ORDER BY u.user_id, cm.course_id, cc.pk1",
        )?;

        let items = stmt
            .query_map(
                params![
                    ASSESSMENT_SOURCE_TABLE,
                    PRIMARY_INSTRUCTOR_ROLE,
                    course_like,
                    user_like
                ],
                |row| {
                    Ok(ForceCompletionItem {
                        user_id: row.get(0)?,
                        first_name: row.get(1)?,
                        last_name: row.get(2)?,
                        email: row.get(3)?,
                        course_id: row.get(4)?,
                        course_name: row.get(5)?,
                        test_title: row.get(6)?,
                        content_id: row.get(7)?,
                    })
                },
            )?
            .collect::<Result<Vec<_>>>()?;

        Ok(items)
    }

    /// Files named exactly like library e-reserve pages, with the content item holding them.
    pub fn library_movie_files(&self, course_like: &str) -> Result<Vec<LibraryMovieFile>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT cm.course_id, f.link_name, cc.pk1
             FROM course_main cm
             JOIN course_contents cc ON cc.crsmain_pk1 = cm.pk1
             JOIN course_contents_files ccf ON ccf.course_contents_pk1 = cc.pk1
             JOIN files f ON f.pk1 = ccf.files_pk1
             WHERE f.link_name LIKE '%.html'
               AND cm.course_id LIKE ?1
             ORDER BY cm.course_id, f.link_name, cc.pk1",
        )?;

        let files = stmt
            .query_map(params![course_like], |row| {
                Ok(LibraryMovieFile {
                    course_id: row.get(0)?,
                    file_name: row.get(1)?,
                    content_id: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>>>()?;

        Ok(files
            .into_iter()
            .filter(|file| LIBRARY_MOVIE_NAMING.is_match(&file.file_name))
            .collect())
    }

    pub fn get_connection(&self) -> &Connection {
        &self.conn
    }
}

impl RowSource for Database {
    fn query_content_by_prefix(
        &self,
        partition: &Partition,
    ) -> bbaudit_scanner::Result<Vec<ContentRecord>> {
        debug!("Querying content for {}", partition.course_pattern);
        self.content_by_prefix(&partition.course_pattern)
            .map_err(AuditError::row_source)
    }

    fn query_unconventional_html_files(
        &self,
        partition: &Partition,
    ) -> bbaudit_scanner::Result<Vec<String>> {
        debug!("Querying deployed HTML files for {}", partition.course_pattern);
        self.unconventional_html_files(&partition.course_pattern)
            .map_err(AuditError::row_source)
    }

    fn query_ancestor_titles(&self, leaf: i64) -> bbaudit_scanner::Result<Vec<String>> {
        let titles = self
            .ancestor_titles(leaf)
            .map_err(AuditError::row_source)?;
        if titles.is_empty() {
            return Err(AuditError::NodeNotFound(leaf));
        }
        Ok(titles)
    }

    fn query_library_movie_files(
        &self,
        partition: &Partition,
    ) -> bbaudit_scanner::Result<Vec<LibraryMovieFile>> {
        debug!("Querying e-reserve files for {}", partition.course_pattern);
        self.library_movie_files(&partition.course_pattern)
            .map_err(AuditError::row_source)
    }

    fn query_force_completion_items(
        &self,
        partition: &Partition,
    ) -> bbaudit_scanner::Result<Vec<ForceCompletionItem>> {
        debug!(
            "Querying force completion tests for {} / {}",
            partition.course_pattern, partition.user_pattern
        );
        self.force_completion_items(&partition.course_pattern, &partition.user_pattern)
            .map_err(AuditError::row_source)
    }
}
