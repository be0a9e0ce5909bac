// ABOUTME: SQLite connection handling for source and destination tables
// ABOUTME: Provides path validation, identifier hygiene, and read-only source opens

pub mod table;

pub use table::SqliteTable;

use anyhow::{bail, Context, Result};
use std::path::PathBuf;

/// Validate a source SQLite file path.
///
/// Security checks:
/// - Canonicalizes path to resolve symlinks and relative paths
/// - Verifies file exists and is a regular file (not directory)
/// - Checks file extension is .db, .sqlite, or .sqlite3
///
/// # Arguments
///
/// * `path` - Path to SQLite file (can be relative or absolute)
///
/// # Returns
///
/// Canonicalized absolute path if valid, error otherwise
///
/// # Security
///
/// Canonicalization prevents path traversal like `../../../etc/passwd`
/// from reaching the database open call.
pub fn validate_source_path(path: &str) -> Result<PathBuf> {
    if path.is_empty() {
        bail!("SQLite file path cannot be empty");
    }

    let canonical = PathBuf::from(path).canonicalize().with_context(|| {
        format!(
            "Failed to resolve SQLite file path '{}'. \
             File may not exist or may not be readable.",
            path
        )
    })?;

    if !canonical.is_file() {
        bail!("Path '{}' is not a regular file (may be a directory)", path);
    }

    validate_db_extension(&canonical, path)?;

    tracing::debug!("Validated source path: {}", canonical.display());

    Ok(canonical)
}

/// Validate a destination SQLite file path.
///
/// The destination file may not exist yet (SQLite creates it on open), so
/// only the parent directory is required to exist. When the file already
/// exists it must be a regular file with a recognized extension.
pub fn validate_dest_path(path: &str) -> Result<PathBuf> {
    if path.is_empty() {
        bail!("SQLite file path cannot be empty");
    }

    let path_buf = PathBuf::from(path);

    if path_buf.exists() {
        return validate_source_path(path);
    }

    let parent = match path_buf.parent() {
        Some(p) if p.as_os_str().is_empty() => PathBuf::from("."),
        Some(p) => p.to_path_buf(),
        None => bail!("Destination path '{}' has no parent directory", path),
    };

    let canonical_parent = parent.canonicalize().with_context(|| {
        format!(
            "Destination directory '{}' does not exist or is not readable",
            parent.display()
        )
    })?;

    let file_name = path_buf
        .file_name()
        .with_context(|| format!("Destination path '{}' has no file name", path))?;

    let resolved = canonical_parent.join(file_name);
    validate_db_extension(&resolved, path)?;

    tracing::debug!("Validated destination path: {}", resolved.display());

    Ok(resolved)
}

fn validate_db_extension(resolved: &std::path::Path, original: &str) -> Result<()> {
    match resolved.extension().and_then(|e| e.to_str()) {
        Some(ext) if ["db", "sqlite", "sqlite3"].contains(&ext) => Ok(()),
        Some(ext) => bail!(
            "Invalid SQLite file extension '{}'. Must be .db, .sqlite, or .sqlite3",
            ext
        ),
        None => bail!(
            "SQLite file '{}' has no extension. Must be .db, .sqlite, or .sqlite3",
            original
        ),
    }
}

/// Open a source SQLite database in read-only mode.
///
/// The source is never written to; opening with SQLITE_OPEN_READ_ONLY
/// makes that a hard guarantee rather than a convention.
pub fn open_source(path: &str) -> Result<rusqlite::Connection> {
    let canonical = validate_source_path(path)?;

    tracing::info!("Opening source database: {}", canonical.display());

    let conn = rusqlite::Connection::open_with_flags(
        &canonical,
        rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY,
    )
    .with_context(|| format!("Failed to open source database: {}", canonical.display()))?;

    // Verify we can query the database
    let _version: String = conn
        .query_row("SELECT sqlite_version()", [], |row| row.get(0))
        .context("Failed to query SQLite version (database may be corrupted)")?;

    Ok(conn)
}

/// Open a destination SQLite database read-write, creating it if needed.
pub fn open_dest(path: &str) -> Result<rusqlite::Connection> {
    let resolved = validate_dest_path(path)?;

    tracing::info!("Opening destination database: {}", resolved.display());

    let conn = rusqlite::Connection::open(&resolved)
        .with_context(|| format!("Failed to open destination database: {}", resolved.display()))?;

    Ok(conn)
}

/// Validate a table or column identifier to prevent SQL injection.
///
/// Identifiers must contain only ASCII alphanumerics and underscores, be at
/// most 63 characters, and must not be a reserved SQL keyword. Validated
/// identifiers are still quoted with [`quote_ident`] before use.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        bail!("Identifier cannot be empty");
    }

    if name.len() > 63 {
        bail!("Identifier too long (max 63 characters): {}", name);
    }

    for ch in name.chars() {
        if !ch.is_ascii_alphanumeric() && ch != '_' {
            bail!(
                "Invalid identifier '{}': contains invalid character '{}'. \
                 Only alphanumeric characters and underscores are allowed.",
                name,
                ch
            );
        }
    }

    let lower = name.to_lowercase();
    let reserved_keywords = [
        "select", "insert", "update", "delete", "drop", "create", "alter", "table", "database",
        "index", "view", "trigger", "grant", "revoke",
    ];

    if reserved_keywords.contains(&lower.as_str()) {
        bail!(
            "Invalid identifier '{}': cannot use SQL reserved keyword",
            name
        );
    }

    Ok(())
}

/// Double-quote an identifier for interpolation into SQL.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    #[test]
    fn test_validate_source_empty_path() {
        let result = validate_source_path("");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("cannot be empty"));
    }

    #[test]
    fn test_validate_source_nonexistent_file() {
        assert!(validate_source_path("/nonexistent/database.db").is_err());
    }

    #[test]
    fn test_validate_source_wrong_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.txt");
        File::create(&path).unwrap();

        let result = validate_source_path(path.to_str().unwrap());
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Invalid SQLite file extension"));
    }

    #[test]
    fn test_validate_source_valid_extensions() {
        let dir = tempfile::tempdir().unwrap();

        for ext in &["db", "sqlite", "sqlite3"] {
            let path = dir.path().join(format!("data.{}", ext));
            File::create(&path).unwrap();

            assert!(
                validate_source_path(path.to_str().unwrap()).is_ok(),
                "extension .{} should be valid",
                ext
            );
        }
    }

    #[test]
    fn test_validate_source_rejects_traversal() {
        for attempt in ["../../../etc/passwd", "/etc/shadow", "../../.."] {
            assert!(validate_source_path(attempt).is_err());
        }
    }

    #[test]
    fn test_validate_dest_allows_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("new.db");

        let resolved = validate_dest_path(path.to_str().unwrap()).unwrap();
        assert_eq!(resolved.file_name().unwrap(), "new.db");
    }

    #[test]
    fn test_validate_dest_requires_parent_dir() {
        assert!(validate_dest_path("/nonexistent/dir/new.db").is_err());
    }

    #[test]
    fn test_validate_dest_checks_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("new.txt");
        assert!(validate_dest_path(path.to_str().unwrap()).is_err());
    }

    #[test]
    fn test_open_source_is_readonly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("readonly.db");

        {
            let conn = rusqlite::Connection::open(&path).unwrap();
            conn.execute("CREATE TABLE t (id INTEGER)", []).unwrap();
        }

        let conn = open_source(path.to_str().unwrap()).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM t", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);

        let write_result = conn.execute("INSERT INTO t VALUES (1)", []);
        assert!(write_result.is_err());
    }

    #[test]
    fn test_open_dest_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("created.db");

        let conn = open_dest(path.to_str().unwrap()).unwrap();
        conn.execute("CREATE TABLE t (id INTEGER)", []).unwrap();

        assert!(path.exists());
    }

    #[test]
    fn test_validate_identifier_accepts_normal_names() {
        assert!(validate_identifier("users").is_ok());
        assert!(validate_identifier("user_events_2024").is_ok());
        assert!(validate_identifier("_private").is_ok());
    }

    #[test]
    fn test_validate_identifier_rejects_injection() {
        assert!(validate_identifier("users; DROP TABLE users;").is_err());
        assert!(validate_identifier("users'--").is_err());
        assert!(validate_identifier("users OR 1=1").is_err());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier(&"a".repeat(64)).is_err());
    }

    #[test]
    fn test_validate_identifier_rejects_keywords() {
        assert!(validate_identifier("select").is_err());
        assert!(validate_identifier("TABLE").is_err());
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("users"), "\"users\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }
}
