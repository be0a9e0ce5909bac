// ABOUTME: SQLite implementation of the table accessor contract
// ABOUTME: Maps rusqlite errors into the classified accessor error taxonomy

use crate::accessor::{AccessorError, TableAccessor};
use crate::row::{project, Row};
use crate::sqlite::{quote_ident, validate_identifier};
use anyhow::Context;
use rusqlite::Connection;

/// A SQLite connection bound to one named table.
///
/// Owns the connection for the duration of a run; dropping the handle
/// closes the connection on every exit path. The table and id column names
/// are validated at construction and quoted into every statement.
pub struct SqliteTable {
    conn: Connection,
    table: String,
    quoted_table: String,
    quoted_id: String,
    snapshot_active: bool,
}

impl SqliteTable {
    /// Bind `conn` to `table`, using `id` as the identifier column.
    pub fn new(conn: Connection, table: &str) -> anyhow::Result<Self> {
        Self::with_id_column(conn, table, "id")
    }

    /// Bind `conn` to `table` with a custom identifier column.
    pub fn with_id_column(conn: Connection, table: &str, id_column: &str) -> anyhow::Result<Self> {
        validate_identifier(table)
            .with_context(|| format!("Invalid table name '{}'", table))?;
        validate_identifier(id_column)
            .with_context(|| format!("Invalid id column name '{}'", id_column))?;

        Ok(Self {
            conn,
            table: table.to_string(),
            quoted_table: quote_ident(table),
            quoted_id: quote_ident(id_column),
            snapshot_active: false,
        })
    }

    /// Name of the bound table.
    pub fn table(&self) -> &str {
        &self.table
    }

    fn read_rows(
        &self,
        sql: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<Row>, AccessorError> {
        let mut stmt = self
            .conn
            .prepare(sql)
            .map_err(|e| classify(e, &format!("prepare query on '{}'", self.table)))?;

        let column_names: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();

        let rows = stmt
            .query_map(params, |row| {
                let mut map = Row::new();
                for (idx, name) in column_names.iter().enumerate() {
                    let value: rusqlite::types::Value = row.get(idx)?;
                    map.insert(name.clone(), value.into());
                }
                Ok(map)
            })
            .map_err(|e| classify(e, &format!("query rows from '{}'", self.table)))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| classify(e, &format!("decode rows from '{}'", self.table)))?;

        Ok(rows)
    }
}

impl TableAccessor for SqliteTable {
    fn column_names(&self) -> Result<Vec<String>, AccessorError> {
        tracing::debug!("Introspecting columns of table '{}'", self.table);

        let sql = format!("SELECT * FROM {} LIMIT 0", self.quoted_table);
        let stmt = self
            .conn
            .prepare(&sql)
            .map_err(|e| classify(e, &format!("introspect columns of '{}'", self.table)))?;

        Ok(stmt.column_names().iter().map(|s| s.to_string()).collect())
    }

    fn count_rows(&self, min_id_exclusive: Option<i64>) -> Result<u64, AccessorError> {
        let count: i64 = match min_id_exclusive {
            Some(watermark) => {
                let sql = format!(
                    "SELECT COUNT(*) FROM {} WHERE {} > ?1",
                    self.quoted_table, self.quoted_id
                );
                self.conn.query_row(&sql, [watermark], |row| row.get(0))
            }
            None => {
                let sql = format!("SELECT COUNT(*) FROM {}", self.quoted_table);
                self.conn.query_row(&sql, [], |row| row.get(0))
            }
        }
        .map_err(|e| classify(e, &format!("count rows in '{}'", self.table)))?;

        Ok(count as u64)
    }

    fn read_page(&self, offset: u64, limit: usize) -> Result<Vec<Row>, AccessorError> {
        let sql = format!("SELECT * FROM {} LIMIT ?1 OFFSET ?2", self.quoted_table);
        let limit = limit as i64;
        let offset = offset as i64;
        self.read_rows(&sql, &[&limit as &dyn rusqlite::ToSql, &offset])
    }

    fn read_after(&self, watermark: i64, limit: usize) -> Result<Vec<Row>, AccessorError> {
        let sql = format!(
            "SELECT * FROM {} WHERE {} > ?1 ORDER BY {} ASC LIMIT ?2",
            self.quoted_table, self.quoted_id, self.quoted_id
        );
        let limit = limit as i64;
        self.read_rows(&sql, &[&watermark as &dyn rusqlite::ToSql, &limit])
    }

    fn max_id(&self) -> Result<Option<i64>, AccessorError> {
        let sql = format!("SELECT MAX({}) FROM {}", self.quoted_id, self.quoted_table);
        self.conn
            .query_row(&sql, [], |row| row.get::<_, Option<i64>>(0))
            .map_err(|e| classify(e, &format!("read max id from '{}'", self.table)))
    }

    fn insert_batch(&mut self, columns: &[String], rows: &[Row]) -> Result<(), AccessorError> {
        if rows.is_empty() {
            return Ok(());
        }

        for col in columns {
            validate_identifier(col)
                .map_err(|e| AccessorError::Schema(format!("invalid column name: {}", e)))?;
        }

        let quoted_cols: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.quoted_table,
            quoted_cols.join(", "),
            placeholders.join(", ")
        );

        let tx = self
            .conn
            .transaction()
            .map_err(|e| classify(e, &format!("begin transaction on '{}'", self.table)))?;

        {
            let mut stmt = tx
                .prepare(&sql)
                .map_err(|e| classify(e, &format!("prepare insert into '{}'", self.table)))?;

            for row in rows {
                let values = project(row, columns)?;
                stmt.execute(rusqlite::params_from_iter(values.iter()))
                    .map_err(|e| classify(e, &format!("insert row into '{}'", self.table)))?;
            }
        }

        // A failed transaction rolls back on drop; only the explicit commit
        // makes the batch durable.
        tx.commit()
            .map_err(|e| classify(e, &format!("commit batch into '{}'", self.table)))?;

        tracing::debug!("Committed {} rows into '{}'", rows.len(), self.table);

        Ok(())
    }

    fn begin_read_snapshot(&mut self) -> Result<(), AccessorError> {
        if self.snapshot_active {
            return Ok(());
        }

        // A deferred transaction pins the reader's view of the database once
        // the first read runs, so offset paging sees a stable row set.
        self.conn
            .execute_batch("BEGIN DEFERRED")
            .map_err(|e| classify(e, &format!("begin read snapshot on '{}'", self.table)))?;
        self.snapshot_active = true;

        tracing::debug!("Pinned read snapshot on '{}'", self.table);

        Ok(())
    }

    fn end_read_snapshot(&mut self) -> Result<(), AccessorError> {
        if !self.snapshot_active {
            return Ok(());
        }

        self.snapshot_active = false;
        self.conn
            .execute_batch("COMMIT")
            .map_err(|e| classify(e, &format!("end read snapshot on '{}'", self.table)))?;

        Ok(())
    }
}

/// Classify a rusqlite error into the accessor taxonomy.
///
/// SQLite reports missing tables and columns as generic errors with a
/// recognizable message, so those are matched textually; everything else is
/// classified by result code.
fn classify(err: rusqlite::Error, what: &str) -> AccessorError {
    use rusqlite::ErrorCode;

    if let rusqlite::Error::InvalidColumnName(name) = &err {
        return AccessorError::Schema(format!("{}: no such column '{}'", what, name));
    }

    let (code, message) = match &err {
        rusqlite::Error::SqliteFailure(code, message) => {
            (Some(code.code), message.clone().unwrap_or_default())
        }
        _ => (None, String::new()),
    };

    match code {
        Some(ErrorCode::ConstraintViolation) => {
            AccessorError::Constraint(anyhow::Error::new(err).context(what.to_string()))
        }
        Some(
            ErrorCode::DatabaseBusy
            | ErrorCode::DatabaseLocked
            | ErrorCode::CannotOpen
            | ErrorCode::NotADatabase
            | ErrorCode::DatabaseCorrupt
            | ErrorCode::DiskFull
            | ErrorCode::SystemIoFailure
            | ErrorCode::OperationInterrupted,
        ) => AccessorError::Connectivity(anyhow::Error::new(err).context(what.to_string())),
        // SQLite reports missing tables/columns as a generic error whose
        // message is the only classification signal.
        Some(_) if message.contains("no such table") || message.contains("no such column") => {
            AccessorError::Schema(format!("{}: {}", what, message))
        }
        _ => AccessorError::Other(anyhow::Error::new(err).context(what.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::Value;

    fn open_fixture() -> SqliteTable {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE users (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                age INTEGER
            );
            INSERT INTO users VALUES
                (1, 'Alice', 30),
                (2, 'Bob', 25),
                (5, 'Charlie', NULL);",
        )
        .unwrap();

        SqliteTable::new(conn, "users").unwrap()
    }

    fn make_row(id: i64, name: &str) -> Row {
        let mut row = Row::new();
        row.insert("id".to_string(), Value::Integer(id));
        row.insert("name".to_string(), Value::Text(name.to_string()));
        row.insert("age".to_string(), Value::Null);
        row
    }

    #[test]
    fn test_rejects_invalid_table_name() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(SqliteTable::new(conn, "users; DROP TABLE users;").is_err());
    }

    #[test]
    fn test_rejects_invalid_id_column() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(SqliteTable::with_id_column(conn, "users", "id'--").is_err());
    }

    #[test]
    fn test_column_names() {
        let table = open_fixture();
        assert_eq!(table.column_names().unwrap(), vec!["id", "name", "age"]);
    }

    #[test]
    fn test_column_names_missing_table_is_schema_error() {
        let conn = Connection::open_in_memory().unwrap();
        let table = SqliteTable::new(conn, "missing").unwrap();

        let err = table.column_names().unwrap_err();
        assert!(matches!(err, AccessorError::Schema(_)), "got {:?}", err);
    }

    #[test]
    fn test_count_rows() {
        let table = open_fixture();
        assert_eq!(table.count_rows(None).unwrap(), 3);
        assert_eq!(table.count_rows(Some(0)).unwrap(), 3);
        assert_eq!(table.count_rows(Some(2)).unwrap(), 1);
        assert_eq!(table.count_rows(Some(5)).unwrap(), 0);
    }

    #[test]
    fn test_read_page_bounds() {
        let table = open_fixture();

        let page = table.read_page(0, 2).unwrap();
        assert_eq!(page.len(), 2);

        let last = table.read_page(2, 2).unwrap();
        assert_eq!(last.len(), 1);

        let past_end = table.read_page(10, 2).unwrap();
        assert!(past_end.is_empty());
    }

    #[test]
    fn test_read_after_orders_by_id() {
        let table = open_fixture();

        let rows = table.read_after(1, 10).unwrap();
        let ids: Vec<i64> = rows
            .iter()
            .map(|r| crate::row::integer_id(r, "id").unwrap())
            .collect();
        assert_eq!(ids, vec![2, 5]);

        assert!(table.read_after(5, 10).unwrap().is_empty());
    }

    #[test]
    fn test_max_id() {
        let table = open_fixture();
        assert_eq!(table.max_id().unwrap(), Some(5));

        let conn = Connection::open_in_memory().unwrap();
        conn.execute("CREATE TABLE empty (id INTEGER PRIMARY KEY)", [])
            .unwrap();
        let empty = SqliteTable::new(conn, "empty").unwrap();
        assert_eq!(empty.max_id().unwrap(), None);
    }

    #[test]
    fn test_insert_batch_commits() {
        let mut table = open_fixture();
        let columns = vec!["id".to_string(), "name".to_string(), "age".to_string()];

        table
            .insert_batch(&columns, &[make_row(10, "Dora")])
            .unwrap();

        assert_eq!(table.count_rows(None).unwrap(), 4);
        assert_eq!(table.max_id().unwrap(), Some(10));
    }

    #[test]
    fn test_insert_batch_empty_is_noop() {
        let mut table = open_fixture();
        let columns = vec!["id".to_string(), "name".to_string(), "age".to_string()];

        table.insert_batch(&columns, &[]).unwrap();
        assert_eq!(table.count_rows(None).unwrap(), 3);
    }

    #[test]
    fn test_insert_batch_rolls_back_whole_batch_on_failure() {
        let mut table = open_fixture();
        let columns = vec!["id".to_string(), "name".to_string(), "age".to_string()];

        // Second row collides with an existing primary key; the first row
        // must not survive the failed batch.
        let batch = vec![make_row(20, "Eve"), make_row(1, "Dup")];
        let err = table.insert_batch(&columns, &batch).unwrap_err();

        assert!(matches!(err, AccessorError::Constraint(_)), "got {:?}", err);
        assert_eq!(table.count_rows(None).unwrap(), 3);
        assert_eq!(table.max_id().unwrap(), Some(5));
    }

    #[test]
    fn test_duplicate_key_classified_as_constraint() {
        let mut table = open_fixture();
        let columns = vec!["id".to_string(), "name".to_string(), "age".to_string()];

        let err = table
            .insert_batch(&columns, &[make_row(1, "Dup")])
            .unwrap_err();
        assert!(err.kind() == "constraint");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_insert_into_missing_table_is_schema_error() {
        let conn = Connection::open_in_memory().unwrap();
        let mut table = SqliteTable::new(conn, "missing").unwrap();
        let columns = vec!["id".to_string(), "name".to_string(), "age".to_string()];

        let err = table
            .insert_batch(&columns, &[make_row(1, "A")])
            .unwrap_err();
        assert!(matches!(err, AccessorError::Schema(_)), "got {:?}", err);
    }

    #[test]
    fn test_snapshot_begin_end_is_balanced() {
        let mut table = open_fixture();

        table.begin_read_snapshot().unwrap();
        // Second begin is a no-op, not a nested transaction error.
        table.begin_read_snapshot().unwrap();
        assert_eq!(table.count_rows(None).unwrap(), 3);
        table.end_read_snapshot().unwrap();
        // End without an active snapshot must be safe.
        table.end_read_snapshot().unwrap();
    }
}
