use std::path::Path;

use rusqlite::Connection;

use super::DatabaseError;

const MIGRATION_V1: &str = "
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL
);

CREATE TABLE operators (
    id TEXT PRIMARY KEY,
    id_card TEXT NOT NULL UNIQUE,
    operator_name TEXT NOT NULL,
    phone TEXT,
    email TEXT,
    gender TEXT,
    nationality TEXT,
    address TEXT,
    business_name TEXT,
    business_address TEXT,
    business_scope TEXT,
    registration_code TEXT,
    registered_capital TEXT,
    landlord TEXT,
    lease_start TEXT,
    lease_end TEXT,
    rent TEXT,
    source_files TEXT NOT NULL DEFAULT '{}',
    metadata TEXT NOT NULL DEFAULT '{}',
    status TEXT NOT NULL DEFAULT 'active',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX idx_operators_status ON operators(status);

INSERT INTO schema_version (version) VALUES (1);
";

const MIGRATION_V2: &str = "
CREATE TABLE audit_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    operator_id TEXT NOT NULL,
    action TEXT NOT NULL,
    detail TEXT NOT NULL,
    timestamp TEXT NOT NULL
);

CREATE INDEX idx_audit_operator ON audit_log(operator_id);

INSERT INTO schema_version (version) VALUES (2);
";

/// Open a SQLite connection to the given path and run migrations
pub fn open_database(path: &Path) -> Result<Connection, DatabaseError> {
    let conn = Connection::open(path)?;
    configure_pragmas(&conn)?;
    run_migrations(&conn)?;
    Ok(conn)
}

/// Open an in-memory database (for testing)
pub fn open_memory_database() -> Result<Connection, DatabaseError> {
    let conn = Connection::open_in_memory()?;
    configure_pragmas(&conn)?;
    run_migrations(&conn)?;
    Ok(conn)
}

fn configure_pragmas(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(
        "PRAGMA journal_mode=WAL;
         PRAGMA foreign_keys=ON;",
    )?;
    Ok(())
}

/// Run all pending migrations
pub fn run_migrations(conn: &Connection) -> Result<(), DatabaseError> {
    let current_version = get_current_version(conn);

    let migrations: Vec<(i64, &str)> = vec![(1, MIGRATION_V1), (2, MIGRATION_V2)];

    for (version, sql) in migrations {
        if version > current_version {
            tracing::info!("Running migration v{version}");
            conn.execute_batch(sql)
                .map_err(|e| DatabaseError::MigrationFailed {
                    version,
                    reason: e.to_string(),
                })?;
        }
    }

    Ok(())
}

/// Get the current schema version (0 if no schema exists yet)
fn get_current_version(conn: &Connection) -> i64 {
    conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| {
        row.get::<_, i64>(0)
    })
    .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_initializes_tables() {
        let conn = open_memory_database().unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        // operators + audit_log + schema_version
        assert!(count >= 3, "Expected at least 3 tables, got {count}");
    }

    #[test]
    fn schema_version_is_current() {
        let conn = open_memory_database().unwrap();
        let version: i64 = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, 2);
    }

    #[test]
    fn migration_idempotent() {
        let conn = open_memory_database().unwrap();
        let result = run_migrations(&conn);
        assert!(result.is_ok());
    }

    #[test]
    fn operators_id_card_is_unique() {
        let conn = open_memory_database().unwrap();
        conn.execute(
            "INSERT INTO operators (id, id_card, operator_name, created_at, updated_at)
             VALUES ('a', 'X1', 'A', '2026-01-01', '2026-01-01')",
            [],
        )
        .unwrap();
        let dup = conn.execute(
            "INSERT INTO operators (id, id_card, operator_name, created_at, updated_at)
             VALUES ('b', 'X1', 'B', '2026-01-01', '2026-01-01')",
            [],
        );
        assert!(dup.is_err());
    }
}
