//! Append-only audit trail. One row per mutation, written inside the
//! same transaction as the mutation itself, so trail and data can never
//! disagree.

use chrono::Utc;
use rusqlite::{params, Connection};
use serde::Serialize;

use super::DatabaseError;
use crate::models::AuditAction;

#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub id: i64,
    pub operator_id: String,
    pub action: String,
    pub detail: String,
    pub timestamp: String,
}

/// Insert one audit row. Callers are expected to hold an open
/// transaction; this function never commits.
pub fn insert_audit(
    conn: &Connection,
    operator_id: &str,
    action: AuditAction,
    detail: &str,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO audit_log (operator_id, action, detail, timestamp) VALUES (?1, ?2, ?3, ?4)",
        params![
            operator_id,
            action.as_str(),
            detail,
            Utc::now().format("%Y-%m-%d %H:%M:%S%.3f").to_string()
        ],
    )?;
    Ok(())
}

/// All audit rows for one operator, oldest first.
pub fn query_audit_for(
    conn: &Connection,
    operator_id: &str,
) -> Result<Vec<AuditEntry>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, operator_id, action, detail, timestamp FROM audit_log
         WHERE operator_id = ?1 ORDER BY id ASC",
    )?;
    let rows = stmt
        .query_map(params![operator_id], |row| {
            Ok(AuditEntry {
                id: row.get(0)?,
                operator_id: row.get(1)?,
                action: row.get(2)?,
                detail: row.get(3)?,
                timestamp: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::open_memory_database;

    #[test]
    fn audit_rows_ordered_oldest_first() {
        let conn = open_memory_database().unwrap();
        insert_audit(&conn, "op-1", AuditAction::Insert, "created").unwrap();
        insert_audit(&conn, "op-1", AuditAction::Update, "merged new fields").unwrap();
        insert_audit(&conn, "op-2", AuditAction::Insert, "created").unwrap();

        let trail = query_audit_for(&conn, "op-1").unwrap();
        assert_eq!(trail.len(), 2);
        assert_eq!(trail[0].action, "insert");
        assert_eq!(trail[1].action, "update");
    }
}
