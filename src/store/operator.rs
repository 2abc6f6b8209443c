//! Operator record repository. The national ID number is the natural
//! unique key; upsert converges repeated pipeline runs for the same
//! person instead of erroring, delete is soft, and every mutation writes
//! its audit row in the same transaction.

use std::collections::BTreeMap;

use chrono::Utc;
use rusqlite::{params, Connection, ErrorCode};
use serde_json::Value;
use uuid::Uuid;

use super::audit::insert_audit;
use super::DatabaseError;
use crate::models::{AuditAction, DocumentCategory, OperatorRecord, RecordStatus};

const SELECT_COLUMNS: &str = "id, id_card, operator_name, phone, email, gender, nationality,
    address, business_name, business_address, business_scope, registration_code,
    registered_capital, landlord, lease_start, lease_end, rent, source_files, metadata";

/// Optional columns paired with their value accessor, used by both the
/// insert statement and the non-empty-field update fallback.
fn optional_columns(record: &OperatorRecord) -> Vec<(&'static str, Option<&str>)> {
    vec![
        ("phone", record.phone.as_deref()),
        ("email", record.email.as_deref()),
        ("gender", record.gender.as_deref()),
        ("nationality", record.nationality.as_deref()),
        ("address", record.address.as_deref()),
        ("business_name", record.business_name.as_deref()),
        ("business_address", record.business_address.as_deref()),
        ("business_scope", record.business_scope.as_deref()),
        ("registration_code", record.registration_code.as_deref()),
        ("registered_capital", record.registered_capital.as_deref()),
        ("landlord", record.landlord.as_deref()),
        ("lease_start", record.lease_start.as_deref()),
        ("lease_end", record.lease_end.as_deref()),
        ("rent", record.rent.as_deref()),
    ]
}

fn now_string() -> String {
    Utc::now().format("%Y-%m-%d %H:%M:%S%.3f").to_string()
}

fn json_column<T: serde::Serialize>(value: &T) -> Result<String, DatabaseError> {
    serde_json::to_string(value).map_err(|e| DatabaseError::CorruptColumn(e.to_string()))
}

/// Insert the record, falling back to an update of only the non-empty
/// fields when the identity key already exists. Returns the surrogate id
/// of the row that now holds the data. One audit row is written in the
/// same transaction either way.
pub fn upsert(conn: &Connection, record: &OperatorRecord) -> Result<Uuid, DatabaseError> {
    let tx = conn.unchecked_transaction()?;
    let now = now_string();

    match try_insert(&tx, record, &now) {
        Ok(()) => {
            insert_audit(
                &tx,
                &record.id.to_string(),
                AuditAction::Insert,
                &format!("pipeline upsert: inserted id_card={}", record.id_card),
            )?;
            tx.commit()?;
            tracing::info!(operator_id = %record.id, "Operator record inserted");
            Ok(record.id)
        }
        Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
            let existing_id: String = tx.query_row(
                "SELECT id FROM operators WHERE id_card = ?1",
                params![record.id_card],
                |row| row.get(0),
            )?;
            let updated = update_non_empty(&tx, record, &now)?;
            insert_audit(
                &tx,
                &existing_id,
                AuditAction::Update,
                &format!("pipeline upsert: updated fields [{}]", updated.join(", ")),
            )?;
            tx.commit()?;
            tracing::info!(operator_id = %existing_id, fields = updated.len(), "Operator record updated");
            Uuid::parse_str(&existing_id)
                .map_err(|e| DatabaseError::CorruptColumn(e.to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

fn try_insert(conn: &Connection, record: &OperatorRecord, now: &str) -> Result<(), rusqlite::Error> {
    let mut columns = vec![
        "id".to_string(),
        "id_card".to_string(),
        "operator_name".to_string(),
    ];
    let mut values: Vec<String> = vec![
        record.id.to_string(),
        record.id_card.clone(),
        record.operator_name.clone(),
    ];

    for (column, value) in optional_columns(record) {
        if let Some(v) = value {
            columns.push(column.to_string());
            values.push(v.to_string());
        }
    }

    columns.push("source_files".to_string());
    values.push(serde_json::to_string(&record.source_files).unwrap_or_else(|_| "{}".into()));
    columns.push("metadata".to_string());
    values.push(serde_json::to_string(&record.metadata).unwrap_or_else(|_| "{}".into()));
    columns.push("status".to_string());
    values.push(RecordStatus::Active.as_str().to_string());
    columns.push("created_at".to_string());
    values.push(now.to_string());
    columns.push("updated_at".to_string());
    values.push(now.to_string());

    let placeholders: Vec<String> = (1..=values.len()).map(|i| format!("?{i}")).collect();
    let sql = format!(
        "INSERT INTO operators ({}) VALUES ({})",
        columns.join(", "),
        placeholders.join(", ")
    );
    conn.execute(&sql, rusqlite::params_from_iter(values.iter()))?;
    Ok(())
}

/// Update only the non-empty fields supplied, so a sparse re-run can
/// never blank out data a previous run recognized. Returns the updated
/// column names for the audit detail.
fn update_non_empty(
    conn: &Connection,
    record: &OperatorRecord,
    now: &str,
) -> Result<Vec<String>, DatabaseError> {
    let mut assignments = vec!["operator_name".to_string()];
    let mut values: Vec<String> = vec![record.operator_name.clone()];

    for (column, value) in optional_columns(record) {
        if let Some(v) = value {
            assignments.push(column.to_string());
            values.push(v.to_string());
        }
    }
    if !record.source_files.is_empty() {
        assignments.push("source_files".to_string());
        values.push(json_column(&record.source_files)?);
    }
    if !record.metadata.is_empty() {
        assignments.push("metadata".to_string());
        values.push(json_column(&record.metadata)?);
    }
    // A fresh upsert resurrects a soft-deleted row: the person showed up
    // again with valid documents, so the record is active again.
    assignments.push("status".to_string());
    values.push(RecordStatus::Active.as_str().to_string());
    assignments.push("updated_at".to_string());
    values.push(now.to_string());

    let set_clause: Vec<String> = assignments
        .iter()
        .enumerate()
        .map(|(i, col)| format!("{col} = ?{}", i + 1))
        .collect();
    let key_placeholder = values.len() + 1;
    values.push(record.id_card.clone());

    let sql = format!(
        "UPDATE operators SET {} WHERE id_card = ?{key_placeholder}",
        set_clause.join(", ")
    );
    conn.execute(&sql, rusqlite::params_from_iter(values.iter()))?;
    Ok(assignments)
}

/// Look up the active record for a national ID number. Soft-deleted rows
/// are invisible here.
pub fn find_by_identity_key(
    conn: &Connection,
    id_card: &str,
) -> Result<Option<OperatorRecord>, DatabaseError> {
    let sql = format!(
        "SELECT {SELECT_COLUMNS} FROM operators WHERE id_card = ?1 AND status = ?2"
    );
    let mut stmt = conn.prepare(&sql)?;
    let result = stmt.query_row(
        params![id_card, RecordStatus::Active.as_str()],
        row_to_operator_row,
    );
    match result {
        Ok(row) => Ok(Some(operator_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// All active records, most recently updated first.
pub fn list_active(conn: &Connection) -> Result<Vec<OperatorRecord>, DatabaseError> {
    let sql = format!(
        "SELECT {SELECT_COLUMNS} FROM operators WHERE status = ?1 ORDER BY updated_at DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![RecordStatus::Active.as_str()], row_to_operator_row)?
        .collect::<Result<Vec<_>, _>>()?;

    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        records.push(operator_from_row(row)?);
    }
    Ok(records)
}

/// Flip the status flag to deleted. Physical deletion is never performed
/// here; the audit trail keeps referencing the row.
pub fn soft_delete(conn: &Connection, id_card: &str) -> Result<(), DatabaseError> {
    let tx = conn.unchecked_transaction()?;
    let existing_id: String = match tx.query_row(
        "SELECT id FROM operators WHERE id_card = ?1 AND status = ?2",
        params![id_card, RecordStatus::Active.as_str()],
        |row| row.get(0),
    ) {
        Ok(id) => id,
        Err(rusqlite::Error::QueryReturnedNoRows) => {
            return Err(DatabaseError::NotFound {
                entity_type: "Operator".into(),
                id: id_card.to_string(),
            });
        }
        Err(e) => return Err(e.into()),
    };

    tx.execute(
        "UPDATE operators SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![RecordStatus::Deleted.as_str(), now_string(), existing_id],
    )?;
    insert_audit(
        &tx,
        &existing_id,
        AuditAction::SoftDelete,
        &format!("soft delete for id_card={id_card}"),
    )?;
    tx.commit()?;
    tracing::info!(operator_id = %existing_id, "Operator record soft-deleted");
    Ok(())
}

// Internal row type for Operator mapping
struct OperatorRow {
    id: String,
    id_card: String,
    operator_name: String,
    phone: Option<String>,
    email: Option<String>,
    gender: Option<String>,
    nationality: Option<String>,
    address: Option<String>,
    business_name: Option<String>,
    business_address: Option<String>,
    business_scope: Option<String>,
    registration_code: Option<String>,
    registered_capital: Option<String>,
    landlord: Option<String>,
    lease_start: Option<String>,
    lease_end: Option<String>,
    rent: Option<String>,
    source_files: String,
    metadata: String,
}

fn row_to_operator_row(row: &rusqlite::Row<'_>) -> Result<OperatorRow, rusqlite::Error> {
    Ok(OperatorRow {
        id: row.get(0)?,
        id_card: row.get(1)?,
        operator_name: row.get(2)?,
        phone: row.get(3)?,
        email: row.get(4)?,
        gender: row.get(5)?,
        nationality: row.get(6)?,
        address: row.get(7)?,
        business_name: row.get(8)?,
        business_address: row.get(9)?,
        business_scope: row.get(10)?,
        registration_code: row.get(11)?,
        registered_capital: row.get(12)?,
        landlord: row.get(13)?,
        lease_start: row.get(14)?,
        lease_end: row.get(15)?,
        rent: row.get(16)?,
        source_files: row.get(17)?,
        metadata: row.get(18)?,
    })
}

fn operator_from_row(row: OperatorRow) -> Result<OperatorRecord, DatabaseError> {
    let source_files: BTreeMap<DocumentCategory, String> =
        serde_json::from_str(&row.source_files)
            .map_err(|e| DatabaseError::CorruptColumn(format!("source_files: {e}")))?;
    let metadata: BTreeMap<String, Value> = serde_json::from_str(&row.metadata)
        .map_err(|e| DatabaseError::CorruptColumn(format!("metadata: {e}")))?;

    Ok(OperatorRecord {
        id: Uuid::parse_str(&row.id).map_err(|e| DatabaseError::CorruptColumn(e.to_string()))?,
        operator_name: row.operator_name,
        id_card: row.id_card,
        phone: row.phone,
        email: row.email,
        gender: row.gender,
        nationality: row.nationality,
        address: row.address,
        business_name: row.business_name,
        business_address: row.business_address,
        business_scope: row.business_scope,
        registration_code: row.registration_code,
        registered_capital: row.registered_capital,
        landlord: row.landlord,
        lease_start: row.lease_start,
        lease_end: row.lease_end,
        rent: row.rent,
        source_files,
        metadata,
    })
}
