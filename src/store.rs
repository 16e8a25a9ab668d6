//! Global system tables and catalog queries.
//!
//! `Company` lists the tenants; `FieldDefinition` records every column the reconciler has
//! materialized per (company, table). Neither table carries a `$`, so both are global.

use crate::config::ColumnSpec;
use crate::error::AppError;
use crate::session::Session;
use crate::tenant;
use serde::Serialize;
use sqlx::sqlite::SqliteConnection;
use sqlx::Row;

pub const COMPANY_TABLE: &str = "Company";
pub const FIELD_DEFINITION_TABLE: &str = "FieldDefinition";

/// Create `Company` and `FieldDefinition` if not exists.
pub async fn ensure_system_tables(conn: &mut SqliteConnection) -> Result<(), AppError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS "Company" (
            name TEXT PRIMARY KEY COLLATE NOCASE,
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(&mut *conn)
    .await?;
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS "FieldDefinition" (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            company TEXT NOT NULL COLLATE NOCASE,
            table_name TEXT NOT NULL COLLATE NOCASE,
            field_name TEXT NOT NULL,
            field_type TEXT NOT NULL,
            is_primary_key INTEGER NOT NULL DEFAULT 0,
            field_order INTEGER NOT NULL DEFAULT 0,
            UNIQUE (company, table_name, field_name)
        )
        "#,
    )
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Open a named savepoint. Outside a transaction this starts one that the matching
/// release commits.
pub async fn savepoint(conn: &mut SqliteConnection, name: &str) -> Result<(), AppError> {
    sqlx::query(&format!("SAVEPOINT {}", name))
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Release `name` on success; roll back to it and release it on failure. The outcome is
/// passed through.
pub async fn close_savepoint<T>(
    conn: &mut SqliteConnection,
    name: &str,
    outcome: Result<T, AppError>,
) -> Result<T, AppError> {
    if outcome.is_err() {
        sqlx::query(&format!("ROLLBACK TO {}", name))
            .execute(&mut *conn)
            .await?;
    }
    sqlx::query(&format!("RELEASE {}", name))
        .execute(&mut *conn)
        .await?;
    outcome
}

pub async fn system_tables_exist(conn: &mut SqliteConnection) -> Result<bool, AppError> {
    table_exists(conn, COMPANY_TABLE).await
}

pub async fn table_exists(conn: &mut SqliteConnection, name: &str) -> Result<bool, AppError> {
    let row: Option<(String,)> =
        sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ? COLLATE NOCASE",
        )
            .bind(name)
            .fetch_optional(&mut *conn)
            .await?;
    Ok(row.is_some())
}

/// Live column names of a table, lower-cased.
pub async fn live_columns(conn: &mut SqliteConnection, table: &str) -> Result<Vec<String>, AppError> {
    let rows = sqlx::query("SELECT name FROM pragma_table_info(?)")
        .bind(table)
        .fetch_all(&mut *conn)
        .await?;
    rows.iter()
        .map(|r| {
            r.try_get::<String, _>("name")
                .map(|n| n.to_lowercase())
                .map_err(AppError::Db)
        })
        .collect()
}

/// Every physical table named `<company>$*`, company matched case-insensitively.
pub async fn company_tables(conn: &mut SqliteConnection, company: &str) -> Result<Vec<String>, AppError> {
    let names: Vec<(String,)> =
        sqlx::query_as("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .fetch_all(&mut *conn)
            .await?;
    Ok(names
        .into_iter()
        .map(|(n,)| n)
        .filter(|n| tenant::belongs_to_company(n, company))
        .collect())
}

/// The stored spelling of a company name. Names compare without regard to ASCII case,
/// the same way SQLite resolves the `<company>$<base>` table names.
pub async fn canonical_company_name(
    conn: &mut SqliteConnection,
    company: &str,
) -> Result<Option<String>, AppError> {
    let row: Option<(String,)> =
        sqlx::query_as(r#"SELECT name FROM "Company" WHERE name = ? COLLATE NOCASE"#)
            .bind(company)
            .fetch_optional(&mut *conn)
            .await?;
    Ok(row.map(|(name,)| name))
}

pub async fn company_exists(conn: &mut SqliteConnection, company: &str) -> Result<bool, AppError> {
    Ok(canonical_company_name(conn, company).await?.is_some())
}

/// Record one materialized column. Re-running updates type, key flag and order in place.
pub async fn upsert_field_definition(
    conn: &mut SqliteConnection,
    company: &str,
    table_name: &str,
    column: &ColumnSpec,
    order: usize,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO "FieldDefinition"
            (company, table_name, field_name, field_type, is_primary_key, field_order)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT (company, table_name, field_name) DO UPDATE SET
            field_type = excluded.field_type,
            is_primary_key = excluded.is_primary_key,
            field_order = excluded.field_order
        "#,
    )
    .bind(company)
    .bind(table_name)
    .bind(&column.name)
    .bind(&column.sql_type)
    .bind(column.primary_key)
    .bind(order as i64)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn delete_field_definitions(conn: &mut SqliteConnection, company: &str) -> Result<u64, AppError> {
    let done = sqlx::query(r#"DELETE FROM "FieldDefinition" WHERE company = ?"#)
        .bind(company)
        .execute(&mut *conn)
        .await?;
    Ok(done.rows_affected())
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FieldDefinition {
    pub company: String,
    pub table_name: String,
    pub field_name: String,
    pub field_type: String,
    pub is_primary_key: bool,
    pub field_order: i64,
}

/// Recorded columns of the current company, optionally for one table, in table and
/// column order.
pub async fn field_definitions(
    session: &mut Session,
    table_name: Option<&str>,
) -> Result<Vec<FieldDefinition>, AppError> {
    let company = session.require_company()?.to_string();
    let conn = session.executor()?;
    let rows = sqlx::query(
        r#"
        SELECT company, table_name, field_name, field_type, is_primary_key, field_order
        FROM "FieldDefinition"
        WHERE company = ? AND (? IS NULL OR table_name = ?)
        ORDER BY table_name, field_order
        "#,
    )
    .bind(&company)
    .bind(table_name)
    .bind(table_name)
    .fetch_all(&mut *conn)
    .await?;
    rows.iter()
        .map(|r| -> Result<FieldDefinition, AppError> {
            Ok(FieldDefinition {
                company: r.try_get("company")?,
                table_name: r.try_get("table_name")?,
                field_name: r.try_get("field_name")?,
                field_type: r.try_get("field_type")?,
                is_primary_key: r.try_get("is_primary_key")?,
                field_order: r.try_get("field_order")?,
            })
        })
        .collect()
}
