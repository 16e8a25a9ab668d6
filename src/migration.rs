//! Schema reconciliation: bring one company's physical tables in line with the registry.
//!
//! Absent tables are created. Existing tables gain the columns they lack; nothing is ever
//! dropped or retyped. Each entity runs under its own SAVEPOINT, so a failing entity leaves
//! no partial change behind while the others proceed. This works the same inside or
//! outside a caller's transaction.

use crate::config::ObjectDescriptor;
use crate::error::AppError;
use crate::registry::ObjectRegistry;
use crate::session::Session;
use crate::sql::{add_column, backfill_nulls, create_table};
use crate::{store, tenant};
use sqlx::sqlite::SqliteConnection;
use std::collections::HashSet;
use std::fmt;

const SAVEPOINT: &str = "reconcile_entity";

#[derive(Debug)]
pub struct EntityFailure {
    pub table_id: u32,
    pub table_name: String,
    pub error: Box<AppError>,
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Default)]
pub struct MigrationReport {
    pub company: String,
    pub tables_created: usize,
    /// Tables that already existed and were reconciled, changed or not.
    pub tables_migrated: usize,
    pub columns_added: usize,
    pub failures: Vec<EntityFailure>,
}

impl MigrationReport {
    fn new(company: &str) -> Self {
        MigrationReport {
            company: company.to_string(),
            ..Default::default()
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

impl fmt::Display for MigrationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "company {}: {} tables created, {} migrated, {} columns added",
            self.company, self.tables_created, self.tables_migrated, self.columns_added
        )?;
        if !self.failures.is_empty() {
            write!(f, "; {} failed:", self.failures.len())?;
            for fail in &self.failures {
                write!(f, " [table {} {}: {}]", fail.table_id, fail.table_name, fail.error)?;
            }
        }
        Ok(())
    }
}

enum EntityOutcome {
    Created,
    Migrated { columns_added: usize },
}

/// Reconcile every table descriptor that carries a schema for `company`.
///
/// Returns the report when every entity succeeded, `MigrationFailed(report)` otherwise.
/// Successful entities keep their changes either way.
pub async fn reconcile_company(
    session: &mut Session,
    registry: &ObjectRegistry,
    company: &str,
) -> Result<MigrationReport, AppError> {
    tenant::validate_company_name(company)?;
    let session_id = session.id();
    let conn = session.executor()?;
    let company = store::canonical_company_name(conn, company)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("company '{}'", company)))?;
    let company = company.as_str();

    let mut report = MigrationReport::new(company);
    for descriptor in registry.tables_with_schema() {
        sqlx::query(&format!("SAVEPOINT {}", SAVEPOINT))
            .execute(&mut *conn)
            .await?;
        match reconcile_entity(conn, company, descriptor).await {
            Ok(outcome) => {
                sqlx::query(&format!("RELEASE {}", SAVEPOINT))
                    .execute(&mut *conn)
                    .await?;
                match outcome {
                    EntityOutcome::Created => report.tables_created += 1,
                    EntityOutcome::Migrated { columns_added } => {
                        report.tables_migrated += 1;
                        report.columns_added += columns_added;
                    }
                }
            }
            Err(e) => {
                sqlx::query(&format!("ROLLBACK TO {}", SAVEPOINT))
                    .execute(&mut *conn)
                    .await?;
                sqlx::query(&format!("RELEASE {}", SAVEPOINT))
                    .execute(&mut *conn)
                    .await?;
                tracing::warn!(
                    session = %session_id,
                    company,
                    table_id = descriptor.id,
                    table = %descriptor.name,
                    error = %e,
                    "entity reconciliation failed"
                );
                report.failures.push(EntityFailure {
                    table_id: descriptor.id,
                    table_name: descriptor.name.clone(),
                    error: Box::new(e),
                });
            }
        }
    }

    tracing::info!(
        session = %session_id,
        company,
        created = report.tables_created,
        migrated = report.tables_migrated,
        columns_added = report.columns_added,
        failed = report.failures.len(),
        "reconciliation finished"
    );
    if report.is_clean() {
        Ok(report)
    } else {
        Err(AppError::MigrationFailed(report))
    }
}

async fn reconcile_entity(
    conn: &mut SqliteConnection,
    company: &str,
    descriptor: &ObjectDescriptor,
) -> Result<EntityOutcome, AppError> {
    let table = tenant::full_table_name(company, &descriptor.name)?;

    if !store::table_exists(conn, &table).await? {
        let ddl = create_table(&table, &descriptor.columns);
        sqlx::query(&ddl).execute(&mut *conn).await?;
        record_fields(conn, company, descriptor).await?;
        tracing::debug!(table = %table, "table created");
        return Ok(EntityOutcome::Created);
    }

    let live: HashSet<String> = store::live_columns(conn, &table).await?.into_iter().collect();
    let mut columns_added = 0;
    for column in &descriptor.columns {
        if live.contains(&column.name.to_lowercase()) {
            continue;
        }
        sqlx::query(&add_column(&table, column))
            .execute(&mut *conn)
            .await?;
        let default = column
            .default
            .as_deref()
            .or_else(|| column.type_default().map(|d| d.literal()));
        if let Some(literal) = default {
            sqlx::query(&backfill_nulls(&table, &column.name, literal))
                .execute(&mut *conn)
                .await?;
        }
        columns_added += 1;
        tracing::debug!(table = %table, column = %column.name, sql_type = %column.sql_type, "column added");
    }

    // NULL sweep over pre-existing text and integer columns.
    for column in &descriptor.columns {
        if !live.contains(&column.name.to_lowercase()) {
            continue;
        }
        if let Some(default) = column.type_default() {
            sqlx::query(&backfill_nulls(&table, &column.name, default.literal()))
                .execute(&mut *conn)
                .await?;
        }
    }

    record_fields(conn, company, descriptor).await?;
    Ok(EntityOutcome::Migrated { columns_added })
}

async fn record_fields(
    conn: &mut SqliteConnection,
    company: &str,
    descriptor: &ObjectDescriptor,
) -> Result<(), AppError> {
    for (order, column) in descriptor.columns.iter().enumerate() {
        store::upsert_field_definition(conn, company, &descriptor.name, column, order).await?;
    }
    Ok(())
}
