//! Company lifecycle: create, enter, exit, delete, list, initialize.

use crate::error::AppError;
use crate::migration::{reconcile_company, MigrationReport};
use crate::registry::ObjectRegistry;
use crate::session::Session;
use crate::sql::quoted;
use crate::{store, tenant};
use chrono::NaiveDateTime;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CompanyInfo {
    pub name: String,
    pub created_at: Option<NaiveDateTime>,
}

pub struct CompanyService;

impl CompanyService {
    /// Insert the `Company` row. Tables are created by [`CompanyService::initialize`] or
    /// a later reconciliation.
    pub async fn create(session: &mut Session, name: &str) -> Result<(), AppError> {
        let conn = session.executor()?;
        tenant::validate_company_name(name)?;
        let result = sqlx::query(r#"INSERT INTO "Company" (name) VALUES (?)"#)
            .bind(name)
            .execute(&mut *conn)
            .await;
        match result.map_err(AppError::Db) {
            Ok(_) => {
                tracing::info!(company = name, "company created");
                Ok(())
            }
            Err(e) if e.is_unique_violation() => Err(AppError::DuplicateCompany(name.to_string())),
            Err(e) => Err(e),
        }
    }

    /// Create the company and reconcile every registered table for it.
    pub async fn initialize(
        session: &mut Session,
        registry: &ObjectRegistry,
        name: &str,
    ) -> Result<MigrationReport, AppError> {
        Self::create(session, name).await?;
        reconcile_company(session, registry, name).await
    }

    pub async fn enter(session: &mut Session, name: &str) -> Result<(), AppError> {
        session.executor()?;
        if name.is_empty() {
            return Err(AppError::InvalidName("company name cannot be empty".into()));
        }
        if let Some(current) = session.company() {
            return Err(AppError::AlreadyInCompany(current.to_string()));
        }
        let conn = session.executor()?;
        let company = store::canonical_company_name(conn, name)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("company '{}'", name)))?;
        tracing::info!(session = %session.id(), company = %company, "entered company");
        session.set_company(Some(company));
        Ok(())
    }

    pub async fn exit(session: &mut Session) -> Result<(), AppError> {
        session.executor()?;
        let Some(company) = session.company().map(str::to_string) else {
            return Err(AppError::NotInCompany);
        };
        session.set_company(None);
        tracing::info!(session = %session.id(), company = %company, "exited company");
        Ok(())
    }

    /// Drop every `<name>$*` table, the company's field definitions and its `Company` row,
    /// all or nothing. Runs inside the caller's transaction when one is active. A session
    /// inside the deleted company leaves it once the drop succeeded.
    pub async fn delete(session: &mut Session, name: &str) -> Result<(), AppError> {
        let conn = session.executor()?;
        if name.is_empty() {
            return Err(AppError::InvalidName("company name cannot be empty".into()));
        }
        let company = store::canonical_company_name(conn, name)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("company '{}'", name)))?;

        let dropped = if session.in_transaction() {
            drop_company(session, &company).await?
        } else {
            let owned = company.clone();
            session
                .with_transaction(move |s| Box::pin(async move { drop_company(s, &owned).await }))
                .await?
        };
        if session.company() == Some(company.as_str()) {
            session.set_company(None);
        }
        tracing::info!(company = %company, tables_dropped = dropped, "company deleted");
        Ok(())
    }

    pub async fn list(session: &mut Session) -> Result<Vec<CompanyInfo>, AppError> {
        let conn = session.executor()?;
        let rows: Vec<(String, Option<String>)> =
            sqlx::query_as(r#"SELECT name, created_at FROM "Company" ORDER BY name"#)
                .fetch_all(&mut *conn)
                .await?;
        Ok(rows
            .into_iter()
            .map(|(name, created_at)| CompanyInfo {
                name,
                created_at: created_at
                    .and_then(|s| NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S").ok()),
            })
            .collect())
    }
}

async fn drop_company(session: &mut Session, name: &str) -> Result<usize, AppError> {
    let conn = session.executor()?;
    let tables = store::company_tables(conn, name).await?;
    for table in &tables {
        sqlx::query(&format!("DROP TABLE {}", quoted(table)))
            .execute(&mut *conn)
            .await?;
        tracing::debug!(table = %table, "table dropped");
    }
    store::delete_field_definitions(conn, name).await?;
    sqlx::query(r#"DELETE FROM "Company" WHERE name = ?"#)
        .bind(name)
        .execute(&mut *conn)
        .await?;
    Ok(tables.len())
}
