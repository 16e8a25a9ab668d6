//! Generic record CRUD against the current company's tables.

use super::record::{Field, Record};
use super::validation::RecordValidator;
use crate::error::AppError;
use crate::session::Session;
use crate::sql::{
    build_filter_clause, cell_to_value, count, delete, insert, select_by_key, select_list, update,
    update_key, FilterExpression, PhysicalTable, QueryBuf, SqlValue,
};
use crate::{store, tenant};
use sqlx::sqlite::{SqliteConnection, SqliteRow};

/// Wraps one write and its `after_*` hook.
const WRITE_SAVEPOINT: &str = "record_write";

pub struct CrudService;

impl CrudService {
    /// Column checks, `validate`, `on_insert`, INSERT, then `after_insert`. A duplicate key
    /// is `Conflict`.
    pub async fn insert<R: Record>(session: &mut Session, record: &mut R) -> Result<(), AppError> {
        let table = physical_table::<R>(session.require_company()?)?;
        RecordValidator::validate(&table.columns, &record.values())?;
        record.validate().map_err(|e| AppError::hook("validate", e))?;
        {
            let mut ctx = session.hook_context()?;
            record
                .on_insert(&mut ctx)
                .await
                .map_err(|e| AppError::hook("on_insert", e))?;
        }

        let values = record.values();
        RecordValidator::validate(&table.columns, &values)?;
        let q = insert(&table, &values);
        store::savepoint(session.executor()?, WRITE_SAVEPOINT).await?;
        let outcome = insert_row(session, &*record, &q).await;
        store::close_savepoint(session.executor()?, WRITE_SAVEPOINT, outcome).await
    }

    /// Column checks, `validate`, `on_modify`, UPDATE of every non-key column, then
    /// `after_modify`. The record's key locates the row; it is never written. `NotFound`
    /// when no row has that key.
    pub async fn modify<R: Record>(session: &mut Session, record: &mut R) -> Result<(), AppError> {
        let table = physical_table::<R>(session.require_company()?)?;
        RecordValidator::validate(&table.columns, &record.values())?;
        record.validate().map_err(|e| AppError::hook("validate", e))?;
        {
            let mut ctx = session.hook_context()?;
            record
                .on_modify(&mut ctx)
                .await
                .map_err(|e| AppError::hook("on_modify", e))?;
        }

        store::savepoint(session.executor()?, WRITE_SAVEPOINT).await?;
        let outcome = modify_row(session, &*record, &table).await;
        store::close_savepoint(session.executor()?, WRITE_SAVEPOINT, outcome).await
    }

    /// Load by key, apply the given field changes and modify. Changes to key fields are
    /// ignored; use [`CrudService::rename`] for those. Unknown fields are rejected.
    pub async fn modify_fields<R: Record>(
        session: &mut Session,
        key: &[SqlValue],
        changes: &[(&str, SqlValue)],
    ) -> Result<R, AppError> {
        let mut record = Self::get::<R>(session, key)
            .await?
            .ok_or_else(|| not_found::<R>(key))?;
        let fields = R::fields();
        for (name, value) in changes {
            let field = fields
                .iter()
                .find(|f| f.name.eq_ignore_ascii_case(name))
                .ok_or_else(|| AppError::Validation(format!("{} has no field '{}'", R::TABLE_NAME, name)))?;
            if field.primary_key {
                tracing::warn!(
                    table = R::TABLE_NAME,
                    field = field.name,
                    "ignoring change to primary key field; use rename"
                );
                continue;
            }
            (field.set)(&mut record, value.clone())?;
        }
        Self::modify(session, &mut record).await?;
        Ok(record)
    }

    /// `on_delete`, DELETE by key, then `after_delete`. `NotFound` when no row has that key.
    pub async fn delete<R: Record>(session: &mut Session, record: &R) -> Result<(), AppError> {
        let table = physical_table::<R>(session.require_company()?)?;
        {
            let mut ctx = session.hook_context()?;
            record
                .on_delete(&mut ctx)
                .await
                .map_err(|e| AppError::hook("on_delete", e))?;
        }
        store::savepoint(session.executor()?, WRITE_SAVEPOINT).await?;
        let outcome = delete_row(session, record, &table).await;
        store::close_savepoint(session.executor()?, WRITE_SAVEPOINT, outcome).await
    }

    /// Change a record's primary key: `on_rename`, then UPDATE of the key columns.
    /// On success the record carries the new key.
    pub async fn rename<R: Record>(
        session: &mut Session,
        record: &mut R,
        new_key: &[SqlValue],
    ) -> Result<(), AppError> {
        let table = physical_table::<R>(session.require_company()?)?;
        RecordValidator::validate_key(&table.columns, new_key)?;
        {
            let mut ctx = session.hook_context()?;
            record
                .on_rename(&mut ctx, new_key)
                .await
                .map_err(|e| AppError::hook("on_rename", e))?;
        }

        let old_key = record.key_values();
        let q = update_key(&table, &old_key, new_key);
        let affected = match execute(session.executor()?, &q).await {
            Ok(n) => n,
            Err(e) if e.is_unique_violation() => {
                return Err(AppError::Conflict(format!(
                    "{} {:?} already exists",
                    R::TABLE_NAME,
                    new_key
                )))
            }
            Err(e) => return Err(e),
        };
        if affected == 0 {
            return Err(not_found::<R>(&old_key));
        }
        let key_fields = R::fields().into_iter().filter(|f| f.primary_key);
        for (field, value) in key_fields.zip(new_key) {
            (field.set)(&mut *record, value.clone())?;
        }
        Ok(())
    }

    /// Fetch one record by full primary key.
    pub async fn get<R: Record>(session: &mut Session, key: &[SqlValue]) -> Result<Option<R>, AppError> {
        let company = session.require_company()?.to_string();
        fetch_by_key::<R>(session.executor()?, &company, key).await
    }

    /// All records, ordered by primary key.
    pub async fn list<R: Record>(session: &mut Session) -> Result<Vec<R>, AppError> {
        Self::search::<R>(session, &[]).await
    }

    /// Records matching every filter, ordered by primary key.
    pub async fn search<R: Record>(
        session: &mut Session,
        filters: &[FilterExpression],
    ) -> Result<Vec<R>, AppError> {
        let table = physical_table::<R>(session.require_company()?)?;
        let predicate = build_filter_clause(&resolve_filters::<R>(filters)?)?;
        let q = select_list(&table, predicate.as_ref());
        fetch_all::<R>(session.executor()?, &q).await
    }

    pub async fn count<R: Record>(
        session: &mut Session,
        filters: &[FilterExpression],
    ) -> Result<u64, AppError> {
        let table = physical_table::<R>(session.require_company()?)?;
        let predicate = build_filter_clause(&resolve_filters::<R>(filters)?)?;
        let q = count(&table, predicate.as_ref());
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query_scalar::<_, i64>(&q.sql);
        for p in &q.params {
            query = query.bind(p.clone());
        }
        let n = query.fetch_one(session.executor()?).await?;
        Ok(n.max(0) as u64)
    }
}

fn physical_table<R: Record>(company: &str) -> Result<PhysicalTable, AppError> {
    let name = tenant::full_table_name(company, R::TABLE_NAME)?;
    let columns = R::fields().iter().map(Field::to_spec).collect();
    Ok(PhysicalTable::new(name, columns))
}

async fn insert_row<R: Record>(session: &mut Session, record: &R, q: &QueryBuf) -> Result<(), AppError> {
    match execute(session.executor()?, q).await {
        Ok(_) => {}
        Err(e) if e.is_unique_violation() => {
            return Err(AppError::Conflict(format!(
                "{} {:?} already exists",
                R::TABLE_NAME,
                record.key_values()
            )))
        }
        Err(e) => return Err(e),
    }
    let mut ctx = session.hook_context()?;
    record
        .after_insert(&mut ctx)
        .await
        .map_err(|e| AppError::hook("after_insert", e))
}

async fn modify_row<R: Record>(session: &mut Session, record: &R, table: &PhysicalTable) -> Result<(), AppError> {
    let key = record.key_values();
    let affected = match update(table, &record.values(), &key) {
        Some(q) => execute(session.executor()?, &q).await?,
        // key-only table: nothing to set, but the row must exist
        None => {
            let q = select_by_key(table, &key);
            u64::from(fetch_optional::<R>(session.executor()?, &q).await?.is_some())
        }
    };
    if affected == 0 {
        return Err(not_found::<R>(&key));
    }
    let mut ctx = session.hook_context()?;
    record
        .after_modify(&mut ctx)
        .await
        .map_err(|e| AppError::hook("after_modify", e))
}

async fn delete_row<R: Record>(session: &mut Session, record: &R, table: &PhysicalTable) -> Result<(), AppError> {
    let key = record.key_values();
    let q = delete(table, &key);
    if execute(session.executor()?, &q).await? == 0 {
        return Err(not_found::<R>(&key));
    }
    let mut ctx = session.hook_context()?;
    record
        .after_delete(&mut ctx)
        .await
        .map_err(|e| AppError::hook("after_delete", e))
}

fn not_found<R: Record>(key: &[SqlValue]) -> AppError {
    AppError::NotFound(format!("{} {:?}", R::TABLE_NAME, key))
}

/// Map filter fields onto the record's own column names. Unknown fields are rejected.
fn resolve_filters<R: Record>(filters: &[FilterExpression]) -> Result<Vec<FilterExpression>, AppError> {
    let fields = R::fields();
    filters
        .iter()
        .map(|f| -> Result<FilterExpression, AppError> {
            let field = fields
                .iter()
                .find(|x| x.name.eq_ignore_ascii_case(f.field.trim()))
                .ok_or_else(|| {
                    AppError::Validation(format!("{} has no field '{}'", R::TABLE_NAME, f.field))
                })?;
            Ok(FilterExpression::new(field.name, f.expression.as_str()))
        })
        .collect()
}

pub(crate) async fn fetch_by_key<R: Record>(
    conn: &mut SqliteConnection,
    company: &str,
    key: &[SqlValue],
) -> Result<Option<R>, AppError> {
    let table = physical_table::<R>(company)?;
    RecordValidator::validate_key(&table.columns, key)?;
    let q = select_by_key(&table, key);
    fetch_optional::<R>(conn, &q).await
}

async fn execute(conn: &mut SqliteConnection, q: &QueryBuf) -> Result<u64, AppError> {
    tracing::debug!(sql = %q.sql, params = ?q.params, "query");
    let mut query = sqlx::query(&q.sql);
    for p in &q.params {
        query = query.bind(p.clone());
    }
    Ok(query.execute(&mut *conn).await?.rows_affected())
}

async fn fetch_optional<R: Record>(conn: &mut SqliteConnection, q: &QueryBuf) -> Result<Option<R>, AppError> {
    tracing::debug!(sql = %q.sql, params = ?q.params, "query");
    let mut query = sqlx::query(&q.sql);
    for p in &q.params {
        query = query.bind(p.clone());
    }
    let row = query.fetch_optional(&mut *conn).await?;
    row.as_ref().map(row_to_record::<R>).transpose()
}

async fn fetch_all<R: Record>(conn: &mut SqliteConnection, q: &QueryBuf) -> Result<Vec<R>, AppError> {
    tracing::debug!(sql = %q.sql, params = ?q.params, "query");
    let mut query = sqlx::query(&q.sql);
    for p in &q.params {
        query = query.bind(p.clone());
    }
    let rows = query.fetch_all(&mut *conn).await?;
    rows.iter().map(row_to_record::<R>).collect()
}

fn row_to_record<R: Record>(row: &SqliteRow) -> Result<R, AppError> {
    let mut record = R::default();
    for field in R::fields() {
        (field.set)(&mut record, cell_to_value(row, field.name))?;
    }
    Ok(record)
}
