//! The record contract: an explicit field list plus optional lifecycle hooks.

use crate::config::{ColumnSpec, ObjectDescriptor};
use crate::error::AppError;
use crate::sql::SqlValue;
use async_trait::async_trait;
use sqlx::sqlite::SqliteConnection;

/// One column of a record type: its SQL shape and how to read and write it on `R`.
pub struct Field<R> {
    pub name: &'static str,
    pub sql_type: &'static str,
    pub nullable: bool,
    pub primary_key: bool,
    pub default: Option<&'static str>,
    pub get: fn(&R) -> SqlValue,
    pub set: fn(&mut R, SqlValue) -> Result<(), AppError>,
}

impl<R> Field<R> {
    /// Primary-key field (NOT NULL).
    pub fn key(
        name: &'static str,
        sql_type: &'static str,
        get: fn(&R) -> SqlValue,
        set: fn(&mut R, SqlValue) -> Result<(), AppError>,
    ) -> Self {
        Field {
            name,
            sql_type,
            nullable: false,
            primary_key: true,
            default: None,
            get,
            set,
        }
    }

    pub fn column(
        name: &'static str,
        sql_type: &'static str,
        get: fn(&R) -> SqlValue,
        set: fn(&mut R, SqlValue) -> Result<(), AppError>,
    ) -> Self {
        Field {
            name,
            sql_type,
            nullable: true,
            primary_key: false,
            default: None,
            get,
            set,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn default_value(mut self, expression: &'static str) -> Self {
        self.default = Some(expression);
        self
    }

    pub fn to_spec(&self) -> ColumnSpec {
        ColumnSpec {
            name: self.name.to_string(),
            sql_type: self.sql_type.to_string(),
            nullable: self.nullable,
            primary_key: self.primary_key,
            default: self.default.map(str::to_string),
            check: None,
        }
    }
}

/// A business record stored in `<Company>$<TABLE_NAME>`.
///
/// ```ignore
/// #[derive(Default)]
/// struct PaymentTerms { code: String, description: String }
///
/// impl Record for PaymentTerms {
///     const TABLE_ID: u32 = 3;
///     const TABLE_NAME: &'static str = "Payment Terms";
///     fn fields() -> Vec<Field<Self>> {
///         vec![
///             Field::<Self>::key("code", "VARCHAR(10)", |r| r.code.clone().into(), |r, v| {
///                 r.code = v.into_text()?;
///                 Ok(())
///             }),
///             Field::<Self>::column("description", "VARCHAR(100)", |r| r.description.clone().into(), |r, v| {
///                 r.description = v.into_text()?;
///                 Ok(())
///             }),
///         ]
///     }
/// }
/// impl RecordHooks for PaymentTerms {}
/// ```
pub trait Record: RecordHooks + Default + Sized + 'static {
    const TABLE_ID: u32;
    const TABLE_NAME: &'static str;

    /// Columns in storage order; at least one must be a key.
    fn fields() -> Vec<Field<Self>>;

    fn descriptor() -> ObjectDescriptor {
        let columns = Self::fields().iter().map(Field::to_spec).collect();
        ObjectDescriptor::table(Self::TABLE_ID, Self::TABLE_NAME, columns)
    }

    /// Every field value in storage order.
    fn values(&self) -> Vec<SqlValue> {
        Self::fields().iter().map(|f| (f.get)(self)).collect()
    }

    /// Key field values in storage order.
    fn key_values(&self) -> Vec<SqlValue> {
        Self::fields()
            .iter()
            .filter(|f| f.primary_key)
            .map(|f| (f.get)(self))
            .collect()
    }

    /// JSON object of field name to value.
    fn to_json(&self) -> serde_json::Value {
        let map = Self::fields()
            .iter()
            .map(|f| (f.name.to_string(), (f.get)(self).to_json()))
            .collect();
        serde_json::Value::Object(map)
    }
}

/// What a hook can see: the company it runs in, the acting user and the session's
/// connection (inside the caller's transaction, if any).
pub struct HookContext<'a> {
    pub company: &'a str,
    pub user: Option<&'a str>,
    pub conn: &'a mut SqliteConnection,
}

impl HookContext<'_> {
    /// Load a related record of the same company by key.
    pub async fn get<T: Record>(&mut self, key: &[SqlValue]) -> Result<Option<T>, AppError> {
        super::crud::fetch_by_key::<T>(&mut *self.conn, self.company, key).await
    }
}

/// Lifecycle hooks. Every hook defaults to doing nothing.
///
/// An error from `validate` or an `on_*` hook aborts the operation before it writes
/// anything. The `after_*` hooks run once the row is written, on the same connection;
/// an error there undoes that write and is returned.
#[async_trait]
pub trait RecordHooks: Send + Sync {
    fn validate(&self) -> Result<(), AppError> {
        Ok(())
    }

    async fn on_insert(&mut self, _ctx: &mut HookContext<'_>) -> Result<(), AppError> {
        Ok(())
    }

    async fn on_modify(&mut self, _ctx: &mut HookContext<'_>) -> Result<(), AppError> {
        Ok(())
    }

    async fn on_delete(&self, _ctx: &mut HookContext<'_>) -> Result<(), AppError> {
        Ok(())
    }

    async fn on_rename(&mut self, _ctx: &mut HookContext<'_>, _new_key: &[SqlValue]) -> Result<(), AppError> {
        Ok(())
    }

    async fn after_insert(&self, _ctx: &mut HookContext<'_>) -> Result<(), AppError> {
        Ok(())
    }

    async fn after_modify(&self, _ctx: &mut HookContext<'_>) -> Result<(), AppError> {
        Ok(())
    }

    async fn after_delete(&self, _ctx: &mut HookContext<'_>) -> Result<(), AppError> {
        Ok(())
    }
}
