//! Session: one connection, the current company and user, and explicit transactions.
//!
//! Transactions are plain `BEGIN`/`COMMIT`/`ROLLBACK` on the session's own connection, so
//! [`Session::executor`] is the same handle whether or not a transaction is active and
//! record operations never need to know which one they run under.

use crate::config::EngineSettings;
use crate::error::{AppError, TransactionStateError};
use crate::service::HookContext;
use crate::store;
use futures_util::future::{BoxFuture, FutureExt};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::{ConnectOptions, Connection};
use std::panic::AssertUnwindSafe;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserContext {
    pub id: String,
    pub name: String,
    pub language: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TxState {
    Idle,
    Active,
}

pub struct Session {
    id: Uuid,
    conn: Option<SqliteConnection>,
    company: Option<String>,
    user: Option<UserContext>,
    tx: TxState,
}

impl Session {
    fn with_connection(conn: SqliteConnection) -> Self {
        Session {
            id: Uuid::new_v4(),
            conn: Some(conn),
            company: None,
            user: None,
            tx: TxState::Idle,
        }
    }

    /// Open the database at `url`, creating the file and the system tables when missing.
    pub async fn create(url: &str) -> Result<Self, AppError> {
        let opts = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let mut conn = opts.connect().await?;
        store::ensure_system_tables(&mut conn).await?;
        let session = Session::with_connection(conn);
        tracing::info!(session = %session.id, url, "database ready");
        Ok(session)
    }

    /// Open an existing database. Fails `NotFound` when it was never initialized.
    pub async fn open(url: &str) -> Result<Self, AppError> {
        let opts = SqliteConnectOptions::from_str(url)?;
        let mut conn = opts.connect().await?;
        if !store::system_tables_exist(&mut conn).await? {
            let _ = conn.close().await;
            return Err(AppError::NotFound(format!(
                "database {} has no Company table; create it first",
                url
            )));
        }
        let session = Session::with_connection(conn);
        tracing::info!(session = %session.id, url, "database opened");
        Ok(session)
    }

    /// Create or open per settings and stamp the default user, if any.
    pub async fn from_settings(settings: &EngineSettings) -> Result<Self, AppError> {
        let mut session = if settings.create_if_missing {
            Session::create(&settings.database_url).await?
        } else {
            Session::open(&settings.database_url).await?
        };
        if let Some(user) = &settings.default_user {
            session.set_user(user.clone(), user.clone(), "en");
        }
        Ok(session)
    }

    /// Close the connection. An active transaction is rolled back first. Every later
    /// operation fails `NotOpen`.
    pub async fn close(&mut self) -> Result<(), AppError> {
        self.rollback_quietly().await;
        self.company = None;
        if let Some(conn) = self.conn.take() {
            conn.close().await?;
            tracing::info!(session = %self.id, "database closed");
        }
        Ok(())
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    /// Current company, if one was entered.
    pub fn company(&self) -> Option<&str> {
        self.company.as_deref()
    }

    pub(crate) fn set_company(&mut self, company: Option<String>) {
        self.company = company;
    }

    /// Fails `NotOpen` or `NoCompanyContext`; otherwise the current company.
    pub fn require_company(&self) -> Result<&str, AppError> {
        if self.conn.is_none() {
            return Err(AppError::NotOpen);
        }
        self.company.as_deref().ok_or(AppError::NoCompanyContext)
    }

    pub fn set_user(&mut self, id: impl Into<String>, name: impl Into<String>, language: impl Into<String>) {
        self.user = Some(UserContext {
            id: id.into(),
            name: name.into(),
            language: language.into(),
        });
    }

    pub fn user(&self) -> Option<&UserContext> {
        self.user.as_ref()
    }

    /// The connection carrying the session's work, inside or outside a transaction.
    pub fn executor(&mut self) -> Result<&mut SqliteConnection, AppError> {
        self.conn.as_mut().ok_or(AppError::NotOpen)
    }

    /// Company, user and connection borrowed together for a record hook.
    pub(crate) fn hook_context(&mut self) -> Result<HookContext<'_>, AppError> {
        let conn = self.conn.as_mut().ok_or(AppError::NotOpen)?;
        let company = self.company.as_deref().ok_or(AppError::NoCompanyContext)?;
        Ok(HookContext {
            company,
            user: self.user.as_ref().map(|u| u.id.as_str()),
            conn,
        })
    }

    pub fn in_transaction(&self) -> bool {
        self.tx == TxState::Active
    }

    pub async fn begin_transaction(&mut self) -> Result<(), AppError> {
        if self.tx == TxState::Active {
            return Err(TransactionStateError::AlreadyActive.into());
        }
        let conn = self.executor()?;
        sqlx::query("BEGIN").execute(&mut *conn).await?;
        self.tx = TxState::Active;
        tracing::debug!(session = %self.id, "transaction begun");
        Ok(())
    }

    pub async fn commit(&mut self) -> Result<(), AppError> {
        self.finish("COMMIT").await
    }

    pub async fn rollback(&mut self) -> Result<(), AppError> {
        self.finish("ROLLBACK").await
    }

    /// The state goes back to Idle before the engine's answer is looked at.
    async fn finish(&mut self, statement: &'static str) -> Result<(), AppError> {
        if self.tx != TxState::Active {
            return Err(TransactionStateError::NoActiveTransaction.into());
        }
        self.tx = TxState::Idle;
        let conn = self.executor()?;
        sqlx::query(statement).execute(&mut *conn).await?;
        tracing::debug!(session = %self.id, statement, "transaction finished");
        Ok(())
    }

    async fn rollback_quietly(&mut self) {
        if !self.in_transaction() {
            return;
        }
        if let Err(e) = self.rollback().await {
            tracing::warn!(session = %self.id, error = %e, "rollback failed");
        }
    }

    /// Run `body` inside a transaction. `Ok` commits (unless the body already finished the
    /// transaction itself), `Err` rolls back and returns the body's error unchanged, and a
    /// panic rolls back before it is resumed.
    ///
    /// ```ignore
    /// let mut terms = PaymentTerms { code: "30D".into(), ..Default::default() };
    /// session
    ///     .with_transaction(move |s| Box::pin(async move { CrudService::insert(s, &mut terms).await }))
    ///     .await?;
    /// ```
    pub async fn with_transaction<T, F>(&mut self, body: F) -> Result<T, AppError>
    where
        F: for<'c> FnOnce(&'c mut Session) -> BoxFuture<'c, Result<T, AppError>>,
    {
        self.begin_transaction().await?;
        let outcome = AssertUnwindSafe(body(self)).catch_unwind().await;
        match outcome {
            Ok(Ok(value)) => {
                if self.in_transaction() {
                    self.commit().await?;
                }
                Ok(value)
            }
            Ok(Err(e)) => {
                self.rollback_quietly().await;
                Err(e)
            }
            Err(panic) => {
                self.rollback_quietly().await;
                std::panic::resume_unwind(panic)
            }
        }
    }
}
