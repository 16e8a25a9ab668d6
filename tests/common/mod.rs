#![allow(dead_code)]

use async_trait::async_trait;
use erp_foundation::{
    AppError, Code, CompanyService, Field, HookContext, ObjectRegistry, Record, RecordHooks, Session,
    SqlValue,
};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PaymentTerms {
    pub code: Code,
    pub description: String,
    pub due_days: i64,
}

impl PaymentTerms {
    pub fn new(code: &str, description: &str, due_days: i64) -> Self {
        PaymentTerms {
            code: Code::new(code),
            description: description.into(),
            due_days,
        }
    }
}

impl Record for PaymentTerms {
    const TABLE_ID: u32 = 3;
    const TABLE_NAME: &'static str = "Payment Terms";

    fn fields() -> Vec<Field<Self>> {
        vec![
            Field::<Self>::key(
                "code",
                "VARCHAR(10)",
                |r| r.code.clone().into(),
                |r, v| {
                    r.code = v.into_code()?;
                    Ok(())
                },
            ),
            Field::<Self>::column(
                "description",
                "VARCHAR(100)",
                |r| r.description.clone().into(),
                |r, v| {
                    r.description = v.into_text()?;
                    Ok(())
                },
            ),
            Field::<Self>::column(
                "due_days",
                "INTEGER",
                |r| r.due_days.into(),
                |r, v| {
                    r.due_days = v.into_i64()?;
                    Ok(())
                },
            )
            .not_null()
            .default_value("0"),
        ]
    }
}

#[async_trait]
impl RecordHooks for PaymentTerms {
    async fn on_delete(&self, _ctx: &mut HookContext<'_>) -> Result<(), AppError> {
        if self.code == "LOCKED" {
            return Err(AppError::Validation("payment terms LOCKED are in use".into()));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Customer {
    pub no: String,
    pub name: String,
    pub payment_terms_code: String,
    pub balance: f64,
    pub blocked: bool,
}

impl Customer {
    pub fn new(no: &str, name: &str, balance: f64) -> Self {
        Customer {
            no: no.into(),
            name: name.into(),
            balance,
            ..Default::default()
        }
    }
}

impl Record for Customer {
    const TABLE_ID: u32 = 18;
    const TABLE_NAME: &'static str = "Customer";

    fn fields() -> Vec<Field<Self>> {
        vec![
            Field::<Self>::key(
                "no",
                "VARCHAR(20)",
                |r| r.no.clone().into(),
                |r, v| {
                    r.no = v.into_text()?;
                    Ok(())
                },
            ),
            Field::<Self>::column(
                "name",
                "VARCHAR(100)",
                |r| r.name.clone().into(),
                |r, v| {
                    r.name = v.into_text()?;
                    Ok(())
                },
            ),
            Field::<Self>::column(
                "payment_terms_code",
                "VARCHAR(10)",
                |r| r.payment_terms_code.clone().into(),
                |r, v| {
                    r.payment_terms_code = v.into_text()?;
                    Ok(())
                },
            ),
            Field::<Self>::column(
                "balance",
                "REAL",
                |r| r.balance.into(),
                |r, v| {
                    r.balance = v.into_f64()?;
                    Ok(())
                },
            ),
            Field::<Self>::column(
                "blocked",
                "INTEGER",
                |r| r.blocked.into(),
                |r, v| {
                    r.blocked = v.into_bool()?;
                    Ok(())
                },
            ),
        ]
    }
}

impl Customer {
    async fn check_payment_terms(&self, ctx: &mut HookContext<'_>) -> Result<(), AppError> {
        if self.payment_terms_code.is_empty() {
            return Ok(());
        }
        let key = [SqlValue::from(self.payment_terms_code.as_str())];
        match ctx.get::<PaymentTerms>(&key).await? {
            Some(_) => Ok(()),
            None => Err(AppError::Validation(format!(
                "payment terms '{}' do not exist in {}",
                self.payment_terms_code, ctx.company
            ))),
        }
    }
}

#[async_trait]
impl RecordHooks for Customer {
    fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::Validation("customer name must not be empty".into()));
        }
        Ok(())
    }

    async fn on_insert(&mut self, ctx: &mut HookContext<'_>) -> Result<(), AppError> {
        self.check_payment_terms(ctx).await
    }

    async fn on_modify(&mut self, ctx: &mut HookContext<'_>) -> Result<(), AppError> {
        self.check_payment_terms(ctx).await
    }
}

/// Item whose after hooks check the row they follow.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Item {
    pub no: Code,
    pub description: String,
    pub unit_price: f64,
    pub group: Code,
}

impl Item {
    pub fn new(no: &str, description: &str, unit_price: f64) -> Self {
        Item {
            no: Code::new(no),
            description: description.into(),
            unit_price,
            group: Code::default(),
        }
    }

    async fn stored(&self, ctx: &mut HookContext<'_>) -> Result<Option<Item>, AppError> {
        ctx.get::<Item>(&[SqlValue::from(&self.no)]).await
    }
}

impl Record for Item {
    const TABLE_ID: u32 = 27;
    const TABLE_NAME: &'static str = "Item";

    fn fields() -> Vec<Field<Self>> {
        vec![
            Field::<Self>::key(
                "no",
                "VARCHAR(20)",
                |r| r.no.clone().into(),
                |r, v| {
                    r.no = v.into_code()?;
                    Ok(())
                },
            ),
            Field::<Self>::column(
                "description",
                "VARCHAR(100)",
                |r| r.description.clone().into(),
                |r, v| {
                    r.description = v.into_text()?;
                    Ok(())
                },
            ),
            Field::<Self>::column(
                "unit_price",
                "REAL",
                |r| r.unit_price.into(),
                |r, v| {
                    r.unit_price = v.into_f64()?;
                    Ok(())
                },
            ),
            Field::<Self>::column(
                "group",
                "VARCHAR(10)",
                |r| r.group.clone().into(),
                |r, v| {
                    r.group = v.into_code()?;
                    Ok(())
                },
            ),
        ]
    }
}

#[async_trait]
impl RecordHooks for Item {
    async fn after_insert(&self, ctx: &mut HookContext<'_>) -> Result<(), AppError> {
        if self.stored(ctx).await?.is_none() {
            return Err(AppError::Validation("inserted item is not visible".into()));
        }
        if self.description == "REJECT" {
            return Err(AppError::Validation("item rejected after insert".into()));
        }
        Ok(())
    }

    async fn after_modify(&self, ctx: &mut HookContext<'_>) -> Result<(), AppError> {
        match self.stored(ctx).await? {
            Some(stored) if stored.unit_price < 0.0 => {
                Err(AppError::Validation("unit price cannot be negative".into()))
            }
            Some(stored) if stored == *self => Ok(()),
            _ => Err(AppError::Validation("modified item does not match the row".into())),
        }
    }

    async fn after_delete(&self, ctx: &mut HookContext<'_>) -> Result<(), AppError> {
        if self.stored(ctx).await?.is_some() {
            return Err(AppError::Validation("deleted item is still visible".into()));
        }
        if self.description == "KEEP" {
            return Err(AppError::Validation("item must be kept".into()));
        }
        Ok(())
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn registry() -> ObjectRegistry {
    let mut registry = ObjectRegistry::new();
    registry.register_record::<PaymentTerms>().unwrap();
    registry.register_record::<Customer>().unwrap();
    registry
}

pub async fn memory_session() -> Session {
    init_tracing();
    Session::create("sqlite::memory:").await.unwrap()
}

/// In-memory database with `company` initialized and entered.
pub async fn company_session(company: &str) -> (Session, ObjectRegistry) {
    let mut session = memory_session().await;
    let registry = registry();
    CompanyService::initialize(&mut session, &registry, company)
        .await
        .unwrap();
    CompanyService::enter(&mut session, company).await.unwrap();
    (session, registry)
}
