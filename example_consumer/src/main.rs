//! Example consumer: a separate Rust project that uses erp-foundation as a dependency.
//!
//! Run from repo root: `cargo run -p example-consumer`
//! Or from this directory: `cargo run`
//!
//! Settings come from the environment or `.env`: `ERP_DATABASE_URL`
//! (default `sqlite://erp.db`), `ERP_CREATE_IF_MISSING`, `ERP_USER`.

use async_trait::async_trait;
use erp_foundation::{
    load_descriptors_json, parse_column_definitions, AppError, Code, CompanyService, CrudService,
    EngineSettings, Field, FilterExpression, HookContext, ObjectDescriptor, ObjectRegistry, Record,
    RecordHooks, Session, SqlValue,
};

const COMPANY: &str = "CRONUS";

/// Schema-only objects shipped as JSON next to the binary.
const DESCRIPTORS: &str = r#"[
    {"id": 4, "kind": "table", "name": "Currency",
     "columns": [{"name": "code", "type": "VARCHAR(10)", "primary_key": true, "nullable": false},
                 {"name": "description", "type": "VARCHAR(30)"},
                 {"name": "rounding_precision", "type": "REAL", "default": "0.01"}]},
    {"id": 21, "kind": "page", "name": "Customer Card"}
]"#;

const LEDGER_ENTRY_SCHEMA: &str = "
    customer_no VARCHAR(20) NOT NULL,
    entry_no INTEGER NOT NULL,
    posting_date TEXT,
    amount REAL DEFAULT 0,
    PRIMARY KEY (customer_no, entry_no)
";

#[derive(Clone, Debug, Default)]
struct PaymentTerms {
    code: Code,
    description: String,
    due_days: i64,
}

impl Record for PaymentTerms {
    const TABLE_ID: u32 = 3;
    const TABLE_NAME: &'static str = "Payment Terms";

    fn fields() -> Vec<Field<Self>> {
        vec![
            Field::<Self>::key("code", "VARCHAR(10)", |r| r.code.clone().into(), |r, v| {
                r.code = v.into_code()?;
                Ok(())
            }),
            Field::<Self>::column("description", "VARCHAR(100)", |r| r.description.clone().into(), |r, v| {
                r.description = v.into_text()?;
                Ok(())
            }),
            Field::<Self>::column("due_days", "INTEGER", |r| r.due_days.into(), |r, v| {
                r.due_days = v.into_i64()?;
                Ok(())
            })
            .not_null()
            .default_value("0"),
        ]
    }
}

impl RecordHooks for PaymentTerms {}

#[derive(Clone, Debug, Default)]
struct Customer {
    no: String,
    name: String,
    payment_terms_code: String,
    balance: f64,
}

impl Record for Customer {
    const TABLE_ID: u32 = 18;
    const TABLE_NAME: &'static str = "Customer";

    fn fields() -> Vec<Field<Self>> {
        vec![
            Field::<Self>::key("no", "VARCHAR(20)", |r| r.no.clone().into(), |r, v| {
                r.no = v.into_text()?;
                Ok(())
            }),
            Field::<Self>::column("name", "VARCHAR(100)", |r| r.name.clone().into(), |r, v| {
                r.name = v.into_text()?;
                Ok(())
            }),
            Field::<Self>::column(
                "payment_terms_code",
                "VARCHAR(10)",
                |r| r.payment_terms_code.clone().into(),
                |r, v| {
                    r.payment_terms_code = v.into_text()?;
                    Ok(())
                },
            ),
            Field::<Self>::column("balance", "REAL", |r| r.balance.into(), |r, v| {
                r.balance = v.into_f64()?;
                Ok(())
            }),
        ]
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
        if self.payment_terms_code.is_empty() {
            return Ok(());
        }
        let key = [SqlValue::from(self.payment_terms_code.as_str())];
        if ctx.get::<PaymentTerms>(&key).await?.is_none() {
            return Err(AppError::Validation(format!(
                "payment terms '{}' do not exist",
                self.payment_terms_code
            )));
        }
        tracing::info!(customer = %self.no, user = ?ctx.user, "customer checked");
        Ok(())
    }

    async fn after_insert(&self, ctx: &mut HookContext<'_>) -> Result<(), AppError> {
        tracing::info!(customer = %self.no, company = ctx.company, "customer stored");
        Ok(())
    }
}

fn build_registry() -> Result<ObjectRegistry, AppError> {
    let mut registry = ObjectRegistry::new();
    registry.register_record::<PaymentTerms>()?;
    registry.register_record::<Customer>()?;
    for descriptor in load_descriptors_json(DESCRIPTORS)? {
        registry.register(descriptor)?;
    }
    let ledger = parse_column_definitions(LEDGER_ENTRY_SCHEMA)?;
    registry.register(ObjectDescriptor::table(21, "Cust. Ledger Entry", ledger))?;
    Ok(registry)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("erp_foundation=info")),
        )
        .init();

    let settings = EngineSettings::from_env()?;
    let registry = build_registry()?;
    let mut session = Session::from_settings(&settings).await?;

    let exists = CompanyService::list(&mut session)
        .await?
        .iter()
        .any(|c| c.name == COMPANY);
    let report = if exists {
        erp_foundation::reconcile_company(&mut session, &registry, COMPANY).await?
    } else {
        CompanyService::initialize(&mut session, &registry, COMPANY).await?
    };
    tracing::info!(%report, "schema up to date");
    CompanyService::enter(&mut session, COMPANY).await?;

    let mut terms = PaymentTerms {
        code: Code::new("30d"),
        description: "Net 30 days".into(),
        due_days: 30,
    };
    let mut customer = Customer {
        no: "C10000".into(),
        name: "Adatum Corporation".into(),
        payment_terms_code: "30D".into(),
        balance: 1500.0,
    };
    let outcome = session
        .with_transaction(move |s| {
            Box::pin(async move {
                CrudService::insert(s, &mut terms).await?;
                CrudService::insert(s, &mut customer).await?;
                Ok::<_, AppError>(customer.no)
            })
        })
        .await;
    match outcome {
        Ok(no) => tracing::info!(customer = %no, "customer created"),
        Err(AppError::Conflict(msg)) => tracing::info!(%msg, "demo data already present"),
        Err(e) => return Err(e.into()),
    }

    let filters = [FilterExpression::new("no", "C1*|C2*"), FilterExpression::new("balance", "1000..")];
    for c in CrudService::search::<Customer>(&mut session, &filters).await? {
        println!("{}", c.to_json());
    }
    let total = CrudService::count::<Customer>(&mut session, &[]).await?;
    println!("{} customer(s) in {}", total, COMPANY);

    session.close().await?;
    Ok(())
}
