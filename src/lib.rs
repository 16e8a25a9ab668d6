//! ERP foundation: company-scoped business-data engine on SQLite.
//!
//! Business entities live in per-company physical tables named `<Company>$<Table>`, keyed by
//! user-defined primary keys. An [`ObjectRegistry`] holds every entity descriptor, the
//! reconciler ([`reconcile_company`]) brings a company's tables in line with it, and
//! [`CrudService`] reads and writes records through a [`Session`].

pub mod code;
pub mod company;
pub mod config;
pub mod error;
pub mod migration;
pub mod registry;
pub mod service;
pub mod session;
pub mod sql;
pub mod store;
pub mod tenant;

pub use code::Code;
pub use company::{CompanyInfo, CompanyService};
pub use config::{load_descriptors_json, parse_column_definitions, ColumnSpec, EngineSettings, ObjectDescriptor, ObjectKind};
pub use error::{AppError, ConfigError, TransactionStateError};
pub use migration::{reconcile_company, EntityFailure, MigrationReport};
pub use registry::{object_range, IdRange, ObjectRegistry};
pub use service::{CrudService, Field, HookContext, Record, RecordHooks};
pub use session::{Session, UserContext};
pub use sql::{FilterExpression, SqlValue};
pub use store::{field_definitions, FieldDefinition};
pub use tenant::{full_table_name, parse_table_name, validate_company_name};
