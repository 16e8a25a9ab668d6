//! Records: the field-list contract, lifecycle hooks and generic CRUD.

mod crud;
mod record;
mod validation;
pub use crud::CrudService;
pub use record::{Field, HookContext, Record, RecordHooks};
pub use validation::RecordValidator;
