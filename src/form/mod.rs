//! Form model: values, schema, conditions and the built-in survey.

pub mod catalog;
pub mod condition;
pub mod schema;
pub mod value;

pub use catalog::{catalog_rules, catalog_schema, IntegrationConnection};
pub use condition::Condition;
pub use schema::{parse_date, FieldKind, FieldSpec, FormSchema, TabSpec};
pub use value::{FieldMap, FieldValue, FormState, DATE_FORMAT};
