//! Configuration: document loading and schema validation.

pub mod loader;
pub mod schema;
pub mod validator;

pub use loader::{load_document, load_documents, overlay};
pub use schema::{Kind, Rule};
pub use validator::{validate, ValidationReport};
