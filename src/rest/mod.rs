//! Generic HTTP entity interface: authenticated sessions and the
//! CRUD/list/batch contract product bindings are consumed through.

pub mod entity;
pub mod session;

pub use entity::{entity_names, task_uuid_of, EntityClient, RestEntity, RestTaskSource};
pub use session::Session;
