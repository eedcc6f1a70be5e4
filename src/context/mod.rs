//! Typed run context threaded through a workflow run.
//!
//! Pre-actions build the context up sequentially (resolving credentials,
//! constructing sessions, deriving endpoints) before any script runs; after
//! that it is shared read-only behind an `Arc`, so parallel operations never
//! contend on it. Each accessor names the slot it reads, which keeps the
//! dependencies between stages explicit.

pub mod credentials;

pub use credentials::{CredentialResolver, FileVault};

use crate::rest::Session;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// A resolved username/password pair.
#[derive(Clone, serde::Deserialize)]
pub struct Credential {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Shared state for one workflow run.
pub struct RunContext {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    /// The validated configuration document.
    pub document: Value,
    credentials: HashMap<String, Credential>,
    sessions: HashMap<String, Arc<Session>>,
    endpoints: HashMap<String, String>,
}

impl RunContext {
    pub fn new(document: Value) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            document,
            credentials: HashMap::new(),
            sessions: HashMap::new(),
            endpoints: HashMap::new(),
        }
    }

    /// The top-level document section an operation was configured from.
    pub fn section(&self, key: &str) -> Option<&Value> {
        self.document.get(key)
    }

    /// A required top-level string field of the document.
    pub fn field(&self, key: &str) -> Result<&str> {
        self.document
            .get(key)
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Config(format!("document field {key:?} missing or not a string")))
    }

    pub fn insert_credential(&mut self, name: impl Into<String>, credential: Credential) {
        self.credentials.insert(name.into(), credential);
    }

    pub fn credential(&self, name: &str) -> Result<&Credential> {
        self.credentials
            .get(name)
            .ok_or_else(|| Error::Credential(format!("credential {name:?} was not resolved")))
    }

    pub fn insert_session(&mut self, name: impl Into<String>, session: Session) {
        self.sessions.insert(name.into(), Arc::new(session));
    }

    pub fn session(&self, name: &str) -> Result<Arc<Session>> {
        self.sessions
            .get(name)
            .cloned()
            .ok_or_else(|| Error::Config(format!("no session named {name:?} was constructed")))
    }

    pub fn insert_endpoint(&mut self, name: impl Into<String>, address: impl Into<String>) {
        self.endpoints.insert(name.into(), address.into());
    }

    pub fn endpoint(&self, name: &str) -> Result<&str> {
        self.endpoints
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| Error::Config(format!("no endpoint named {name:?} was derived")))
    }

    /// An empty context for engine and operation tests.
    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self::new(Value::Object(Default::default()))
    }
}
