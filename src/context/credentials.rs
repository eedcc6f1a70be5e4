//! Credential resolution: turn a credential name into a username/password
//! pair without the workflow document ever carrying secrets.

use super::Credential;
use crate::{Error, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Resolves credential names for pre-actions.
pub trait CredentialResolver: Send + Sync {
    fn resolve(&self, name: &str) -> Result<Credential>;
}

/// JSON vault document on disk, keyed by credential name:
/// `{"pc_admin": {"username": "...", "password": "..."}}`.
pub struct FileVault {
    path: PathBuf,
}

impl FileVault {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn load(&self) -> Result<HashMap<String, Credential>> {
        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            Error::Credential(format!(
                "cannot read credential vault {}: {e}",
                self.path.display()
            ))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            Error::Credential(format!(
                "credential vault {} is not valid JSON: {e}",
                self.path.display()
            ))
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialResolver for FileVault {
    fn resolve(&self, name: &str) -> Result<Credential> {
        let mut vault = self.load()?;
        vault.remove(name).ok_or_else(|| {
            Error::Credential(format!(
                "credential {name:?} not present in vault {}",
                self.path.display()
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn resolves_a_named_credential() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"pc_admin": {{"username": "admin", "password": "s3cret"}}}}"#
        )
        .unwrap();

        let vault = FileVault::new(file.path());
        let cred = vault.resolve("pc_admin").unwrap();
        assert_eq!(cred.username, "admin");
        assert_eq!(cred.password, "s3cret");

        let missing = vault.resolve("nope");
        assert!(matches!(missing, Err(Error::Credential(_))));
    }
}
