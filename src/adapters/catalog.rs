//! In-memory test catalog and user directory.
//!
//! The real platform serves test content and identity from its own
//! subsystems; this adapter loads a fixed catalog from a YAML file (or
//! is built programmatically in tests) and satisfies the collaborator
//! ports from memory.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::TestDefinition;
use crate::domain::ports::{TestCatalog, UserDirectory};

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    tests: Vec<TestDefinition>,
}

/// Static catalog backed by in-memory maps.
#[derive(Debug, Default)]
pub struct StaticCatalog {
    tests: RwLock<HashMap<String, TestDefinition>>,
    emails: RwLock<HashMap<Uuid, String>>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load test definitions from a YAML catalog file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> DomainResult<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let file: CatalogFile = serde_yaml::from_str(&raw)
            .map_err(|e| DomainError::SerializationError(e.to_string()))?;

        let tests: HashMap<String, TestDefinition> = file
            .tests
            .into_iter()
            .map(|test| (test.id.clone(), test))
            .collect();

        Ok(Self {
            tests: RwLock::new(tests),
            emails: RwLock::default(),
        })
    }

    pub async fn insert_test(&self, test: TestDefinition) {
        self.tests.write().await.insert(test.id.clone(), test);
    }

    pub async fn insert_email(&self, user_id: Uuid, email: impl Into<String>) {
        self.emails.write().await.insert(user_id, email.into());
    }
}

#[async_trait]
impl TestCatalog for StaticCatalog {
    async fn get_test(&self, test_id: &str) -> DomainResult<Option<TestDefinition>> {
        Ok(self.tests.read().await.get(test_id).cloned())
    }
}

#[async_trait]
impl UserDirectory for StaticCatalog {
    async fn email_for(&self, user_id: Uuid) -> DomainResult<String> {
        Ok(self
            .emails
            .read()
            .await
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }
}
