//! Question bank: where test definitions come from.

use crate::error::{check_test_id, ClientError, Result};
use async_trait::async_trait;
use autotest_engine::TestDefinition;
use reqwest::Client;
use std::path::PathBuf;

/// Loads test definitions by id.
#[async_trait]
pub trait QuestionBank: Send + Sync {
    async fn load_test(&self, test_id: &str) -> Result<TestDefinition>;
}

/// Definitions stored as `{dir}/{test_id}.json`.
#[derive(Debug, Clone)]
pub struct DirQuestionBank {
    dir: PathBuf,
}

impl DirQuestionBank {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl QuestionBank for DirQuestionBank {
    async fn load_test(&self, test_id: &str) -> Result<TestDefinition> {
        check_test_id(test_id)?;
        let path = self.dir.join(format!("{}.json", test_id));
        let raw = tokio::fs::read_to_string(&path).await?;
        let definition: TestDefinition = serde_json::from_str(&raw)?;
        tracing::debug!(test_id = %test_id, path = %path.display(), "loaded test definition");
        Ok(definition)
    }
}

/// Definitions served by the backend at `GET /tests/{id}`.
#[derive(Debug, Clone)]
pub struct HttpQuestionBank {
    client: Client,
    base_url: String,
}

impl HttpQuestionBank {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl QuestionBank for HttpQuestionBank {
    async fn load_test(&self, test_id: &str) -> Result<TestDefinition> {
        check_test_id(test_id)?;
        let url = format!("{}/tests/{}", self.base_url, test_id);
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(ClientError::Status {
                status: response.status().as_u16(),
                url,
            });
        }
        Ok(response.json().await?)
    }
}
