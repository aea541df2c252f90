//! Remote progress and result stores.
//!
//! [`RemoteSync`] is the only seam where the client asks "is a backend
//! configured". [`NullRemote`] answers every read with absence and accepts
//! every write, so session and listing code never branch on it.

use crate::error::{check_test_id, ClientError, Result};
use async_trait::async_trait;
use autotest_engine::{RemoteTestProgress, RemoteTestResult, UserId};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};

/// The signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
}

/// Auth, progress and result collaborators.
#[async_trait]
pub trait RemoteSync: Send + Sync {
    /// The signed-in user, `None` when anonymous.
    async fn current_user(&self) -> Result<Option<User>>;

    async fn read_progress(&self, user_id: &str, test_id: &str)
        -> Result<Option<RemoteTestProgress>>;

    async fn upsert_progress(&self, progress: &RemoteTestProgress) -> Result<()>;

    async fn delete_progress(&self, user_id: &str, test_id: &str) -> Result<()>;

    /// Append a graded attempt.
    async fn insert_result(&self, result: &RemoteTestResult) -> Result<()>;

    async fn list_results(&self, user_id: &str, category: &str) -> Result<Vec<RemoteTestResult>>;

    async fn list_progress(&self, user_id: &str, category: &str)
        -> Result<Vec<RemoteTestProgress>>;
}

/// Remote used when no backend is configured: nobody is ever signed in.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRemote;

#[async_trait]
impl RemoteSync for NullRemote {
    async fn current_user(&self) -> Result<Option<User>> {
        Ok(None)
    }

    async fn read_progress(&self, _: &str, _: &str) -> Result<Option<RemoteTestProgress>> {
        Ok(None)
    }

    async fn upsert_progress(&self, _: &RemoteTestProgress) -> Result<()> {
        Ok(())
    }

    async fn delete_progress(&self, _: &str, _: &str) -> Result<()> {
        Ok(())
    }

    async fn insert_result(&self, _: &RemoteTestResult) -> Result<()> {
        Ok(())
    }

    async fn list_results(&self, _: &str, _: &str) -> Result<Vec<RemoteTestResult>> {
        Ok(Vec::new())
    }

    async fn list_progress(&self, _: &str, _: &str) -> Result<Vec<RemoteTestProgress>> {
        Ok(Vec::new())
    }
}

/// Remote backed by the AutoTest server's HTTP API.
///
/// The server identifies the user from the bearer token, so `user_id`
/// arguments are not sent; they only have to match the signed-in user.
#[derive(Debug, Clone)]
pub struct HttpRemote {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpRemote {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self::with_client(Client::new(), base_url, token)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn progress_url(&self, test_id: &str) -> Result<String> {
        check_test_id(test_id)?;
        Ok(self.url(&format!("/progress/{}", test_id)))
    }
}

/// Turn a non-success response into [`ClientError::Status`].
fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(ClientError::Status {
            status: status.as_u16(),
            url: response.url().to_string(),
        })
    }
}

#[async_trait]
impl RemoteSync for HttpRemote {
    async fn current_user(&self) -> Result<Option<User>> {
        if self.token.is_none() {
            return Ok(None);
        }
        let response = self
            .authorized(self.client.get(self.url("/me")))
            .send()
            .await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            return Ok(None);
        }
        Ok(Some(ensure_success(response)?.json().await?))
    }

    async fn read_progress(
        &self,
        _user_id: &str,
        test_id: &str,
    ) -> Result<Option<RemoteTestProgress>> {
        let url = self.progress_url(test_id)?;
        let response = self.authorized(self.client.get(url)).send().await?;
        Ok(ensure_success(response)?.json().await?)
    }

    async fn upsert_progress(&self, progress: &RemoteTestProgress) -> Result<()> {
        let url = self.progress_url(&progress.test_id)?;
        let response = self
            .authorized(self.client.put(url).json(progress))
            .send()
            .await?;
        ensure_success(response)?;
        Ok(())
    }

    async fn delete_progress(&self, _user_id: &str, test_id: &str) -> Result<()> {
        let url = self.progress_url(test_id)?;
        let response = self.authorized(self.client.delete(url)).send().await?;
        ensure_success(response)?;
        Ok(())
    }

    async fn insert_result(&self, result: &RemoteTestResult) -> Result<()> {
        let response = self
            .authorized(self.client.post(self.url("/results")).json(result))
            .send()
            .await?;
        ensure_success(response)?;
        Ok(())
    }

    async fn list_results(&self, _user_id: &str, category: &str) -> Result<Vec<RemoteTestResult>> {
        let response = self
            .authorized(self.client.get(self.url("/results")))
            .query(&[("category", category)])
            .send()
            .await?;
        Ok(ensure_success(response)?.json().await?)
    }

    async fn list_progress(
        &self,
        _user_id: &str,
        category: &str,
    ) -> Result<Vec<RemoteTestProgress>> {
        let response = self
            .authorized(self.client.get(self.url("/progress")))
            .query(&[("category", category)])
            .send()
            .await?;
        Ok(ensure_success(response)?.json().await?)
    }
}
