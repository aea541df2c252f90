//! In-memory collaborators shared by the client integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use autotest_client::{AppContext, ClientConfig, ClientError, QuestionBank, RemoteSync, Result, User};
use autotest_engine::{
    Clock, ManualClock, MemoryBackend, Question, RemoteTestProgress, RemoteTestResult,
    SessionStore, TestDefinition,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const T0: u64 = 1_706_745_600_000;

pub fn create_test_definition(id: &str, questions: usize) -> TestDefinition {
    TestDefinition {
        id: id.into(),
        title: format!("Test {}", id),
        category: "B".into(),
        questions: (0..questions)
            .map(|i| Question {
                question: format!("Question {}", i + 1),
                options: vec!["A".into(), "B".into(), "C".into()],
                answer: "A".into(),
                image: None,
            })
            .collect(),
    }
}

/// Remote call as recorded by [`FakeRemote`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Upsert(RemoteTestProgress),
    Delete(String),
    Insert(RemoteTestResult),
}

#[derive(Debug, Default)]
pub struct FakeRemote {
    pub user: Mutex<Option<User>>,
    pub progress: Mutex<BTreeMap<String, RemoteTestProgress>>,
    pub results: Mutex<Vec<RemoteTestResult>>,
    pub calls: Mutex<Vec<Call>>,
    pub fail_writes: AtomicBool,
    pub fail_reads: AtomicBool,
    pub fail_deletes: AtomicBool,
    /// Delay applied to `list_results`, to order concurrent refreshes.
    pub list_delays: Mutex<Vec<Duration>>,
}

impl FakeRemote {
    pub fn signed_in(user_id: &str) -> Arc<Self> {
        let remote = Self::default();
        *remote.user.lock().unwrap() = Some(User {
            id: user_id.into(),
        });
        Arc::new(remote)
    }

    pub fn anonymous() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn unavailable() -> ClientError {
        ClientError::Status {
            status: 503,
            url: "fake".into(),
        }
    }

    fn check_write(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        Ok(())
    }

    fn check_read(&self) -> Result<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteSync for FakeRemote {
    async fn current_user(&self) -> Result<Option<User>> {
        self.check_read()?;
        Ok(self.user.lock().unwrap().clone())
    }

    async fn read_progress(&self, _user_id: &str, test_id: &str) -> Result<Option<RemoteTestProgress>> {
        self.check_read()?;
        Ok(self.progress.lock().unwrap().get(test_id).cloned())
    }

    async fn upsert_progress(&self, progress: &RemoteTestProgress) -> Result<()> {
        self.calls.lock().unwrap().push(Call::Upsert(progress.clone()));
        self.check_write()?;
        self.progress
            .lock()
            .unwrap()
            .insert(progress.test_id.clone(), progress.clone());
        Ok(())
    }

    async fn delete_progress(&self, _user_id: &str, test_id: &str) -> Result<()> {
        self.calls.lock().unwrap().push(Call::Delete(test_id.into()));
        self.check_write()?;
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        self.progress.lock().unwrap().remove(test_id);
        Ok(())
    }

    async fn insert_result(&self, result: &RemoteTestResult) -> Result<()> {
        self.calls.lock().unwrap().push(Call::Insert(result.clone()));
        self.check_write()?;
        self.results.lock().unwrap().push(result.clone());
        Ok(())
    }

    async fn list_results(&self, _user_id: &str, category: &str) -> Result<Vec<RemoteTestResult>> {
        let delay = {
            let mut delays = self.list_delays.lock().unwrap();
            if delays.is_empty() {
                None
            } else {
                Some(delays.remove(0))
            }
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.check_read()?;
        Ok(self
            .results
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.category == category)
            .cloned()
            .collect())
    }

    async fn list_progress(&self, _user_id: &str, category: &str) -> Result<Vec<RemoteTestProgress>> {
        self.check_read()?;
        Ok(self
            .progress
            .lock()
            .unwrap()
            .values()
            .filter(|p| p.category == category)
            .cloned()
            .collect())
    }
}

#[derive(Debug, Default)]
pub struct FakeBank {
    pub tests: Mutex<BTreeMap<String, TestDefinition>>,
}

impl FakeBank {
    pub fn with(definitions: Vec<TestDefinition>) -> Arc<Self> {
        let bank = Self::default();
        for definition in definitions {
            bank.tests
                .lock()
                .unwrap()
                .insert(definition.id.clone(), definition);
        }
        Arc::new(bank)
    }
}

#[async_trait]
impl QuestionBank for FakeBank {
    async fn load_test(&self, test_id: &str) -> Result<TestDefinition> {
        self.tests
            .lock()
            .unwrap()
            .get(test_id)
            .cloned()
            .ok_or_else(|| ClientError::Status {
                status: 404,
                url: format!("/tests/{}", test_id),
            })
    }
}

pub struct Harness {
    pub ctx: AppContext,
    pub remote: Arc<FakeRemote>,
    pub clock: Arc<ManualClock>,
    pub backend: Arc<MemoryBackend>,
}

pub fn harness(remote: Arc<FakeRemote>, bank: Arc<FakeBank>) -> Harness {
    let clock = Arc::new(ManualClock::new(T0));
    let backend = Arc::new(MemoryBackend::new());
    let store = Arc::new(SessionStore::new(backend.clone(), clock.clone()));
    let config = ClientConfig {
        autosave_ms: 400,
        ..ClientConfig::default()
    };
    let ctx = AppContext::new(config, store, remote.clone(), bank, clock.clone() as Arc<dyn Clock>);
    Harness {
        ctx,
        remote,
        clock,
        backend,
    }
}
