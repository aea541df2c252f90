//! Test Session State Machine.
//!
//! Drives one attempt at one test: `Loading -> Active -> Finished`, with
//! `LoadFailed` as a distinguishable dead end when the question bank cannot
//! deliver a usable test. The session is the only writer of its working copy
//! and does no IO; callers persist what [`TestSession::snapshot`] returns.

use crate::{
    definition::grade, error::Result, Error, Grade, Question, RemoteTestProgress,
    RemoteTestResult, SessionStatus, TestConfig, TestDefinition, TestId, TestMode,
    TestSessionSnapshot, Timestamp,
};
use serde::{Deserialize, Serialize};

/// Lifecycle phase of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionPhase {
    /// Waiting for the test definition
    Loading,
    /// The definition could not be loaded; nothing else will happen
    LoadFailed,
    /// Answering questions, countdown running
    Active,
    /// Graded
    Finished,
}

/// Where the initial working copy came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SeedSource {
    Fresh,
    RemoteProgress,
    LocalSnapshot,
}

/// A graded attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestOutcome {
    pub grade: Grade,
    pub passed: bool,
    pub completed_at: Timestamp,
}

impl TestOutcome {
    pub fn status(&self) -> SessionStatus {
        SessionStatus::from_passed(self.passed)
    }

    pub fn total_questions(&self) -> u32 {
        self.grade.total()
    }
}

/// Result of one countdown tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Not counting down (not active)
    Idle,
    /// Seconds left after this tick
    Running(u32),
    /// Time ran out and the attempt was finished
    Expired(TestOutcome),
}

/// One attempt at one test.
#[derive(Debug, Clone)]
pub struct TestSession {
    test_id: TestId,
    config: TestConfig,
    phase: SessionPhase,
    load_error: Option<String>,
    definition: Option<TestDefinition>,
    answers: Vec<Option<String>>,
    current: usize,
    time_remaining: u32,
    outcome: Option<TestOutcome>,
    seeded_from: SeedSource,
}

impl TestSession {
    /// A session waiting for its definition.
    pub fn loading(test_id: impl Into<TestId>, config: TestConfig) -> Self {
        Self {
            test_id: test_id.into(),
            config,
            phase: SessionPhase::Loading,
            load_error: None,
            definition: None,
            answers: Vec::new(),
            current: 0,
            time_remaining: config.time_limit_secs,
            outcome: None,
            seeded_from: SeedSource::Fresh,
        }
    }

    /// Record that the definition could not be loaded.
    pub fn fail_load(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        tracing::error!(test_id = %self.test_id, reason = %reason, "failed to load test");
        self.phase = SessionPhase::LoadFailed;
        self.load_error = Some(reason);
    }

    /// Seed the working copy and become active (or finished).
    ///
    /// A remote progress row takes precedence over the local snapshot for
    /// answers and position. Without one, the local snapshot seeds answers,
    /// position and remaining time, and a graded local snapshot jumps
    /// straight to `Finished`. Without either the attempt starts fresh.
    pub fn initialize(
        &mut self,
        definition: TestDefinition,
        remote: Option<&RemoteTestProgress>,
        local: Option<&TestSessionSnapshot>,
    ) -> Result<SeedSource> {
        if let Err(e) = self.check_definition(&definition) {
            self.fail_load(e.to_string());
            return Err(e);
        }

        let count = definition.question_count();
        let full = self.config.time_limit_secs;
        self.definition = Some(definition);
        self.load_error = None;
        self.outcome = None;

        let source = match (remote, local) {
            (Some(remote), local) => {
                self.answers = remote.dense_answers(count);
                self.current = remote.current_question.min(count - 1);
                // Progress rows carry no clock; keep the local countdown if it
                // belongs to the same unfinished attempt.
                self.time_remaining = local
                    .filter(|s| !s.is_terminal())
                    .and_then(|s| s.time_remaining_secs)
                    .map_or(full, |t| t.min(full));
                self.phase = SessionPhase::Active;
                SeedSource::RemoteProgress
            }
            (None, Some(local)) => {
                self.answers = fit_answers(&local.answers, count);
                self.current = local.current_question.min(count - 1);
                if local.is_terminal() {
                    let completed_at = local.completed_at.or(local.updated_at).unwrap_or_default();
                    self.outcome = Some(TestOutcome {
                        grade: self.grade(),
                        passed: local.status == SessionStatus::Approved,
                        completed_at,
                    });
                    self.time_remaining = 0;
                    self.phase = SessionPhase::Finished;
                } else {
                    self.time_remaining = local.time_remaining_secs.map_or(full, |t| t.min(full));
                    self.phase = SessionPhase::Active;
                }
                SeedSource::LocalSnapshot
            }
            (None, None) => {
                self.reset_working_copy();
                SeedSource::Fresh
            }
        };

        self.seeded_from = source;
        tracing::debug!(test_id = %self.test_id, ?source, phase = ?self.phase, "session initialized");
        Ok(source)
    }

    fn check_definition(&self, definition: &TestDefinition) -> Result<()> {
        definition.validate()?;
        if definition.id != self.test_id {
            return Err(Error::InvalidTest(format!(
                "expected test '{}', got '{}'",
                self.test_id, definition.id
            )));
        }
        Ok(())
    }

    pub fn test_id(&self) -> &str {
        &self.test_id
    }

    pub fn config(&self) -> &TestConfig {
        &self.config
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_active(&self) -> bool {
        self.phase == SessionPhase::Active
    }

    pub fn is_finished(&self) -> bool {
        self.phase == SessionPhase::Finished
    }

    pub fn load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }

    pub fn seeded_from(&self) -> SeedSource {
        self.seeded_from
    }

    pub fn definition(&self) -> Option<&TestDefinition> {
        self.definition.as_ref()
    }

    pub fn question_count(&self) -> usize {
        self.definition
            .as_ref()
            .map_or(0, TestDefinition::question_count)
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.definition.as_ref()?.questions.get(self.current)
    }

    pub fn answers(&self) -> &[Option<String>] {
        &self.answers
    }

    pub fn answer_at(&self, index: usize) -> Option<&str> {
        self.answers.get(index).and_then(Option::as_deref)
    }

    pub fn answered_count(&self) -> usize {
        self.answers.iter().filter(|a| a.is_some()).count()
    }

    /// Position through the test as a fraction in `(0, 1]`.
    pub fn progress(&self) -> f64 {
        match self.question_count() {
            0 => 0.0,
            n => (self.current + 1) as f64 / n as f64,
        }
    }

    pub fn time_remaining(&self) -> u32 {
        self.time_remaining
    }

    pub fn outcome(&self) -> Option<&TestOutcome> {
        self.outcome.as_ref()
    }

    /// Move to the next question. Returns true if the position changed.
    pub fn next(&mut self) -> bool {
        self.jump_to(self.current.saturating_add(1))
    }

    /// Move to the previous question. Returns true if the position changed.
    pub fn previous(&mut self) -> bool {
        self.jump_to(self.current.saturating_sub(1))
    }

    /// Move to `index`, clamped to the question range. Answers are untouched.
    pub fn jump_to(&mut self, index: usize) -> bool {
        if !self.is_active() {
            return false;
        }
        let target = index.min(self.question_count().saturating_sub(1));
        let moved = target != self.current;
        self.current = target;
        moved
    }

    /// Answer the current question. Returns true if the answer changed.
    pub fn select_answer(&mut self, option: impl Into<String>) -> Result<bool> {
        if !self.is_active() {
            return Err(Error::SessionNotActive);
        }
        let option = option.into();
        let index = self.current;
        let question = self
            .current_question()
            .ok_or(Error::QuestionOutOfRange {
                index,
                count: self.question_count(),
            })?;
        if !question.offers(&option) {
            return Err(Error::UnknownOption { index, option });
        }

        let slot = &mut self.answers[index];
        if slot.as_deref() == Some(option.as_str()) {
            return Ok(false);
        }
        *slot = Some(option);
        Ok(true)
    }

    /// Advance the countdown by one second.
    ///
    /// Reaching zero finishes the attempt exactly like a manual submit.
    pub fn tick(&mut self, now: Timestamp) -> Tick {
        if !self.is_active() {
            return Tick::Idle;
        }
        self.time_remaining = self.time_remaining.saturating_sub(1);
        if self.time_remaining > 0 {
            return Tick::Running(self.time_remaining);
        }

        tracing::info!(test_id = %self.test_id, "time is up, finishing test");
        match self.finish(now) {
            Ok(outcome) => Tick::Expired(outcome),
            Err(_) => Tick::Idle,
        }
    }

    /// Grade the attempt and become `Finished`.
    ///
    /// Finishing an already finished attempt returns the existing outcome.
    pub fn finish(&mut self, now: Timestamp) -> Result<TestOutcome> {
        match self.phase {
            SessionPhase::Finished => self.outcome.ok_or(Error::SessionNotActive),
            SessionPhase::Active => {
                let grade = self.grade();
                let outcome = TestOutcome {
                    grade,
                    passed: grade.passed(&self.config),
                    completed_at: now,
                };
                self.outcome = Some(outcome);
                self.time_remaining = 0;
                self.phase = SessionPhase::Finished;
                tracing::info!(
                    test_id = %self.test_id,
                    correct = grade.correct,
                    incorrect = grade.incorrect,
                    unanswered = grade.unanswered,
                    passed = outcome.passed,
                    "test finished"
                );
                Ok(outcome)
            }
            SessionPhase::Loading | SessionPhase::LoadFailed => Err(Error::SessionNotActive),
        }
    }

    /// Throw the attempt away and start over.
    pub fn restart(&mut self) -> Result<()> {
        if self.definition.is_none() {
            return Err(Error::SessionNotActive);
        }
        self.reset_working_copy();
        self.outcome = None;
        self.seeded_from = SeedSource::Fresh;
        tracing::debug!(test_id = %self.test_id, "session restarted");
        Ok(())
    }

    /// The working copy as a snapshot, `None` until a definition is loaded.
    ///
    /// `updated_at` is left for the store to stamp, except on graded
    /// snapshots where it equals the completion time.
    pub fn snapshot(&self) -> Option<TestSessionSnapshot> {
        let definition = self.definition.as_ref()?;
        let mut snapshot = TestSessionSnapshot::new(
            self.test_id.clone(),
            definition.category.clone(),
            definition.question_count(),
        );
        snapshot.answers = self.answers.clone();
        snapshot.current_question = self.current;
        snapshot.time_remaining_secs = Some(self.time_remaining);

        if let Some(outcome) = &self.outcome {
            snapshot.status = outcome.status();
            snapshot.score = Some(outcome.grade.correct);
            snapshot.total_questions = Some(outcome.total_questions());
            snapshot.completed_at = Some(outcome.completed_at);
            snapshot.updated_at = Some(outcome.completed_at);
            snapshot.time_remaining_secs = Some(0);
        }

        Some(snapshot)
    }

    /// The remote progress row for an active attempt.
    pub fn progress_row(&self, user_id: &str, now: Timestamp) -> Option<RemoteTestProgress> {
        if !self.is_active() {
            return None;
        }
        let definition = self.definition.as_ref()?;
        Some(RemoteTestProgress::from_answers(
            user_id,
            self.test_id.clone(),
            definition.category.clone(),
            self.current,
            &self.answers,
            now,
        ))
    }

    /// The remote result row for a finished attempt.
    pub fn result_row(&self, user_id: &str, mode: TestMode) -> Option<RemoteTestResult> {
        let outcome = self.outcome.as_ref()?;
        let definition = self.definition.as_ref()?;
        Some(RemoteTestResult {
            user_id: user_id.to_string(),
            test_id: self.test_id.clone(),
            category: definition.category.clone(),
            score: outcome.grade.correct,
            total_questions: outcome.total_questions(),
            passed: outcome.passed,
            completed_at: outcome.completed_at,
            test_mode: mode,
        })
    }

    fn grade(&self) -> Grade {
        match &self.definition {
            Some(definition) => grade(definition, &self.answers),
            None => Grade {
                correct: 0,
                incorrect: 0,
                unanswered: 0,
            },
        }
    }

    fn reset_working_copy(&mut self) {
        self.answers = vec![None; self.question_count()];
        self.current = 0;
        self.time_remaining = self.config.time_limit_secs;
        self.phase = SessionPhase::Active;
    }
}

/// Pad or truncate stored answers to the definition's question count.
fn fit_answers(answers: &[Option<String>], count: usize) -> Vec<Option<String>> {
    let mut fitted: Vec<_> = answers.iter().take(count).cloned().collect();
    fitted.resize(count, None);
    fitted
}

/// Render seconds as `mm:ss`.
pub fn format_time(seconds: u32) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}
