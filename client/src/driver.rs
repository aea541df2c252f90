//! Session Driver - runs one test attempt against the real collaborators.
//!
//! The driver owns a [`TestSession`] and a [`SyncScheduler`] and performs the
//! IO they decide on: loading the definition and the seed state, autosaving
//! (local first, remote if signed in), and finalizing a graded attempt.
//!
//! Remote failures are logged and dropped. After every awaited call the
//! driver checks its [`Lifecycle`]; once unmounted it stops touching state.

use crate::context::AppContext;
use crate::remote::User;
use autotest_engine::{
    plan_remote_write, FlushReason, RemoteWrite, SessionPhase, SyncScheduler, TestId, TestMode,
    TestOutcome, TestSession, TestSessionSnapshot, Tick, Timestamp,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

/// Shared "still mounted" flag.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    mounted: Arc<AtomicBool>,
}

impl Lifecycle {
    fn new() -> Self {
        Self {
            mounted: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }

    /// Mark as unmounted. In-flight calls finish but their results are ignored.
    pub fn unmount(&self) {
        self.mounted.store(false, Ordering::SeqCst);
    }
}

/// Drives one attempt at one test.
pub struct SessionDriver {
    ctx: AppContext,
    session: TestSession,
    scheduler: SyncScheduler,
    user: Option<User>,
    mode: TestMode,
    lifecycle: Lifecycle,
}

impl SessionDriver {
    pub fn new(ctx: AppContext, test_id: impl Into<TestId>, mode: TestMode) -> Self {
        let session = TestSession::loading(test_id, ctx.test_config());
        let scheduler = SyncScheduler::new(ctx.config.autosave_ms);
        Self {
            ctx,
            session,
            scheduler,
            user: None,
            mode,
            lifecycle: Lifecycle::new(),
        }
    }

    pub fn session(&self) -> &TestSession {
        &self.session
    }

    pub fn phase(&self) -> SessionPhase {
        self.session.phase()
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle.clone()
    }

    fn now(&self) -> Timestamp {
        self.ctx.clock.now()
    }

    fn test_id(&self) -> &str {
        self.session.test_id()
    }

    /// Fetch the definition and seed state, then become active or finished.
    ///
    /// A bank failure leaves the session in `LoadFailed`. Auth and progress
    /// read failures fall back to local-only seeding.
    pub async fn load(&mut self) -> SessionPhase {
        let test_id = self.test_id().to_string();

        let definition = match self.ctx.bank.load_test(&test_id).await {
            Ok(definition) => definition,
            Err(e) => {
                if self.lifecycle.is_mounted() {
                    self.session.fail_load(e.to_string());
                }
                return self.phase();
            }
        };
        if !self.lifecycle.is_mounted() {
            return self.phase();
        }

        let user = self.ctx.current_user().await;
        if !self.lifecycle.is_mounted() {
            return self.phase();
        }

        let remote = match &user {
            Some(user) => match self.ctx.remote.read_progress(&user.id, &test_id).await {
                Ok(progress) => progress,
                Err(e) => {
                    tracing::warn!(test_id = %test_id, error = %e, "failed to read remote progress");
                    None
                }
            },
            None => None,
        };
        if !self.lifecycle.is_mounted() {
            return self.phase();
        }

        self.user = user;
        let local = self.ctx.store.get(&test_id);
        if let Err(e) = self
            .session
            .initialize(definition, remote.as_ref(), local.as_ref())
        {
            tracing::debug!(test_id = %test_id, error = %e, "session did not start");
        }
        self.phase()
    }

    /// Answer the current question. Changes schedule an autosave.
    pub fn select_answer(&mut self, option: &str) -> bool {
        match self.session.select_answer(option) {
            Ok(changed) => {
                if changed {
                    self.schedule_autosave();
                }
                changed
            }
            Err(e) => {
                tracing::debug!(test_id = %self.test_id(), error = %e, "answer ignored");
                false
            }
        }
    }

    pub fn next(&mut self) -> bool {
        let moved = self.session.next();
        self.after_navigation(moved)
    }

    pub fn previous(&mut self) -> bool {
        let moved = self.session.previous();
        self.after_navigation(moved)
    }

    pub fn jump_to(&mut self, index: usize) -> bool {
        let moved = self.session.jump_to(index);
        self.after_navigation(moved)
    }

    fn after_navigation(&mut self, moved: bool) -> bool {
        if moved {
            self.schedule_autosave();
        }
        moved
    }

    fn schedule_autosave(&mut self) {
        if let Some(snapshot) = self.session.snapshot() {
            let now = self.now();
            self.scheduler.schedule(snapshot, now);
        }
    }

    /// One countdown second. Expiry finalizes like a manual finish.
    pub async fn tick(&mut self) -> Tick {
        let now = self.now();
        let tick = self.session.tick(now);
        if let Tick::Expired(outcome) = tick {
            self.finalize(outcome).await;
        }
        tick
    }

    /// Grade the attempt and persist the result.
    pub async fn finish(&mut self) -> Option<TestOutcome> {
        let was_active = self.session.is_active();
        let now = self.now();
        match self.session.finish(now) {
            Ok(outcome) => {
                if was_active {
                    self.finalize(outcome).await;
                }
                Some(outcome)
            }
            Err(e) => {
                tracing::debug!(test_id = %self.test_id(), error = %e, "finish ignored");
                None
            }
        }
    }

    /// Local terminal snapshot, then result insert, then progress delete.
    ///
    /// The two remote writes are independent: either may fail and leave the
    /// other in place.
    async fn finalize(&mut self, outcome: TestOutcome) {
        self.scheduler.cancel();
        let test_id = self.test_id().to_string();

        if let Some(snapshot) = self.session.snapshot() {
            self.ctx.store.set(&test_id, Some(snapshot));
        }

        let Some(user) = self.user.clone() else {
            return;
        };
        let Some(result) = self.session.result_row(&user.id, self.mode) else {
            return;
        };

        if let Err(e) = self.ctx.remote.insert_result(&result).await {
            tracing::warn!(test_id = %test_id, error = %e, "failed to record result");
        }
        if let Err(e) = self.ctx.remote.delete_progress(&user.id, &test_id).await {
            tracing::warn!(test_id = %test_id, error = %e, "failed to delete finished progress");
        }
        tracing::info!(
            test_id = %test_id,
            score = outcome.grade.correct,
            passed = outcome.passed,
            "test finalized"
        );
    }

    /// Throw the attempt away and start fresh.
    ///
    /// Clears the local snapshot. A remote progress row is left to be
    /// replaced by the next autosave.
    pub fn restart(&mut self) -> bool {
        if let Err(e) = self.session.restart() {
            tracing::debug!(test_id = %self.test_id(), error = %e, "restart ignored");
            return false;
        }
        self.scheduler.cancel();
        self.ctx.store.clear(self.session.test_id());
        true
    }

    pub async fn on_visibility_change(&mut self, hidden: bool) {
        if hidden {
            self.flush(FlushReason::Hidden).await;
        }
    }

    pub async fn on_unload(&mut self) {
        self.flush(FlushReason::Unload).await;
    }

    /// Flush, then unmount.
    pub async fn teardown(&mut self) {
        self.flush(FlushReason::Teardown).await;
        self.lifecycle.unmount();
    }

    /// Save the working copy now, pending autosave or not.
    async fn flush(&mut self, reason: FlushReason) {
        self.scheduler.cancel();
        if !self.session.is_active() {
            return;
        }
        if let Some(snapshot) = self.session.snapshot() {
            self.save(snapshot, reason).await;
        }
    }

    /// Save the pending snapshot if its quiet period has passed.
    pub async fn run_due_autosave(&mut self) -> bool {
        let now = self.now();
        match self.scheduler.poll(now) {
            Some(snapshot) => {
                self.save(snapshot, FlushReason::Debounced).await;
                true
            }
            None => false,
        }
    }

    pub fn next_autosave_deadline(&self) -> Option<Timestamp> {
        self.scheduler.next_deadline()
    }

    /// Local write always; remote write only when signed in.
    async fn save(&mut self, snapshot: TestSessionSnapshot, reason: FlushReason) {
        let test_id = snapshot.test_id.clone();
        let saved = self
            .ctx
            .store
            .set(&test_id, Some(snapshot.clone()))
            .unwrap_or(snapshot);
        tracing::debug!(test_id = %test_id, ?reason, "autosave");

        let user_id = self.user.as_ref().map(|u| u.id.as_str());
        let now = self.now();
        let outcome = match plan_remote_write(&saved, user_id, now) {
            RemoteWrite::Skip => return,
            RemoteWrite::DeleteProgress => match user_id {
                Some(user_id) => self.ctx.remote.delete_progress(user_id, &test_id).await,
                None => return,
            },
            RemoteWrite::UpsertProgress(row) => self.ctx.remote.upsert_progress(&row).await,
        };
        if let Err(e) = outcome {
            tracing::warn!(test_id = %test_id, ?reason, error = %e, "failed to sync progress");
        }
    }

    /// Handle one command. Returns false once the session should stop.
    pub async fn handle(&mut self, command: SessionCommand) -> bool {
        match command {
            SessionCommand::Select(option) => {
                self.select_answer(&option);
            }
            SessionCommand::Next => {
                self.next();
            }
            SessionCommand::Previous => {
                self.previous();
            }
            SessionCommand::JumpTo(index) => {
                self.jump_to(index);
            }
            SessionCommand::Finish => {
                self.finish().await;
            }
            SessionCommand::Restart => {
                self.restart();
            }
            SessionCommand::VisibilityChanged { hidden } => self.on_visibility_change(hidden).await,
            SessionCommand::Unload => self.on_unload().await,
            SessionCommand::Teardown => {
                self.teardown().await;
                return false;
            }
        }
        true
    }

    fn autosave_delay(&self) -> Option<Duration> {
        let due = self.next_autosave_deadline()?;
        Some(Duration::from_millis(due.saturating_sub(self.now())))
    }
}

impl std::fmt::Debug for SessionDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionDriver")
            .field("session", &self.session)
            .field("scheduler", &self.scheduler)
            .field("user", &self.user)
            .field("mode", &self.mode)
            .finish()
    }
}

/// Input events for [`run_session`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Select(String),
    Next,
    Previous,
    JumpTo(usize),
    Finish,
    Restart,
    VisibilityChanged { hidden: bool },
    Unload,
    Teardown,
}

/// Run a loaded session until torn down.
///
/// Commands are applied in arrival order. The countdown ticks once per second
/// while active and the pending autosave fires when its quiet period ends.
/// Closing the command channel tears the session down.
pub async fn run_session(
    mut driver: SessionDriver,
    mut commands: mpsc::Receiver<SessionCommand>,
) -> SessionDriver {
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    loop {
        let autosave = driver.autosave_delay();
        let active = driver.session().is_active();

        tokio::select! {
            command = commands.recv() => match command {
                Some(command) => {
                    if !driver.handle(command).await {
                        break;
                    }
                    if !active && driver.session().is_active() {
                        // Restarted: count the first second from now.
                        ticker.reset();
                    }
                }
                None => {
                    driver.teardown().await;
                    break;
                }
            },
            _ = ticker.tick(), if active => {
                driver.tick().await;
            }
            _ = tokio::time::sleep(autosave.unwrap_or_default()), if autosave.is_some() => {
                driver.run_due_autosave().await;
            }
        }
    }

    driver
}
