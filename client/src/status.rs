//! Status Board - reconciled per-test status for one category listing.
//!
//! Each refresh takes a sequence token before it starts fetching. When it
//! comes back, it commits only if no newer refresh has been started since;
//! an older refresh that finishes late is dropped. After [`unmount`]
//! nothing is committed at all.
//!
//! [`unmount`]: StatusBoard::unmount

use crate::context::AppContext;
use autotest_engine::{
    reconcile, Category, ChangeEvent, HistorySummary, RemoteTestProgress, RemoteTestResult,
    StatusMap, StatusSummary, Subscription,
};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::sync::mpsc;

#[derive(Debug, Default)]
struct BoardState {
    statuses: StatusMap,
    history: HistorySummary,
    committed: u64,
}

/// Live status for the tests of one category.
#[derive(Debug)]
pub struct StatusBoard {
    ctx: AppContext,
    category: Category,
    request_seq: AtomicU64,
    mounted: AtomicBool,
    state: Mutex<BoardState>,
}

impl StatusBoard {
    pub fn new(ctx: AppContext, category: impl Into<Category>) -> Arc<Self> {
        Arc::new(Self {
            ctx,
            category: category.into(),
            request_seq: AtomicU64::new(0),
            mounted: AtomicBool::new(true),
            state: Mutex::new(BoardState::default()),
        })
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    fn state(&self) -> MutexGuard<'_, BoardState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }

    /// Stop committing refresh results.
    pub fn unmount(&self) {
        self.mounted.store(false, Ordering::SeqCst);
    }

    /// Fetch remote rows, merge them with local snapshots and commit.
    ///
    /// Returns true if this refresh's result was committed.
    pub async fn refresh(&self) -> bool {
        let token = self.request_seq.fetch_add(1, Ordering::SeqCst) + 1;

        let user = self.ctx.current_user().await;
        if !self.is_mounted() {
            return false;
        }

        let (results, progress) = match &user {
            Some(user) => self.fetch_remote(&user.id).await,
            None => (Vec::new(), Vec::new()),
        };
        if !self.is_mounted() {
            return false;
        }
        if self.request_seq.load(Ordering::SeqCst) != token {
            tracing::debug!(category = %self.category, token, "discarding superseded status refresh");
            return false;
        }

        let local = self.ctx.store.list_by_category(&self.category);
        let statuses = reconcile(&results, &progress, &local);
        let history = HistorySummary::from_results(&results);

        let mut state = self.state();
        state.statuses = statuses;
        state.history = history;
        state.committed = token;
        tracing::trace!(category = %self.category, token, tests = state.statuses.len(), "status refreshed");
        true
    }

    /// Remote read failures read as "no remote data".
    async fn fetch_remote(
        &self,
        user_id: &str,
    ) -> (Vec<RemoteTestResult>, Vec<RemoteTestProgress>) {
        let remote = &self.ctx.remote;
        let (results, progress) = tokio::join!(
            remote.list_results(user_id, &self.category),
            remote.list_progress(user_id, &self.category),
        );

        let results = results.unwrap_or_else(|e| {
            tracing::warn!(category = %self.category, error = %e, "failed to fetch results");
            Vec::new()
        });
        let progress = progress.unwrap_or_else(|e| {
            tracing::warn!(category = %self.category, error = %e, "failed to fetch progress");
            Vec::new()
        });
        (results, progress)
    }

    /// Last committed status map.
    pub fn statuses(&self) -> StatusMap {
        self.state().statuses.clone()
    }

    pub fn summary(&self) -> StatusSummary {
        self.state().statuses.summary()
    }

    pub fn history(&self) -> HistorySummary {
        self.state().history
    }

    /// Token of the last committed refresh, 0 before the first.
    pub fn committed_token(&self) -> u64 {
        self.state().committed
    }

    /// Whether a store change concerns this listing.
    pub fn is_relevant(&self, event: &ChangeEvent) -> bool {
        event.category().map_or(true, |c| c == self.category)
    }

    /// Refresh whenever a snapshot of this category changes, locally or in
    /// another process.
    ///
    /// Must be called inside a tokio runtime. Dropping the subscription stops
    /// the refreshes.
    pub fn watch_store(self: &Arc<Self>) -> Subscription {
        let (tx, mut rx) = mpsc::unbounded_channel::<()>();
        let board: Weak<Self> = Arc::downgrade(self);

        tokio::spawn(async move {
            while rx.recv().await.is_some() {
                // Coalesce a burst of events into one refresh.
                while rx.try_recv().is_ok() {}
                let Some(board) = board.upgrade() else {
                    break;
                };
                if !board.is_mounted() {
                    break;
                }
                board.refresh().await;
            }
        });

        let filter = Arc::downgrade(self);
        self.ctx.store.subscribe(move |event| {
            let relevant = filter.upgrade().is_some_and(|b| b.is_relevant(event));
            if relevant {
                let _ = tx.send(());
            }
        })
    }
}
