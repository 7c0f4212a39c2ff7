//! Debounced write-through of plans to the store

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::error::{PlannerError, StoreError};
use crate::plan::StoredPlan;
use super::events::{EventBus, NoticeLevel};
use super::retry::{with_reconnect, RetryPolicy};
use super::store::{PlanRecord, PlanStore, StudentId};

/// Quiet window used when none is configured
pub const DEFAULT_QUIET_WINDOW: Duration = Duration::from_secs(1);

/// Snapshot waiting for the quiet window to elapse
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingWrite {
    pub student: StudentId,
    pub plan: StoredPlan,
}

#[derive(Debug, Default)]
struct TimerState {
    pending: Option<PendingWrite>,
    timer: Option<JoinHandle<()>>,
    // Bumped on every reset; a timer only fires if its ticket is still current.
    ticket: u64,
}

struct Shared<S: ?Sized> {
    store: Arc<S>,
    events: EventBus,
    retry: RetryPolicy,
    state: Mutex<TimerState>,
    // Held across each upsert so writes land in the order they were queued.
    write_turn: tokio::sync::Mutex<()>,
}

/// Owns the debounce timer for plan writes
///
/// Every [`notify_changed`](Self::notify_changed) replaces the pending
/// snapshot and restarts the quiet window; only the last snapshot of a burst
/// is written. Write failures are logged and reported as a notice, and the
/// caller's in-memory plan is left alone.
pub struct WriteScheduler<S: ?Sized> {
    shared: Arc<Shared<S>>,
    quiet: Duration,
}

impl<S> WriteScheduler<S>
where
    S: PlanStore + ?Sized + 'static,
{
    pub fn new(store: Arc<S>, events: EventBus, quiet: Duration, retry: RetryPolicy) -> Self {
        Self {
            shared: Arc::new(Shared {
                store,
                events,
                retry,
                state: Mutex::new(TimerState::default()),
                write_turn: tokio::sync::Mutex::new(()),
            }),
            quiet,
        }
    }

    pub fn has_pending(&self) -> bool {
        self.shared.state.lock().pending.is_some()
    }

    pub fn pending(&self) -> Option<PendingWrite> {
        self.shared.state.lock().pending.clone()
    }

    /// Queues `plan` for `student`, restarting the quiet window
    ///
    /// A pending snapshot for a different student is written straight away
    /// rather than being replaced.
    pub fn notify_changed(&self, student: StudentId, plan: StoredPlan) {
        let mut state = self.shared.state.lock();

        if let Some(previous) = state.pending.take() {
            if previous.student != student {
                let shared = Arc::clone(&self.shared);
                tokio::spawn(async move {
                    let _ = shared.write(previous).await;
                });
            }
        }
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }

        state.ticket += 1;
        let ticket = state.ticket;
        state.pending = Some(PendingWrite { student, plan });

        let shared = Arc::clone(&self.shared);
        let quiet = self.quiet;
        state.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(quiet).await;
            let due = {
                let mut state = shared.state.lock();
                if state.ticket != ticket {
                    return;
                }
                state.timer = None;
                state.pending.take()
            };
            if let Some(write) = due {
                let _ = shared.write(write).await;
            }
        }));
    }

    /// Writes the pending snapshot now
    ///
    /// Also waits for a write that is already running. Returns `Ok(false)`
    /// when nothing was pending.
    pub async fn flush(&self) -> Result<bool, StoreError> {
        let Some(write) = self.cancel() else {
            drop(self.shared.write_turn.lock().await);
            return Ok(false);
        };
        self.shared.write(write).await.map(|()| true)
    }

    /// Drops the pending snapshot without writing it
    pub fn cancel(&self) -> Option<PendingWrite> {
        let mut state = self.shared.state.lock();
        state.ticket += 1;
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        state.pending.take()
    }
}

impl<S: ?Sized> Drop for WriteScheduler<S> {
    fn drop(&mut self) {
        if let Some(timer) = self.shared.state.lock().timer.take() {
            timer.abort();
        }
    }
}

impl<S> Shared<S>
where
    S: PlanStore + ?Sized,
{
    async fn write(&self, write: PendingWrite) -> Result<(), StoreError> {
        let _turn = self.write_turn.lock().await;
        let result = self.upsert(&write).await;
        match &result {
            Ok(()) => tracing::info!(
                student = %write.student,
                cells = write.plan.len(),
                "plan saved"
            ),
            Err(err) => {
                tracing::error!(student = %write.student, %err, "failed to save plan");
                let message = PlannerError::from(err.clone()).user_message();
                self.events.notice(NoticeLevel::Warning, message);
            }
        }
        result
    }

    // Check-then-act: last writer wins if two editors race on one student.
    async fn upsert(&self, write: &PendingWrite) -> Result<(), StoreError> {
        let record = PlanRecord::new(write.student.clone(), serde_json::to_value(&write.plan)?);
        let store = self.store.as_ref();

        let existing = with_reconnect(self.retry, &self.events, || store.fetch(&write.student)).await?;
        if existing.is_some() {
            with_reconnect(self.retry, &self.events, || store.update(record.clone())).await
        } else {
            with_reconnect(self.retry, &self.events, || store.insert(record.clone())).await
        }
    }
}
