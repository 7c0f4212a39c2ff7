use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::{PlannerError, StoreError};
use crate::plan::{PlacementGrid, StoredPlan};
use super::events::{EventBus, NoticeLevel, PlannerEvent};
use super::retry::{with_reconnect, RetryPolicy};
use super::scheduler::{PendingWrite, WriteScheduler};
use super::store::{PlanStore, StudentId};

/// Identifies one student selection
///
/// Grids handed out by [`PlanSynchronizer::select_student`] carry the
/// generation they were loaded under; changes reported with an older
/// generation belong to a previous selection and are not written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

/// What to do with the grid after a selection change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// A stored plan was found
    Loaded {
        generation: Generation,
        grid: PlacementGrid,
    },
    /// Start from an empty grid: nothing stored, no student, or the load failed
    Reset { generation: Generation },
    /// The selection changed while the load was in flight; discard it
    Stale,
}

impl LoadOutcome {
    /// Generation and grid to install, `None` for stale responses
    pub fn into_grid(self) -> Option<(Generation, PlacementGrid)> {
        match self {
            LoadOutcome::Loaded { generation, grid } => Some((generation, grid)),
            LoadOutcome::Reset { generation } => Some((generation, PlacementGrid::new())),
            LoadOutcome::Stale => None,
        }
    }
}

#[derive(Debug, Default)]
struct Selection {
    student: Option<StudentId>,
    generation: Generation,
    loading: bool,
    loaded: bool,
}

/// Keeps the stored plan of the selected student in step with the grid
pub struct PlanSynchronizer<S: ?Sized> {
    store: Arc<S>,
    events: EventBus,
    retry: RetryPolicy,
    scheduler: WriteScheduler<S>,
    selection: Mutex<Selection>,
}

impl<S> PlanSynchronizer<S>
where
    S: PlanStore + ?Sized + 'static,
{
    pub fn new(store: Arc<S>, events: EventBus, quiet: Duration, retry: RetryPolicy) -> Self {
        let scheduler = WriteScheduler::new(Arc::clone(&store), events.clone(), quiet, retry);
        Self {
            store,
            events,
            retry,
            scheduler,
            selection: Mutex::new(Selection::default()),
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn scheduler(&self) -> &WriteScheduler<S> {
        &self.scheduler
    }

    pub fn selected_student(&self) -> Option<StudentId> {
        self.selection.lock().student.clone()
    }

    pub fn generation(&self) -> Generation {
        self.selection.lock().generation
    }

    pub fn is_current(&self, generation: Generation) -> bool {
        self.selection.lock().generation == generation
    }

    pub fn is_loading(&self) -> bool {
        self.selection.lock().loading
    }

    /// Switches to `student` and loads their stored plan
    ///
    /// Pending writes for the previous student are flushed first. If another
    /// selection starts while the fetch is in flight, the response is
    /// discarded and [`LoadOutcome::Stale`] returned.
    pub async fn select_student(&self, student: Option<StudentId>) -> LoadOutcome {
        if let Err(err) = self.scheduler.flush().await {
            tracing::debug!(%err, "pending write failed before selection change");
        }

        let generation = {
            let mut selection = self.selection.lock();
            selection.generation.0 += 1;
            selection.student = student.clone();
            selection.loading = student.is_some();
            selection.loaded = student.is_none();
            selection.generation
        };
        self.events.publish(PlannerEvent::SelectionChanged(student.clone()));

        let Some(student) = student else {
            return LoadOutcome::Reset { generation };
        };

        let store = self.store.as_ref();
        let fetched = with_reconnect(self.retry, &self.events, || store.fetch(&student)).await;

        {
            let mut selection = self.selection.lock();
            if selection.generation != generation {
                tracing::debug!(student = %student, "discarding stale plan response");
                return LoadOutcome::Stale;
            }
            selection.loading = false;
            selection.loaded = true;
        }

        match fetched {
            Ok(Some(record)) => match PlacementGrid::from_stored(&record.plan) {
                Ok(grid) => {
                    tracing::info!(student = %student, courses = grid.len(), "plan loaded");
                    LoadOutcome::Loaded { generation, grid }
                }
                Err(err) => {
                    tracing::warn!(student = %student, %err, "stored plan is malformed");
                    self.report(PlannerError::Plan(err), NoticeLevel::Warning);
                    LoadOutcome::Reset { generation }
                }
            },
            Ok(None) => {
                tracing::debug!(student = %student, "no stored plan yet");
                LoadOutcome::Reset { generation }
            }
            Err(err) => {
                tracing::error!(student = %student, %err, "failed to load plan");
                self.report(PlannerError::Store(err), NoticeLevel::Error);
                LoadOutcome::Reset { generation }
            }
        }
    }

    /// Forwards a changed grid to the write scheduler if every guard passes
    ///
    /// Skipped silently when the change belongs to an older selection, a load
    /// is in flight or not yet done, no student is selected, or the plan is
    /// empty. Returns whether a write was scheduled.
    pub fn grid_changed(&self, generation: Generation, plan: StoredPlan) -> bool {
        let student = {
            let selection = self.selection.lock();
            if selection.generation != generation {
                tracing::debug!("change from previous selection ignored");
                return false;
            }
            if selection.loading || !selection.loaded {
                tracing::debug!("change during load ignored");
                return false;
            }
            match &selection.student {
                Some(student) => student.clone(),
                None => return false,
            }
        };
        if plan.is_empty() {
            tracing::debug!(student = %student, "empty plan not persisted");
            return false;
        }
        self.scheduler.notify_changed(student, plan);
        true
    }

    pub async fn flush(&self) -> Result<bool, StoreError> {
        self.scheduler.flush().await
    }

    pub fn pending(&self) -> Option<PendingWrite> {
        self.scheduler.pending()
    }

    fn report(&self, err: PlannerError, level: NoticeLevel) {
        self.events.notice(level, err.user_message());
    }
}
