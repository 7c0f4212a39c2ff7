//! The planner page: grid, pool and drag state for the selected student,
//! wired to the synchronizer that persists it.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rand::Rng;
use serde::Serialize;

use crate::error::{PlannerError, Result};
use crate::form::{build_custom_course, validate_custom_course, CustomCourseRequest};
use crate::plan::{
    grade_level, subject_color, subject_label, year_label, CandidatePool, CourseAssignment,
    DragController, DragSession, DropOutcome, DropTarget, PlacementGrid, PositionKey, StoredPlan,
    Subject, Year,
};
use crate::sync::{EventBus, Generation, PlanStore, PlanSynchronizer, RetryPolicy, StudentId};

/// Subject tab as shown to the frontend
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubjectView {
    pub subject: Subject,
    pub label: String,
    pub color: &'static str,
}

/// Year row as shown to the frontend
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct YearView {
    pub year: Year,
    pub label: &'static str,
    pub grade: u8,
}

/// Everything the page needs to render
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoardView {
    pub student: Option<StudentId>,
    pub loading: bool,
    pub selected_subject: Option<Subject>,
    pub subjects: Vec<SubjectView>,
    pub years: Vec<YearView>,
    pub cells: StoredPlan,
    pub available: Vec<CourseAssignment>,
    pub drag: Option<DragSession>,
}

/// Grid, pool and drag state for one page
///
/// Every grid mutation goes through here so the caller can take a
/// [`snapshot`](Self::snapshot) afterwards.
#[derive(Debug, Clone, Default)]
pub struct PlanBoard {
    grid: PlacementGrid,
    pool: CandidatePool,
    drag: DragController,
    selected_subject: Option<Subject>,
    generation: Generation,
}

impl PlanBoard {
    pub fn new(pool: CandidatePool) -> Self {
        Self {
            pool,
            ..Self::default()
        }
    }

    pub fn grid(&self) -> &PlacementGrid {
        &self.grid
    }

    pub fn pool(&self) -> &CandidatePool {
        &self.pool
    }

    pub fn selected_subject(&self) -> Option<&Subject> {
        self.selected_subject.as_ref()
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn drag_session(&self) -> Option<&DragSession> {
        self.drag.session()
    }

    /// Selects the subject tab; `None` clears it
    pub fn select_subject(&mut self, subject: Option<&str>) -> Result<()> {
        let subject = match subject.map(Subject::new) {
            Some(subject) if !self.pool.has_subject(&subject) => {
                return Err(PlannerError::Validation(format!("Unknown subject: {}", subject)));
            }
            other => other,
        };
        self.selected_subject = subject;
        Ok(())
    }

    /// Unplaced courses of the selected subject
    pub fn available(&self) -> Vec<CourseAssignment> {
        match &self.selected_subject {
            Some(subject) => self.pool.available(subject, &self.grid),
            None => Vec::new(),
        }
    }

    /// Unplaced courses of any known subject
    pub fn available_for(&self, subject: &str) -> Result<Vec<CourseAssignment>> {
        let subject = Subject::new(subject);
        if !self.pool.has_subject(&subject) {
            return Err(PlannerError::NotFound(format!("Subject {}", subject)));
        }
        Ok(self.pool.available(&subject, &self.grid))
    }

    pub fn drag_start(&mut self, course_id: &str) -> DragSession {
        self.drag.start(course_id, &self.grid, &self.pool)
    }

    pub fn drag_accepts(&self, target: &DropTarget) -> bool {
        self.drag.accepts(target)
    }

    pub fn drag_end(&mut self, target: Option<&DropTarget>) -> DropOutcome {
        self.drag.end(
            target,
            &mut self.grid,
            &self.pool,
            self.selected_subject.as_ref(),
        )
    }

    pub fn drag_cancel(&mut self) {
        self.drag.cancel();
    }

    /// Adds a user-created course to the pool
    ///
    /// When the request names a year the course is also placed there, and
    /// the second value is `true`.
    pub fn add_custom_course<R: Rng>(
        &mut self,
        req: &CustomCourseRequest,
        rng: &mut R,
    ) -> Result<(CourseAssignment, bool)> {
        validate_custom_course(req, &self.pool).map_err(PlannerError::Validation)?;
        let course = build_custom_course(req, &self.pool, rng);
        self.pool.insert(course.clone());

        let Some(year) = req.year else {
            return Ok((course, false));
        };
        let year = Year::try_from(year)?;
        let key = PositionKey::new(course.subject.clone(), year);
        self.grid.place_course(key, course.clone())?;
        Ok((course, true))
    }

    /// Installs a freshly loaded grid, dropping any drag in progress
    pub fn replace_grid(&mut self, generation: Generation, grid: PlacementGrid) {
        self.drag.cancel();
        self.grid = grid;
        self.generation = generation;
    }

    /// Current contents, tagged with the selection they belong to
    pub fn snapshot(&self) -> (Generation, StoredPlan) {
        (self.generation, self.grid.serialize())
    }

    pub fn view(&self) -> BoardView {
        BoardView {
            student: None,
            loading: false,
            selected_subject: self.selected_subject.clone(),
            subjects: self
                .pool
                .subjects()
                .map(|subject| SubjectView {
                    subject: subject.clone(),
                    label: subject_label(subject),
                    color: subject_color(subject),
                })
                .collect(),
            years: Year::all()
                .map(|year| YearView {
                    year,
                    label: year_label(year),
                    grade: grade_level(year),
                })
                .collect(),
            cells: self.grid.serialize(),
            available: self.available(),
            drag: self.drag.session().cloned(),
        }
    }
}

/// Shared planner: one board plus the synchronizer persisting it
///
/// Lock order is board, then selection state, then scheduler state. Grid
/// changes are handed to the synchronizer while the board is still locked,
/// so snapshots reach the scheduler in the order they were taken.
pub struct Planner<S: ?Sized> {
    board: Mutex<PlanBoard>,
    sync: PlanSynchronizer<S>,
}

impl<S> Planner<S>
where
    S: PlanStore + ?Sized + 'static,
{
    pub fn new(
        pool: CandidatePool,
        store: Arc<S>,
        events: EventBus,
        quiet: Duration,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            board: Mutex::new(PlanBoard::new(pool)),
            sync: PlanSynchronizer::new(store, events, quiet, retry),
        }
    }

    pub fn events(&self) -> &EventBus {
        self.sync.events()
    }

    pub fn synchronizer(&self) -> &PlanSynchronizer<S> {
        &self.sync
    }

    /// Runs `f` against the board without touching persistence
    pub fn with_board<R>(&self, f: impl FnOnce(&PlanBoard) -> R) -> R {
        f(&self.board.lock())
    }

    /// Switches student and installs their plan
    ///
    /// Returns `false` when a newer selection overtook this one.
    pub async fn select_student(&self, student: Option<StudentId>) -> bool {
        let outcome = self.sync.select_student(student).await;
        let Some((generation, grid)) = outcome.into_grid() else {
            return false;
        };

        let mut board = self.board.lock();
        if !self.sync.is_current(generation) {
            return false;
        }
        board.replace_grid(generation, grid);
        true
    }

    pub fn select_subject(&self, subject: Option<&str>) -> Result<()> {
        self.board.lock().select_subject(subject)
    }

    pub fn available(&self, subject: &str) -> Result<Vec<CourseAssignment>> {
        self.board.lock().available_for(subject)
    }

    pub fn drag_start(&self, course_id: &str) -> DragSession {
        self.board.lock().drag_start(course_id)
    }

    pub fn drag_accepts(&self, target: &DropTarget) -> bool {
        self.board.lock().drag_accepts(target)
    }

    pub fn drag_end(&self, target: Option<&DropTarget>) -> DropOutcome {
        let mut board = self.board.lock();
        let outcome = board.drag_end(target);
        if outcome.changed_grid() {
            self.persist(&board);
        }
        outcome
    }

    pub fn drag_cancel(&self) {
        self.board.lock().drag_cancel();
    }

    pub fn add_custom_course(&self, req: &CustomCourseRequest) -> Result<CourseAssignment> {
        let mut board = self.board.lock();
        let (course, placed) = board.add_custom_course(req, &mut rand::thread_rng())?;
        tracing::info!(course_id = %course.id, subject = %course.subject, placed, "custom course added");
        if placed {
            self.persist(&board);
        }
        Ok(course)
    }

    /// Writes any pending change now
    pub async fn flush(&self) -> Result<bool> {
        Ok(self.sync.flush().await?)
    }

    pub fn grid(&self) -> PlacementGrid {
        self.board.lock().grid().clone()
    }

    pub fn view(&self) -> BoardView {
        let view = self.board.lock().view();
        BoardView {
            student: self.sync.selected_student(),
            loading: self.sync.is_loading(),
            ..view
        }
    }

    fn persist(&self, board: &PlanBoard) {
        let (generation, plan) = board.snapshot();
        self.sync.grid_changed(generation, plan);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::sync::{MemoryStore, PlanRecord, DEFAULT_QUIET_WINDOW};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::json;

    fn cell(key: &str) -> DropTarget {
        DropTarget::Cell(key.parse().unwrap())
    }

    fn planner(store: &Arc<MemoryStore>) -> Planner<MemoryStore> {
        Planner::new(
            CandidatePool::with_defaults(),
            Arc::clone(store),
            EventBus::default(),
            DEFAULT_QUIET_WINDOW,
            RetryPolicy::none(),
        )
    }

    #[test]
    fn unknown_subject_is_rejected() {
        let mut board = PlanBoard::new(CandidatePool::with_defaults());
        assert!(matches!(
            board.select_subject(Some("astrology")),
            Err(PlannerError::Validation(_))
        ));
        assert!(board.select_subject(Some(" Math ")).is_ok());
        assert_eq!(board.selected_subject(), Some(&Subject::new("math")));
        assert!(matches!(board.available_for("astrology"), Err(PlannerError::NotFound(_))));
    }

    #[test]
    fn placing_from_pool_removes_from_available() {
        let mut board = PlanBoard::new(CandidatePool::with_defaults());
        board.select_subject(Some("math")).unwrap();
        let before = board.available().len();

        board.drag_start("math-geo");
        let outcome = board.drag_end(Some(&cell("math-2")));

        assert!(matches!(outcome, DropOutcome::Placed { .. }));
        assert_eq!(board.available().len(), before - 1);
        assert!(board.available().iter().all(|c| c.id != "math-geo"));
    }

    #[test]
    fn custom_course_with_year_is_placed() {
        let mut board = PlanBoard::new(CandidatePool::with_defaults());
        let mut rng = StdRng::seed_from_u64(1);
        let req = CustomCourseRequest {
            name: "Robotics".to_string(),
            subject: "electives".to_string(),
            year: Some(3),
        };

        let (course, placed) = board.add_custom_course(&req, &mut rng).unwrap();
        assert!(placed);
        assert!(board.pool().contains(&course.id));
        assert_eq!(
            board.grid().find_course(&course.id).map(|(key, _)| key.to_string()),
            Some("electives-3".to_string())
        );

        let bad = CustomCourseRequest {
            name: String::new(),
            ..req
        };
        assert!(matches!(
            board.add_custom_course(&bad, &mut rng),
            Err(PlannerError::Validation(_))
        ));
    }

    #[test]
    fn view_lists_subjects_and_years() {
        let mut board = PlanBoard::new(CandidatePool::with_defaults());
        board.select_subject(Some("pe")).unwrap();
        let view = board.view();

        assert_eq!(view.years.len(), 4);
        assert_eq!(view.years[0].label, "Freshman");
        assert!(view.subjects.iter().any(|s| s.label == "PE"));
        assert_eq!(view.available.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn drops_are_persisted_for_the_selected_student() {
        let store = Arc::new(MemoryStore::new());
        let planner = planner(&store);
        let alice = StudentId::new("alice");

        assert!(planner.select_student(Some(alice.clone())).await);
        planner.select_subject(Some("science")).unwrap();
        planner.drag_start("sci-bio");
        assert!(planner.drag_end(Some(&cell("science-1"))).changed_grid());
        assert!(planner.flush().await.unwrap());

        let saved = PlacementGrid::from_stored(&store.record(&alice).unwrap().plan).unwrap();
        assert!(saved.contains("sci-bio"));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_write_keeps_the_grid() {
        let store = Arc::new(MemoryStore::new());
        let planner = planner(&store);
        let alice = StudentId::new("alice");

        planner.select_student(Some(alice.clone())).await;
        planner.select_subject(Some("science")).unwrap();
        store.fail_next(StoreError::Permission("read only".into()));
        planner.drag_start("sci-bio");
        planner.drag_end(Some(&cell("science-1")));
        let before = planner.grid();

        assert!(planner.flush().await.is_err());
        assert!(store.record(&alice).is_none());
        assert_eq!(planner.grid(), before);
        assert!(planner.grid().contains("sci-bio"));
        assert!(planner.view().available.iter().all(|c| c.id != "sci-bio"));

        // The next change writes the whole grid again.
        planner.drag_start("sci-chem");
        planner.drag_end(Some(&cell("science-2")));
        assert!(planner.flush().await.unwrap());
        let saved = PlacementGrid::from_stored(&store.record(&alice).unwrap().plan).unwrap();
        assert!(saved.contains("sci-bio") && saved.contains("sci-chem"));
    }

    #[tokio::test(start_paused = true)]
    async fn ignored_drops_write_nothing() {
        let store = Arc::new(MemoryStore::new());
        let planner = planner(&store);

        planner.select_student(Some(StudentId::new("alice"))).await;
        planner.select_subject(Some("math")).unwrap();
        planner.drag_start("math-geo");
        assert_eq!(planner.drag_end(Some(&cell("science-1"))), DropOutcome::Ignored);
        assert!(planner.synchronizer().pending().is_none());
    }

    #[tokio::test]
    async fn selecting_a_student_replaces_the_grid() {
        let alice = StudentId::new("alice");
        let store = Arc::new(MemoryStore::new().with_record(PlanRecord::new(
            alice.clone(),
            json!({ "math-1": [{ "id": "math-alg1", "name": "Algebra 1", "subject": "math" }] }),
        )));
        let planner = planner(&store);

        planner.select_student(Some(alice.clone())).await;
        assert!(planner.grid().contains("math-alg1"));
        let view = planner.view();
        assert_eq!(view.student, Some(alice));
        assert!(!view.loading);

        planner.select_student(Some(StudentId::new("bob"))).await;
        assert!(planner.grid().is_empty());
    }
}
