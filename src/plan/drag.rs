use serde::Serialize;

use super::catalog::{subject_color, CandidatePool, DEFAULT_COLOR};
use super::grid::PlacementGrid;
use super::types::{CourseAssignment, DropTarget, PositionKey, Subject};

/// Where the dragged item was picked up
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "key")]
pub enum DragOrigin {
    /// A cell of the grid
    Cell(PositionKey),
    /// The candidate pool
    Pool,
    /// Neither; every drop except a pool return is ignored
    Unknown,
}

/// The item currently being dragged
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DragSession {
    pub course_id: String,
    pub subject: Option<Subject>,
    pub color: &'static str,
    pub origin: DragOrigin,
}

/// Result of ending a drag
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum DropOutcome {
    /// Course dragged back to the pool and removed from the grid
    Returned { course_id: String, from: PositionKey },
    /// Placed course repositioned
    Moved {
        course_id: String,
        from: PositionKey,
        to: PositionKey,
    },
    /// Fresh placement from the pool
    Placed { course_id: String, to: PositionKey },
    /// Nothing changed
    Ignored,
}

impl DropOutcome {
    pub fn changed_grid(&self) -> bool {
        !matches!(self, DropOutcome::Ignored)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
enum DragState {
    #[default]
    Idle,
    Dragging(DragSession),
}

/// Single-focus drag state machine: Idle <-> Dragging
#[derive(Debug, Clone, Default)]
pub struct DragController {
    state: DragState,
}

impl DragController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session(&self) -> Option<&DragSession> {
        match &self.state {
            DragState::Idle => None,
            DragState::Dragging(session) => Some(session),
        }
    }

    pub fn is_dragging(&self) -> bool {
        self.session().is_some()
    }

    /// Starts dragging `course_id`, replacing any session left over
    pub fn start(&mut self, course_id: &str, grid: &PlacementGrid, pool: &CandidatePool) -> DragSession {
        let (subject, origin) = if let Some((key, course)) = grid.find_course(course_id) {
            (Some(course.subject.clone()), DragOrigin::Cell(key.clone()))
        } else if let Some(template) = pool.template(course_id) {
            (Some(template.subject.clone()), DragOrigin::Pool)
        } else {
            (None, DragOrigin::Unknown)
        };

        let color = subject.as_ref().map(subject_color).unwrap_or(DEFAULT_COLOR);
        tracing::debug!(course_id, ?origin, "drag started");

        let session = DragSession {
            course_id: course_id.to_string(),
            subject,
            color,
            origin,
        };
        self.state = DragState::Dragging(session.clone());
        session
    }

    /// Whether `target` should highlight as a valid drop
    pub fn accepts(&self, target: &DropTarget) -> bool {
        match (target, self.session()) {
            (DropTarget::Pool, _) => true,
            (DropTarget::Cell(_), None) => true,
            (DropTarget::Cell(key), Some(session)) => session.subject.as_ref() == Some(&key.subject),
        }
    }

    /// Drops without a target
    pub fn cancel(&mut self) {
        self.state = DragState::Idle;
    }

    /// Ends the drag and applies the drop, always returning to Idle
    ///
    /// Precedence: pool return, then reposition of a placed course, then a
    /// fresh placement from the pool into the selected subject. Anything
    /// else is silently ignored.
    pub fn end(
        &mut self,
        target: Option<&DropTarget>,
        grid: &mut PlacementGrid,
        pool: &CandidatePool,
        selected_subject: Option<&Subject>,
    ) -> DropOutcome {
        let DragState::Dragging(session) = std::mem::take(&mut self.state) else {
            return DropOutcome::Ignored;
        };
        let Some(target) = target else {
            return DropOutcome::Ignored;
        };

        let outcome = resolve_drop(&session, target, grid, pool, selected_subject);
        tracing::debug!(course_id = %session.course_id, ?outcome, "drag ended");
        outcome
    }
}

fn resolve_drop(
    session: &DragSession,
    target: &DropTarget,
    grid: &mut PlacementGrid,
    pool: &CandidatePool,
    selected_subject: Option<&Subject>,
) -> DropOutcome {
    let course_id = session.course_id.as_str();

    let key = match target {
        DropTarget::Pool => {
            return match grid.remove_course(course_id) {
                Some((from, _)) => DropOutcome::Returned {
                    course_id: course_id.to_string(),
                    from,
                },
                None => DropOutcome::Ignored,
            };
        }
        DropTarget::Cell(key) => key,
    };

    if let Some((from, course)) = grid.find_course(course_id) {
        if course.subject != key.subject {
            return DropOutcome::Ignored;
        }
        let from = from.clone();
        return match grid.move_course(course_id, &from, key) {
            Ok(true) => DropOutcome::Moved {
                course_id: course_id.to_string(),
                from,
                to: key.clone(),
            },
            Ok(false) => DropOutcome::Ignored,
            Err(err) => {
                tracing::debug!(%err, "move rejected");
                DropOutcome::Ignored
            }
        };
    }

    if selected_subject != Some(&key.subject) {
        return DropOutcome::Ignored;
    }
    let Some(template) = pool.template(course_id) else {
        return DropOutcome::Ignored;
    };

    let course = CourseAssignment::new(
        template.id.clone(),
        template.name.clone(),
        template.subject.clone(),
    );
    match grid.place_course(key.clone(), course) {
        Ok(()) => DropOutcome::Placed {
            course_id: course_id.to_string(),
            to: key.clone(),
        },
        Err(err) => {
            tracing::debug!(%err, "placement rejected");
            DropOutcome::Ignored
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(raw: &str) -> PositionKey {
        raw.parse().unwrap()
    }

    fn pool() -> CandidatePool {
        CandidatePool::from_courses([
            CourseAssignment::new("m1", "Algebra 1", "math"),
            CourseAssignment::new("m2", "Geometry", "math"),
            CourseAssignment::new("s1", "Biology", "science"),
        ])
    }

    #[test]
    fn idle_controller_accepts_every_target() {
        let drag = DragController::new();
        assert!(drag.accepts(&DropTarget::Pool));
        assert!(drag.accepts(&DropTarget::Cell(key("science-4"))));
    }

    #[test]
    fn dragging_accepts_only_matching_cells_and_pool() {
        let pool = pool();
        let grid = PlacementGrid::new();
        let mut drag = DragController::new();

        let session = drag.start("m1", &grid, &pool);
        assert_eq!(session.origin, DragOrigin::Pool);
        assert_eq!(session.color, "#ef4444");

        assert!(drag.accepts(&DropTarget::Cell(key("math-3"))));
        assert!(!drag.accepts(&DropTarget::Cell(key("science-3"))));
        assert!(drag.accepts(&DropTarget::Pool));
    }

    #[test]
    fn start_prefers_grid_origin() {
        let pool = pool();
        let mut grid = PlacementGrid::new();
        grid.place_course(key("math-2"), CourseAssignment::new("m1", "Algebra 1", "math"))
            .unwrap();
        let mut drag = DragController::new();

        assert_eq!(drag.start("m1", &grid, &pool).origin, DragOrigin::Cell(key("math-2")));
    }

    #[test]
    fn pool_drop_places_fresh_copy() {
        let pool = pool();
        let mut grid = PlacementGrid::new();
        let mut drag = DragController::new();
        let math = Subject::new("math");

        drag.start("m1", &grid, &pool);
        let outcome = drag.end(Some(&DropTarget::Cell(key("math-1"))), &mut grid, &pool, Some(&math));

        assert_eq!(
            outcome,
            DropOutcome::Placed {
                course_id: "m1".to_string(),
                to: key("math-1")
            }
        );
        assert_eq!(grid.cell(&key("math-1")), &[CourseAssignment::new("m1", "Algebra 1", "math")]);
        assert!(!drag.is_dragging());
    }

    #[test]
    fn pool_drop_requires_selected_subject_to_match() {
        let pool = pool();
        let mut grid = PlacementGrid::new();
        let mut drag = DragController::new();

        drag.start("m1", &grid, &pool);
        let outcome = drag.end(
            Some(&DropTarget::Cell(key("math-1"))),
            &mut grid,
            &pool,
            Some(&Subject::new("science")),
        );
        assert_eq!(outcome, DropOutcome::Ignored);
        assert!(grid.is_empty());
    }

    #[test]
    fn mismatched_subject_drop_is_noop() {
        let pool = pool();
        let mut grid = PlacementGrid::new();
        let mut drag = DragController::new();
        let science = Subject::new("science");

        drag.start("s1", &grid, &pool);
        let outcome = drag.end(Some(&DropTarget::Cell(key("math-2"))), &mut grid, &pool, Some(&science));

        assert_eq!(outcome, DropOutcome::Ignored);
        assert!(grid.is_empty());
        assert!(!drag.is_dragging());
    }

    #[test]
    fn returning_last_course_removes_cell() {
        let pool = pool();
        let mut grid = PlacementGrid::new();
        grid.place_course(key("math-1"), CourseAssignment::new("m1", "Algebra 1", "math"))
            .unwrap();
        let mut drag = DragController::new();

        drag.start("m1", &grid, &pool);
        let outcome = drag.end(Some(&DropTarget::Pool), &mut grid, &pool, None);

        assert_eq!(
            outcome,
            DropOutcome::Returned {
                course_id: "m1".to_string(),
                from: key("math-1")
            }
        );
        assert!(grid.is_empty());
        assert!(grid.serialize().is_empty());
    }

    #[test]
    fn reposition_moves_within_subject() {
        let pool = pool();
        let mut grid = PlacementGrid::new();
        grid.place_course(key("math-1"), CourseAssignment::new("m1", "Algebra 1", "math"))
            .unwrap();
        let mut drag = DragController::new();

        // Selected subject does not gate repositioning.
        drag.start("m1", &grid, &pool);
        let outcome = drag.end(Some(&DropTarget::Cell(key("math-4"))), &mut grid, &pool, None);

        assert!(matches!(outcome, DropOutcome::Moved { .. }));
        assert_eq!(grid.cell(&key("math-4")).len(), 1);
        assert!(grid.cell(&key("math-1")).is_empty());
    }

    #[test]
    fn drop_on_own_cell_is_noop() {
        let pool = pool();
        let mut grid = PlacementGrid::new();
        grid.place_course(key("math-1"), CourseAssignment::new("m1", "Algebra 1", "math"))
            .unwrap();
        let before = grid.clone();
        let mut drag = DragController::new();

        drag.start("m1", &grid, &pool);
        let outcome = drag.end(Some(&DropTarget::Cell(key("math-1"))), &mut grid, &pool, None);

        assert_eq!(outcome, DropOutcome::Ignored);
        assert_eq!(grid, before);
    }

    #[test]
    fn unknown_ids_and_missing_targets_are_ignored() {
        let pool = pool();
        let mut grid = PlacementGrid::new();
        let mut drag = DragController::new();
        let math = Subject::new("math");

        let session = drag.start("ghost", &grid, &pool);
        assert_eq!(session.origin, DragOrigin::Unknown);
        assert!(!drag.accepts(&DropTarget::Cell(key("math-1"))));
        assert_eq!(
            drag.end(Some(&DropTarget::Cell(key("math-1"))), &mut grid, &pool, Some(&math)),
            DropOutcome::Ignored
        );

        drag.start("m1", &grid, &pool);
        assert_eq!(drag.end(None, &mut grid, &pool, Some(&math)), DropOutcome::Ignored);
        assert!(!drag.is_dragging());
        assert!(grid.is_empty());
    }

    #[test]
    fn end_without_start_is_ignored() {
        let pool = pool();
        let mut grid = PlacementGrid::new();
        let mut drag = DragController::new();
        assert_eq!(drag.end(Some(&DropTarget::Pool), &mut grid, &pool, None), DropOutcome::Ignored);
    }
}
