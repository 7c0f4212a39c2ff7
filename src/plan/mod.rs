pub mod types;
pub mod labels;
pub mod grid;
pub mod catalog;
pub mod drag;

pub use types::{CourseAssignment, DropTarget, PositionKey, Subject, Year};
pub use labels::{grade_level, subject_label, year_label};
pub use grid::{PlacementGrid, StoredPlan};
pub use catalog::{subject_color, CandidatePool};
pub use drag::{DragController, DragOrigin, DragSession, DropOutcome};
