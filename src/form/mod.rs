pub mod submission;
pub mod export;

pub use submission::{build_custom_course, validate_custom_course, CustomCourseRequest, MAX_NAME_LEN};
pub use export::{export_plan_to_csv, write_plan_csv};
