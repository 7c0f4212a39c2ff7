use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::plan::{CandidatePool, CourseAssignment, Subject, Year};

/// Longest course name the form accepts
pub const MAX_NAME_LEN: usize = 80;

/// "Create course" form data from the frontend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomCourseRequest {
    pub name: String,
    pub subject: String,
    /// When set, the new course is also placed in that year's cell
    #[serde(default)]
    pub year: Option<u8>,
}

/// Validates a custom course request against the pool's subjects
pub fn validate_custom_course(req: &CustomCourseRequest, pool: &CandidatePool) -> Result<(), String> {
    // Validate name
    let name = req.name.trim();
    if name.is_empty() {
        return Err("Course name is required".to_string());
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(format!("Course name must be at most {} characters", MAX_NAME_LEN));
    }

    // Validate subject
    if req.subject.trim().is_empty() {
        return Err("Subject selection is required".to_string());
    }
    let subject = Subject::new(&req.subject);
    if !pool.has_subject(&subject) {
        return Err(format!("Unknown subject: {}", req.subject.trim()));
    }

    // Same name twice in one subject is almost always a double submit
    if pool
        .catalog(&subject)
        .iter()
        .any(|course| course.name.eq_ignore_ascii_case(name))
    {
        return Err(format!("{} already has a course named \"{}\"", subject, name));
    }

    if let Some(year) = req.year {
        if Year::try_from(year).is_err() {
            return Err(format!("Invalid year: {}", year));
        }
    }

    Ok(())
}

/// Builds the course for a validated request, with an id unique in `pool`
pub fn build_custom_course<R: Rng>(req: &CustomCourseRequest, pool: &CandidatePool, rng: &mut R) -> CourseAssignment {
    let subject = Subject::new(&req.subject);
    let id = loop {
        let candidate = format!("custom-{}-{:08x}", subject, rng.gen::<u32>());
        if !pool.contains(&candidate) {
            break candidate;
        }
    };
    CourseAssignment::new(id, req.name.trim(), subject)
}
