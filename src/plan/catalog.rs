use std::collections::BTreeMap;

use super::grid::PlacementGrid;
use super::types::{CourseAssignment, Subject};

/// Overlay colour used while a course of an unknown subject is dragged
pub const DEFAULT_COLOR: &str = "#9ca3af";

const SUBJECT_COLORS: &[(&str, &str)] = &[
    ("english", "#3b82f6"),
    ("math", "#ef4444"),
    ("science", "#10b981"),
    ("social-studies", "#f59e0b"),
    ("language", "#8b5cf6"),
    ("arts", "#ec4899"),
    ("pe", "#14b8a6"),
    ("electives", "#6366f1"),
];

/// Looks up the display colour for a subject
pub fn subject_color(subject: &Subject) -> &'static str {
    SUBJECT_COLORS
        .iter()
        .find(|(tag, _)| *tag == subject.as_str())
        .map(|(_, color)| *color)
        .unwrap_or(DEFAULT_COLOR)
}

const DEFAULT_CATALOG: &[(&str, &str, &str)] = &[
    ("eng-9", "English 9", "english"),
    ("eng-10", "English 10", "english"),
    ("eng-11", "American Literature", "english"),
    ("eng-12", "British Literature", "english"),
    ("eng-ap-lang", "AP English Language", "english"),
    ("math-alg1", "Algebra 1", "math"),
    ("math-geo", "Geometry", "math"),
    ("math-alg2", "Algebra 2", "math"),
    ("math-precalc", "Pre-Calculus", "math"),
    ("math-calc", "Calculus", "math"),
    ("math-stats", "Statistics", "math"),
    ("sci-bio", "Biology", "science"),
    ("sci-chem", "Chemistry", "science"),
    ("sci-phys", "Physics", "science"),
    ("sci-earth", "Earth Science", "science"),
    ("sci-anat", "Anatomy and Physiology", "science"),
    ("ss-world", "World History", "social-studies"),
    ("ss-us", "US History", "social-studies"),
    ("ss-gov", "Government", "social-studies"),
    ("ss-econ", "Economics", "social-studies"),
    ("lang-span1", "Spanish 1", "language"),
    ("lang-span2", "Spanish 2", "language"),
    ("lang-fr1", "French 1", "language"),
    ("lang-fr2", "French 2", "language"),
    ("arts-art1", "Art 1", "arts"),
    ("arts-music", "Music Theory", "arts"),
    ("arts-theatre", "Theatre", "arts"),
    ("pe-pe", "Physical Education", "pe"),
    ("pe-health", "Health", "pe"),
    ("elec-cs", "Computer Science", "electives"),
    ("elec-psych", "Psychology", "electives"),
    ("elec-finance", "Personal Finance", "electives"),
];

/// Per-subject catalog of course templates, plus user-created entries
#[derive(Debug, Clone, Default)]
pub struct CandidatePool {
    subjects: BTreeMap<Subject, Vec<CourseAssignment>>,
}

impl CandidatePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in high-school catalog
    pub fn with_defaults() -> Self {
        Self::from_courses(
            DEFAULT_CATALOG
                .iter()
                .map(|(id, name, subject)| CourseAssignment::new(*id, *name, *subject)),
        )
    }

    /// Later templates with an id already in the pool replace the earlier one
    pub fn from_courses(courses: impl IntoIterator<Item = CourseAssignment>) -> Self {
        let mut pool = Self::new();
        for course in courses {
            pool.insert(course);
        }
        pool
    }

    pub fn insert(&mut self, course: CourseAssignment) {
        if let Some(existing) = self.template_mut(&course.id) {
            if existing.subject == course.subject {
                *existing = course;
                return;
            }
        }
        self.remove(&course.id);
        self.subjects
            .entry(course.subject.clone())
            .or_default()
            .push(course);
    }

    pub fn remove(&mut self, course_id: &str) -> Option<CourseAssignment> {
        let subject = self.template(course_id)?.subject.clone();
        let courses = self.subjects.get_mut(&subject)?;
        let index = courses.iter().position(|course| course.id == course_id)?;
        let removed = courses.remove(index);
        if courses.is_empty() {
            self.subjects.remove(&subject);
        }
        Some(removed)
    }

    pub fn subjects(&self) -> impl Iterator<Item = &Subject> {
        self.subjects.keys()
    }

    pub fn has_subject(&self, subject: &Subject) -> bool {
        self.subjects.contains_key(subject)
    }

    pub fn catalog(&self, subject: &Subject) -> &[CourseAssignment] {
        self.subjects.get(subject).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn template(&self, course_id: &str) -> Option<&CourseAssignment> {
        self.subjects.values().flatten().find(|course| course.id == course_id)
    }

    fn template_mut(&mut self, course_id: &str) -> Option<&mut CourseAssignment> {
        self.subjects
            .values_mut()
            .flatten()
            .find(|course| course.id == course_id)
    }

    pub fn contains(&self, course_id: &str) -> bool {
        self.template(course_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.subjects.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Catalog entries for `subject` not placed anywhere in `grid`, in catalog order
    pub fn available(&self, subject: &Subject, grid: &PlacementGrid) -> Vec<CourseAssignment> {
        let placed = grid.placed_ids();
        self.catalog(subject)
            .iter()
            .filter(|course| !placed.contains(course.id.as_str()))
            .cloned()
            .collect()
    }
}
