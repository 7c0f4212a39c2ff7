use std::collections::{BTreeMap, HashSet};

use serde_json::{Map, Value};

use crate::error::PlanError;
use super::types::{CourseAssignment, PositionKey};

/// Storage form of a grid: position key string -> ordered courses
pub type StoredPlan = BTreeMap<String, Vec<CourseAssignment>>;

// Stored plans have been seen double-encoded; anything deeper is rejected.
const MAX_ENCODING_DEPTH: usize = 3;

/// Mapping from grid cell to the courses placed there, in display order
///
/// Every course id appears at most once across all cells, every course sits in
/// a cell of its own subject, and cells never hold an empty list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlacementGrid {
    cells: BTreeMap<PositionKey, Vec<CourseAssignment>>,
}

impl PlacementGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Number of placed courses
    pub fn len(&self) -> usize {
        self.cells.values().map(Vec::len).sum()
    }

    pub fn cells(&self) -> impl Iterator<Item = (&PositionKey, &[CourseAssignment])> {
        self.cells.iter().map(|(key, courses)| (key, courses.as_slice()))
    }

    pub fn cell(&self, key: &PositionKey) -> &[CourseAssignment] {
        self.cells.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Finds the cell holding `course_id`
    pub fn find_course(&self, course_id: &str) -> Option<(&PositionKey, &CourseAssignment)> {
        self.cells.iter().find_map(|(key, courses)| {
            courses
                .iter()
                .find(|course| course.id == course_id)
                .map(|course| (key, course))
        })
    }

    pub fn contains(&self, course_id: &str) -> bool {
        self.find_course(course_id).is_some()
    }

    pub fn placed_ids(&self) -> HashSet<&str> {
        self.cells
            .values()
            .flatten()
            .map(|course| course.id.as_str())
            .collect()
    }

    /// Appends `course` to the cell at `key`
    pub fn place_course(&mut self, key: PositionKey, course: CourseAssignment) -> Result<(), PlanError> {
        if !course.is_well_formed() {
            return Err(PlanError::MalformedCourse(course.id));
        }
        if course.subject != key.subject {
            return Err(PlanError::SubjectMismatch {
                course_id: course.id,
                subject: course.subject,
                key,
            });
        }
        if let Some((existing, _)) = self.find_course(&course.id) {
            return Err(PlanError::AlreadyPlaced {
                course_id: course.id,
                key: existing.clone(),
            });
        }
        self.cells.entry(key).or_default().push(course);
        Ok(())
    }

    /// Removes the first occurrence of `course_id`, dropping its cell if it empties
    pub fn remove_course(&mut self, course_id: &str) -> Option<(PositionKey, CourseAssignment)> {
        let (key, index) = self.cells.iter().find_map(|(key, courses)| {
            courses
                .iter()
                .position(|course| course.id == course_id)
                .map(|index| (key.clone(), index))
        })?;

        let courses = self.cells.get_mut(&key)?;
        let removed = courses.remove(index);
        if courses.is_empty() {
            self.cells.remove(&key);
        }
        Some((key, removed))
    }

    /// Moves a placed course between cells of its own subject
    ///
    /// Returns `Ok(false)` when `from == to`. The course keeps its own name and
    /// subject; nothing is re-derived from the target cell.
    pub fn move_course(
        &mut self,
        course_id: &str,
        from: &PositionKey,
        to: &PositionKey,
    ) -> Result<bool, PlanError> {
        if from == to {
            return Ok(false);
        }

        let index = self
            .cell(from)
            .iter()
            .position(|course| course.id == course_id)
            .ok_or_else(|| PlanError::NotInCell {
                course_id: course_id.to_string(),
                key: from.clone(),
            })?;

        let subject = &self.cell(from)[index].subject;
        if *subject != to.subject {
            return Err(PlanError::SubjectMismatch {
                course_id: course_id.to_string(),
                subject: subject.clone(),
                key: to.clone(),
            });
        }

        let Some(courses) = self.cells.get_mut(from) else {
            return Ok(false);
        };
        let course = courses.remove(index);
        if courses.is_empty() {
            self.cells.remove(from);
        }
        self.cells.entry(to.clone()).or_default().push(course);
        Ok(true)
    }

    /// Replaces the whole grid with a stored plan
    ///
    /// On error the grid is left untouched.
    pub fn load(&mut self, stored: &Value) -> Result<(), PlanError> {
        *self = Self::from_stored(stored)?;
        Ok(())
    }

    /// Builds a grid from a stored plan, tolerating string-encoded JSON
    ///
    /// Unparseable keys, entries missing an id, name or subject, entries in a
    /// cell of another subject and repeated ids are dropped.
    pub fn from_stored(stored: &Value) -> Result<Self, PlanError> {
        let object = decode_object(stored)?;
        let mut grid = Self::new();
        let mut seen = HashSet::new();
        let mut dropped = 0usize;

        for (raw_key, entries) in &object {
            let Ok(key) = raw_key.parse::<PositionKey>() else {
                tracing::warn!(key = %raw_key, "ignoring stored cell with invalid key");
                continue;
            };
            let Some(entries) = entries.as_array() else {
                tracing::warn!(key = %raw_key, "ignoring stored cell that is not a list");
                continue;
            };

            let mut courses = Vec::with_capacity(entries.len());
            for entry in entries {
                match serde_json::from_value::<CourseAssignment>(entry.clone()) {
                    Ok(course)
                        if course.is_well_formed()
                            && course.subject == key.subject
                            && seen.insert(course.id.clone()) =>
                    {
                        courses.push(course);
                    }
                    _ => dropped += 1,
                }
            }
            if !courses.is_empty() {
                grid.cells.insert(key, courses);
            }
        }

        if dropped > 0 {
            tracing::warn!(dropped, "dropped malformed entries from stored plan");
        }
        Ok(grid)
    }

    /// Storage-ready form holding only non-empty, well-formed cells
    pub fn serialize(&self) -> StoredPlan {
        self.cells
            .iter()
            .filter_map(|(key, courses)| {
                let courses: Vec<CourseAssignment> = courses
                    .iter()
                    .filter(|course| course.is_well_formed())
                    .cloned()
                    .collect();
                (!courses.is_empty()).then(|| (key.to_string(), courses))
            })
            .collect()
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self.serialize()).unwrap_or_else(|_| Value::Object(Map::new()))
    }
}

fn decode_object(stored: &Value) -> Result<Map<String, Value>, PlanError> {
    let mut current = stored.clone();
    for _ in 0..MAX_ENCODING_DEPTH {
        match current {
            Value::Object(map) => return Ok(map),
            Value::Null => return Ok(Map::new()),
            Value::String(text) if text.trim().is_empty() => return Ok(Map::new()),
            Value::String(text) => {
                current = serde_json::from_str(&text)
                    .map_err(|err| PlanError::MalformedPlan(err.to_string()))?;
            }
            other => {
                return Err(PlanError::MalformedPlan(format!(
                    "expected an object, found {}",
                    value_kind(&other)
                )))
            }
        }
    }
    Err(PlanError::MalformedPlan("too many levels of string encoding".to_string()))
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
