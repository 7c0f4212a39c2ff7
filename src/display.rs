use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::error::Result;
use crate::plan::{grade_level, subject_label, year_label, CandidatePool, CourseAssignment, PlacementGrid, PositionKey, Subject, Year};

/// Formats a course name with its id: `Algebra 1 (math-alg1)`
pub fn format_course_name(course: &CourseAssignment) -> String {
    if course.name.is_empty() {
        course.id.clone()
    } else {
        format!("{} ({})", course.name, course.id)
    }
}

// Pool subjects first, then anything only the grid knows about.
fn subjects_to_show<'a>(grid: &'a PlacementGrid, pool: &'a CandidatePool) -> BTreeSet<&'a Subject> {
    pool.subjects()
        .chain(grid.cells().map(|(key, _)| &key.subject))
        .collect()
}

/// Renders the plan as text, one block per subject and one line per year
pub fn format_plan(grid: &PlacementGrid, pool: &CandidatePool) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "** Course plan: {} courses **", grid.len());

    for subject in subjects_to_show(grid, pool) {
        let _ = writeln!(out, "\n== {} ==", subject_label(subject));
        for year in Year::all() {
            let courses = grid.cell(&PositionKey::new(subject.clone(), year));
            let label = format!("{} ({}th)", year_label(year), grade_level(year));
            if courses.is_empty() {
                let _ = writeln!(out, "  {:<17} [EMPTY]", label);
            } else {
                let names: Vec<String> = courses.iter().map(format_course_name).collect();
                let _ = writeln!(out, "  {:<17} {}", label, names.join(", "));
            }
        }
    }

    out
}

/// Prints the plan to stdout
pub fn print_plan(grid: &PlacementGrid, pool: &CandidatePool) {
    print!("{}", format_plan(grid, pool));
}

/// Writes the text rendering of the plan to a file
pub fn write_plan_to_file(grid: &PlacementGrid, pool: &CandidatePool, path: &Path) -> Result<()> {
    let mut file = File::create(path)?;
    file.write_all(format_plan(grid, pool).as_bytes())?;
    Ok(())
}
