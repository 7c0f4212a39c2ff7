use std::fs::File;
use std::io::Write;
use std::path::Path;

use csv::WriterBuilder;

use crate::error::Result;
use crate::plan::PlacementGrid;

const HEADER: [&str; 5] = ["subject", "year", "position", "id", "name"];

/// Writes one row per placed course, ordered by subject then year
pub fn write_plan_csv<W: Write>(grid: &PlacementGrid, writer: W) -> Result<()> {
    let mut wtr = WriterBuilder::new().has_headers(false).from_writer(writer);
    wtr.write_record(HEADER)?;

    for (key, courses) in grid.cells() {
        let year = key.year.to_string();
        let position = key.to_string();
        for course in courses {
            wtr.write_record([
                key.subject.as_str(),
                year.as_str(),
                position.as_str(),
                course.id.as_str(),
                course.name.as_str(),
            ])?;
        }
    }

    wtr.flush()?;
    Ok(())
}

/// Exports a plan to a CSV file, replacing any existing file
pub fn export_plan_to_csv(grid: &PlacementGrid, csv_path: &Path) -> Result<()> {
    let file = File::create(csv_path)?;
    write_plan_csv(grid, file)?;
    tracing::info!(path = %csv_path.display(), courses = grid.len(), "plan exported");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{CourseAssignment, PositionKey};

    fn grid() -> PlacementGrid {
        let mut grid = PlacementGrid::new();
        grid.place_course(
            "science-2".parse::<PositionKey>().unwrap(),
            CourseAssignment::new("sci-chem", "Chemistry", "science"),
        )
        .unwrap();
        grid.place_course(
            "math-1".parse::<PositionKey>().unwrap(),
            CourseAssignment::new("math-alg1", "Algebra 1, Honors", "math"),
        )
        .unwrap();
        grid
    }

    #[test]
    fn rows_are_sorted_and_quoted() {
        let mut out = Vec::new();
        write_plan_csv(&grid(), &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "subject,year,position,id,name",
                "math,1,math-1,math-alg1,\"Algebra 1, Honors\"",
                "science,2,science-2,sci-chem,Chemistry",
            ]
        );
    }

    #[test]
    fn empty_plan_writes_only_the_header() {
        let mut out = Vec::new();
        write_plan_csv(&PlacementGrid::new(), &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "subject,year,position,id,name\n");
    }

    #[test]
    fn export_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.csv");
        export_plan_to_csv(&grid(), &path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap().lines().count(), 3);
    }
}
