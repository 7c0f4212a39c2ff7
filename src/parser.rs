use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use csv::ReaderBuilder;

use crate::error::Result;
use crate::plan::{CourseAssignment, Subject};

/// Loads course templates from a CSV file
///
/// Expects `id`, `name` and `subject` columns. Header names are matched
/// case-insensitively; when a header is missing the first three columns are
/// used in that order.
pub fn load_catalog<P: AsRef<Path>>(csv_path: P) -> Result<Vec<CourseAssignment>> {
    let path = csv_path.as_ref();
    let file = std::fs::File::open(path)?;
    let courses = read_catalog(file)?;
    tracing::info!(path = %path.display(), courses = courses.len(), "catalog loaded");
    Ok(courses)
}

/// Reads course templates from any CSV source, see [`load_catalog`]
pub fn read_catalog<R: Read>(source: R) -> Result<Vec<CourseAssignment>> {
    let mut reader = ReaderBuilder::new().flexible(true).trim(csv::Trim::All).from_reader(source);
    let headers = reader.headers()?.clone();

    let column = |wanted: &str, fallback: usize| {
        headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(wanted))
            .unwrap_or(fallback)
    };
    let id_col = column("id", 0);
    let name_col = column("name", 1);
    let subject_col = column("subject", 2);

    // Later rows with the same id replace earlier ones, keeping first-seen order
    let mut order: Vec<String> = Vec::new();
    let mut by_id: HashMap<String, CourseAssignment> = HashMap::new();

    for (line, result) in reader.records().enumerate() {
        let record = result?;
        let id = record.get(id_col).unwrap_or("").trim();
        let name = record.get(name_col).unwrap_or("").trim();
        let subject = record.get(subject_col).unwrap_or("").trim();

        // Skip incomplete records
        if id.is_empty() || name.is_empty() || subject.is_empty() {
            if record.iter().any(|field| !field.trim().is_empty()) {
                tracing::warn!(row = line + 2, "skipping incomplete catalog row");
            }
            continue;
        }

        let course = CourseAssignment::new(id, name, Subject::new(subject));
        if by_id.insert(id.to_string(), course).is_none() {
            order.push(id.to_string());
        }
    }

    Ok(order
        .into_iter()
        .filter_map(|id| by_id.remove(&id))
        .collect())
}
