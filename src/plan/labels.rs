use super::types::{Subject, Year};

/// Display name for a plan year
pub fn year_label(year: Year) -> &'static str {
    match year.index() {
        1 => "Freshman",
        2 => "Sophomore",
        3 => "Junior",
        _ => "Senior",
    }
}

/// US grade level for a plan year (year 1 is 9th grade)
pub fn grade_level(year: Year) -> u8 {
    year.index() + 8
}

/// Title-cases a subject tag: `social-studies` -> `Social Studies`, `pe` -> `PE`
pub fn subject_label(subject: &Subject) -> String {
    subject
        .as_str()
        .split(['-', '_'])
        .filter(|word| !word.is_empty())
        .map(|word| {
            if word.len() <= 2 {
                return word.to_uppercase();
            }
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_cover_all_years() {
        let labels: Vec<_> = Year::all().map(year_label).collect();
        assert_eq!(labels, vec!["Freshman", "Sophomore", "Junior", "Senior"]);
        assert_eq!(Year::all().map(grade_level).collect::<Vec<_>>(), vec![9, 10, 11, 12]);
    }

    #[test]
    fn subject_labels_are_title_cased() {
        assert_eq!(subject_label(&Subject::new("social-studies")), "Social Studies");
        assert_eq!(subject_label(&Subject::new("pe")), "PE");
        assert_eq!(subject_label(&Subject::new("math")), "Math");
    }
}
