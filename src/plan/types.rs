use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PlanError;

/// Subject tag, e.g. `math` or `social-studies`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Subject(String);

impl Subject {
    pub fn new(tag: impl AsRef<str>) -> Self {
        Self(tag.as_ref().trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Subject {
    fn from(tag: &str) -> Self {
        Self::new(tag)
    }
}

impl From<String> for Subject {
    fn from(tag: String) -> Self {
        Self::new(tag)
    }
}

impl From<Subject> for String {
    fn from(subject: Subject) -> Self {
        subject.0
    }
}

/// High-school year, 1 through 4
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Year(u8);

impl Year {
    pub const FIRST: u8 = 1;
    pub const LAST: u8 = 4;

    /// All four years in display order
    pub fn all() -> impl Iterator<Item = Year> {
        (Self::FIRST..=Self::LAST).map(Year)
    }

    pub fn index(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Year {
    type Error = PlanError;

    fn try_from(index: u8) -> Result<Self, Self::Error> {
        if (Self::FIRST..=Self::LAST).contains(&index) {
            Ok(Year(index))
        } else {
            Err(PlanError::InvalidKey(format!("year {index} is outside 1-4")))
        }
    }
}

impl From<Year> for u8 {
    fn from(year: Year) -> Self {
        year.0
    }
}

impl fmt::Display for Year {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One cell of the placement grid, rendered as `{subject}-{year}`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PositionKey {
    pub subject: Subject,
    pub year: Year,
}

impl PositionKey {
    pub fn new(subject: impl Into<Subject>, year: Year) -> Self {
        Self {
            subject: subject.into(),
            year,
        }
    }
}

impl fmt::Display for PositionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.subject, self.year)
    }
}

impl FromStr for PositionKey {
    type Err = PlanError;

    // Subjects may contain hyphens, so the year is whatever follows the last one.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let (subject, year) = raw
            .trim()
            .rsplit_once('-')
            .ok_or_else(|| PlanError::InvalidKey(raw.to_string()))?;
        if subject.trim().is_empty() {
            return Err(PlanError::InvalidKey(raw.to_string()));
        }
        let index: u8 = year
            .parse()
            .map_err(|_| PlanError::InvalidKey(raw.to_string()))?;
        Ok(Self {
            subject: Subject::new(subject),
            year: Year::try_from(index)?,
        })
    }
}

impl TryFrom<String> for PositionKey {
    type Error = PlanError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        raw.parse()
    }
}

impl From<PositionKey> for String {
    fn from(key: PositionKey) -> Self {
        key.to_string()
    }
}

/// A course placed in (or offered to) the grid
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseAssignment {
    pub id: String,
    pub name: String,
    pub subject: Subject,
}

impl CourseAssignment {
    pub fn new(id: impl Into<String>, name: impl Into<String>, subject: impl Into<Subject>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            subject: subject.into(),
        }
    }

    /// Stored entries must carry a non-empty id, name and subject
    pub fn is_well_formed(&self) -> bool {
        !self.id.trim().is_empty() && !self.name.trim().is_empty() && !self.subject.as_str().is_empty()
    }
}

/// Where a drop lands
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "key")]
pub enum DropTarget {
    /// Back into the candidate pool
    Pool,
    /// A grid cell
    Cell(PositionKey),
}

impl DropTarget {
    pub fn subject(&self) -> Option<&Subject> {
        match self {
            DropTarget::Pool => None,
            DropTarget::Cell(key) => Some(&key.subject),
        }
    }
}

impl FromStr for DropTarget {
    type Err = PlanError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        if raw.trim().eq_ignore_ascii_case("pool") {
            Ok(DropTarget::Pool)
        } else {
            raw.parse().map(DropTarget::Cell)
        }
    }
}
