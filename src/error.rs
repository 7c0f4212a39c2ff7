//! Error types for the planner
//!
//! Nothing here is fatal to the process: every variant maps to a
//! non-blocking message and a safe default state.

use crate::plan::types::{PositionKey, Subject};

/// Errors raised by the placement grid and its stored form
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    /// Course subject does not match the cell it was dropped on
    #[error("course {course_id} ({subject}) cannot be placed in {key}")]
    SubjectMismatch {
        course_id: String,
        subject: Subject,
        key: PositionKey,
    },

    /// Course id is already placed somewhere in the grid
    #[error("course {course_id} is already placed in {key}")]
    AlreadyPlaced { course_id: String, key: PositionKey },

    /// Course id is not in the cell the move started from
    #[error("course {course_id} is not in {key}")]
    NotInCell { course_id: String, key: PositionKey },

    /// Course is missing an id, name or subject
    #[error("course {0:?} needs a non-empty id, name and subject")]
    MalformedCourse(String),

    /// Position key could not be parsed
    #[error("invalid position key: {0}")]
    InvalidKey(String),

    /// Stored plan is not a JSON object (or an encoding of one)
    #[error("malformed stored plan: {0}")]
    MalformedPlan(String),
}

/// Errors returned by a plan store
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// Store unreachable; retried before it is surfaced
    #[error("store unreachable: {0}")]
    Connectivity(String),

    /// Row-level permission or ownership rejection
    #[error("permission denied: {0}")]
    Permission(String),

    /// Any other backend failure
    #[error("store error: {0}")]
    Backend(String),

    /// Record could not be encoded or decoded
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Connectivity failures are the only ones worth retrying
    #[inline]
    #[must_use]
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Connectivity(_))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        Self::Backend(err.to_string())
    }
}

/// Crate-level error
#[derive(Debug, thiserror::Error)]
pub enum PlannerError {
    /// Grid or stored plan error
    #[error(transparent)]
    Plan(#[from] PlanError),

    /// Store error
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Form input rejected
    #[error("{0}")]
    Validation(String),

    /// Referenced record does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Catalog or export file error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV error
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

impl PlannerError {
    /// Message suitable for an inline notice
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(msg) => msg.clone(),
            Self::Plan(PlanError::MalformedPlan(_)) => {
                "The saved plan could not be read; starting from an empty plan.".to_string()
            }
            Self::Plan(err) => err.to_string(),
            Self::Store(StoreError::Permission(_)) => {
                "You do not have access to this plan. Please contact support.".to_string()
            }
            Self::Store(StoreError::Connectivity(_)) => {
                "Could not reach the server. Your changes are kept on this page.".to_string()
            }
            Self::Store(_) => "The plan could not be saved. Please try again.".to_string(),
            Self::NotFound(what) => format!("{what} was not found"),
            Self::Config(msg) => msg.clone(),
            Self::Io(_) | Self::Csv(_) => "The file could not be read.".to_string(),
        }
    }
}

pub type Result<T, E = PlannerError> = std::result::Result<T, E>;
