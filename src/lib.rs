//! Four-year high-school course planner
//!
//! Courses are dragged from a per-subject candidate pool into a
//! subject-by-year grid. The grid of the selected student is persisted
//! through a debounced write scheduler.

pub mod config;
pub mod display;
pub mod error;
pub mod form;
pub mod parser;
pub mod plan;
pub mod planner;
pub mod sync;
pub mod web;

pub use error::{PlanError, PlannerError, Result, StoreError};
pub use planner::{PlanBoard, Planner};
