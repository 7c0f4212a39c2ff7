//! Command line and environment configuration

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::error::{PlannerError, Result};
use crate::parser::load_catalog;
use crate::plan::CandidatePool;
use crate::planner::Planner;
use crate::sync::{EventBus, JsonFileStore, MemoryStore, PlanStore, RetryPolicy};

const MAX_DEBOUNCE_MS: u64 = 60_000;
const MAX_RETRY_DELAY_MS: u64 = 30_000;

#[derive(Parser, Debug)]
#[command(name = "course-planner")]
#[command(about = "Four-year course planner with a drag-and-drop web UI")]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    pub common: CommonArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Options shared by every subcommand
#[derive(Args, Debug, Clone, Default)]
pub struct CommonArgs {
    /// JSON file holding stored plans (kept in memory when omitted)
    #[arg(long, env = "PLANNER_STORE", global = true, value_name = "PATH")]
    pub store: Option<PathBuf>,

    /// CSV course catalog with id,name,subject columns
    #[arg(long, env = "PLANNER_CATALOG", global = true, value_name = "PATH")]
    pub catalog: Option<PathBuf>,

    /// Quiet window before a changed plan is written
    #[arg(long, env = "PLANNER_DEBOUNCE_MS", global = true, value_name = "MS")]
    pub debounce_ms: Option<u64>,

    /// Reconnect attempts after a connectivity failure
    #[arg(long, env = "PLANNER_MAX_RETRIES", global = true)]
    pub max_retries: Option<u32>,

    /// Delay between reconnect attempts
    #[arg(long, env = "PLANNER_RETRY_DELAY_MS", global = true, value_name = "MS")]
    pub retry_delay_ms: Option<u64>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Serve the planner UI and JSON API
    Web {
        #[arg(short, long, env = "PLANNER_PORT", default_value_t = 8080)]
        port: u16,

        /// Directory with the static frontend
        #[arg(long, env = "PLANNER_STATIC_DIR", value_name = "DIR")]
        static_dir: Option<PathBuf>,
    },
    /// Print a student's stored plan
    Show {
        student: String,

        /// Also write the text rendering to this file
        #[arg(short, long, value_name = "PATH")]
        out: Option<PathBuf>,
    },
    /// Export a student's stored plan as CSV
    Export {
        student: String,

        #[arg(short, long, value_name = "PATH")]
        out: PathBuf,
    },
    /// List the course catalog
    Catalog,
}

/// Resolved settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub port: u16,
    pub store_path: Option<PathBuf>,
    pub catalog_path: Option<PathBuf>,
    pub static_dir: Option<PathBuf>,
    pub debounce_ms: u64,
    pub retry: RetryPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            store_path: None,
            catalog_path: None,
            static_dir: None,
            debounce_ms: 1000,
            retry: RetryPolicy::default(),
        }
    }
}

impl Config {
    pub fn from_cli(cli: &Cli) -> Self {
        let mut config = Self::default();
        let common = &cli.common;

        config.store_path = common.store.clone();
        config.catalog_path = common.catalog.clone();
        if let Some(ms) = common.debounce_ms {
            config.debounce_ms = ms;
        }
        if let Some(retries) = common.max_retries {
            config.retry.max_retries = retries;
        }
        if let Some(ms) = common.retry_delay_ms {
            config.retry.delay = Duration::from_millis(ms);
        }
        if let Command::Web { port, static_dir } = &cli.command {
            config.port = *port;
            config.static_dir = static_dir.clone();
        }
        config
    }

    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(PlannerError::Config("port must be non-zero".to_string()));
        }
        if self.debounce_ms > MAX_DEBOUNCE_MS {
            return Err(PlannerError::Config(format!(
                "debounce must be at most {} ms, got {}",
                MAX_DEBOUNCE_MS, self.debounce_ms
            )));
        }
        if self.retry.delay > Duration::from_millis(MAX_RETRY_DELAY_MS) {
            return Err(PlannerError::Config(format!(
                "retry delay must be at most {} ms",
                MAX_RETRY_DELAY_MS
            )));
        }
        if let Some(dir) = &self.static_dir {
            if !dir.is_dir() {
                return Err(PlannerError::Config(format!(
                    "static directory {} does not exist",
                    dir.display()
                )));
            }
        }
        Ok(())
    }

    pub fn quiet_window(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Catalog from `catalog_path`, or the built-in one
    pub fn load_pool(&self) -> Result<CandidatePool> {
        let Some(path) = &self.catalog_path else {
            return Ok(CandidatePool::with_defaults());
        };
        let courses = load_catalog(path)?;
        if courses.is_empty() {
            return Err(PlannerError::Config(format!(
                "catalog {} has no courses",
                path.display()
            )));
        }
        Ok(CandidatePool::from_courses(courses))
    }

    pub fn open_store(&self) -> Arc<dyn PlanStore> {
        match &self.store_path {
            Some(path) => {
                tracing::info!(path = %path.display(), "using file-backed plan store");
                Arc::new(JsonFileStore::new(path))
            }
            None => {
                tracing::warn!("no plan store configured, plans are kept in memory only");
                Arc::new(MemoryStore::new())
            }
        }
    }

    pub fn build_planner(&self) -> Result<Planner<dyn PlanStore>> {
        Ok(Planner::new(
            self.load_pool()?,
            self.open_store(),
            EventBus::default(),
            self.quiet_window(),
            self.retry,
        ))
    }
}
