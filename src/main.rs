use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use course_planner::config::{Cli, Command, Config};
use course_planner::display::{format_course_name, print_plan, write_plan_to_file};
use course_planner::form::export_plan_to_csv;
use course_planner::plan::subject_label;
use course_planner::sync::StudentId;
use course_planner::web;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = Config::from_cli(&cli);
    config.validate()?;

    match cli.command {
        Command::Web { .. } => {
            println!("Access the planner at http://localhost:{}", config.port);
            web::start_server(config).await?;
        }
        Command::Show { student, out } => {
            let planner = config.build_planner()?;
            planner.select_student(Some(StudentId::new(&student))).await;
            let grid = planner.grid();
            let pool = planner.with_board(|board| board.pool().clone());

            print_plan(&grid, &pool);
            if let Some(path) = out {
                write_plan_to_file(&grid, &pool, &path)
                    .with_context(|| format!("writing {}", path.display()))?;
                println!("Plan saved to {}", path.display());
            }
        }
        Command::Export { student, out } => {
            let planner = config.build_planner()?;
            planner.select_student(Some(StudentId::new(&student))).await;
            export_plan_to_csv(&planner.grid(), &out)
                .with_context(|| format!("exporting to {}", out.display()))?;
            println!("Exported {} courses to {}", planner.grid().len(), out.display());
        }
        Command::Catalog => {
            let pool = config.load_pool()?;
            for subject in pool.subjects() {
                println!("\n=== {} ===", subject_label(subject));
                for course in pool.catalog(subject) {
                    println!("  {}", format_course_name(course));
                }
            }
        }
    }

    Ok(())
}
