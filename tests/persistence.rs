use std::sync::Arc;
use std::time::Duration;

use course_planner::plan::{CandidatePool, DropTarget};
use course_planner::planner::Planner;
use course_planner::sync::{EventBus, JsonFileStore, RetryPolicy, StudentId};

fn planner(path: &std::path::Path) -> Planner<JsonFileStore> {
    Planner::new(
        CandidatePool::with_defaults(),
        Arc::new(JsonFileStore::new(path)),
        EventBus::default(),
        Duration::from_millis(200),
        RetryPolicy::none(),
    )
}

fn cell(key: &str) -> DropTarget {
    DropTarget::Cell(key.parse().unwrap())
}

#[tokio::test]
async fn plan_survives_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plans.json");
    let alice = StudentId::new("alice");

    {
        let planner = planner(&path);
        planner.select_student(Some(alice.clone())).await;
        planner.select_subject(Some("english")).unwrap();
        for (course, key) in [("eng-9", "english-1"), ("eng-10", "english-2")] {
            planner.drag_start(course);
            assert!(planner.drag_end(Some(&cell(key))).changed_grid());
        }
        // Reorder: move eng-10 into year 1 as well
        planner.drag_start("eng-10");
        planner.drag_end(Some(&cell("english-1")));
        assert!(planner.flush().await.unwrap());
    }

    let planner = planner(&path);
    planner.select_student(Some(alice)).await;
    let grid = planner.grid();
    let year_one: Vec<&str> = grid
        .cell(&"english-1".parse().unwrap())
        .iter()
        .map(|c| c.id.as_str())
        .collect();
    assert_eq!(year_one, vec!["eng-9", "eng-10"]);
    assert!(grid.cell(&"english-2".parse().unwrap()).is_empty());
}

#[tokio::test]
async fn switching_students_keeps_plans_apart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plans.json");
    let planner = planner(&path);

    planner.select_student(Some(StudentId::new("alice"))).await;
    planner.select_subject(Some("math")).unwrap();
    planner.drag_start("math-calc");
    planner.drag_end(Some(&cell("math-4")));

    // The pending write for alice is flushed before bob loads.
    planner.select_student(Some(StudentId::new("bob"))).await;
    assert!(planner.grid().is_empty());
    planner.drag_start("math-alg1");
    planner.drag_end(Some(&cell("math-1")));
    planner.flush().await.unwrap();

    planner.select_student(Some(StudentId::new("alice"))).await;
    assert!(planner.grid().contains("math-calc"));
    assert!(!planner.grid().contains("math-alg1"));
}
