use std::collections::VecDeque;
use std::sync::Arc;

use actix_files::Files;
use actix_web::{middleware, web, App, HttpResponse, HttpServer, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::error::{PlanError, PlannerError, StoreError};
use crate::form::CustomCourseRequest;
use crate::plan::{DropOutcome, DropTarget};
use crate::planner::{BoardView, Planner};
use crate::sync::{ConnectionStatus, EventBus, Notice, PlanStore, PlannerEvent, StudentId};

// Oldest notices are dropped once the page stops polling.
const MAX_NOTICES: usize = 32;

pub struct AppState {
    pub planner: Arc<Planner<dyn PlanStore>>,
    pub notices: Arc<Mutex<VecDeque<Notice>>>,
    pub connection: Arc<Mutex<ConnectionStatus>>,
}

impl AppState {
    pub fn new(planner: Arc<Planner<dyn PlanStore>>) -> Self {
        Self {
            planner,
            notices: Arc::new(Mutex::new(VecDeque::new())),
            connection: Arc::new(Mutex::new(ConnectionStatus::Connected)),
        }
    }

    /// Collects notices and connection changes from the bus until it closes
    pub fn spawn_event_collector(&self) -> JoinHandle<()> {
        let events: &EventBus = self.planner.events();
        let mut rx = events.subscribe();
        let notices = Arc::clone(&self.notices);
        let connection = Arc::clone(&self.connection);

        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(PlannerEvent::Notice(notice)) => {
                        let mut notices = notices.lock();
                        if notices.len() == MAX_NOTICES {
                            notices.pop_front();
                        }
                        notices.push_back(notice);
                    }
                    Ok(PlannerEvent::Connection(status)) => *connection.lock() = status,
                    Ok(PlannerEvent::SelectionChanged(_)) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "notice collector fell behind");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}

#[derive(Deserialize)]
pub struct SelectStudentRequest {
    student: Option<String>,
}

#[derive(Deserialize)]
pub struct SelectSubjectRequest {
    subject: Option<String>,
}

#[derive(Deserialize)]
pub struct DragStartRequest {
    course_id: String,
}

#[derive(Deserialize)]
pub struct DragEndRequest {
    target: Option<DropTarget>,
}

#[derive(Serialize)]
pub struct PlanResponse {
    #[serde(flatten)]
    board: BoardView,
    connection: ConnectionStatus,
}

#[derive(Serialize)]
pub struct DropResponse {
    #[serde(flatten)]
    outcome: DropOutcome,
    plan: BoardView,
}

#[derive(Serialize)]
pub struct NoticesResponse {
    notices: Vec<Notice>,
    connection: ConnectionStatus,
}

/// Maps a planner error to a JSON error response
pub fn error_response(err: &PlannerError) -> HttpResponse {
    let mut builder = match err {
        PlannerError::Validation(_) | PlannerError::Plan(PlanError::InvalidKey(_)) => {
            HttpResponse::BadRequest()
        }
        PlannerError::Plan(_) => HttpResponse::UnprocessableEntity(),
        PlannerError::NotFound(_) => HttpResponse::NotFound(),
        PlannerError::Store(StoreError::Permission(_)) => HttpResponse::Forbidden(),
        PlannerError::Store(StoreError::Connectivity(_)) => HttpResponse::ServiceUnavailable(),
        _ => HttpResponse::InternalServerError(),
    };
    builder.json(serde_json::json!({"success": false, "error": err.user_message()}))
}

fn plan_response(state: &AppState) -> PlanResponse {
    PlanResponse {
        board: state.planner.view(),
        connection: *state.connection.lock(),
    }
}

async fn get_plan(state: web::Data<AppState>) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(plan_response(&state)))
}

async fn get_notices(state: web::Data<AppState>) -> Result<HttpResponse> {
    let notices: Vec<Notice> = state.notices.lock().drain(..).collect();
    Ok(HttpResponse::Ok().json(NoticesResponse {
        notices,
        connection: *state.connection.lock(),
    }))
}

async fn select_student(
    req: web::Json<SelectStudentRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    // A blank selection clears the student
    let student = req
        .student
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(StudentId::new);

    let applied = state.planner.select_student(student).await;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "applied": applied,
        "plan": plan_response(&state),
    })))
}

async fn select_subject(
    req: web::Json<SelectSubjectRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    match state.planner.select_subject(req.subject.as_deref()) {
        Ok(()) => Ok(HttpResponse::Ok().json(plan_response(&state))),
        Err(err) => Ok(error_response(&err)),
    }
}

async fn get_available(
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    match state.planner.available(&path) {
        Ok(courses) => Ok(HttpResponse::Ok().json(courses)),
        Err(err) => Ok(error_response(&err)),
    }
}

async fn drag_start(
    req: web::Json<DragStartRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let session = state.planner.drag_start(req.course_id.trim());
    Ok(HttpResponse::Ok().json(session))
}

async fn drag_accepts(
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    match path.parse::<DropTarget>() {
        Ok(target) => Ok(HttpResponse::Ok().json(serde_json::json!({
            "accepts": state.planner.drag_accepts(&target),
        }))),
        Err(err) => Ok(error_response(&PlannerError::from(err))),
    }
}

async fn drag_end(
    req: web::Json<DragEndRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let outcome = state.planner.drag_end(req.target.as_ref());
    Ok(HttpResponse::Ok().json(DropResponse {
        outcome,
        plan: state.planner.view(),
    }))
}

async fn drag_cancel(state: web::Data<AppState>) -> Result<HttpResponse> {
    state.planner.drag_cancel();
    Ok(HttpResponse::Ok().json(serde_json::json!({"success": true})))
}

async fn create_course(
    req: web::Json<CustomCourseRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    match state.planner.add_custom_course(&req) {
        Ok(course) => Ok(HttpResponse::Created().json(course)),
        Err(err) => Ok(error_response(&err)),
    }
}

async fn flush_plan(state: web::Data<AppState>) -> Result<HttpResponse> {
    match state.planner.flush().await {
        Ok(saved) => Ok(HttpResponse::Ok().json(serde_json::json!({"saved": saved}))),
        Err(err) => Ok(error_response(&err)),
    }
}

/// Registers the JSON API
pub fn api_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/plan", web::get().to(get_plan))
        .route("/api/plan/flush", web::post().to(flush_plan))
        .route("/api/notices", web::get().to(get_notices))
        .route("/api/students/select", web::post().to(select_student))
        .route("/api/subject", web::post().to(select_subject))
        .service(web::resource("/api/available/{subject}").route(web::get().to(get_available)))
        .route("/api/drag/start", web::post().to(drag_start))
        .service(web::resource("/api/drag/accepts/{target}").route(web::get().to(drag_accepts)))
        .route("/api/drag/end", web::post().to(drag_end))
        .route("/api/drag/cancel", web::post().to(drag_cancel))
        .route("/api/courses", web::post().to(create_course));
}

pub async fn start_server(config: Config) -> crate::error::Result<()> {
    let planner = Arc::new(config.build_planner()?);
    let app_state = web::Data::new(AppState::new(Arc::clone(&planner)));
    let collector = app_state.spawn_event_collector();
    let static_dir = config.static_dir.clone();

    tracing::info!(port = config.port, "starting web server");
    let result = HttpServer::new(move || {
        let app = App::new()
            .app_data(app_state.clone())
            .wrap(middleware::Logger::default())
            .configure(api_routes);
        match &static_dir {
            Some(dir) => app.service(Files::new("/", dir).index_file("index.html")),
            None => app,
        }
    })
    .bind(("0.0.0.0", config.port))?
    .run()
    .await;

    // Server stopped; write whatever is still pending.
    if let Err(err) = planner.flush().await {
        tracing::error!(%err, "failed to save pending plan on shutdown");
    }
    collector.abort();
    Ok(result?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::CandidatePool;
    use crate::sync::{MemoryStore, RetryPolicy, DEFAULT_QUIET_WINDOW};
    use actix_web::http::StatusCode;

    fn state() -> AppState {
        let store: Arc<dyn PlanStore> = Arc::new(MemoryStore::new());
        AppState::new(Arc::new(Planner::new(
            CandidatePool::with_defaults(),
            store,
            EventBus::default(),
            DEFAULT_QUIET_WINDOW,
            RetryPolicy::none(),
        )))
    }

    #[test]
    fn errors_map_to_status_codes() {
        let cases = [
            (PlannerError::Validation("bad".into()), StatusCode::BAD_REQUEST),
            (PlannerError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (
                StoreError::Permission("rls".into()).into(),
                StatusCode::FORBIDDEN,
            ),
            (
                StoreError::Connectivity("down".into()).into(),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                StoreError::Backend("boom".into()).into(),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(error_response(&err).status(), status, "{err}");
        }
    }

    #[actix_web::test]
    async fn collector_keeps_notices_and_connection_status() {
        let state = state();
        let collector = state.spawn_event_collector();
        let events = state.planner.events().clone();

        events.notice(crate::sync::NoticeLevel::Warning, "offline");
        events.connection(ConnectionStatus::Lost);
        for _ in 0..20 {
            tokio::task::yield_now().await;
            if *state.connection.lock() == ConnectionStatus::Lost {
                break;
            }
        }

        assert_eq!(state.notices.lock().len(), 1);
        assert_eq!(*state.connection.lock(), ConnectionStatus::Lost);
        collector.abort();
    }
}
