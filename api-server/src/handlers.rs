use actix_web::{
    http::StatusCode,
    web::{Data, Json, Path, Query},
    HttpResponse, Responder,
};
use harness_core::{SessionError, TargetWindow};
use uuid::Uuid;

use crate::{
    ActionResponse, AppState, ErrorResponse, HealthResponse, HistoryListResponse, HistoryQuery,
    StartTestRequest, StatusResponse,
};

fn error_response(
    status: StatusCode,
    error_code: &'static str,
    message: impl Into<String>,
) -> HttpResponse {
    HttpResponse::build(status).json(ErrorResponse::new(error_code, message))
}

fn session_error(err: SessionError) -> HttpResponse {
    let status = match err {
        SessionError::RuntimeUnavailable => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_REQUEST,
    };
    error_response(status, err.code(), err.to_string())
}

fn store_error() -> HttpResponse {
    error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal_error",
        "history store error",
    )
}

fn record_not_found(id: Uuid) -> HttpResponse {
    error_response(
        StatusCode::NOT_FOUND,
        "record_not_found",
        format!("test with id {id} not found"),
    )
}

pub(crate) async fn health(state: Data<AppState>) -> impl Responder {
    let stored_records = match state.history.count() {
        Ok(count) => count,
        Err(e) => {
            tracing::error!("health check failed: {e}");
            return error_response(
                StatusCode::SERVICE_UNAVAILABLE,
                "internal_error",
                "history store error",
            );
        }
    };

    HttpResponse::Ok().json(HealthResponse {
        status: "healthy",
        service: "game-testing-harness",
        desktop_support: cfg!(feature = "desktop"),
        current_status: state.controller.metrics().status,
        is_running: state.controller.is_running(),
        stored_records,
        history_max_records: state.history_max_records,
        total_steps_per_session: state.controller.settings().total_steps,
    })
}

pub(crate) async fn start_test(
    state: Data<AppState>,
    body: Json<StartTestRequest>,
) -> impl Responder {
    let request = body.into_inner();
    tracing::info!(genre = %request.genre, window_hwnd = ?request.window_hwnd, "start-test requested");

    match state
        .controller
        .start(&request.genre, request.window_hwnd.map(TargetWindow))
    {
        Ok(ack) => HttpResponse::Ok().json(ActionResponse::success(ack.message())),
        Err(err) => {
            tracing::warn!(error = %err, "start-test rejected");
            session_error(err)
        }
    }
}

pub(crate) async fn stop_test(state: Data<AppState>) -> impl Responder {
    match state.controller.stop().await {
        Ok(ack) => HttpResponse::Ok().json(ActionResponse::success(ack.message())),
        Err(err) => {
            tracing::warn!(error = %err, "stop-test rejected");
            session_error(err)
        }
    }
}

pub(crate) async fn reset_status(state: Data<AppState>) -> impl Responder {
    match state.controller.reset_status() {
        Ok(status) => {
            HttpResponse::Ok().json(ActionResponse::success(format!("status reset to {status}")))
        }
        Err(err) => session_error(err),
    }
}

pub(crate) async fn status(state: Data<AppState>) -> impl Responder {
    let metrics = state.controller.metrics();
    HttpResponse::Ok().json(StatusResponse {
        status: metrics.status,
        is_running: state.controller.is_running(),
        current_genre: state.controller.current_genre(),
        error: metrics.error,
    })
}

pub(crate) async fn metrics(state: Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(state.controller.metrics())
}

pub(crate) async fn list_history(
    state: Data<AppState>,
    query: Query<HistoryQuery>,
) -> impl Responder {
    if let Err((msg, code)) = query.validate() {
        return error_response(StatusCode::BAD_REQUEST, code, msg);
    }

    let listed = state
        .history
        .list(&query)
        .and_then(|tests| Ok((tests, state.history.count_matching(&query)?)));
    match listed {
        Ok((tests, total)) => HttpResponse::Ok().json(HistoryListResponse { tests, total }),
        Err(e) => {
            tracing::error!("list_history failed: {e}");
            store_error()
        }
    }
}

pub(crate) async fn history_statistics(state: Data<AppState>) -> impl Responder {
    match state.history.statistics() {
        Ok(stats) => HttpResponse::Ok().json(stats),
        Err(e) => {
            tracing::error!("history_statistics failed: {e}");
            store_error()
        }
    }
}

pub(crate) async fn get_history(state: Data<AppState>, path: Path<Uuid>) -> impl Responder {
    let id = path.into_inner();
    match state.history.get(id) {
        Ok(Some(record)) => HttpResponse::Ok().json(record),
        Ok(None) => record_not_found(id),
        Err(e) => {
            tracing::error!(record_id = %id, "get_history failed: {e}");
            store_error()
        }
    }
}

pub(crate) async fn delete_history(state: Data<AppState>, path: Path<Uuid>) -> impl Responder {
    let id = path.into_inner();
    match state.history.delete(id) {
        Ok(true) => HttpResponse::Ok().json(ActionResponse::success(format!(
            "test {id} deleted"
        ))),
        Ok(false) => record_not_found(id),
        Err(e) => {
            tracing::error!(record_id = %id, "delete_history failed: {e}");
            store_error()
        }
    }
}

pub(crate) async fn clear_history(state: Data<AppState>) -> impl Responder {
    match state.history.clear() {
        Ok(deleted) => {
            tracing::info!(deleted, "history cleared");
            HttpResponse::Ok().json(serde_json::json!({
                "status": "success",
                "message": format!("deleted {deleted} test records"),
                "deleted": deleted,
            }))
        }
        Err(e) => {
            tracing::error!("clear_history failed: {e}");
            store_error()
        }
    }
}
