use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use std::sync::Arc;
use wiki_types::page::{
    CreatePageRequest, CreatePageResponse, PageListResponse, PageResponse, StatusResponse,
    UpdatePageRequest,
};
use wiki_types::PageId;

use crate::services::{PageService, ServiceError};

#[derive(Clone)]
pub struct ApiState {
    pub service: Arc<PageService>,
}

impl ServiceError {
    /// Convert a ServiceError to an HTTP StatusCode.
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ServiceError::Conflict(_) => StatusCode::CONFLICT,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        (
            self.status_code(),
            Json(StatusResponse::error(self.to_string())),
        )
            .into_response()
    }
}

/// Malformed or incomplete JSON bodies are answered with a 400 envelope.
fn bad_payload(rejection: JsonRejection) -> Response {
    tracing::error!("Bad page JSON payload: {}", rejection.body_text());
    (
        StatusCode::BAD_REQUEST,
        Json(StatusResponse::error("Bad request payload")),
    )
        .into_response()
}

pub fn router(service: Arc<PageService>) -> Router {
    let state = ApiState { service };

    Router::new()
        .route("/api/pages", get(list_pages).post(create_page))
        .route(
            "/api/pages/:id",
            get(get_page).put(update_page).delete(delete_page),
        )
        .with_state(state)
}

async fn list_pages(State(state): State<ApiState>) -> Json<PageListResponse> {
    Json(PageListResponse {
        success: true,
        pages: state.service.list_pages().await,
    })
}

async fn get_page(
    State(state): State<ApiState>,
    Path(id): Path<PageId>,
) -> Result<Json<PageResponse>, ServiceError> {
    let page = state.service.get_page(id).await?;
    Ok(Json(PageResponse {
        success: true,
        page,
    }))
}

async fn create_page(
    State(state): State<ApiState>,
    body: Result<Json<CreatePageRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match body {
        Ok(body) => body,
        Err(rejection) => return bad_payload(rejection),
    };

    match state.service.create_page(&req.title, &req.markdown).await {
        Ok(id) => (
            StatusCode::CREATED,
            Json(CreatePageResponse { success: true, id }),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

async fn update_page(
    State(state): State<ApiState>,
    Path(id): Path<PageId>,
    body: Result<Json<UpdatePageRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match body {
        Ok(body) => body,
        Err(rejection) => return bad_payload(rejection),
    };

    match state.service.save_page(id, &req.markdown, req.client).await {
        Ok(()) => Json(StatusResponse::ok()).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn delete_page(
    State(state): State<ApiState>,
    Path(id): Path<PageId>,
) -> Result<Json<StatusResponse>, ServiceError> {
    state.service.delete_page(id).await?;
    Ok(Json(StatusResponse::ok()))
}
