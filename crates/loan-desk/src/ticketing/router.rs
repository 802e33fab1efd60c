use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use super::service::{TicketingError, TicketingService};
use super::store::RecordBackend;

/// Router builder exposing the submit, fetch and approve endpoints.
pub fn ticketing_router<B>(service: Arc<TicketingService<B>>) -> Router
where
    B: RecordBackend + 'static,
{
    Router::new()
        .route("/api/v1/loans", post(submit_handler::<B>))
        .route("/api/v1/loans/:ticket_id", get(fetch_handler::<B>))
        .route(
            "/api/v1/loans/:ticket_id/approve",
            post(approve_handler::<B>),
        )
        .route(
            "/loan",
            get(action_handler::<B>).post(action_handler::<B>),
        )
        .with_state(service)
}

/// JSON body of a submission. `amount` may arrive as a number or a string.
#[derive(Debug, Default, Deserialize)]
pub struct SubmitRequest {
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(default)]
    pub amount: Option<AmountInput>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AmountInput {
    Number(f64),
    Text(String),
}

impl AmountInput {
    fn into_text(self) -> String {
        match self {
            AmountInput::Number(value) => value.to_string(),
            AmountInput::Text(raw) => raw,
        }
    }
}

/// Query-parameter form: `/loan?action=application&contact=..&amount=..`,
/// `/loan?action=fetch&ticketId=..`, `/loan?action=approve&ticketId=..`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionQuery {
    pub action: Option<String>,
    pub contact: Option<String>,
    pub amount: Option<String>,
    pub ticket_id: Option<String>,
}

pub(crate) async fn submit_handler<B>(
    State(service): State<Arc<TicketingService<B>>>,
    payload: Result<Json<SubmitRequest>, JsonRejection>,
) -> Response
where
    B: RecordBackend + 'static,
{
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            return error_response(TicketingError::InvalidRequest(rejection.body_text()));
        }
    };

    let amount = request.amount.map(AmountInput::into_text);
    match service.submit(request.contact.as_deref(), amount.as_deref()) {
        Ok(ticket) => (StatusCode::CREATED, Json(ticket)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn fetch_handler<B>(
    State(service): State<Arc<TicketingService<B>>>,
    Path(ticket_id): Path<String>,
) -> Response
where
    B: RecordBackend + 'static,
{
    match service.fetch(&ticket_id) {
        Ok(application) => (StatusCode::OK, Json(application)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn approve_handler<B>(
    State(service): State<Arc<TicketingService<B>>>,
    Path(ticket_id): Path<String>,
) -> Response
where
    B: RecordBackend + 'static,
{
    match service.approve(&ticket_id) {
        Ok(ticket) => (StatusCode::OK, Json(ticket)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn action_handler<B>(
    State(service): State<Arc<TicketingService<B>>>,
    Query(query): Query<ActionQuery>,
) -> Response
where
    B: RecordBackend + 'static,
{
    let action = query
        .action
        .as_deref()
        .map(|action| action.trim().to_ascii_lowercase());

    let result = match action.as_deref() {
        Some("application") => service
            .submit(query.contact.as_deref(), query.amount.as_deref())
            .map(|ticket| Json(ticket).into_response()),
        Some("fetch") => with_ticket(&query, |ticket_id| {
            service
                .fetch(ticket_id)
                .map(|application| Json(application).into_response())
        }),
        Some("approve") => with_ticket(&query, |ticket_id| {
            service
                .approve(ticket_id)
                .map(|ticket| Json(ticket).into_response())
        }),
        _ => Err(TicketingError::incorrect_parameters()),
    };

    result.unwrap_or_else(error_response)
}

fn with_ticket<F>(query: &ActionQuery, run: F) -> Result<Response, TicketingError>
where
    F: FnOnce(&str) -> Result<Response, TicketingError>,
{
    match query.ticket_id.as_deref() {
        Some(ticket_id) => run(ticket_id),
        None => Err(TicketingError::incorrect_parameters()),
    }
}

pub(crate) fn error_response(err: TicketingError) -> Response {
    let status = match &err {
        TicketingError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        TicketingError::NotFound(_) => StatusCode::NOT_FOUND,
        TicketingError::Storage(source) => {
            error!(error = %source, "loan store operation failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    let payload = json!({ "error": err.to_string() });
    (status, Json(payload)).into_response()
}
