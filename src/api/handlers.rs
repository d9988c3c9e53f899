//! HTTP handlers.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use tracing::debug;

use super::types::{ErrorResponse, HistoryQuery, ShellQuery, StatusQuery};
use crate::error::{ExecutionError, ShellRelayError};
use crate::relay::{CommandOutput, ShellRelay};
use crate::security::HashAuth;
use crate::ticket::TicketRecord;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<ShellRelay>,
    pub auth: Arc<HashAuth>,
}

impl AppState {
    pub fn new(relay: ShellRelay, auth: HashAuth) -> Self {
        Self {
            relay: Arc::new(relay),
            auth: Arc::new(auth),
        }
    }
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn bad_request(message: &str) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse::bad_request(message)),
    )
}

/// Map a relay error to its HTTP form.
pub fn error_response(err: ShellRelayError) -> ApiError {
    let message = err.to_string();
    match err {
        ShellRelayError::InvalidSessionId(_) => bad_request(&message),
        ShellRelayError::SessionUnknown(id) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::session_not_found(&id)),
        ),
        ShellRelayError::TicketNotFound { .. } => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::ticket_not_found(message)),
        ),
        ShellRelayError::Execution(ExecutionError::Timeout(_)) => (
            StatusCode::GATEWAY_TIMEOUT,
            Json(ErrorResponse::timeout(message)),
        ),
        ShellRelayError::Execution(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::execution_failed(message)),
        ),
        _ => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::internal_error(message)),
        ),
    }
}

fn required<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str, ApiError> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| bad_request(&format!("Invalid or missing '{}' parameter", name)))
}

/// Health check endpoint.
pub async fn health() -> &'static str {
    "OK"
}

/// Run a command in a session.
pub async fn shell(
    State(state): State<AppState>,
    Query(query): Query<ShellQuery>,
) -> Result<Json<CommandOutput>, ApiError> {
    let session = required(&query.session, "session")?;
    let cmd = required(&query.cmd, "cmd")?;
    debug!(session, "shell request");

    state
        .relay
        .execute(session, cmd)
        .await
        .map(Json)
        .map_err(error_response)
}

/// Fetch one stored ticket.
pub async fn status(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<TicketRecord>, ApiError> {
    let session = required(&query.session, "session")?;
    let ticket = query
        .ticket_number()
        .ok_or_else(|| bad_request("Invalid or missing 'ticket' parameter"))?;

    state
        .relay
        .ticket(session, ticket)
        .await
        .map(Json)
        .map_err(error_response)
}

/// List all stored tickets of a session.
pub async fn history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<TicketRecord>>, ApiError> {
    let session = required(&query.session, "session")?;

    state
        .relay
        .history(session)
        .await
        .map(Json)
        .map_err(error_response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (
                ShellRelayError::InvalidSessionId("a/b".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                ShellRelayError::SessionUnknown("x".into()),
                StatusCode::NOT_FOUND,
            ),
            (
                ShellRelayError::TicketNotFound {
                    session: "x".into(),
                    ticket: 4,
                },
                StatusCode::NOT_FOUND,
            ),
            (
                ExecutionError::Timeout(Duration::from_secs(1)).into(),
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (
                ExecutionError::ReadFailed("eof".into()).into(),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (ShellRelayError::LockPoisoned, StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, expected) in cases {
            let (status, _) = error_response(err);
            assert_eq!(status, expected);
        }
    }

    #[test]
    fn test_required() {
        assert_eq!(required(&Some("a".into()), "session").unwrap(), "a");
        assert!(required(&Some(String::new()), "session").is_err());
        let (status, body) = required(&None, "cmd").unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.message.contains("'cmd'"));
    }

    #[tokio::test]
    async fn test_health() {
        assert_eq!(health().await, "OK");
    }
}
