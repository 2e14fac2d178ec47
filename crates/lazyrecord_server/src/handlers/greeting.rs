use super::run_blocking;
use crate::app_state::AppState;
use crate::errors::ServerError;
use axum::extract::{Query, State};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct GreetingQuery {
    name: Option<String>,
}

/// Plain-text greeting for `?name=`, created on first request.
pub async fn get_greeting(
    State(state): State<AppState>,
    Query(query): Query<GreetingQuery>,
) -> Result<String, ServerError> {
    let name = match query.name {
        Some(name) if !name.is_empty() => name,
        _ => return Err(ServerError::bad_request("missing 'name' parameter")),
    };

    run_blocking("/api/user", "failed to fetch greeting", move || {
        state.greetings.greet(&name)
    })
    .await
}
