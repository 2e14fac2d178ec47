use super::run_blocking;
use crate::app_state::AppState;
use crate::errors::ServerError;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct MessageInput {
    msg: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    message: String,
}

/// Returns one stored message at random. An empty pool is a server error.
pub async fn get_message(State(state): State<AppState>) -> Result<Json<MessageResponse>, ServerError> {
    let message = run_blocking("/get", "failed to fetch message", move || {
        state.messages.random()
    })
    .await?;
    Ok(Json(MessageResponse { message }))
}

pub async fn post_message(
    State(state): State<AppState>,
    payload: Result<Json<MessageInput>, JsonRejection>,
) -> Result<(StatusCode, Json<MessageResponse>), ServerError> {
    let Json(input) = payload.map_err(|rejection| ServerError::invalid_json("/post", rejection))?;
    let message = input.msg;

    let stored = message.clone();
    run_blocking("/post", "failed to add message", move || {
        state.messages.post(&stored)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(MessageResponse { message })))
}
