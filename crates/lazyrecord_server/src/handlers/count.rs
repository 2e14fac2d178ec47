use super::run_blocking;
use crate::app_state::AppState;
use crate::errors::ServerError;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use log::info;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct CountInput {
    count: i64,
}

#[derive(Debug, Serialize)]
pub struct CountResponse {
    count: i64,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    message: String,
}

pub async fn get_count(State(state): State<AppState>) -> Result<Json<CountResponse>, ServerError> {
    let count = run_blocking("/count/get", "failed to read counter", move || {
        state.counter.current()
    })
    .await?;
    Ok(Json(CountResponse { count }))
}

pub async fn post_count(
    State(state): State<AppState>,
    payload: Result<Json<CountInput>, JsonRejection>,
) -> Result<Json<MessageResponse>, ServerError> {
    let Json(input) =
        payload.map_err(|rejection| ServerError::invalid_json("/count/post", rejection))?;
    let amount = input.count;

    run_blocking("/count/post", "failed to update counter", move || {
        state.counter.increment(amount)
    })
    .await?;

    info!("event=counter_increment module=http status=ok");
    Ok(Json(MessageResponse {
        message: format!("Counter increased by {amount}"),
    }))
}
