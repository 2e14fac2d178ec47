mod count;
mod greeting;
mod hello;

use crate::app_state::AppState;
use crate::errors::ServerError;
use axum::routing::{get, post};
use axum::Router;
use lazyrecord_core::ServiceResult;
use log::error;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/count/get", get(count::get_count))
        .route("/count/post", post(count::post_count))
        .route("/get", get(hello::get_message))
        .route("/post", post(hello::post_message))
        .route("/api/user", get(greeting::get_greeting))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

/// Runs a blocking service call off the async workers and maps its failure
/// for `route`.
async fn run_blocking<T, F>(
    route: &'static str,
    failure_message: &'static str,
    job: F,
) -> Result<T, ServerError>
where
    T: Send + 'static,
    F: FnOnce() -> ServiceResult<T> + Send + 'static,
{
    match tokio::task::spawn_blocking(job).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(ServerError::from_service(route, failure_message, err)),
        Err(join_err) => {
            error!(
                "event=request_failed module=http route={} status=error error_code=worker_panicked cancelled={}",
                route,
                join_err.is_cancelled()
            );
            Err(ServerError::internal(failure_message))
        }
    }
}
