//! Data-source routes (e.g., /api/v1/query, /api/v1/providers)

use axum::{routing::{get, post}, Router};
use crate::api::controller::datasource::DataSourceController;
use crate::app_state::AppState;

pub fn datasource_routes() -> Router<AppState> {
    Router::new()
        .route("/query", post(DataSourceController::query))
        .route("/test", get(DataSourceController::test))

        .route("/providers", get(DataSourceController::search_providers))
        .route("/providers/filters", post(DataSourceController::search_filters))
        .route("/variables", post(DataSourceController::find_variable_values))
}
