use anyhow::Result;
use axum::Json;

use crate::api::dto::ApiResponse;
use crate::domain::datasource::service::data_source::UpstreamError;
use crate::errors::{internal_error, AppError};

pub fn to_json<T: serde::Serialize>(
    result: Result<T>
) -> Result<Json<ApiResponse<T>>, AppError> {
    match result {
        Ok(value) => Ok(Json(ApiResponse::ok(value))),
        Err(err) => match err.downcast::<UpstreamError>() {
            Ok(upstream) => Err(AppError::UpstreamError(upstream.message)),
            Err(err) => Err(internal_error(err)), // keeps the error message
        },
    }
}
