//! Data-source controller: connects routes to the data-source facade

use axum::extract::{Query, State};
use axum::Json;
use validator::Validate;

use crate::api::dto::datasource_dto::{FilterSearchRequest, ProviderSearchQuery};
use crate::api::dto::ApiResponse;
use crate::api::util::json::to_json;
use crate::app_state::AppState;
use crate::domain::datasource::service::data_source::ConnectionStatus;
use crate::domain::query::dto::panel_query::QueryRequest;
use crate::domain::query::dto::provider_dto::{
    DpFilterResponse, MetricFindValue, TextValuePair, VariableQuery,
};
use crate::domain::query::dto::result_frame::QueryResult;
use crate::errors::AppError;

pub struct DataSourceController;

impl DataSourceController {
    pub async fn query(
        State(state): State<AppState>,
        Json(payload): Json<QueryRequest>,
    ) -> Result<Json<ApiResponse<Vec<QueryResult>>>, AppError> {
        payload.validate()?;
        let results = state.data_source.query_all(&payload).await;
        Ok(Json(ApiResponse::ok(results)))
    }

    pub async fn test(
        State(state): State<AppState>,
    ) -> Result<Json<ApiResponse<ConnectionStatus>>, AppError> {
        to_json(state.data_source.test_datasource().await)
    }

    pub async fn search_providers(
        State(state): State<AppState>,
        Query(query): Query<ProviderSearchQuery>,
    ) -> Result<Json<ApiResponse<Vec<TextValuePair>>>, AppError> {
        to_json(
            state
                .data_source
                .search_data_providers(query.query.as_deref(), &query.query_id)
                .await,
        )
    }

    pub async fn search_filters(
        State(state): State<AppState>,
        Json(payload): Json<FilterSearchRequest>,
    ) -> Result<Json<ApiResponse<Option<Vec<DpFilterResponse>>>>, AppError> {
        payload.validate()?;
        let source = &state.data_source;

        if payload.related {
            let Some(filter) = payload.filter.as_ref() else {
                return Err(AppError::BodyParsingError(
                    "related refresh requires a filter".into(),
                ));
            };
            let query = payload.query.unwrap_or_default();
            return to_json(
                source
                    .related_filter_options(&payload.provider, &payload.query_id, filter, &query)
                    .await,
            );
        }

        to_json(
            source
                .search_data_provider_filters(
                    &payload.provider,
                    &payload.query_id,
                    payload.filter.as_ref(),
                    payload.query.as_ref(),
                )
                .await
                .map(Some),
        )
    }

    pub async fn find_variable_values(
        State(state): State<AppState>,
        Json(payload): Json<VariableQuery>,
    ) -> Result<Json<ApiResponse<Vec<MetricFindValue>>>, AppError> {
        to_json(state.data_source.metric_find_query(&payload).await)
    }
}
