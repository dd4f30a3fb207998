use std::sync::Arc;

use crate::core::client::reqwest_fetcher::ReqwestFetcher;
use crate::core::settings::datasource_settings_entity::DataSourceConfig;
use crate::core::util::template_util::ScopedVariableInterpolator;
use crate::domain::datasource::service::data_source::DataSource;

#[derive(Clone)]
pub struct AppState {
    pub data_source: Arc<DataSource>,
}

/// Must run inside the runtime so the CSRF refresh can be spawned.
pub fn build_app_state(config: DataSourceConfig) -> AppState {
    AppState {
        data_source: Arc::new(DataSource::new(
            config,
            Arc::new(ReqwestFetcher::default()),
            Arc::new(ScopedVariableInterpolator::default()),
        )),
    }
}
