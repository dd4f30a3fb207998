//! Data-source instance settings

pub mod datasource_settings_entity;
pub mod env_loader;
