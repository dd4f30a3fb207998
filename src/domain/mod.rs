pub mod common;
pub mod datasource;
pub mod query;
