pub mod diagnostics;
pub mod request_builder;
pub mod resolution_planner;
pub mod response_reconstructor;
pub mod semantic_period_service;
pub mod series_completion;
