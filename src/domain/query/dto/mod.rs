pub mod panel_query;
pub mod provider_dto;
pub mod result_frame;
pub mod wire_request;
pub mod wire_response;
