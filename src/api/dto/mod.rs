//! API DTOs shared by the controllers

use serde::Serialize;

pub mod datasource_dto;

/// Envelope of every successful API response.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}
