//! Query translation and result reconstruction

pub mod dto;
pub mod service;
