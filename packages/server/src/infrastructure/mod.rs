//! Infrastructure layer: room runtime, repository implementations and DTOs.

pub mod dto;
pub mod repository;
pub mod room;
