/// OpenAPI documentation generation.
pub mod documentation;
/// Session lifecycle, turn handling and ballots.
pub mod game_service;
/// Health check service.
pub mod health_service;
/// Session store connection supervision.
pub mod storage_supervisor;
