/// Database model definitions.
pub mod models;
/// Session persistence contract and its backends.
pub mod session_store;
/// Storage abstraction layer for database operations.
pub mod storage;
