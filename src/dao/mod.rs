/// Document store abstraction and its backends.
pub mod document_store;
/// Mapping of the game state onto store documents.
pub mod game;
/// JSON merge patch helper.
pub mod merge;
/// Persisted document shapes.
pub mod models;
/// Storage error types shared by every backend.
pub mod storage;
