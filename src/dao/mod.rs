/// Record and notification definitions shared with the store.
pub mod models;
/// Storage error types.
pub mod storage;
/// Shared state store contract and its in-process implementation.
pub mod store;
