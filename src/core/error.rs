use rusqlite;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum QcError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Invalid item status: {0}")]
    InvalidStatus(String),
    #[error("Mandatory items still pending: {}", .0.join(", "))]
    MissingMandatoryItems(Vec<String>),
    #[error("Signature image is empty")]
    EmptySignature,
    #[error("Invalid transition: {op} is not allowed from {from}")]
    InvalidTransition { from: String, op: String },
    #[error("Instance {0} is terminal and can no longer be modified")]
    InstanceTerminal(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("External service error: {0}")]
    ExternalService(String),
    #[error("Concurrency conflict: {0}")]
    ConcurrencyConflict(String),
    #[error("SQLite error: {0}")]
    RusqliteError(#[from] rusqlite::Error),
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}
