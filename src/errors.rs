use std::path::PathBuf;
use thiserror::Error;

/// The central error type for the homepage runtime.
///
/// Lower layers fail with their own enums; this wrapper is what the CLI
/// and the composition root propagate.
#[derive(Error, Debug)]
pub enum HomepageError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Visitor counter error: {0}")]
    Counter(#[from] CounterError),

    #[error("Initialization error: {0}")]
    Init(#[from] InitError),

    #[error("Data manager error: {0}")]
    Data(#[from] DataError),

    #[error("Document error: {0}")]
    Document(#[from] DocumentError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DocumentError {
    #[error("Batch entry {entry} names entry {index} as parent, which is not an earlier entry")]
    UnknownBatchParent { entry: usize, index: usize },
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage I/O failed at {path}: {message}")]
    Io { path: PathBuf, message: String },

    #[error("Stored value for '{key}' is not valid: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to serialize storage: {0}")]
    Serialize(String),
}

/// Failures of the single outbound visitor-counter call.
///
/// Every variant is handled the same way by the stats manager: the
/// visitor count is unavailable for this page load.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CounterError {
    #[error("Invalid counter endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Counter request timed out")]
    Timeout,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Counter returned status {status}")]
    HttpStatus { status: u16 },

    #[error("Failed to parse counter response: {0}")]
    Parse(String),
}

/// Top-level bring-up failures. Only these put the page in the failed state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InitError {
    #[error("Document never became interactive")]
    DomUnavailable,

    #[error("Page interaction setup failed: {0}")]
    Interactions(String),
}

/// A single tracked module failing. Recorded in the status table, never fatal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModuleError {
    #[error("Module '{name}' not ready after {attempts} attempts")]
    NotReady { name: String, attempts: u32 },

    #[error("Module '{name}' failed: {message}")]
    Failed { name: String, message: String },
}

#[derive(Error, Debug)]
pub enum DataError {
    #[error("Invalid statistics document: {0}")]
    InvalidDocument(String),

    #[error("Data file I/O failed at {path}: {message}")]
    Io { path: PathBuf, message: String },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type Result<T> = std::result::Result<T, HomepageError>;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_ERROR: u8 = 1;
pub const EXIT_CONFIG_ERROR: u8 = 2;
pub const EXIT_STORAGE_ERROR: u8 = 3;
pub const EXIT_COUNTER_ERROR: u8 = 4;
pub const EXIT_INIT_ERROR: u8 = 5;

/// Determine the appropriate process exit code for an error.
pub fn get_exit_code(e: &anyhow::Error) -> u8 {
    if let Some(err) = e.downcast_ref::<HomepageError>() {
        return match err {
            HomepageError::Config(_) => EXIT_CONFIG_ERROR,
            HomepageError::Storage(_) => EXIT_STORAGE_ERROR,
            HomepageError::Counter(_) => EXIT_COUNTER_ERROR,
            HomepageError::Init(_) => EXIT_INIT_ERROR,
            HomepageError::Data(DataError::Storage(_)) => EXIT_STORAGE_ERROR,
            _ => EXIT_ERROR,
        };
    }

    // Direct enum fallbacks for errors that were never wrapped
    if e.downcast_ref::<StorageError>().is_some() {
        return EXIT_STORAGE_ERROR;
    }
    if e.downcast_ref::<CounterError>().is_some() {
        return EXIT_COUNTER_ERROR;
    }
    if e.downcast_ref::<InitError>().is_some() {
        return EXIT_INIT_ERROR;
    }

    let msg = e.to_string().to_lowercase();
    if msg.contains("config") {
        return EXIT_CONFIG_ERROR;
    }

    EXIT_ERROR
}
