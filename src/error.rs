//! Error types for the database notifier
//!
//! This module defines all error types used throughout the crate. Driver
//! failures are reported by drivers as [`DriverError`] and mapped by the
//! notifier into [`NotifierError::ConnectionError`] or
//! [`NotifierError::PersistenceError`] depending on the lifecycle phase.

use crate::driver::DriverError;
use crate::message::MessageType;
use crate::notifier::NotifierState;
use thiserror::Error;

/// Main error type for notifier operations
#[derive(Error, Debug)]
pub enum NotifierError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Configuration file not found
    #[error("Configuration file not found: {0}")]
    ConfigFileMissing(String),

    /// Invalid log level
    #[error("Invalid log level: {0}")]
    InvalidLogLevel(String),

    /// 表名或列名不是合法的 SQL 标识符
    #[error("Invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    /// Statement could not be built from the given input
    #[error("Invalid statement: {0}")]
    InvalidStatement(String),

    /// The initial connect failed (bad driver, unreachable server, auth failure)
    #[error("Connection error: {source}")]
    ConnectionError {
        #[source]
        source: DriverError,
    },

    /// A statement, commit or close failed on an open session
    #[error("Persistence error: {source}")]
    PersistenceError {
        #[source]
        source: DriverError,
    },

    /// 重复调用 initialize
    #[error("Notifier already initialized")]
    AlreadyInitialized,

    /// Lifecycle method called in the wrong state
    #[error("Cannot {operation} while notifier is {state}")]
    InvalidState {
        operation: &'static str,
        state: NotifierState,
    },

    /// Message kind outside the subscription set
    #[error("Message type {0} is not subscribed")]
    UnsubscribedMessage(MessageType),

    /// No notifier registered under this type name
    #[error("Unknown notifier type: {0}")]
    UnknownNotifier(String),

    /// A notifier with this type name is already registered
    #[error("Notifier type already registered: {0}")]
    DuplicateNotifier(String),

    /// I/O errors
    #[error("I/O error: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },

    /// Serialization/deserialization errors
    #[error("Serialization error: {source}")]
    SerializationError {
        #[from]
        source: serde_json::Error,
    },

    /// TOML parsing errors
    #[error("TOML parsing error: {source}")]
    TomlError {
        #[from]
        source: toml::de::Error,
    },

    /// Layered (file + environment) configuration errors
    #[error("Layered configuration error: {source}")]
    LayeredConfigError {
        #[from]
        source: ::config::ConfigError,
    },

    /// Background task errors
    #[error("Task error: {0}")]
    TaskError(String),
}

/// Result type alias for notifier operations
pub type Result<T> = std::result::Result<T, NotifierError>;

impl NotifierError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Create a new connection error
    pub fn connection(source: DriverError) -> Self {
        Self::ConnectionError { source }
    }

    /// Create a new persistence error
    pub fn persistence(source: DriverError) -> Self {
        Self::PersistenceError { source }
    }

    /// Create a new state violation error
    pub fn invalid_state(operation: &'static str, state: NotifierState) -> Self {
        Self::InvalidState { operation, state }
    }

    /// Create a new task error
    pub fn task<S: Into<String>>(msg: S) -> Self {
        Self::TaskError(msg.into())
    }

    /// 生命周期调用顺序错误，属于编程错误
    pub fn is_state_violation(&self) -> bool {
        matches!(self, Self::AlreadyInitialized | Self::InvalidState { .. })
    }

    /// Get the error category for logging purposes
    pub fn category(&self) -> &'static str {
        match self {
            Self::ConfigError(_)
            | Self::ConfigFileMissing(_)
            | Self::InvalidLogLevel(_)
            | Self::TomlError { .. }
            | Self::LayeredConfigError { .. } => "config",
            Self::InvalidIdentifier(_) | Self::InvalidStatement(_) => "statement",
            Self::ConnectionError { .. } => "connection",
            Self::PersistenceError { .. } => "persistence",
            Self::AlreadyInitialized | Self::InvalidState { .. } => "state",
            Self::UnsubscribedMessage(_) => "routing",
            Self::UnknownNotifier(_) | Self::DuplicateNotifier(_) => "registry",
            Self::IoError { .. } => "io",
            Self::SerializationError { .. } => "serialization",
            Self::TaskError(_) => "task",
        }
    }
}
