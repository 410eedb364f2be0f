//! Application layer errors

use std::path::PathBuf;
use thiserror::Error;

/// General bot errors
#[derive(Error, Debug)]
pub enum BotError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Platform error: {0}")]
    Platform(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Command error: {0}")]
    Command(#[from] CommandError),

    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BotError {
    pub fn validation(msg: impl Into<String>) -> Self {
        BotError::Validation(msg.into())
    }

    pub fn platform(msg: impl Into<String>) -> Self {
        BotError::Platform(msg.into())
    }

    pub(crate) fn poisoned() -> Self {
        BotError::Internal("Lock poisoned".to_string())
    }
}

/// Command execution errors
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Command not found: {0}")]
    NotFound(String),

    #[error("Invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("This command can only be used in a server")]
    GuildOnly,

    #[error("Slow down, try again in {0}s")]
    Cooldown(u64),

    #[error("Permission denied")]
    PermissionDenied,
}

/// Plugin file load errors, always scoped to a single file
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid manifest {path}: {message}")]
    Manifest { path: PathBuf, message: String },

    #[error("No {kind} factory named '{key}'")]
    UnknownFactory { kind: &'static str, key: String },

    #[error("Factory '{key}' produced a {found} handler where a {expected} handler is required")]
    KindMismatch {
        key: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Plugin {path} is disabled")]
    Disabled { path: PathBuf },

    #[error("Failed to construct '{key}': {source}")]
    Construct {
        key: String,
        #[source]
        source: Box<BotError>,
    },
}

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Errors that abort startup, each mapped to a process exit code
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("No bot token configured (set BOT_TOKEN or bot.token)")]
    MissingCredential,

    #[error("Plugin loading failed: {0}")]
    Load(#[source] BotError),

    #[error("Login failed: {0}")]
    Login(#[source] BotError),

    #[error("Core already started")]
    AlreadyStarted,
}

/// Process exit codes. Supervisors rely on these values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitStatus {
    Success = 0,
    MissingCredential = 2,
    LoadFailure = 3,
    LoginFailure = 4,
    UnhandledPanic = 5,
}

impl ExitStatus {
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl StartupError {
    pub fn exit_status(&self) -> ExitStatus {
        match self {
            StartupError::MissingCredential => ExitStatus::MissingCredential,
            StartupError::Load(_) | StartupError::AlreadyStarted => ExitStatus::LoadFailure,
            StartupError::Login(_) => ExitStatus::LoginFailure,
        }
    }
}
