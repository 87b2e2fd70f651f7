//! Error types for tcpspeech.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TcpSpeechError {
    // Input errors
    #[error("Malformed document {path}: {message}")]
    MalformedDocument { path: String, message: String },

    #[error("Malformed record on line {line}: {message}")]
    MalformedRecord { line: usize, message: String },

    #[error("Failed to load dictionary {path}: {message}")]
    DictionaryLoad { path: String, message: String },

    #[error("Filename {filename} does not match the naming convention: {message}")]
    NamingConvention { filename: String, message: String },

    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Failed to parse configuration: {message}")]
    ConfigParse { message: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Stage errors
    #[error("Stage {station} failed: {message}")]
    StageFailed { station: String, message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, TcpSpeechError>;
