// Error handling for the session controller and its engines

use std::fmt;

/// Session and engine error types
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Failed to construct an engine instance
    Initialization(String),

    /// A media source descriptor violates its invariants
    InvalidSource(String),

    /// The engine cannot play this kind of source
    UnsupportedSource(String),

    /// Network error (manifest or chunk fetch)
    Network(String),

    /// IO error
    Io(String),

    /// Decoding error
    Decoding(String),

    /// Output device error
    Device(String),

    /// Operation not valid in the current engine state
    InvalidState(String),

    /// JNI error (Android-specific)
    #[cfg(target_os = "android")]
    Jni(String),

    /// Generic error
    Other(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Initialization(msg) => write!(f, "Initialization error: {}", msg),
            Error::InvalidSource(msg) => write!(f, "Invalid media source: {}", msg),
            Error::UnsupportedSource(msg) => write!(f, "Unsupported media source: {}", msg),
            Error::Network(msg) => write!(f, "Network error: {}", msg),
            Error::Io(msg) => write!(f, "IO error: {}", msg),
            Error::Decoding(msg) => write!(f, "Decoding error: {}", msg),
            Error::Device(msg) => write!(f, "Device error: {}", msg),
            Error::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
            #[cfg(target_os = "android")]
            Error::Jni(msg) => write!(f, "JNI error: {}", msg),
            Error::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

/// Result type alias for session operations
pub type Result<T> = std::result::Result<T, Error>;

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

#[cfg(target_os = "android")]
impl From<jni::errors::Error> for Error {
    fn from(err: jni::errors::Error) -> Self {
        Error::Jni(err.to_string())
    }
}
