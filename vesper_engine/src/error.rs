//! Error types for the Vesper engine
//!
//! This module defines the error types used throughout the engine,
//! covering rendering, initialization and resource management.

use std::fmt;

/// Result type for Vesper engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Vesper engine errors
#[derive(Debug, Clone)]
pub enum Error {
    /// Backend-specific error (Vulkan, DirectX, etc.)
    BackendError(String),

    /// Out of GPU memory
    OutOfMemory,

    /// Invalid resource (texture, buffer, shader, etc.)
    InvalidResource(String),

    /// Invalid parameter passed into an RHI call (null-like handles, bad dimensions)
    InvalidParameter(String),

    /// Initialization failed (engine, renderer, subsystems)
    InitializationFailed(String),

    /// Shader compilation failed
    ShaderCompilation(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InvalidParameter(msg) => write!(f, "Invalid parameter: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::ShaderCompilation(msg) => write!(f, "Shader compilation failed: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
