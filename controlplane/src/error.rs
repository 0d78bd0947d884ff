//! Control plane client error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ControlPlaneError {
    #[error("invalid control plane base URL: {url}")]
    InvalidBaseUrl { url: String },

    #[error("control plane returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("failed to decode response: {message}")]
    Decode { message: String },

    #[error("execution stream error: {message}")]
    Stream { message: String },
}

pub type ControlPlaneResult<T> = Result<T, ControlPlaneError>;
