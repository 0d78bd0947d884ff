//! HTTP client for the remote control plane API
//!
//! Covers the slice of the API the execution pipeline needs: worker queue
//! lifecycle, queue worker listing, agent/team execution submission, and
//! the execution output stream.

pub mod client;
pub mod entities;
pub mod error;
pub mod stream;

pub use client::Client;
pub use error::{ControlPlaneError, ControlPlaneResult};
pub use stream::{StreamEvent, StreamEventType};
