//! Graphics error types.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur in the frame synchronization system.
///
/// Only [`Timeout`](Self::Timeout), [`SurfaceOutdated`](Self::SurfaceOutdated) and
/// [`SurfaceLost`](Self::SurfaceLost) are recoverable. Every other variant returned
/// while a frame is in progress means queued GPU work can no longer be trusted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphicsError {
    /// Failed to initialize the graphics system.
    #[error("initialization failed: {0}")]
    InitializationFailed(String),
    /// Failed to create a resource.
    #[error("resource creation failed: {0}")]
    ResourceCreationFailed(String),
    /// A requested feature is not supported.
    #[error("feature not supported: {0}")]
    FeatureNotSupported(String),
    /// Out of GPU memory.
    #[error("out of GPU memory")]
    OutOfMemory,
    /// The GPU device was lost.
    #[error("GPU device lost")]
    DeviceLost,
    /// An invalid parameter was provided.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
    /// A bounded wait (fence or image acquisition) elapsed.
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    /// The surface is outdated and needs to be reconfigured.
    #[error("surface outdated, needs reconfiguration")]
    SurfaceOutdated,
    /// The surface was lost and needs to be recreated.
    #[error("surface lost, needs recreation")]
    SurfaceLost,
}

impl GraphicsError {
    /// Returns true if the caller can rebuild surface-dependent resources and retry.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::SurfaceOutdated | Self::SurfaceLost
        )
    }
}
