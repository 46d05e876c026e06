//! Error taxonomy for the content model and its lifecycle verbs.

use thiserror::Error;

use crate::models::NodeId;

/// Errors raised by content graph mutation, traversal and lifecycle operations.
///
/// Every variant is reported synchronously at the point of violation; nothing
/// is retried and nothing is rolled back by this layer.
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unknown node: {0}")]
    UnknownNode(NodeId),

    #[error("Index {index} out of range for length {len}")]
    OutOfRange { index: usize, len: usize },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Backing store failure: {0}")]
    Store(#[from] anyhow::Error),
}

impl ContentError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn not_supported(msg: impl Into<String>) -> Self {
        Self::NotSupported(msg.into())
    }

    /// Null/wrong-kind parameters, unknown ids and out-of-range indices.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument(_) | Self::UnknownNode(_) | Self::OutOfRange { .. }
        )
    }

    pub fn is_invalid_state(&self) -> bool {
        matches!(self, Self::InvalidState(_))
    }

    pub fn is_not_supported(&self) -> bool {
        matches!(self, Self::NotSupported(_))
    }
}

pub type Result<T, E = ContentError> = std::result::Result<T, E>;
