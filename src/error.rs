use std::path::PathBuf;

use thiserror::Error;

use crate::overlay::OverlayId;

#[derive(Debug, Error)]
pub enum CompositeError {
    #[error("invalid geometry: {reason}")]
    InvalidGeometry { reason: String },

    #[error("invalid overlay {id}: {reason}")]
    InvalidOverlay { id: OverlayId, reason: String },

    #[error("overlay {id} resource unavailable: {reason}")]
    OverlayResourceUnavailable { id: OverlayId, reason: String },

    #[error("export to {} failed: {reason}", .target.display())]
    ExportFailure { target: PathBuf, reason: String },
}

impl CompositeError {
    pub(crate) fn geometry(reason: impl Into<String>) -> Self {
        Self::InvalidGeometry {
            reason: reason.into(),
        }
    }

    pub(crate) fn export(target: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::ExportFailure {
            target: target.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether retrying the same call with corrected inputs can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::InvalidGeometry { .. } | Self::ExportFailure { .. }
        )
    }
}
