// SPDX-License-Identifier: MPL-2.0

//! Error types for the viewfinder
//!
//! Every failure in the frame pipeline is tick-local: it is logged, reported
//! through the controller's tick output, and the next tick starts clean.

use std::fmt;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for per-frame pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Main application error type
#[derive(Debug, Clone)]
pub enum AppError {
    /// Frame pipeline errors
    Pipeline(PipelineError),
    /// Recording-related errors
    Recording(RecordingError),
    /// Photo capture errors
    Photo(PhotoError),
    /// Configuration errors
    Config(String),
    /// Storage/filesystem errors
    Storage(String),
}

/// Per-tick pipeline failures
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// Device read failed; the tick is skipped without transform or write
    CaptureUnavailable(String),
    /// Zero or inconsistent frame dimensions
    InvalidFrame(String),
    /// A video or still-image writer could not be opened
    EncoderInitFailure(String),
    /// Wide-angle valid-pixel region collapsed to nothing
    DegenerateRoi,
}

/// Recording-specific errors
#[derive(Debug, Clone, PartialEq)]
pub enum RecordingError {
    /// Failed to open the output stream
    StartFailed(String),
    /// Failed to flush and close the output stream
    StopFailed(String),
    /// No usable encoder installed
    EncoderNotAvailable(String),
    /// Appending a frame to the open stream failed
    WriteFailed(String),
}

/// Photo capture errors
#[derive(Debug, Clone, PartialEq)]
pub enum PhotoError {
    /// No frame available for capture
    NoFrameAvailable,
    /// Encoding failed
    EncodingFailed(String),
    /// Save failed
    SaveFailed(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Pipeline(e) => write!(f, "Pipeline error: {}", e),
            AppError::Recording(e) => write!(f, "Recording error: {}", e),
            AppError::Photo(e) => write!(f, "Photo error: {}", e),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Storage(msg) => write!(f, "Storage error: {}", msg),
        }
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::CaptureUnavailable(msg) => write!(f, "Capture unavailable: {}", msg),
            PipelineError::InvalidFrame(msg) => write!(f, "Invalid frame: {}", msg),
            PipelineError::EncoderInitFailure(msg) => {
                write!(f, "Encoder initialization failed: {}", msg)
            }
            PipelineError::DegenerateRoi => write!(f, "Valid pixel region is empty"),
        }
    }
}

impl fmt::Display for RecordingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordingError::StartFailed(msg) => write!(f, "Failed to start recording: {}", msg),
            RecordingError::StopFailed(msg) => write!(f, "Failed to stop recording: {}", msg),
            RecordingError::EncoderNotAvailable(msg) => write!(f, "Encoder not available: {}", msg),
            RecordingError::WriteFailed(msg) => write!(f, "Failed to write frame: {}", msg),
        }
    }
}

impl fmt::Display for PhotoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhotoError::NoFrameAvailable => write!(f, "No frame available for capture"),
            PhotoError::EncodingFailed(msg) => write!(f, "Encoding failed: {}", msg),
            PhotoError::SaveFailed(msg) => write!(f, "Save failed: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}
impl std::error::Error for PipelineError {}
impl std::error::Error for RecordingError {}
impl std::error::Error for PhotoError {}

impl RecordingError {
    /// Whether this failure happened while opening the writer
    pub fn is_init_failure(&self) -> bool {
        matches!(
            self,
            RecordingError::StartFailed(_) | RecordingError::EncoderNotAvailable(_)
        )
    }

    /// Pipeline category of a writer open failure; `None` for other failures
    pub fn as_encoder_failure(&self) -> Option<PipelineError> {
        self.is_init_failure()
            .then(|| PipelineError::EncoderInitFailure(self.to_string()))
    }
}

// Conversions from sub-errors to AppError
impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        AppError::Pipeline(err)
    }
}

impl From<RecordingError> for AppError {
    fn from(err: RecordingError) -> Self {
        AppError::Recording(err)
    }
}

impl From<PhotoError> for AppError {
    fn from(err: PhotoError) -> Self {
        AppError::Photo(err)
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<std::io::Error> for PhotoError {
    fn from(err: std::io::Error) -> Self {
        PhotoError::SaveFailed(err.to_string())
    }
}

impl From<image::ImageError> for PhotoError {
    fn from(err: image::ImageError) -> Self {
        PhotoError::EncodingFailed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        assert_eq!(
            PipelineError::CaptureUnavailable("EOF".into()).to_string(),
            "Capture unavailable: EOF"
        );
        assert_eq!(
            AppError::from(PhotoError::NoFrameAvailable).to_string(),
            "Photo error: No frame available for capture"
        );
    }

    #[test]
    fn test_only_open_failures_map_to_encoder_failure() {
        let open = RecordingError::StartFailed("no mp4mux".into());
        assert!(matches!(
            open.as_encoder_failure(),
            Some(PipelineError::EncoderInitFailure(_))
        ));
        assert!(
            RecordingError::EncoderNotAvailable("x264enc".into())
                .as_encoder_failure()
                .is_some()
        );
        assert_eq!(RecordingError::StopFailed("timeout".into()).as_encoder_failure(), None);
        assert_eq!(RecordingError::WriteFailed("flushing".into()).as_encoder_failure(), None);
    }
}
