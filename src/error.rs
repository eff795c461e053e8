// Error types for the mood overlay

use thiserror::Error;

/// Main error type for the mood overlay
#[derive(Debug, Error)]
pub enum OverlayError {
    #[error("Required surface not found: {0}")]
    MissingSurface(&'static str),

    #[error("Model loading failed: {0}")]
    ModelLoad(String),

    #[error("Camera initialization failed: {0}")]
    Camera(String),

    #[error("Camera access denied")]
    CameraAccessDenied,

    #[error("Face detection failed: {0}")]
    Detection(String),

    #[error("Unknown emotion key: {0}")]
    UnknownEmotion(String),

    #[error("Frame processing failed: {0}")]
    FrameProcessing(String),

    #[error("Stopped before startup completed")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for mood overlay operations
pub type Result<T> = std::result::Result<T, OverlayError>;

// Conversion from nokhwa errors
#[cfg(feature = "native")]
impl From<nokhwa::NokhwaError> for OverlayError {
    fn from(err: nokhwa::NokhwaError) -> Self {
        match err {
            nokhwa::NokhwaError::StructureError { structure, error } => {
                OverlayError::Camera(format!("{structure}: {error}"))
            }
            nokhwa::NokhwaError::OpenDeviceError(device, error) => {
                OverlayError::Camera(format!("Device {device}: {error}"))
            }
            nokhwa::NokhwaError::GetPropertyError { property, error } => {
                OverlayError::Camera(format!("Property {property}: {error}"))
            }
            _ => OverlayError::Camera(err.to_string()),
        }
    }
}

// Conversion from OpenCV errors
#[cfg(feature = "native")]
impl From<opencv::Error> for OverlayError {
    fn from(err: opencv::Error) -> Self {
        OverlayError::Detection(format!("OpenCV: {err}"))
    }
}

// Conversion from ONNX Runtime errors
#[cfg(feature = "native")]
impl From<ort::Error> for OverlayError {
    fn from(err: ort::Error) -> Self {
        OverlayError::Detection(format!("ONNX Runtime: {err}"))
    }
}
