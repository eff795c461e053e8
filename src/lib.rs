// Library exports for the mood overlay

pub mod camera;
pub mod config;
pub mod detector;
pub mod emotion;
pub mod error;
pub mod models;
pub mod surface;
#[cfg(feature = "native")]
pub mod ui;
pub mod vision;

pub use config::{ModelLoadPolicy, OverlayConfig};
pub use detector::{EmotionDetector, EmotionDetectorBuilder, ModelStatus, StartReport};
pub use error::{OverlayError, Result};
pub use models::{Detection, Emotion, EmotionDefinition, ExpressionScores, EMOTIONS};
