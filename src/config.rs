// Runtime settings for the overlay loop

use crate::camera::CameraConstraints;
use std::path::PathBuf;
use std::time::Duration;

/// Directory model bundles are loaded from unless overridden
pub const DEFAULT_MODEL_DIR: &str = "/models";

/// What `start()` does when a model bundle fails to load
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ModelLoadPolicy {
    /// Return the load error and skip camera acquisition
    #[default]
    Abort,
    /// Log the error, report it in the start report and keep going.
    /// Detection ticks will fail until the models are available.
    Degraded,
}

/// Settings for one `EmotionDetector`
#[derive(Clone, Debug)]
pub struct OverlayConfig {
    pub model_dir: PathBuf,
    /// Period of the detection timer
    pub tick_interval: Duration,
    /// Box outline width in pixels
    pub line_width: f32,
    /// Padding around the label text in pixels
    pub label_padding: f32,
    pub camera: CameraConstraints,
    pub model_load_policy: ModelLoadPolicy,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from(DEFAULT_MODEL_DIR),
            tick_interval: Duration::from_millis(200),
            line_width: 5.0,
            label_padding: 10.0,
            camera: CameraConstraints::default(),
            model_load_policy: ModelLoadPolicy::Abort,
        }
    }
}

impl OverlayConfig {
    pub fn with_model_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.model_dir = dir.into();
        self
    }

    /// Sets the detection period. Zero is raised to one millisecond.
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval.max(Duration::from_millis(1));
        self
    }

    pub fn with_model_load_policy(mut self, policy: ModelLoadPolicy) -> Self {
        self.model_load_policy = policy;
        self
    }

    pub fn with_camera(mut self, camera: CameraConstraints) -> Self {
        self.camera = camera;
        self
    }
}
