// Camera module: stream constraints, stream handle and the webcam backend

use crate::error::Result;
use crate::models::Frame;
use async_trait::async_trait;
use tokio::sync::watch;

/// Which camera to prefer on devices with several
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FacingMode {
    /// Front camera, facing the user
    #[default]
    User,
    Environment,
}

/// What to request from the camera
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CameraConstraints {
    pub audio: bool,
    pub facing: FacingMode,
}

impl Default for CameraConstraints {
    fn default() -> Self {
        Self {
            audio: false,
            facing: FacingMode::User,
        }
    }
}

/// A live camera stream: the latest captured frame, updated in place
#[derive(Clone, Debug)]
pub struct MediaStream {
    label: String,
    frames: watch::Receiver<Option<Frame>>,
}

impl MediaStream {
    pub fn new(label: impl Into<String>, frames: watch::Receiver<Option<Frame>>) -> Self {
        Self {
            label: label.into(),
            frames,
        }
    }

    /// Human readable name of the capturing device
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Most recent frame, `None` until the device delivers one
    pub fn latest_frame(&self) -> Option<Frame> {
        self.frames.borrow().clone()
    }
}

/// Platform camera access
#[async_trait]
pub trait CameraSource: Send + Sync {
    /// Requests a stream matching `constraints`.
    /// Fails when no camera is available or access is denied.
    async fn open(&self, constraints: &CameraConstraints) -> Result<MediaStream>;
}

#[cfg(feature = "native")]
pub use native::NokhwaCamera;

#[cfg(feature = "native")]
mod native {
    use super::{CameraConstraints, CameraSource, FacingMode, MediaStream};
    use crate::error::{OverlayError, Result};
    use crate::models::Frame;
    use async_trait::async_trait;
    use nokhwa::pixel_format::RgbFormat;
    use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType};
    use nokhwa::Camera;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::{Duration, Instant};
    use tokio::sync::{oneshot, watch};
    use tracing::{debug, error, info, warn};

    /// Target 30 FPS
    const FRAME_DURATION: Duration = Duration::from_millis(33);

    /// Webcam capture on a dedicated thread
    pub struct NokhwaCamera {
        running: Arc<AtomicBool>,
    }

    impl NokhwaCamera {
        pub fn new() -> Self {
            Self {
                running: Arc::new(AtomicBool::new(false)),
            }
        }

        /// Lists available camera devices
        pub fn list_devices() -> Result<Vec<String>> {
            let devices = nokhwa::query(nokhwa::utils::ApiBackend::Auto)
                .map_err(|e| OverlayError::Camera(format!("Failed to query cameras: {e}")))?;

            Ok(devices
                .iter()
                .map(|info| info.human_name().to_string())
                .collect())
        }

        /// Stops the capture thread after its current frame
        pub fn stop_capture(&self) {
            self.running.store(false, Ordering::Release);
        }

        fn requested_format() -> RequestedFormat<'static> {
            // Request 640x480 at 30 FPS for better performance
            RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(
                nokhwa::utils::CameraFormat::new(
                    nokhwa::utils::Resolution::new(640, 480),
                    nokhwa::utils::FrameFormat::YUYV,
                    30,
                ),
            ))
        }

        /// Opens the first camera that works (some systems start at 0, others at 1)
        fn open_camera() -> Result<Camera> {
            let format = Self::requested_format();
            let mut camera = Camera::new(CameraIndex::Index(0), format)
                .or_else(|_| Camera::new(CameraIndex::Index(1), format))
                .map_err(|e| {
                    error!("Failed to initialize camera after trying multiple indices: {}", e);
                    OverlayError::Camera(format!(
                        "Could not open camera. Make sure:\n\
                        1. A camera is connected\n\
                        2. No other app is using it\n\
                        3. Camera permissions are granted\n\
                        Error: {e}"
                    ))
                })?;

            camera.open_stream()?;
            Ok(camera)
        }
    }

    impl Default for NokhwaCamera {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Drop for NokhwaCamera {
        fn drop(&mut self) {
            self.stop_capture();
        }
    }

    #[async_trait]
    impl CameraSource for NokhwaCamera {
        async fn open(&self, constraints: &CameraConstraints) -> Result<MediaStream> {
            if constraints.audio {
                warn!("Audio capture is not supported, opening video only");
            }
            if constraints.facing == FacingMode::Environment {
                debug!("Facing mode is ignored for desktop cameras");
            }

            let (frame_tx, frame_rx) = watch::channel(None);
            let (ready_tx, ready_rx) = oneshot::channel();
            self.running.store(true, Ordering::Release);
            let running = Arc::clone(&self.running);

            // nokhwa cameras are not Send, so the camera lives on its own thread
            std::thread::Builder::new()
                .name("camera-capture".to_string())
                .spawn(move || capture_loop(running, frame_tx, ready_tx))?;

            let label = ready_rx.await.map_err(|_| {
                OverlayError::Camera("Capture thread exited before opening".to_string())
            })??;

            info!("Camera stream opened: {}", label);
            Ok(MediaStream::new(label, frame_rx))
        }
    }

    fn capture_loop(
        running: Arc<AtomicBool>,
        frame_tx: watch::Sender<Option<Frame>>,
        ready_tx: oneshot::Sender<Result<String>>,
    ) {
        let mut camera = match NokhwaCamera::open_camera() {
            Ok(camera) => camera,
            Err(e) => {
                running.store(false, Ordering::Release);
                let _ = ready_tx.send(Err(e));
                return;
            }
        };

        let label = camera.info().human_name().to_string();
        if ready_tx.send(Ok(label)).is_err() {
            running.store(false, Ordering::Release);
            return;
        }

        let mut last_frame_time = Instant::now();
        // Stops when asked to or when every stream handle is gone
        while running.load(Ordering::Acquire) && !frame_tx.is_closed() {
            let elapsed = last_frame_time.elapsed();
            if elapsed < FRAME_DURATION {
                std::thread::sleep(FRAME_DURATION - elapsed);
            }
            last_frame_time = Instant::now();

            let buffer = match camera.frame() {
                Ok(raw) => match raw.decode_image::<RgbFormat>() {
                    Ok(buffer) => buffer,
                    Err(e) => {
                        warn!("Failed to decode frame: {}", e);
                        continue;
                    }
                },
                Err(e) => {
                    // Continue to next frame instead of crashing
                    error!("Failed to capture frame: {}", e);
                    continue;
                }
            };

            let (width, height) = (buffer.width(), buffer.height());
            frame_tx.send_replace(Some(Frame::new(buffer.into_raw(), width, height)));
        }

        if let Err(e) = camera.stop_stream() {
            error!("Error stopping camera stream: {}", e);
        }
        running.store(false, Ordering::Release);
        info!("Camera capture stopped");
    }
}
