// EmotionDetector: binds camera, face detector and overlay canvas into the detection loop

use crate::camera::CameraSource;
use crate::config::{ModelLoadPolicy, OverlayConfig};
use crate::emotion;
use crate::error::{OverlayError, Result};
use crate::models::{Detection, EmotionDefinition};
use crate::surface::{
    same_canvas, DrawBox, OverlayCanvas, OverlayHost, SurfaceRegistry, VideoSurface, CONTAINER_ID,
    VIDEO_ID,
};
use crate::vision::{FaceDetector, ModelKind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

const MIN_TICK_INTERVAL: Duration = Duration::from_millis(1);

/// Called once per detection cycle with the raw detection and the dominant emotion
pub type EmotionCallback = Arc<dyn Fn(&Detection, &'static EmotionDefinition) + Send + Sync>;

/// Outcome of loading the model bundles
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModelStatus {
    Loaded,
    /// Loading failed and startup continued anyway
    Degraded(String),
}

/// What `start()` brought up
#[derive(Clone, Debug)]
pub struct StartReport {
    pub models: ModelStatus,
    /// Label of the camera stream attached to the video
    pub stream_label: String,
}

/// Builds an `EmotionDetector`
pub struct EmotionDetectorBuilder {
    video: Arc<dyn VideoSurface>,
    container: Arc<dyn OverlayHost>,
    detector: Arc<dyn FaceDetector>,
    camera: Arc<dyn CameraSource>,
    config: OverlayConfig,
    callback: Option<EmotionCallback>,
}

impl EmotionDetectorBuilder {
    pub fn config(mut self, config: OverlayConfig) -> Self {
        self.config = config;
        self
    }

    pub fn callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Detection, &'static EmotionDefinition) + Send + Sync + 'static,
    {
        self.callback = Some(Arc::new(callback));
        self
    }

    pub fn build(self) -> EmotionDetector {
        EmotionDetector {
            shared: Arc::new(Shared {
                video: self.video,
                container: self.container,
                detector: self.detector,
                camera: self.camera,
                callback: self.callback,
                config: self.config,
                state: Mutex::new(LoopState::default()),
                in_flight: AtomicBool::new(false),
            }),
        }
    }
}

/// Webcam facial-expression overlay.
///
/// `start()` loads the models, opens the camera and waits for playback. Once
/// the video plays, a timer runs a detection every `tick_interval` and draws
/// a box labeled with the dominant emotion over the face. `stop()` tears the
/// listener, timer and canvas down again.
pub struct EmotionDetector {
    shared: Arc<Shared>,
}

struct Shared {
    video: Arc<dyn VideoSurface>,
    container: Arc<dyn OverlayHost>,
    detector: Arc<dyn FaceDetector>,
    camera: Arc<dyn CameraSource>,
    callback: Option<EmotionCallback>,
    config: OverlayConfig,
    state: Mutex<LoopState>,
    /// Set while a detection tick is running
    in_flight: AtomicBool,
}

#[derive(Default)]
struct LoopState {
    canvas: Option<Arc<dyn OverlayCanvas>>,
    ticker: Option<JoinHandle<()>>,
    listener: Option<JoinHandle<()>>,
    /// Bumped by `stop()`; work started under an older value must not touch the display
    generation: u64,
}

/// Clears the in-flight flag when the tick ends, however it ends
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl EmotionDetector {
    /// Starts building a detector bound to the given surfaces
    pub fn builder(
        video: Arc<dyn VideoSurface>,
        container: Arc<dyn OverlayHost>,
        detector: Arc<dyn FaceDetector>,
        camera: Arc<dyn CameraSource>,
    ) -> EmotionDetectorBuilder {
        EmotionDetectorBuilder {
            video,
            container,
            detector,
            camera,
            config: OverlayConfig::default(),
            callback: None,
        }
    }

    /// Starts building a detector from surfaces looked up by their fixed identifiers
    pub fn from_registry(
        registry: &dyn SurfaceRegistry,
        detector: Arc<dyn FaceDetector>,
        camera: Arc<dyn CameraSource>,
    ) -> Result<EmotionDetectorBuilder> {
        let video = registry
            .video(VIDEO_ID)
            .ok_or(OverlayError::MissingSurface(VIDEO_ID))?;
        let container = registry
            .container(CONTAINER_ID)
            .ok_or(OverlayError::MissingSurface(CONTAINER_ID))?;

        Ok(Self::builder(video, container, detector, camera))
    }

    pub fn config(&self) -> &OverlayConfig {
        &self.shared.config
    }

    /// Loads the models, opens the camera and starts listening for playback.
    ///
    /// Returns `OverlayError::Cancelled` if `stop()` ran while this was suspended.
    pub async fn start(&self) -> Result<StartReport> {
        let shared = &self.shared;
        let generation = shared.state().generation;
        info!("Starting emotion detector");

        let models = shared.load_models().await?;
        shared.ensure_current(generation)?;

        let stream = shared
            .camera
            .open(&shared.config.camera)
            .await
            .map_err(|e| {
                error!("Camera acquisition failed: {}", e);
                e
            })?;
        shared.ensure_current(generation)?;

        let stream_label = stream.label().to_string();
        // Subscribe before attaching so the first play cannot be missed
        let events = shared.video.play_events();
        shared.video.attach_stream(stream);
        Shared::listen_for_play(shared, events, generation)?;

        info!("Emotion detector started with camera {}", stream_label);
        Ok(StartReport {
            models,
            stream_label,
        })
    }

    /// Handles playback start: sets up the overlay canvas and the detection timer.
    /// Must be called from within a tokio runtime.
    pub fn on_video_play(&self) {
        let generation = self.shared.state().generation;
        self.shared.on_video_play(generation);
    }

    /// Stops future detection ticks and removes the overlay. Safe to call repeatedly.
    pub fn stop(&self) {
        self.shared.stop();
    }

    pub fn has_overlay(&self) -> bool {
        self.shared.state().canvas.is_some()
    }

    /// True while the detection timer is scheduled
    pub fn is_ticking(&self) -> bool {
        self.shared
            .state()
            .ticker
            .as_ref()
            .is_some_and(|ticker| !ticker.is_finished())
    }

    pub fn is_listening(&self) -> bool {
        self.shared
            .state()
            .listener
            .as_ref()
            .is_some_and(|listener| !listener.is_finished())
    }
}

impl Drop for EmotionDetector {
    fn drop(&mut self) {
        self.shared.stop();
    }
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, LoopState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_current(&self, generation: u64) -> Result<()> {
        if self.state().generation == generation {
            Ok(())
        } else {
            info!("Startup interrupted by stop");
            Err(OverlayError::Cancelled)
        }
    }

    /// Loads both model bundles concurrently and applies the load policy
    async fn load_models(&self) -> Result<ModelStatus> {
        let dir = self.config.model_dir.as_path();
        let (faces, expressions) = tokio::join!(
            self.detector.load_model(ModelKind::FaceDetector, dir),
            self.detector.load_model(ModelKind::ExpressionNet, dir),
        );

        match faces.and(expressions) {
            Ok(()) => {
                info!("Models loaded from {:?}", dir);
                Ok(ModelStatus::Loaded)
            }
            Err(e) => match self.config.model_load_policy {
                ModelLoadPolicy::Abort => {
                    error!("Error loading models: {}", e);
                    Err(e)
                }
                ModelLoadPolicy::Degraded => {
                    warn!("Error loading models, continuing without them: {}", e);
                    Ok(ModelStatus::Degraded(e.to_string()))
                }
            },
        }
    }

    /// Registers the play listener unless `stop()` ran since `generation` was taken
    fn listen_for_play(
        self: &Arc<Self>,
        mut events: broadcast::Receiver<()>,
        generation: u64,
    ) -> Result<()> {
        let mut state = self.state();
        if state.generation != generation {
            info!("Startup interrupted by stop");
            return Err(OverlayError::Cancelled);
        }
        if state
            .listener
            .as_ref()
            .is_some_and(|listener| !listener.is_finished())
        {
            debug!("Play listener already registered");
            return Ok(());
        }

        let shared = Arc::clone(self);
        state.listener = Some(tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(()) | Err(RecvError::Lagged(_)) => shared.on_video_play(generation),
                    Err(RecvError::Closed) => break,
                }
            }
            debug!("Video surface closed its play events");
        }));
        Ok(())
    }

    fn on_video_play(self: &Arc<Self>, generation: u64) {
        let dims = self.video.displayed_dimensions();
        let mut state = self.state();
        if state.generation != generation {
            debug!("Play event from before stop, ignoring");
            return;
        }

        let canvas = match &state.canvas {
            Some(canvas) => Arc::clone(canvas),
            None => {
                let canvas = self.container.create_canvas(dims);
                info!("Created overlay canvas {}x{}", dims.width, dims.height);
                state.canvas = Some(Arc::clone(&canvas));
                canvas
            }
        };
        self.container.append(&canvas);
        canvas.resize(dims);

        // At most one timer per detector
        if let Some(ticker) = state.ticker.take() {
            ticker.abort();
        }

        // A zero period would panic inside the ticker task
        let period = self.config.tick_interval.max(MIN_TICK_INTERVAL);
        let shared = Arc::clone(self);
        state.ticker = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                // The first tick completes immediately
                interval.tick().await;
                let tick = Arc::clone(&shared);
                let canvas = Arc::clone(&canvas);
                tokio::spawn(async move { tick.detect_once(canvas, generation).await });
            }
        }));
    }

    async fn detect_once(&self, canvas: Arc<dyn OverlayCanvas>, generation: u64) {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Previous detection still running, skipping tick");
            return;
        }
        let _in_flight = InFlight(&self.in_flight);

        let Some(frame) = self.video.current_frame() else {
            debug!("No video frame yet");
            return;
        };

        let detection = match self.detector.detect_single_face(&frame).await {
            Ok(Some(detection)) => detection,
            Ok(None) => return,
            Err(e) => {
                warn!("Detection failed: {}", e);
                return;
            }
        };

        let resized = detection.resized(self.video.displayed_dimensions());

        let definition = {
            let state = self.state();
            let current = state
                .canvas
                .as_ref()
                .is_some_and(|active| same_canvas(active, &canvas));
            if state.generation != generation || !current {
                debug!("Overlay removed while detecting, dropping result");
                return;
            }

            let dims = canvas.dimensions();
            canvas.clear();

            let Some(definition) = emotion::resolve(&resized.expressions) else {
                debug!("No dominant emotion in this frame");
                return;
            };
            debug!(
                "Detected {} at ({:.0}, {:.0}) on {}x{} overlay",
                definition.key, resized.face.x, resized.face.y, dims.width, dims.height
            );
            canvas.draw_box(&DrawBox::for_emotion(resized.face, definition, &self.config));
            definition
        };

        if let Some(callback) = &self.callback {
            callback(&detection, definition);
        }
    }

    fn stop(&self) {
        let mut state = self.state();
        state.generation += 1;

        if let Some(listener) = state.listener.take() {
            listener.abort();
        }
        if let Some(ticker) = state.ticker.take() {
            ticker.abort();
        }
        if let Some(canvas) = state.canvas.take() {
            self.container.remove(&canvas);
            info!("Emotion detector stopped, overlay removed");
        }
    }
}
