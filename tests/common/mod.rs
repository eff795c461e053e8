// Hand-written surfaces, detector and camera for driving EmotionDetector in tests
#![allow(dead_code)]

use async_trait::async_trait;
use mood_overlay::camera::{CameraConstraints, CameraSource, MediaStream};
use mood_overlay::models::{Detection, Dimensions, ExpressionScores, FaceBox, Frame};
use mood_overlay::surface::{DrawListHost, OverlayHost, SurfaceRegistry, VideoSurface};
use mood_overlay::vision::{FaceDetector, ModelKind};
use mood_overlay::{EmotionDetector, OverlayConfig, OverlayError, Result};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, watch};

pub struct FakeVideo {
    frame: Mutex<Option<Frame>>,
    dims: Mutex<Dimensions>,
    attached: Mutex<Option<MediaStream>>,
    on_attach: Mutex<Option<Box<dyn FnOnce() + Send>>>,
    play: broadcast::Sender<()>,
}

impl FakeVideo {
    pub fn new(dims: Dimensions) -> Self {
        let (play, _) = broadcast::channel(8);
        Self {
            frame: Mutex::new(Some(Frame::new(vec![0; 12], 2, 2))),
            dims: Mutex::new(dims),
            attached: Mutex::new(None),
            on_attach: Mutex::new(None),
            play,
        }
    }

    pub fn play(&self) {
        let _ = self.play.send(());
    }

    pub fn set_dims(&self, dims: Dimensions) {
        *self.dims.lock().unwrap() = dims;
    }

    pub fn set_frame(&self, frame: Option<Frame>) {
        *self.frame.lock().unwrap() = frame;
    }

    /// Runs `hook` once, right after the next stream is attached
    pub fn on_attach(&self, hook: impl FnOnce() + Send + 'static) {
        *self.on_attach.lock().unwrap() = Some(Box::new(hook));
    }

    pub fn attached_label(&self) -> Option<String> {
        self.attached
            .lock()
            .unwrap()
            .as_ref()
            .map(|stream| stream.label().to_string())
    }
}

impl VideoSurface for FakeVideo {
    fn attach_stream(&self, stream: MediaStream) {
        *self.attached.lock().unwrap() = Some(stream);
        let hook = self.on_attach.lock().unwrap().take();
        if let Some(hook) = hook {
            hook();
        }
    }

    fn current_frame(&self) -> Option<Frame> {
        self.frame.lock().unwrap().clone()
    }

    fn displayed_dimensions(&self) -> Dimensions {
        *self.dims.lock().unwrap()
    }

    fn play_events(&self) -> broadcast::Receiver<()> {
        self.play.subscribe()
    }
}

pub struct FakeDetector {
    result: Mutex<Option<Detection>>,
    delay: Duration,
    fail_load: Option<ModelKind>,
    loaded: Mutex<Vec<(ModelKind, PathBuf)>>,
    calls: AtomicUsize,
    running: AtomicUsize,
    peak: AtomicUsize,
}

impl FakeDetector {
    pub fn new(result: Option<Detection>) -> Self {
        Self {
            result: Mutex::new(result),
            delay: Duration::ZERO,
            fail_load: None,
            loaded: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            running: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing_load(mut self, kind: ModelKind) -> Self {
        self.fail_load = Some(kind);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Most detections ever running at the same time
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn loaded(&self) -> Vec<(ModelKind, PathBuf)> {
        self.loaded.lock().unwrap().clone()
    }
}

#[async_trait]
impl FaceDetector for FakeDetector {
    async fn load_model(&self, kind: ModelKind, model_dir: &Path) -> Result<()> {
        if self.fail_load == Some(kind) {
            return Err(OverlayError::ModelLoad(format!(
                "{} missing from {}",
                kind.name(),
                model_dir.display()
            )));
        }
        self.loaded
            .lock()
            .unwrap()
            .push((kind, model_dir.to_path_buf()));
        Ok(())
    }

    async fn detect_single_face(&self, _frame: &Frame) -> Result<Option<Detection>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(running, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.running.fetch_sub(1, Ordering::SeqCst);
        Ok(self.result.lock().unwrap().clone())
    }
}

pub struct FakeCamera {
    fail: bool,
    delay: Duration,
    opened: AtomicUsize,
    sender: watch::Sender<Option<Frame>>,
}

impl FakeCamera {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(None);
        Self {
            fail: false,
            delay: Duration::ZERO,
            opened: AtomicUsize::new(0),
            sender,
        }
    }

    pub fn denied() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CameraSource for FakeCamera {
    async fn open(&self, constraints: &CameraConstraints) -> Result<MediaStream> {
        assert!(!constraints.audio);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.opened.fetch_add(1, Ordering::SeqCst);

        if self.fail {
            return Err(OverlayError::CameraAccessDenied);
        }
        Ok(MediaStream::new("fake front camera", self.sender.subscribe()))
    }
}

#[derive(Default)]
pub struct FakeRegistry {
    pub video: Option<Arc<FakeVideo>>,
    pub container: Option<Arc<DrawListHost>>,
}

impl SurfaceRegistry for FakeRegistry {
    fn video(&self, id: &str) -> Option<Arc<dyn VideoSurface>> {
        match (id, &self.video) {
            ("video", Some(video)) => Some(video.clone() as Arc<dyn VideoSurface>),
            _ => None,
        }
    }

    fn container(&self, id: &str) -> Option<Arc<dyn OverlayHost>> {
        match (id, &self.container) {
            ("app-container", Some(container)) => Some(container.clone() as Arc<dyn OverlayHost>),
            _ => None,
        }
    }
}

/// A face at (64, 48) sized 128x96 on a 640x480 frame
pub fn detection(pairs: &[(&str, f32)]) -> Detection {
    Detection {
        face: FaceBox::new(64.0, 48.0, 128.0, 96.0),
        score: 0.93,
        expressions: ExpressionScores::from_keyed(pairs.iter().copied()).unwrap(),
        image_dims: Dimensions::new(640.0, 480.0),
    }
}

pub struct Harness {
    pub video: Arc<FakeVideo>,
    pub host: Arc<DrawListHost>,
    pub detector: Arc<FakeDetector>,
    pub camera: Arc<FakeCamera>,
    pub notified: Arc<Mutex<Vec<(Detection, &'static str)>>>,
    pub overlay: EmotionDetector,
}

impl Harness {
    pub fn new(detector: FakeDetector, camera: FakeCamera) -> Self {
        Self::with_config(detector, camera, OverlayConfig::default())
    }

    pub fn with_config(detector: FakeDetector, camera: FakeCamera, config: OverlayConfig) -> Self {
        let video = Arc::new(FakeVideo::new(Dimensions::new(320.0, 240.0)));
        let host = Arc::new(DrawListHost::new());
        let detector = Arc::new(detector);
        let camera = Arc::new(camera);
        let notified = Arc::new(Mutex::new(Vec::new()));

        let sink = notified.clone();
        let overlay = EmotionDetector::builder(
            video.clone(),
            host.clone(),
            detector.clone(),
            camera.clone(),
        )
        .config(config)
        .callback(move |detection, emotion| {
            sink.lock().unwrap().push((detection.clone(), emotion.key));
        })
        .build();

        Self {
            video,
            host,
            detector,
            camera,
            notified,
            overlay,
        }
    }

    pub fn notifications(&self) -> usize {
        self.notified.lock().unwrap().len()
    }
}

/// Lets spawned tasks run; with paused time this also advances the clock
pub async fn settle(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}
