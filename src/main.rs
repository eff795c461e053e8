use mood_overlay::camera::NokhwaCamera;
use mood_overlay::error::{OverlayError, Result};
use mood_overlay::surface::DrawListHost;
use mood_overlay::ui::{EguiVideo, OverlayApp, Status};
use mood_overlay::vision::HaarOnnxDetector;
use mood_overlay::{EmotionDetector, ModelStatus, OverlayConfig};
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initializes the logging system (file only, no console output)
fn init_logging() -> Result<()> {
    let log_file = std::fs::File::create("mood_overlay.log").map_err(OverlayError::Io)?;

    let file_layer = fmt::layer()
        .with_writer(Arc::new(log_file))
        .with_ansi(false);

    tracing_subscriber::registry().with(file_layer).init();

    Ok(())
}

fn main() -> Result<()> {
    init_logging()?;

    let runtime = tokio::runtime::Runtime::new()?;

    match NokhwaCamera::list_devices() {
        Ok(devices) => info!("Cameras: {:?}", devices),
        Err(e) => warn!("Could not list cameras: {}", e),
    }

    let video = Arc::new(EguiVideo::new());
    let overlay = Arc::new(DrawListHost::new());
    let status = Arc::new(Mutex::new(Status::default()));
    let camera = Arc::new(NokhwaCamera::new());
    let detector = Arc::new(HaarOnnxDetector::new(
        "haarcascade_frontalface_default.xml",
        "emotion.onnx",
    ));

    let callback_status = status.clone();
    let emotion_detector = Arc::new(
        EmotionDetector::builder(video.clone(), overlay.clone(), detector, camera.clone())
            .config(OverlayConfig::default().with_model_dir("assets/models"))
            .callback(move |_detection, emotion| {
                if let Ok(mut status) = callback_status.try_lock() {
                    status.emotion = Some(emotion);
                }
            })
            .build(),
    );

    let starter = emotion_detector.clone();
    let start_status = status.clone();
    runtime.spawn(async move {
        let message = match starter.start().await {
            Ok(report) => {
                info!("Started: {:?}", report);
                match report.models {
                    ModelStatus::Loaded => None,
                    ModelStatus::Degraded(e) => Some(format!("Error loading models: {e}")),
                }
            }
            Err(e) => {
                error!("Startup failed: {}", e);
                Some(e.to_string())
            }
        };
        if let Ok(mut status) = start_status.lock() {
            status.message = message;
        }
    });

    let result = eframe::run_native(
        "Mood Overlay",
        eframe::NativeOptions {
            viewport: egui::ViewportBuilder::default()
                .with_inner_size([1280.0, 960.0])
                .with_title("Mood Overlay"),
            ..Default::default()
        },
        Box::new(move |_cc| Ok(Box::new(OverlayApp::new(video, overlay, status)))),
    );

    if let Err(e) = result {
        error!("Application error: {}", e);
    }

    emotion_detector.stop();
    camera.stop_capture();
    runtime.shutdown_background();

    Ok(())
}
