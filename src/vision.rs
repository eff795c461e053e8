// Face and expression detection seam, plus the OpenCV/ONNX backend

use crate::error::Result;
use crate::models::{Detection, Frame};
use async_trait::async_trait;
use std::path::Path;

/// The two model bundles needed before detection can run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ModelKind {
    /// Fast face bounding-box detector
    FaceDetector,
    /// Expression classifier run on the detected face
    ExpressionNet,
}

impl ModelKind {
    pub fn name(self) -> &'static str {
        match self {
            ModelKind::FaceDetector => "face detector",
            ModelKind::ExpressionNet => "expression classifier",
        }
    }
}

/// Detects a single face and classifies its expression.
///
/// Implementations own their model state; `load_model` is called once per
/// model kind before any detection, possibly concurrently for both kinds.
#[async_trait]
pub trait FaceDetector: Send + Sync {
    /// Loads one model bundle from `model_dir`
    async fn load_model(&self, kind: ModelKind, model_dir: &Path) -> Result<()>;

    /// Detects the most prominent face in `frame` with its expression scores.
    /// Returns `Ok(None)` when no face is visible.
    async fn detect_single_face(&self, frame: &Frame) -> Result<Option<Detection>>;
}

#[cfg(feature = "native")]
pub use native::HaarOnnxDetector;

#[cfg(feature = "native")]
mod native {
    use super::{FaceDetector, ModelKind};
    use crate::error::{OverlayError, Result};
    use crate::models::{Detection, Emotion, ExpressionScores, FaceBox, Frame};
    use async_trait::async_trait;
    use opencv::core::{Mat, Rect, Size, Vector};
    use opencv::imgproc;
    use opencv::objdetect::CascadeClassifier;
    use opencv::prelude::*;
    use ort::session::Session;
    use ort::value::Value;
    use std::path::Path;
    use std::sync::{Arc, Mutex};
    use tokio::task;
    use tracing::{debug, error, info};

    const INPUT_SIZE: usize = 260;

    /// HSEmotion output order:
    /// 0=Angry, 1=Disgust, 2=Fear, 3=Happy, 4=Sad, 5=Surprise, 6=Neutral, 7=Contempt
    const OUTPUT_EMOTIONS: [Emotion; 8] = [
        Emotion::Angry,
        Emotion::Disgusted,
        Emotion::Fearful,
        Emotion::Happy,
        Emotion::Sad,
        Emotion::Surprised,
        Emotion::Neutral,
        // Contempt folds into Disgusted
        Emotion::Disgusted,
    ];

    /// Face detector using an OpenCV Haar cascade and an ONNX expression model.
    ///
    /// Loading and inference run on tokio's blocking pool.
    pub struct HaarOnnxDetector {
        cascade_file: String,
        model_file: String,
        models: Arc<Models>,
    }

    #[derive(Default)]
    struct Models {
        cascade: Mutex<Option<CascadeClassifier>>,
        session: Mutex<Option<Session>>,
    }

    impl HaarOnnxDetector {
        /// Creates a detector that loads the given file names from the model directory
        pub fn new(cascade_file: impl Into<String>, model_file: impl Into<String>) -> Self {
            Self {
                cascade_file: cascade_file.into(),
                model_file: model_file.into(),
                models: Arc::new(Models::default()),
            }
        }
    }

    impl Models {
        fn load_cascade(&self, path: &Path) -> Result<()> {
            let path = path.to_string_lossy();
            let classifier = CascadeClassifier::new(&path).map_err(|e| {
                error!("Failed to load Haar Cascade: {}", e);
                OverlayError::ModelLoad(format!("Haar Cascade load failed: {e}"))
            })?;

            if classifier.empty()? {
                return Err(OverlayError::ModelLoad(
                    "Haar Cascade classifier is empty".to_string(),
                ));
            }

            *lock(&self.cascade)? = Some(classifier);
            Ok(())
        }

        fn load_session(&self, path: &Path) -> Result<()> {
            let session = Session::builder()
                .map_err(|e| {
                    OverlayError::ModelLoad(format!("Failed to create session builder: {e}"))
                })?
                .commit_from_file(path)
                .map_err(|e| {
                    error!("Failed to load ONNX model: {}", e);
                    OverlayError::ModelLoad(format!("ONNX model load failed: {e}"))
                })?;

            *lock(&self.session)? = Some(session);
            Ok(())
        }

        fn detect_blocking(&self, frame: &Frame) -> Result<Option<Detection>> {
            let mut cascade = lock(&self.cascade)?;
            let cascade = cascade
                .as_mut()
                .ok_or_else(|| OverlayError::Detection("face detector not loaded".to_string()))?;

            let gray = to_grayscale(frame)?;
            let Some(rect) = largest_face(cascade, &gray)? else {
                return Ok(None);
            };

            let face = preprocess_face(&gray, rect)?;

            let mut session = lock(&self.session)?;
            let session = session.as_mut().ok_or_else(|| {
                OverlayError::Detection("expression classifier not loaded".to_string())
            })?;
            let expressions = classify(session, face)?;

            Ok(Some(Detection {
                face: FaceBox::new(
                    rect.x as f32,
                    rect.y as f32,
                    rect.width as f32,
                    rect.height as f32,
                ),
                // Haar cascades do not report a per-face confidence
                score: 1.0,
                expressions,
                image_dims: frame.dimensions(),
            }))
        }
    }

    #[async_trait]
    impl FaceDetector for HaarOnnxDetector {
        async fn load_model(&self, kind: ModelKind, model_dir: &Path) -> Result<()> {
            let models = Arc::clone(&self.models);
            let path = match kind {
                ModelKind::FaceDetector => model_dir.join(&self.cascade_file),
                ModelKind::ExpressionNet => model_dir.join(&self.model_file),
            };

            task::spawn_blocking(move || match kind {
                ModelKind::FaceDetector => models.load_cascade(&path),
                ModelKind::ExpressionNet => models.load_session(&path),
            })
            .await
            .map_err(|e| OverlayError::ModelLoad(format!("{} loader failed: {e}", kind.name())))??;

            info!("Loaded {} from {:?}", kind.name(), model_dir);
            Ok(())
        }

        async fn detect_single_face(&self, frame: &Frame) -> Result<Option<Detection>> {
            let models = Arc::clone(&self.models);
            let frame = frame.clone();

            task::spawn_blocking(move || models.detect_blocking(&frame))
                .await
                .map_err(|e| OverlayError::Detection(format!("Detection task failed: {e}")))?
        }
    }

    fn lock<T>(mutex: &Mutex<T>) -> Result<std::sync::MutexGuard<'_, T>> {
        mutex
            .lock()
            .map_err(|_| OverlayError::Detection("model state poisoned".to_string()))
    }

    fn to_grayscale(frame: &Frame) -> Result<Mat> {
        let mat = Mat::from_slice(&frame.data)
            .map_err(|e| OverlayError::FrameProcessing(format!("Failed to create Mat: {e}")))?;

        let mat = mat
            .reshape(3, frame.height as i32)
            .map_err(|e| OverlayError::FrameProcessing(format!("Failed to reshape Mat: {e}")))?;

        let mut gray = Mat::default();
        imgproc::cvt_color(
            &mat,
            &mut gray,
            imgproc::COLOR_RGB2GRAY,
            0,
            opencv::core::AlgorithmHint::ALGO_HINT_DEFAULT,
        )
        .map_err(|e| {
            OverlayError::FrameProcessing(format!("Failed to convert to grayscale: {e}"))
        })?;

        Ok(gray)
    }

    /// Runs the cascade and keeps the biggest face
    fn largest_face(cascade: &mut CascadeClassifier, gray: &Mat) -> Result<Option<Rect>> {
        let mut faces = Vector::<Rect>::new();
        cascade
            .detect_multi_scale(
                gray,
                &mut faces,
                1.1,               // scale factor
                5,                 // min neighbors
                0,                 // flags
                Size::new(40, 40), // min size
                Size::new(0, 0),   // no max size
            )
            .map_err(|e| OverlayError::Detection(format!("Face detection failed: {e}")))?;

        debug!("Cascade found {} face(s)", faces.len());
        Ok(faces.iter().max_by_key(|rect| rect.width * rect.height))
    }

    /// Crops the face, converts to RGB, resizes and normalizes to [0, 1] in CHW order
    fn preprocess_face(gray: &Mat, rect: Rect) -> Result<Vec<f32>> {
        let face_roi = Mat::roi(gray, rect).map_err(|e| {
            OverlayError::FrameProcessing(format!("Failed to crop face region: {e}"))
        })?;
        // Continuous copy of the ROI
        let face = face_roi.try_clone().map_err(|e| {
            OverlayError::FrameProcessing(format!("Failed to clone face ROI: {e}"))
        })?;

        let mut rgb = Mat::default();
        imgproc::cvt_color_def(&face, &mut rgb, imgproc::COLOR_GRAY2RGB)
            .map_err(|e| OverlayError::FrameProcessing(format!("Failed to convert to RGB: {e}")))?;

        let mut resized = Mat::default();
        imgproc::resize(
            &rgb,
            &mut resized,
            Size::new(INPUT_SIZE as i32, INPUT_SIZE as i32),
            0.0,
            0.0,
            imgproc::INTER_LINEAR,
        )
        .map_err(|e| OverlayError::FrameProcessing(format!("Failed to resize face: {e}")))?;

        let hwc = resized.data_bytes().map_err(|e| {
            OverlayError::FrameProcessing(format!("Failed to get resized data: {e}"))
        })?;

        let plane = INPUT_SIZE * INPUT_SIZE;
        let mut chw = vec![0.0f32; 3 * plane];
        for (i, &pixel) in hwc.iter().enumerate() {
            let (pos, c) = (i / 3, i % 3);
            chw[c * plane + pos] = pixel as f32 / 255.0;
        }
        Ok(chw)
    }

    fn classify(session: &mut Session, chw: Vec<f32>) -> Result<ExpressionScores> {
        let input = ndarray::Array4::from_shape_vec((1, 3, INPUT_SIZE, INPUT_SIZE), chw)
            .map_err(|e| OverlayError::Detection(format!("Failed to create input array: {e}")))?;
        let input = Value::from_array(input)?;

        let outputs = session.run(ort::inputs![input])?;
        let (_, output) = outputs
            .iter()
            .next()
            .ok_or_else(|| OverlayError::Detection("No output from model".to_string()))?;
        let (_, logits) = output.try_extract_tensor::<f32>()?;

        Ok(softmax_scores(logits))
    }

    fn softmax_scores(logits: &[f32]) -> ExpressionScores {
        let max_logit = logits.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        let exp_sum: f32 = logits.iter().map(|&x| (x - max_logit).exp()).sum();

        let mut scores = ExpressionScores::new();
        for (&logit, &emotion) in logits.iter().zip(OUTPUT_EMOTIONS.iter()) {
            let p = (logit - max_logit).exp() / exp_sum;
            let folded = scores.get(emotion).unwrap_or(0.0) + p;
            scores.insert(emotion, folded);
        }
        scores
    }

}
