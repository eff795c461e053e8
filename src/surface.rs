// Display surfaces the overlay binds to: the video, its container and the overlay canvas

use crate::camera::MediaStream;
use crate::config::OverlayConfig;
use crate::models::{Color, Dimensions, EmotionDefinition, FaceBox, Frame};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;

/// Identifier of the video surface in a `SurfaceRegistry`
pub const VIDEO_ID: &str = "video";
/// Identifier of the container surface in a `SurfaceRegistry`
pub const CONTAINER_ID: &str = "app-container";

/// The surface showing the camera stream
pub trait VideoSurface: Send + Sync {
    /// Uses `stream` as the video source
    fn attach_stream(&self, stream: MediaStream);

    /// The frame currently on display, if playback has produced one
    fn current_frame(&self) -> Option<Frame>;

    /// Size the video is displayed at, not its native resolution
    fn displayed_dimensions(&self) -> Dimensions;

    /// Fires once each time playback starts
    fn play_events(&self) -> broadcast::Receiver<()>;
}

/// A drawable surface layered over the video
pub trait OverlayCanvas: Send + Sync {
    fn resize(&self, dims: Dimensions);
    fn dimensions(&self) -> Dimensions;
    /// Clears the full canvas rectangle
    fn clear(&self);
    fn draw_box(&self, draw: &DrawBox);
}

/// The container that holds the overlay canvas
pub trait OverlayHost: Send + Sync {
    fn create_canvas(&self, dims: Dimensions) -> Arc<dyn OverlayCanvas>;
    /// Attaches `canvas`. Attaching a canvas that is already attached is a no-op.
    fn append(&self, canvas: &Arc<dyn OverlayCanvas>);
    fn remove(&self, canvas: &Arc<dyn OverlayCanvas>);
}

/// Looks surfaces up by identifier, for hosts that keep them in a registry
pub trait SurfaceRegistry {
    fn video(&self, id: &str) -> Option<Arc<dyn VideoSurface>>;
    fn container(&self, id: &str) -> Option<Arc<dyn OverlayHost>>;
}

/// True when both handles point at the same canvas
pub fn same_canvas(a: &Arc<dyn OverlayCanvas>, b: &Arc<dyn OverlayCanvas>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LabelStyle {
    pub background: Color,
    pub font_color: Color,
    pub padding: f32,
}

/// A labeled box to draw on the overlay
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DrawBox {
    pub rect: FaceBox,
    pub label: &'static str,
    pub box_color: Color,
    pub line_width: f32,
    pub label_style: LabelStyle,
}

impl DrawBox {
    /// Box styled with the emotion's colors
    pub fn for_emotion(rect: FaceBox, emotion: &EmotionDefinition, config: &OverlayConfig) -> Self {
        Self {
            rect,
            label: emotion.label,
            box_color: emotion.color,
            line_width: config.line_width,
            label_style: LabelStyle {
                background: emotion.color,
                font_color: emotion.font_color,
                padding: config.label_padding,
            },
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // Plain data behind these locks, a poisoned guard is still consistent
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// What a `DrawListCanvas` currently shows
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CanvasContents {
    pub dims: Dimensions,
    pub boxes: Vec<DrawBox>,
    pub clear_count: usize,
}

/// Canvas that records draw commands for a renderer to paint
#[derive(Debug, Default)]
pub struct DrawListCanvas {
    contents: Mutex<CanvasContents>,
}

impl DrawListCanvas {
    pub fn new(dims: Dimensions) -> Self {
        Self {
            contents: Mutex::new(CanvasContents {
                dims,
                ..Default::default()
            }),
        }
    }

    pub fn contents(&self) -> CanvasContents {
        lock(&self.contents).clone()
    }
}

impl OverlayCanvas for DrawListCanvas {
    fn resize(&self, dims: Dimensions) {
        let mut contents = lock(&self.contents);
        contents.dims = dims;
        // Resizing wipes the pixels, as with an HTML canvas
        contents.boxes.clear();
    }

    fn dimensions(&self) -> Dimensions {
        lock(&self.contents).dims
    }

    fn clear(&self) {
        let mut contents = lock(&self.contents);
        contents.boxes.clear();
        contents.clear_count += 1;
    }

    fn draw_box(&self, draw: &DrawBox) {
        lock(&self.contents).boxes.push(*draw);
    }
}

struct HostedCanvas {
    canvas: Arc<DrawListCanvas>,
    attached: bool,
}

/// Container holding `DrawListCanvas` overlays
#[derive(Default)]
pub struct DrawListHost {
    canvases: Mutex<Vec<HostedCanvas>>,
}

impl DrawListHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Canvases currently attached, in attach order
    pub fn attached(&self) -> Vec<Arc<DrawListCanvas>> {
        lock(&self.canvases)
            .iter()
            .filter(|hosted| hosted.attached)
            .map(|hosted| Arc::clone(&hosted.canvas))
            .collect()
    }

    /// Canvases created and not yet removed, attached or not
    pub fn created(&self) -> Vec<Arc<DrawListCanvas>> {
        lock(&self.canvases)
            .iter()
            .map(|hosted| Arc::clone(&hosted.canvas))
            .collect()
    }
}

fn is_hosted(hosted: &HostedCanvas, canvas: &Arc<dyn OverlayCanvas>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(&hosted.canvas) as *const (),
        Arc::as_ptr(canvas) as *const (),
    )
}

impl OverlayHost for DrawListHost {
    fn create_canvas(&self, dims: Dimensions) -> Arc<dyn OverlayCanvas> {
        let canvas = Arc::new(DrawListCanvas::new(dims));
        lock(&self.canvases).push(HostedCanvas {
            canvas: Arc::clone(&canvas),
            attached: false,
        });
        canvas
    }

    fn append(&self, canvas: &Arc<dyn OverlayCanvas>) {
        let mut canvases = lock(&self.canvases);
        // Unknown canvases come from another host and are ignored
        if let Some(hosted) = canvases.iter_mut().find(|h| is_hosted(h, canvas)) {
            hosted.attached = true;
        }
    }

    fn remove(&self, canvas: &Arc<dyn OverlayCanvas>) {
        lock(&self.canvases).retain(|hosted| !is_hosted(hosted, canvas));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Emotion;

    fn sample_box() -> DrawBox {
        DrawBox::for_emotion(
            FaceBox::new(10.0, 20.0, 30.0, 40.0),
            Emotion::Surprised.definition(),
            &OverlayConfig::default(),
        )
    }

    #[test]
    fn draw_box_uses_emotion_colors() {
        let draw = sample_box();
        assert_eq!(draw.label, "Surprised");
        assert_eq!(draw.box_color, Color::ORANGE);
        assert_eq!(draw.label_style.background, Color::ORANGE);
        assert_eq!(draw.label_style.font_color, Color::BLACK);
        assert_eq!(draw.line_width, 5.0);
        assert_eq!(draw.label_style.padding, 10.0);
    }

    #[test]
    fn clear_wipes_boxes() {
        let canvas = DrawListCanvas::new(Dimensions::new(100.0, 100.0));
        canvas.draw_box(&sample_box());
        assert_eq!(canvas.contents().boxes.len(), 1);

        canvas.clear();
        let contents = canvas.contents();
        assert!(contents.boxes.is_empty());
        assert_eq!(contents.clear_count, 1);
    }

    #[test]
    fn append_is_idempotent_and_remove_detaches() {
        let host = DrawListHost::new();
        let canvas = host.create_canvas(Dimensions::new(4.0, 3.0));
        assert!(host.attached().is_empty());

        host.append(&canvas);
        host.append(&canvas);
        assert_eq!(host.attached().len(), 1);

        host.remove(&canvas);
        assert!(host.attached().is_empty());
        assert!(host.created().is_empty());
    }

    #[test]
    fn same_canvas_compares_identity() {
        let host = DrawListHost::new();
        let a = host.create_canvas(Dimensions::default());
        let b = host.create_canvas(Dimensions::default());
        assert!(same_canvas(&a, &Arc::clone(&a)));
        assert!(!same_canvas(&a, &b));
    }
}
