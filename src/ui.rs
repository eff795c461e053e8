// UI module: egui window acting as the video surface and painting the overlay

use crate::camera::MediaStream;
use crate::models::{Color, Dimensions, EmotionDefinition, Frame};
use crate::surface::{DrawBox, DrawListHost, VideoSurface};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tracing::debug;

/// Font size of the box labels
const LABEL_FONT_SIZE: f32 = 18.0;

/// Video surface backed by the egui window
pub struct EguiVideo {
    stream: Mutex<Option<MediaStream>>,
    displayed: Mutex<Dimensions>,
    play_sender: broadcast::Sender<()>,
    playing: AtomicBool,
}

impl EguiVideo {
    pub fn new() -> Self {
        let (play_sender, _) = broadcast::channel(4);
        Self {
            stream: Mutex::new(None),
            displayed: Mutex::new(Dimensions::default()),
            play_sender,
            playing: AtomicBool::new(false),
        }
    }

    /// Records the size the video was painted at, then reports playback.
    /// The size is stored first so the overlay canvas never starts at 0x0.
    pub fn present(&self, dims: Dimensions) {
        self.set_displayed(dims);
        self.mark_playing();
    }

    fn set_displayed(&self, dims: Dimensions) {
        if let Ok(mut displayed) = self.displayed.lock() {
            *displayed = dims;
        }
    }

    /// Fires the play event on the first frame after a stream is attached
    fn mark_playing(&self) {
        if !self.playing.swap(true, Ordering::AcqRel) {
            debug!("Video playback started");
            let _ = self.play_sender.send(());
        }
    }
}

impl Default for EguiVideo {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoSurface for EguiVideo {
    fn attach_stream(&self, stream: MediaStream) {
        if let Ok(mut current) = self.stream.lock() {
            *current = Some(stream);
            self.playing.store(false, Ordering::Release);
        }
    }

    fn current_frame(&self) -> Option<Frame> {
        self.stream
            .lock()
            .ok()
            .and_then(|stream| stream.as_ref().and_then(MediaStream::latest_frame))
    }

    fn displayed_dimensions(&self) -> Dimensions {
        self.displayed
            .lock()
            .map(|dims| *dims)
            .unwrap_or_default()
    }

    fn play_events(&self) -> broadcast::Receiver<()> {
        self.play_sender.subscribe()
    }
}

/// What the status strip shows
#[derive(Default)]
pub struct Status {
    pub emotion: Option<&'static EmotionDefinition>,
    pub message: Option<String>,
}

/// Main application window
pub struct OverlayApp {
    video: Arc<EguiVideo>,
    overlay: Arc<DrawListHost>,
    status: Arc<Mutex<Status>>,
    video_texture: Option<egui::TextureHandle>,
}

impl OverlayApp {
    /// Creates a new OverlayApp
    pub fn new(
        video: Arc<EguiVideo>,
        overlay: Arc<DrawListHost>,
        status: Arc<Mutex<Status>>,
    ) -> Self {
        Self {
            video,
            overlay,
            status,
            video_texture: None,
        }
    }

    /// Updates the video texture from the latest frame
    fn update_video_texture(&mut self, ctx: &egui::Context) {
        if let Some(frame) = self.video.current_frame() {
            let color_image = egui::ColorImage::from_rgb(
                [frame.width as usize, frame.height as usize],
                &frame.data,
            );
            self.video_texture =
                Some(ctx.load_texture("camera", color_image, egui::TextureOptions::LINEAR));
        }
    }

    /// Renders the status strip with the current emotion or startup error
    fn render_status(&self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("status").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if let Ok(status) = self.status.try_lock() {
                    if let Some(message) = &status.message {
                        ui.colored_label(egui::Color32::RED, message.as_str());
                    } else if let Some(emotion) = status.emotion {
                        ui.label(egui::RichText::new(emotion.emoji).size(28.0));
                        ui.label(egui::RichText::new(emotion.label).size(20.0));
                    } else {
                        ui.label("Looking for a face...");
                    }
                }
            });
        });
    }

    /// Renders the video centered in the window with the overlay on top
    fn render_video_view(&self, ctx: &egui::Context) {
        egui::CentralPanel::default()
            .frame(egui::Frame::none())
            .show(ctx, |ui| {
                let available = ui.available_rect_before_wrap();

                let Some(texture) = &self.video_texture else {
                    return;
                };

                let texture_size = texture.size_vec2();
                let aspect_ratio = texture_size.x / texture_size.y;

                // Fit while maintaining aspect ratio
                let mut display_width = available.width();
                let mut display_height = display_width / aspect_ratio;
                if display_height > available.height() {
                    display_height = available.height();
                    display_width = display_height * aspect_ratio;
                }

                let video_rect = egui::Rect::from_center_size(
                    available.center(),
                    egui::vec2(display_width, display_height),
                );
                ui.put(
                    video_rect,
                    egui::Image::new(texture)
                        .fit_to_exact_size(egui::vec2(display_width, display_height)),
                );
                self.video
                    .present(Dimensions::new(display_width, display_height));

                let painter = ui.painter_at(video_rect);
                for canvas in self.overlay.attached() {
                    for draw in canvas.contents().boxes {
                        paint_box(&painter, video_rect.min, &draw);
                    }
                }
            });
    }
}

fn color32(color: Color) -> egui::Color32 {
    let [r, g, b] = color.rgb;
    egui::Color32::from_rgb(r, g, b)
}

/// Paints a labeled box; canvas coordinates are relative to `origin`
fn paint_box(painter: &egui::Painter, origin: egui::Pos2, draw: &DrawBox) {
    let rect = egui::Rect::from_min_size(
        origin + egui::vec2(draw.rect.x, draw.rect.y),
        egui::vec2(draw.rect.width, draw.rect.height),
    );
    painter.rect_stroke(
        rect,
        0.0,
        egui::Stroke::new(draw.line_width, color32(draw.box_color)),
    );

    let style = &draw.label_style;
    let galley = painter.layout_no_wrap(
        draw.label.to_string(),
        egui::FontId::proportional(LABEL_FONT_SIZE),
        color32(style.font_color),
    );

    // Label sits under the box's bottom-left corner
    let half_line = draw.line_width / 2.0;
    let label_min = egui::pos2(rect.min.x - half_line, rect.max.y + half_line);
    let padding = egui::vec2(style.padding, style.padding);
    let label_rect = egui::Rect::from_min_size(label_min, galley.size() + padding * 2.0);
    painter.rect_filled(label_rect, 0.0, color32(style.background));
    painter.galley(
        label_rect.min + padding,
        galley,
        color32(style.font_color),
    );
}

impl eframe::App for OverlayApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        ctx.request_repaint();

        self.update_video_texture(ctx);

        self.render_status(ctx);
        self.render_video_view(ctx);
    }
}
