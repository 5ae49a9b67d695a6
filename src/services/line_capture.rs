// src/services/line_capture.rs
use crate::errors::DashboardError;
use crate::models::{LineConfig, Point};
use crate::services::preview_renderer::{PreviewData, PreviewRenderer};
use image::RgbaImage;
use log::debug;

/// Where the capture surface sits on screen, in display (CSS) pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl DisplayRect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// A surface shown at 1:1 with its source image.
    pub fn native(width: u32, height: u32) -> Self {
        Self::new(0.0, 0.0, width as f64, height as f64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CaptureState {
    Empty,
    OnePoint(Point),
    TwoPoints(Point, Point),
}

impl CaptureState {
    pub fn points(&self) -> Vec<Point> {
        match *self {
            CaptureState::Empty => Vec::new(),
            CaptureState::OnePoint(a) => vec![a],
            CaptureState::TwoPoints(a, b) => vec![a, b],
        }
    }
}

/// Collects exactly two clicks on a preview frame and turns them into a
/// [`LineConfig`] in source-image pixels.
pub struct LineCapture {
    preview: PreviewData,
    renderer: PreviewRenderer,
    state: CaptureState,
    surface: RgbaImage,
}

impl LineCapture {
    pub fn new(preview: PreviewData) -> Self {
        let renderer = PreviewRenderer::new();
        let surface = renderer.render(&preview.frame, &[]);
        Self {
            preview,
            renderer,
            state: CaptureState::Empty,
            surface,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn preview(&self) -> &PreviewData {
        &self.preview
    }

    pub fn surface(&self) -> &RgbaImage {
        &self.surface
    }

    pub fn can_save(&self) -> bool {
        matches!(self.state, CaptureState::TwoPoints(..))
    }

    /// Maps a display-space click into image space, clamped to the frame.
    pub fn to_image_space(&self, client_x: f64, client_y: f64, rect: DisplayRect) -> Option<Point> {
        if rect.width <= 0.0 || rect.height <= 0.0 {
            return None;
        }
        let scale_x = self.preview.width as f64 / rect.width;
        let scale_y = self.preview.height as f64 / rect.height;

        let max_x = self.preview.width.saturating_sub(1) as f64;
        let max_y = self.preview.height.saturating_sub(1) as f64;

        let x = ((client_x - rect.left) * scale_x).clamp(0.0, max_x);
        let y = ((client_y - rect.top) * scale_y).clamp(0.0, max_y);
        Some(Point::new(x, y))
    }

    /// Records a click. Returns `false` when the click was ignored.
    pub fn click(&mut self, client_x: f64, client_y: f64, rect: DisplayRect) -> bool {
        let Some(point) = self.to_image_space(client_x, client_y, rect) else {
            debug!("ignoring click on a zero-sized surface");
            return false;
        };

        self.state = match self.state {
            CaptureState::Empty => CaptureState::OnePoint(point),
            CaptureState::OnePoint(first) => CaptureState::TwoPoints(first, point),
            CaptureState::TwoPoints(..) => return false,
        };
        self.redraw();
        true
    }

    pub fn reset(&mut self) {
        self.state = CaptureState::Empty;
        self.redraw();
    }

    /// Emits the captured points in click order.
    pub fn save(&self) -> Result<LineConfig, DashboardError> {
        match self.state {
            CaptureState::TwoPoints(point1, point2) => Ok(LineConfig { point1, point2 }),
            _ => Err(DashboardError::Validation(
                "Two points are required to save the line".to_string(),
            )),
        }
    }

    pub fn surface_png(&self) -> Result<Vec<u8>, DashboardError> {
        self.renderer.encode_png(&self.surface)
    }

    fn redraw(&mut self) {
        self.surface = self.renderer.render(&self.preview.frame, &self.state.points());
    }
}
