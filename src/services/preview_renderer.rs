// src/services/preview_renderer.rs
use crate::errors::DashboardError;
use crate::models::{Point, PreviewResponse};
use base64::{Engine as _, engine::general_purpose};
use image::{GenericImageView, ImageFormat as ImgFormat, Rgba, RgbaImage};

const MARKER_RADIUS: i64 = 5;
const SEGMENT_HALF_WIDTH: i64 = 1;
const LINE_COLOR: Rgba<u8> = Rgba([0x10, 0xb9, 0x81, 0xff]);

/// Decoded preview frame at the dimensions the backend reported.
#[derive(Debug, Clone)]
pub struct PreviewData {
    pub frame: RgbaImage,
    pub width: u32,
    pub height: u32,
    pub filename: String,
}

/// Strips an optional `data:<mime>;base64,` prefix and decodes the payload.
pub fn decode_base64_image(payload: &str) -> Result<Vec<u8>, DashboardError> {
    let encoded = match payload.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => payload,
    };
    general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|e| DashboardError::ImageProcessing(format!("Invalid base64 image: {}", e)))
}

pub struct PreviewRenderer;

impl PreviewRenderer {
    pub fn new() -> Self {
        Self
    }

    pub fn decode_preview(&self, response: &PreviewResponse) -> Result<PreviewData, DashboardError> {
        if response.width == 0 || response.height == 0 {
            return Err(DashboardError::ImageProcessing(format!(
                "Preview has empty dimensions {}x{}",
                response.width, response.height
            )));
        }

        let data = decode_base64_image(&response.preview_image)?;
        let frame = self.decode_frame(&data, response.width, response.height)?;

        Ok(PreviewData {
            frame,
            width: response.width,
            height: response.height,
            filename: response.filename.clone(),
        })
    }

    /// Loads an encoded frame and resizes it to `width`x`height` if needed.
    pub fn decode_frame(
        &self,
        data: &[u8],
        width: u32,
        height: u32,
    ) -> Result<RgbaImage, DashboardError> {
        let img = image::load_from_memory(data)
            .map_err(|e| DashboardError::ImageProcessing(format!("Invalid image format: {}", e)))?;

        if img.dimensions() == (width, height) {
            return Ok(img.to_rgba8());
        }

        Ok(img
            .resize_exact(width, height, image::imageops::FilterType::Triangle)
            .to_rgba8())
    }

    /// Draws `points` and, when there are two, the segment joining them on a
    /// fresh copy of `frame`. The source frame is never touched.
    pub fn render(&self, frame: &RgbaImage, points: &[Point]) -> RgbaImage {
        let mut surface = frame.clone();

        if let [a, b] = points {
            draw_segment(&mut surface, *a, *b);
        }
        for point in points {
            fill_disc(&mut surface, point.x.round() as i64, point.y.round() as i64, MARKER_RADIUS);
        }

        surface
    }

    pub fn encode_png(&self, surface: &RgbaImage) -> Result<Vec<u8>, DashboardError> {
        let mut output = Vec::new();
        image::DynamicImage::ImageRgba8(surface.clone())
            .write_to(&mut std::io::Cursor::new(&mut output), ImgFormat::Png)
            .map_err(|e| {
                DashboardError::ImageProcessing(format!("Failed to encode surface: {}", e))
            })?;
        Ok(output)
    }
}

impl Default for PreviewRenderer {
    fn default() -> Self {
        Self::new()
    }
}

fn fill_disc(surface: &mut RgbaImage, cx: i64, cy: i64, radius: i64) {
    let (w, h) = (surface.width() as i64, surface.height() as i64);
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy > radius * radius {
                continue;
            }
            let (x, y) = (cx + dx, cy + dy);
            if x >= 0 && y >= 0 && x < w && y < h {
                surface.put_pixel(x as u32, y as u32, LINE_COLOR);
            }
        }
    }
}

// Bresenham, thickened with a small disc at every step.
fn draw_segment(surface: &mut RgbaImage, from: Point, to: Point) {
    let (mut x0, mut y0) = (from.x.round() as i64, from.y.round() as i64);
    let (x1, y1) = (to.x.round() as i64, to.y.round() as i64);

    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        fill_disc(surface, x0, y0, SEGMENT_HALF_WIDTH);
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn png_data_url(width: u32, height: u32) -> String {
        let frame = RgbaImage::from_pixel(width, height, Rgba([20, 20, 20, 255]));
        let png = PreviewRenderer::new().encode_png(&frame).unwrap();
        format!("data:image/png;base64,{}", general_purpose::STANDARD.encode(png))
    }

    pub(crate) fn preview_response(width: u32, height: u32) -> PreviewResponse {
        PreviewResponse {
            preview_image: png_data_url(width, height),
            width,
            height,
            filename: "clip.mp4".into(),
        }
    }

    #[test]
    fn decodes_data_url_preview() {
        let preview = PreviewRenderer::new()
            .decode_preview(&preview_response(64, 36))
            .unwrap();
        assert_eq!(preview.frame.dimensions(), (64, 36));
        assert_eq!((preview.width, preview.height), (64, 36));
    }

    #[test]
    fn frame_is_scaled_to_reported_dimensions() {
        let mut response = preview_response(32, 18);
        response.width = 64;
        response.height = 36;
        let preview = PreviewRenderer::new().decode_preview(&response).unwrap();
        assert_eq!(preview.frame.dimensions(), (64, 36));
    }

    #[test]
    fn rejects_garbage_payload() {
        let response = PreviewResponse {
            preview_image: "data:image/png;base64,@@@".into(),
            width: 10,
            height: 10,
            filename: String::new(),
        };
        assert!(matches!(
            PreviewRenderer::new().decode_preview(&response),
            Err(DashboardError::ImageProcessing(_))
        ));
    }

    #[test]
    fn render_draws_markers_and_segment_without_touching_frame() {
        let renderer = PreviewRenderer::new();
        let frame = RgbaImage::from_pixel(100, 50, Rgba([0, 0, 0, 255]));
        let points = [Point::new(10.0, 25.0), Point::new(90.0, 25.0)];

        let surface = renderer.render(&frame, &points);
        assert_eq!(*surface.get_pixel(10, 25), LINE_COLOR);
        assert_eq!(*surface.get_pixel(50, 25), LINE_COLOR);
        assert_eq!(*surface.get_pixel(50, 5), Rgba([0, 0, 0, 255]));
        assert_eq!(*frame.get_pixel(50, 25), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn single_point_has_no_segment() {
        let renderer = PreviewRenderer::new();
        let frame = RgbaImage::from_pixel(100, 50, Rgba([0, 0, 0, 255]));
        let surface = renderer.render(&frame, &[Point::new(10.0, 25.0)]);
        assert_eq!(*surface.get_pixel(10, 25), LINE_COLOR);
        assert_eq!(*surface.get_pixel(50, 25), Rgba([0, 0, 0, 255]));
    }
}
