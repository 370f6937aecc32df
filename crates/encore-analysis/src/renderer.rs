//! Spectrum bars and waveform drawing.

use crate::analyser::Analyser;
use crate::surface::{Color, Paint, Rect, Surface};

/// Translucent black drawn over the previous frame, leaving fading trails.
pub const OVERWASH: Color = Color::rgba(0, 0, 0, 0.1);
/// Bar color at the bottom edge.
pub const BAR_BOTTOM: Color = Color::rgb(0xff, 0x6b, 0x6b);
/// Bar color at the bar's top.
pub const BAR_TOP: Color = Color::rgb(0xfe, 0xca, 0x57);
pub const WAVEFORM_COLOR: Color = Color::rgba(255, 255, 255, 0.8);
pub const WAVEFORM_WIDTH: f32 = 3.0;

/// Bar width as a multiple of `width / bins`.
const BAR_WIDTH_FACTOR: f32 = 2.5;
const BAR_SPACING: f32 = 1.0;
/// Full-scale bars reach this fraction of the height.
const BAR_HEIGHT_FACTOR: f32 = 0.8;

/// Draws one visualization frame per call from an [`Analyser`].
pub struct Renderer {
    frequency: Vec<u8>,
    time_domain: Vec<u8>,
    points: Vec<(f32, f32)>,
}

impl Renderer {
    /// Buffers sized for `bins` frequency bins.
    pub fn new(bins: usize) -> Self {
        Self {
            frequency: vec![0; bins],
            time_domain: vec![128; bins],
            points: Vec::with_capacity(bins),
        }
    }

    pub fn for_analyser(analyser: &Analyser) -> Self {
        Self::new(analyser.frequency_bin_count())
    }

    /// Overwash, then bars, then the waveform.
    pub fn render_frame(&mut self, analyser: &mut Analyser, surface: &mut dyn Surface) {
        analyser.byte_frequency_data(&mut self.frequency);
        analyser.byte_time_domain_data(&mut self.time_domain);

        overwash(surface);
        draw_bars(surface, &self.frequency);
        draw_waveform(surface, &self.time_domain, &mut self.points);
    }

    /// Frequency bytes of the last frame.
    pub fn frequency_data(&self) -> &[u8] {
        &self.frequency
    }

    pub fn time_domain_data(&self) -> &[u8] {
        &self.time_domain
    }
}

pub fn overwash(surface: &mut dyn Surface) {
    let rect = Rect::new(0.0, 0.0, surface.width() as f32, surface.height() as f32);
    surface.fill_rect(rect, &Paint::Solid(OVERWASH));
}

/// One bar per byte, left to right, growing up from the bottom edge.
///
/// Bars past the right edge are clipped by the surface.
pub fn draw_bars(surface: &mut dyn Surface, data: &[u8]) {
    if data.is_empty() {
        return;
    }
    let width = surface.width() as f32;
    let height = surface.height() as f32;
    let bar_width = (width / data.len() as f32) * BAR_WIDTH_FACTOR;

    let mut x = 0.0;
    for &value in data {
        let bar_height = (value as f32 / 255.0) * height * BAR_HEIGHT_FACTOR;
        if bar_height > 0.0 {
            let top = height - bar_height;
            let paint = Paint::LinearGradient {
                start: (0.0, height),
                end: (0.0, top),
                from: BAR_BOTTOM,
                to: BAR_TOP,
            };
            surface.fill_rect(Rect::new(x, top, bar_width, bar_height), &paint);
        }
        x += bar_width + BAR_SPACING;
    }
}

/// Polyline through `y = (v / 128) * h / 4 + h / 2`, evenly spaced across the width.
///
/// `points` is scratch space reused between frames.
pub fn draw_waveform(surface: &mut dyn Surface, data: &[u8], points: &mut Vec<(f32, f32)>) {
    if data.is_empty() {
        return;
    }
    let width = surface.width() as f32;
    let height = surface.height() as f32;
    let slice_width = width / data.len() as f32;

    points.clear();
    points.extend(data.iter().enumerate().map(|(i, &value)| {
        let v = value as f32 / 128.0;
        (i as f32 * slice_width, v * height / 4.0 + height / 2.0)
    }));
    surface.stroke_polyline(points, WAVEFORM_WIDTH, WAVEFORM_COLOR);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::PixelSurface;

    /// Records draw calls instead of rasterizing.
    #[derive(Default)]
    struct Recorder {
        rects: Vec<(Rect, Paint)>,
        lines: Vec<(Vec<(f32, f32)>, f32, Color)>,
    }

    impl Surface for Recorder {
        fn width(&self) -> u32 {
            256
        }
        fn height(&self) -> u32 {
            100
        }
        fn fill_rect(&mut self, rect: Rect, paint: &Paint) {
            self.rects.push((rect, paint.clone()));
        }
        fn stroke_polyline(&mut self, points: &[(f32, f32)], line_width: f32, color: Color) {
            self.lines.push((points.to_vec(), line_width, color));
        }
    }

    #[test]
    fn test_bar_geometry() {
        let mut surface = Recorder::default();
        let mut data = [0u8; 128];
        data[0] = 255;
        data[2] = 51;
        draw_bars(&mut surface, &data);

        // Zero bars draw nothing.
        assert_eq!(surface.rects.len(), 2);

        let (first, paint) = &surface.rects[0];
        assert_eq!(first.width, 5.0);
        assert_eq!(first.x, 0.0);
        assert!((first.height - 80.0).abs() < 1e-4);
        assert!((first.y - 20.0).abs() < 1e-4);
        assert_eq!(
            *paint,
            Paint::LinearGradient {
                start: (0.0, 100.0),
                end: (0.0, first.y),
                from: BAR_BOTTOM,
                to: BAR_TOP,
            }
        );

        let (third, _) = &surface.rects[1];
        assert_eq!(third.x, 12.0);
        assert!((third.height - 16.0).abs() < 1e-4);
    }

    #[test]
    fn test_waveform_geometry() {
        let mut surface = Recorder::default();
        let data = [128u8, 0, 255, 128];
        let mut points = Vec::new();
        draw_waveform(&mut surface, &data, &mut points);

        let (line, width, color) = &surface.lines[0];
        assert_eq!(*width, 3.0);
        assert_eq!(*color, WAVEFORM_COLOR);
        assert_eq!(line.len(), 4);
        assert_eq!(line[0], (0.0, 75.0));
        assert_eq!(line[1], (64.0, 50.0));
        assert!((line[2].1 - (255.0 / 128.0 * 25.0 + 50.0)).abs() < 1e-4);
        assert_eq!(line[3].0, 192.0);
    }

    #[test]
    fn test_overwash_covers_surface() {
        let mut surface = Recorder::default();
        overwash(&mut surface);
        assert_eq!(
            surface.rects[0],
            (Rect::new(0.0, 0.0, 256.0, 100.0), Paint::Solid(OVERWASH))
        );
    }

    #[test]
    fn test_render_frame_on_pixels() {
        let (mut writer, reader) = encore_core::tap(1024);
        let mut analyser = Analyser::new(reader, Default::default()).unwrap();
        let mut renderer = Renderer::for_analyser(&analyser);
        let mut surface = PixelSurface::new(128, 64);

        let tone: Vec<f32> = (0..256)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * i as f32 / 8.0).sin())
            .collect();
        writer.push_slice(&tone);
        renderer.render_frame(&mut analyser, &mut surface);

        assert!(renderer.frequency_data().iter().any(|&v| v > 0));
        // Something was drawn near the bottom edge and the wash is opaque-ish.
        let lit = (0..128).any(|x| surface.pixel(x, 63).map_or(false, |p| p[0] > 100));
        assert!(lit);
    }
}
