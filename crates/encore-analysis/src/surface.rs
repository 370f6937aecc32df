//! 2D drawing surfaces for the visualization.
//!
//! [`Surface`] is the small subset of a canvas API the renderer needs.
//! [`PixelSurface`] implements it over an owned RGBA8 buffer; hosts with
//! their own graphics stack implement the trait directly.

use crate::{Error, Result};

/// Straight-alpha color, channels in `0..=255`, alpha in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f32,
}

impl Color {
    pub const BLACK: Self = Self::rgb(0, 0, 0);
    pub const WHITE: Self = Self::rgb(255, 255, 255);
    pub const TRANSPARENT: Self = Self::rgba(0, 0, 0, 0.0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Parse `#rrggbb` or `#rrggbbaa`.
    pub fn from_hex(hex: &str) -> Result<Self> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        let invalid = || Error::InvalidConfig(format!("invalid color '{}'", hex));
        if !digits.is_ascii() || !(digits.len() == 6 || digits.len() == 8) {
            return Err(invalid());
        }
        let byte = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).map_err(|_| invalid());
        let alpha = if digits.len() == 8 {
            byte(6)? as f32 / 255.0
        } else {
            1.0
        };
        Ok(Self::rgba(byte(0)?, byte(2)?, byte(4)?, alpha))
    }

    /// Component-wise interpolation, `t` clamped to `0.0..=1.0`.
    pub fn lerp(self, other: Self, t: f32) -> Self {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
        Self {
            r: mix(self.r, other.r),
            g: mix(self.g, other.g),
            b: mix(self.b, other.b),
            a: self.a + (other.a - self.a) * t,
        }
    }
}

/// Axis-aligned rectangle in surface pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Fill style for [`Surface::fill_rect`].
#[derive(Debug, Clone, PartialEq)]
pub enum Paint {
    Solid(Color),
    /// Two-stop gradient along the line `start -> end`, clamped past the ends.
    LinearGradient {
        start: (f32, f32),
        end: (f32, f32),
        from: Color,
        to: Color,
    },
}

impl Paint {
    /// Color at a point.
    pub fn color_at(&self, x: f32, y: f32) -> Color {
        match *self {
            Paint::Solid(color) => color,
            Paint::LinearGradient {
                start,
                end,
                from,
                to,
            } => {
                let (dx, dy) = (end.0 - start.0, end.1 - start.1);
                let length_sq = dx * dx + dy * dy;
                if length_sq <= f32::EPSILON {
                    return to;
                }
                let t = ((x - start.0) * dx + (y - start.1) * dy) / length_sq;
                from.lerp(to, t)
            }
        }
    }
}

/// Drawing target of the visualization.
pub trait Surface: Send {
    fn width(&self) -> u32;
    fn height(&self) -> u32;

    /// Composite `paint` over `rect`.
    fn fill_rect(&mut self, rect: Rect, paint: &Paint);

    /// Stroke connected line segments through `points`.
    fn stroke_polyline(&mut self, points: &[(f32, f32)], line_width: f32, color: Color);
}

/// In-memory RGBA8 raster.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelSurface {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl PixelSurface {
    /// A transparent surface.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize * 4],
        }
    }

    /// Raw RGBA8 rows, top to bottom.
    pub fn data(&self) -> &[u8] {
        &self.pixels
    }

    /// RGBA of one pixel, `None` outside the surface.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = self.index(x, y);
        Some([
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ])
    }

    /// Overwrite every pixel.
    pub fn clear(&mut self, color: Color) {
        let rgba = [color.r, color.g, color.b, alpha_byte(color.a)];
        for px in self.pixels.chunks_exact_mut(4) {
            px.copy_from_slice(&rgba);
        }
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * 4
    }

    /// Source-over compositing.
    fn blend(&mut self, x: u32, y: u32, color: Color) {
        let src_a = color.a.clamp(0.0, 1.0);
        if src_a <= 0.0 {
            return;
        }
        let i = self.index(x, y);
        let dst_a = self.pixels[i + 3] as f32 / 255.0;
        let out_a = src_a + dst_a * (1.0 - src_a);
        let channel = |src: u8, dst: u8| {
            let src = src as f32;
            let dst = dst as f32;
            ((src * src_a + dst * dst_a * (1.0 - src_a)) / out_a).round() as u8
        };
        self.pixels[i] = channel(color.r, self.pixels[i]);
        self.pixels[i + 1] = channel(color.g, self.pixels[i + 1]);
        self.pixels[i + 2] = channel(color.b, self.pixels[i + 2]);
        self.pixels[i + 3] = alpha_byte(out_a);
    }

    /// Pixel range whose centers fall in `[lo, hi)`, clipped to `0..limit`.
    fn covered(lo: f32, hi: f32, limit: u32) -> std::ops::Range<u32> {
        let start = (lo - 0.5).ceil().max(0.0);
        let end = (hi - 0.5).ceil().max(0.0);
        let start = (start as u32).min(limit);
        let end = (end as u32).min(limit);
        start..end.max(start)
    }
}

impl Surface for PixelSurface {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn fill_rect(&mut self, rect: Rect, paint: &Paint) {
        if !(rect.width > 0.0 && rect.height > 0.0) {
            return;
        }
        let xs = Self::covered(rect.x, rect.x + rect.width, self.width);
        let ys = Self::covered(rect.y, rect.y + rect.height, self.height);
        for y in ys {
            for x in xs.clone() {
                let color = paint.color_at(x as f32 + 0.5, y as f32 + 0.5);
                self.blend(x, y, color);
            }
        }
    }

    fn stroke_polyline(&mut self, points: &[(f32, f32)], line_width: f32, color: Color) {
        if points.len() < 2 || line_width <= 0.0 || self.width == 0 || self.height == 0 {
            return;
        }
        let half = line_width / 2.0;

        // Mark coverage first so overlapping segments blend each pixel once.
        let mut covered = vec![false; self.width as usize * self.height as usize];
        for segment in points.windows(2) {
            let (a, b) = (segment[0], segment[1]);
            let xs = Self::covered(a.0.min(b.0) - half, a.0.max(b.0) + half, self.width);
            let ys = Self::covered(a.1.min(b.1) - half, a.1.max(b.1) + half, self.height);
            for y in ys {
                for x in xs.clone() {
                    let center = (x as f32 + 0.5, y as f32 + 0.5);
                    if distance_to_segment(center, a, b) <= half {
                        covered[y as usize * self.width as usize + x as usize] = true;
                    }
                }
            }
        }

        for (i, _) in covered.iter().enumerate().filter(|&(_, &hit)| hit) {
            let x = (i % self.width as usize) as u32;
            let y = (i / self.width as usize) as u32;
            self.blend(x, y, color);
        }
    }
}

#[inline]
fn alpha_byte(alpha: f32) -> u8 {
    (alpha.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn distance_to_segment(p: (f32, f32), a: (f32, f32), b: (f32, f32)) -> f32 {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let length_sq = dx * dx + dy * dy;
    let t = if length_sq <= f32::EPSILON {
        0.0
    } else {
        (((p.0 - a.0) * dx + (p.1 - a.1) * dy) / length_sq).clamp(0.0, 1.0)
    };
    let (cx, cy) = (a.0 + t * dx, a.1 + t * dy);
    ((p.0 - cx).powi(2) + (p.1 - cy).powi(2)).sqrt()
}
