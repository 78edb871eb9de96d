//! Color type for waveform rendering
//!
//! A plain linear RGBA color with the HSV conversion the gradient
//! painter needs. Kept framework-free so the render thread can use it.

use serde::{Deserialize, Serialize};

/// An RGBA color with components in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const fn from_rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub const fn from_rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// Convert to HSV; hue is in degrees (`0.0..360.0`).
    pub fn to_hsv(self) -> (f32, f32, f32) {
        let max = self.r.max(self.g).max(self.b);
        let min = self.r.min(self.g).min(self.b);
        let delta = max - min;

        let hue = if delta == 0.0 {
            0.0
        } else if max == self.r {
            60.0 * (((self.g - self.b) / delta).rem_euclid(6.0))
        } else if max == self.g {
            60.0 * ((self.b - self.r) / delta + 2.0)
        } else {
            60.0 * ((self.r - self.g) / delta + 4.0)
        };

        let saturation = if max == 0.0 { 0.0 } else { delta / max };

        (hue, saturation, max)
    }

    /// Build a color from HSV components plus alpha; hue in degrees.
    pub fn from_hsva(hue: f32, saturation: f32, value: f32, alpha: f32) -> Self {
        let hue = hue.rem_euclid(360.0);
        let c = value * saturation;
        let x = c * (1.0 - ((hue / 60.0).rem_euclid(2.0) - 1.0).abs());
        let m = value - c;

        let (r, g, b) = match hue as u32 / 60 {
            0 => (c, x, 0.0),
            1 => (x, c, 0.0),
            2 => (0.0, c, x),
            3 => (0.0, x, c),
            4 => (x, 0.0, c),
            _ => (c, 0.0, x),
        };

        Self::from_rgba(r + m, g + m, b + m, alpha)
    }

    /// Linear per-channel interpolation towards `other`.
    pub fn lerp(self, other: Color, t: f32) -> Self {
        let t = t.clamp(0.0, 1.0);
        Self {
            r: self.r + (other.r - self.r) * t,
            g: self.g + (other.g - self.g) * t,
            b: self.b + (other.b - self.b) * t,
            a: self.a + (other.a - self.a) * t,
        }
    }

    /// Premultiplied 8-bit RGBA, as stored in rendered images.
    pub fn to_premul_rgba8(self) -> [u8; 4] {
        let a = self.a.clamp(0.0, 1.0);
        let to_channel = |c: f32| ((c.clamp(0.0, 1.0) * a * 255.0).round()) as u8;
        [
            to_channel(self.r),
            to_channel(self.g),
            to_channel(self.b),
            (a * 255.0).round() as u8,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hsv_round_trips_primaries() {
        for color in [
            Color::from_rgb(1.0, 0.0, 0.0),
            Color::from_rgb(0.0, 1.0, 0.0),
            Color::from_rgb(0.0, 0.0, 1.0),
            Color::from_rgb(0.36, 0.60, 0.82),
        ] {
            let (h, s, v) = color.to_hsv();
            let back = Color::from_hsva(h, s, v, color.a);
            assert!((back.r - color.r).abs() < 1e-5);
            assert!((back.g - color.g).abs() < 1e-5);
            assert!((back.b - color.b).abs() < 1e-5);
        }
    }

    #[test]
    fn grey_has_zero_saturation() {
        let (_, s, v) = Color::from_rgb(0.5, 0.5, 0.5).to_hsv();
        assert_eq!(s, 0.0);
        assert_eq!(v, 0.5);
    }

    #[test]
    fn premul_scales_color_channels_by_alpha() {
        let px = Color::from_rgba(1.0, 0.5, 0.0, 0.5).to_premul_rgba8();
        assert_eq!(px, [128, 64, 0, 128]);
    }

    #[test]
    fn lerp_endpoints() {
        let a = Color::from_rgb(0.0, 0.0, 0.0);
        let b = Color::from_rgb(1.0, 1.0, 1.0);
        assert_eq!(a.lerp(b, 0.0), a);
        assert_eq!(a.lerp(b, 1.0), b);
    }
}
