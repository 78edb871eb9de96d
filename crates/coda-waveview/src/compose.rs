//! Waveform pixel composition
//!
//! Pure function from a peak array plus visual parameters to a
//! finished image. Per column the composer derives the line tips (top,
//! bottom, spread, clip flags), strokes four coverage masks — wave
//! body, outline terminals, clip indicators, zero line — and
//! composites each through its colored source, optionally replacing
//! the wave source with a vertical gradient.
//!
//! Identical inputs produce byte-identical images. The render thread
//! polls the request's cancel flag at three fixed points (after tip
//! computation, after mask drawing, after gradient construction) and
//! gives up without an image when it fires.

use coda_core::db::coefficient_to_db;
use coda_core::types::PeakData;

use crate::color::Color;
use crate::image::{AlphaMask, ImageError, WaveImage};
use crate::style::{RenderStyle, Shape};
use crate::worker::CancelFlag;

/// Perceptual meter curve: maps a power in dB onto `0.0..=1.0` with a
/// polynomial compression of the lower range.
fn log_meter(power: f32, lower_db: f32, upper_db: f32, non_linearity: f32) -> f32 {
    if power < lower_db {
        0.0
    } else {
        ((power - lower_db) / (upper_db - lower_db)).powf(non_linearity)
    }
}

fn alt_log_meter(power: f32) -> f32 {
    log_meter(power, -192.0, 0.0, 8.0)
}

/// Signed log-meter transform of a sample value.
fn log_scaled(value: f32) -> f64 {
    if value > 0.0 {
        f64::from(alt_log_meter(coefficient_to_db(value)))
    } else if value < 0.0 {
        -f64::from(alt_log_meter(coefficient_to_db(-value)))
    } else {
        0.0
    }
}

/// Vertical position for an amplitude in `-1.0..=1.0`.
///
/// Must return an integral value so single-pixel strokes stay crisp.
/// Rectified output aligns to the bottom edge; normal output rounds
/// away from the midline and wastes two rows top and bottom so the
/// outline terminals stay inside the surface.
fn y_extent(s: f64, shape: Shape, height: u32) -> f64 {
    let height = f64::from(height);
    match shape {
        Shape::Rectified => ((1.0 - s) * (height - 2.0)).floor(),
        Shape::Normal => {
            let pos = if s < 0.0 {
                ((1.0 - s) * 0.5 * (height - 4.0)).ceil()
            } else {
                ((1.0 - s) * 0.5 * (height - 4.0)).floor()
            };
            (height - 4.0).min(pos.max(0.0))
        }
    }
}

/// Per-column line geometry derived from one peak.
#[derive(Debug, Clone, Copy, Default)]
struct LineTips {
    top: f64,
    bot: f64,
    spread: f64,
    clip_max: bool,
    clip_min: bool,
}

fn compute_tips(peaks: &[PeakData], style: &RenderStyle) -> Vec<LineTips> {
    let height = f64::from(style.height);
    let clip_level = style.clip_level;
    let mut tips = Vec::with_capacity(peaks.len());

    match style.shape {
        Shape::Rectified => {
            for peak in peaks {
                let mut tip = LineTips {
                    bot: height - 1.0,
                    clip_max: peak.max >= clip_level,
                    clip_min: -peak.min >= clip_level,
                    ..Default::default()
                };
                let p = peak.max.abs().max(peak.min.abs());
                if style.logscaled {
                    let p = f64::from(alt_log_meter(coefficient_to_db(p)));
                    tip.top = y_extent(p, style.shape, style.height);
                    tip.spread = p * (height - 1.0);
                } else {
                    let p = f64::from(p);
                    tip.top = y_extent(p, style.shape, style.height);
                    tip.spread = p * (height - 2.0);
                }
                tips.push(tip);
            }
        }
        Shape::Normal => {
            for peak in peaks {
                let mut tip = LineTips {
                    clip_max: peak.max >= clip_level,
                    clip_min: -peak.min >= clip_level,
                    ..Default::default()
                };
                let (top, bot) = if style.logscaled {
                    (log_scaled(peak.max), log_scaled(peak.min))
                } else {
                    (f64::from(peak.max), f64::from(peak.min))
                };
                tip.top = y_extent(top, style.shape, style.height);
                tip.bot = y_extent(bot, style.shape, style.height);
                tip.spread = tip.bot - tip.top;
                tips.push(tip);
            }
        }
    }

    tips
}

struct MaskSet {
    wave: AlphaMask,
    outline: AlphaMask,
    clip: AlphaMask,
    zero: AlphaMask,
}

impl MaskSet {
    fn new(width: u32, height: u32) -> Result<Self, ImageError> {
        Ok(Self {
            wave: AlphaMask::new(width, height)?,
            outline: AlphaMask::new(width, height)?,
            clip: AlphaMask::new(width, height)?,
            zero: AlphaMask::new(width, height)?,
        })
    }
}

fn draw_masks(tips: &mut [LineTips], style: &RenderStyle) -> Result<MaskSet, ImageError> {
    let height = style.height;
    let mut masks = MaskSet::new(tips.len() as u32, height)?;

    /* the clip indicator is at most 7 pixels, or 5% of the view
     * height, and never longer than the line it marks */
    let clip_height = 7.0f64.min((f64::from(height) * 0.05).ceil());
    let clip_len = |spread: f64| clip_height.min((spread + 0.5).ceil());

    match style.shape {
        Shape::Rectified => {
            for (i, tip) in tips.iter().enumerate() {
                let x = i as i64;
                if tip.spread >= 1.0 {
                    masks.wave.vspan(x, tip.top, tip.bot);
                }
                /* upper terminal: clip indicator or nothing (the
                 * rectified outline terminal is a degenerate path) */
                if style.show_clipping && tip.clip_max {
                    masks.clip.vseg(x, tip.top, 1.0, clip_len(tip.spread));
                }
            }
        }
        Shape::Normal => {
            let height_2 = (f64::from(height) - 4.0) * 0.5;

            for i in 0..tips.len() {
                let x = i as i64;
                let tip = tips[i];

                if tip.spread >= 2.0 {
                    masks.wave.vspan(x, tip.top, tip.bot);
                }

                /* draw square waves and other discontiguous points clearly */
                if i > 0 {
                    let prev = tips[i - 1];
                    if prev.top + 2.0 < tip.top {
                        let mid = (tip.bot + prev.top) / 2.0;
                        masks.wave.vspan(x - 1, prev.top, mid);
                        masks.wave.vspan(x, mid, tip.top);
                    } else if prev.bot > tip.bot + 2.0 {
                        let mid = (tip.top + prev.bot) / 2.0;
                        masks.wave.vspan(x - 1, prev.bot, mid);
                        masks.wave.vspan(x, mid, tip.bot);
                    }
                }

                if tip.spread >= 5.0 && style.show_zero {
                    masks.zero.dot(x, height_2.floor());
                }

                let draw_outline_as_wave;
                if tip.spread > 1.0 {
                    draw_outline_as_wave = false;
                    /* lower outline/clip indicator */
                    if style.show_clipping && tip.clip_min {
                        let sign = if tip.bot > height_2 { -1.0 } else { 1.0 };
                        masks.clip.vseg(x, tip.bot, sign, clip_len(tip.spread));
                    } else {
                        masks.outline.dot(x, tip.bot);
                    }
                } else {
                    draw_outline_as_wave = true;
                    if tip.clip_min {
                        // make sure we draw the clip
                        tips[i].clip_max = true;
                    }
                }

                /* upper outline/clip indicator */
                if style.show_clipping && tips[i].clip_max {
                    let sign = if tip.top > height_2 { -1.0 } else { 1.0 };
                    masks.clip.vseg(x, tip.top, sign, clip_len(tip.spread));
                } else if draw_outline_as_wave {
                    /* too thin for a line; keep the waveform visible
                     * as a single pixel */
                    masks.wave.dot(x, tip.top);
                } else {
                    masks.outline.dot(x, tip.top);
                }
            }
        }
    }

    Ok(masks)
}

/// Per-row premultiplied source colors for the wave body gradient:
/// three stops with the fill color at the middle one and an
/// HSV-dimmed variant at the outer two.
fn gradient_rows(style: &RenderStyle) -> Vec<[u8; 4]> {
    let stops: [f64; 3] = match style.shape {
        Shape::Rectified => [0.1, 0.3, 0.9],
        Shape::Normal => [0.1, 0.5, 0.9],
    };

    let fill = style.fill_color;
    let (h, s, v) = fill.to_hsv();
    let outer = Color::from_hsva(h, s, v * (1.0 - style.gradient_depth as f32), fill.a);

    let height = f64::from(style.height);
    (0..style.height)
        .map(|y| {
            let t = (f64::from(y) + 0.5) / height;
            let color = if t <= stops[0] {
                outer
            } else if t < stops[1] {
                let f = (t - stops[0]) / (stops[1] - stops[0]);
                outer.lerp(fill, f as f32)
            } else if t < stops[2] {
                let f = (t - stops[1]) / (stops[2] - stops[1]);
                fill.lerp(outer, f as f32)
            } else {
                outer
            };
            color.to_premul_rgba8()
        })
        .collect()
}

/// Compose a waveform image from peak data.
///
/// Returns `Ok(None)` when the cancel flag fired at one of the
/// checkpoints; an image is either complete or absent, never partial.
pub fn render_peaks(
    peaks: &[PeakData],
    style: &RenderStyle,
    cancel: &CancelFlag,
) -> Result<Option<WaveImage>, ImageError> {
    debug_assert!(style.height >= 8, "waveform height too small to draw");
    if peaks.is_empty() || style.height < 8 {
        return Ok(None);
    }

    let mut tips = compute_tips(peaks, style);
    if cancel.is_set() {
        return Ok(None);
    }

    let masks = draw_masks(&mut tips, style)?;
    if cancel.is_set() {
        return Ok(None);
    }

    let mut image = WaveImage::try_new(peaks.len() as u32, style.height)?;

    if style.gradient_depth > 0.0 {
        let rows = gradient_rows(style);
        if cancel.is_set() {
            return Ok(None);
        }
        image.paint_mask_rows(&masks.wave, &rows);
    } else {
        image.paint_mask(&masks.wave, style.fill_color);
    }

    image.paint_mask(&masks.outline, style.outline_color);
    image.paint_mask(&masks.clip, style.clip_color);
    image.paint_mask(&masks.zero, style.zero_color);

    Ok(Some(image))
}
