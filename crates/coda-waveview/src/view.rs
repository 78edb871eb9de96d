//! The waveform view
//!
//! One `WaveView` displays a single channel of one region's waveform.
//! x = 0 in the view corresponds to the first waveform datum taken
//! from `region_start` samples into the source; x = N corresponds to
//! the `(N * samples_per_pixel)`'th sample after that.
//!
//! A paint is synchronous and never waits for rendering: `render`
//! translates the window rectangle into a sample range and either
//! blits an image it already holds, adopts one from a completed
//! request or the process-wide cache, or queues a render request and
//! paints nothing. When the background render finishes, the service
//! delivers `ImageReady` on the GUI thread and the view schedules a
//! repaint.
//!
//! Every property setter cancels in-flight work, drops the held image
//! and (for properties baked into cached pixels) invalidates the
//! matching cache group before taking the new value.

use std::sync::{Arc, Mutex};

use kurbo::Rect;

use coda_core::region::AudioRegion;
use coda_core::types::{SampleCnt, SamplePos};

use crate::cache::VisualKey;
use crate::color::Color;
use crate::image::WaveImage;
use crate::service::WaveRenderService;
use crate::style::{RenderStyle, Shape};
use crate::worker::{CancelFlag, RenderRequest, RequestKind, ViewId};

/// The canvas a view is embedded in: coordinate transforms between
/// the view's item space and window space, the visible area (used to
/// size pre-rendered images), and repaint scheduling.
pub trait Canvas {
    fn visible_area(&self) -> Rect;
    fn item_to_window(&self, r: Rect) -> Rect;
    fn window_to_item(&self, r: Rect) -> Rect;
    fn request_redraw(&self);
}

/// One image placement produced by [`WaveView::render`]; the embedder
/// draws `image` with its origin at (`x`, `y`) in window space,
/// clipped to `clip`.
#[derive(Clone)]
pub struct Blit {
    pub image: Arc<WaveImage>,
    pub x: f64,
    pub y: f64,
    pub clip: Rect,
}

pub struct WaveView {
    service: Arc<WaveRenderService>,
    canvas: Arc<dyn Canvas>,
    region: Arc<dyn AudioRegion>,
    id: ViewId,

    channel: u32,
    samples_per_pixel: f64,
    height: u32,
    show_zero: bool,
    zero_color: Color,
    clip_color: Color,
    fill_color: Color,
    outline_color: Color,
    logscaled: bool,
    shape: Shape,
    gradient_depth: f64,
    shape_independent: bool,
    logscaled_independent: bool,
    gradient_depth_independent: bool,
    amplitude_above_axis: f64,
    region_amplitude: f32,
    start_shift: f64,

    /// The `start` value to use for the region; usually the region's
    /// own, but embedders (e.g. a crossfade editor) may override it.
    region_start: SamplePos,

    image: Option<Arc<WaveImage>>,
    image_offset: f64,
}

impl WaveView {
    pub fn new(
        service: Arc<WaveRenderService>,
        canvas: Arc<dyn Canvas>,
        region: Arc<dyn AudioRegion>,
    ) -> Self {
        let id = service.allocate_view_id();
        let globals = service.globals();
        let defaults = service.defaults().clone();
        let region_amplitude = region.scale_amplitude();
        let region_start = region.start();

        Self {
            service,
            canvas,
            region,
            id,
            channel: 0,
            samples_per_pixel: 0.0,
            height: 64,
            show_zero: false,
            zero_color: defaults.zero_color,
            clip_color: defaults.clip_color,
            fill_color: defaults.fill_color,
            outline_color: defaults.outline_color,
            logscaled: globals.logscaled,
            shape: globals.shape,
            gradient_depth: globals.gradient_depth,
            shape_independent: false,
            logscaled_independent: false,
            gradient_depth_independent: false,
            amplitude_above_axis: 1.0,
            region_amplitude,
            start_shift: 0.0,
            region_start,
            image: None,
            image_offset: 0.0,
        }
    }

    pub fn id(&self) -> ViewId {
        self.id
    }

    pub fn debug_name(&self) -> String {
        format!("{}[{}]", self.region.name(), self.channel)
    }

    /// The area this view covers, in item space.
    pub fn bounding_box(&self) -> Rect {
        let width = if self.samples_per_pixel > 0.0 {
            self.region_length() as f64 / self.samples_per_pixel
        } else {
            0.0
        };
        Rect::new(0.0, 0.0, width, f64::from(self.height))
    }

    /// Usually the region's length, adjusted when `region_start` has
    /// been overridden.
    fn region_length(&self) -> SampleCnt {
        self.region.length() - (self.region_start - self.region.start())
    }

    fn region_end(&self) -> SamplePos {
        self.region_start + self.region_length()
    }

    fn visual_key(&self) -> VisualKey {
        VisualKey {
            channel: self.channel,
            height: self.height,
            amplitude: self.region_amplitude,
            fill_color: self.fill_color,
        }
    }

    /// Paint the part of `area` this view covers.
    ///
    /// Returns `None` when nothing intersects or no image is ready
    /// yet; in the latter case a request has been queued and a repaint
    /// will be scheduled when the image arrives.
    pub fn render(&mut self, area: Rect) -> Option<Blit> {
        debug_assert!(
            self.samples_per_pixel > 0.0,
            "rendering a waveform with no samples-per-pixel"
        );
        if self.samples_per_pixel <= 0.0 {
            return None;
        }

        let self_rect = self.canvas.item_to_window(self.bounding_box());
        let draw = self_rect.intersect(area);
        if draw.width() <= 0.0 || draw.height() <= 0.0 {
            return None;
        }

        /* round down in case we were asked to draw between pixels */
        let mut draw_start = draw.x0.floor();
        let draw_end = draw.x1.floor();

        /* suppress the leading pixels of the waveform when the
         * embedder has shifted the first drawn position */
        if self.start_shift > 0.0 && draw_start == self_rect.x0.floor() {
            draw_start += self.start_shift;
            if draw_start >= draw_end {
                return None;
            }
        }

        /* image coordinates: x = 0 is the first pixel of this
         * waveform, wherever the view sits in the window */
        let image_start = draw_start - self_rect.x0;
        let image_end = draw_end - self_rect.x0;

        /* sample coordinates, bounded by the region */
        let sample_start = (self.region_start
            + (image_start * self.samples_per_pixel) as SamplePos)
            .max(self.region_start);
        let sample_end = (self.region_start + (image_end * self.samples_per_pixel) as SamplePos)
            .min(self.region_end());

        if self.image.is_none() {
            self.acquire_image(sample_start, sample_end);
        }

        /* still not available: blank for now, repaint comes with the
         * ImageReady signal */
        let image = self.image.clone()?;

        /* round the image origin to device pixels to avoid blurring */
        let x = (self_rect.x0 + self.image_offset).round();
        let y = self_rect.y0.round();

        Some(Blit {
            image,
            x,
            y,
            clip: Rect::new(draw_start, draw.y0, draw_end, draw.y1),
        })
    }

    fn acquire_image(&mut self, start: SamplePos, end: SamplePos) {
        let source = self.region.source(self.channel);
        let key = self.visual_key();

        /* a completed request is preferred over the cache; adopting it
         * also publishes the image for other views */
        if let Some((image, offset)) = self.service.collect_request(self.id, &source, &key) {
            self.image = Some(image);
            self.image_offset = offset;
            return;
        }

        if let Some((image, offset)) = self.service.lookup_image(
            &source,
            &key,
            start,
            end,
            self.region_start,
            self.samples_per_pixel,
        ) {
            log::debug!("{}: cache hit for {} .. {}", self.debug_name(), start, end);
            self.image = Some(image);
            self.image_offset = offset;
            return;
        }

        log::debug!("{}: cache miss for {} .. {}", self.debug_name(), start, end);
        self.queue_render(start, end);
    }

    fn queue_render(&self, start: SamplePos, end: SamplePos) {
        let source = self.region.source(self.channel);
        let globals = self.service.globals();

        let style = RenderStyle {
            height: self.height,
            shape: self.shape,
            logscaled: self.logscaled,
            gradient_depth: self.gradient_depth,
            fill_color: self.fill_color,
            outline_color: self.outline_color,
            zero_color: self.zero_color,
            clip_color: self.clip_color,
            show_zero: self.show_zero,
            show_clipping: globals.show_waveform_clipping,
            /* peaks arrive scaled by the region gain, so the clip
             * threshold is scaled the same way */
            clip_level: globals.clip_level * self.region_amplitude,
        };

        let request = RenderRequest {
            kind: RequestKind::Draw,
            view: self.id,
            source: source.downgrade(),
            start,
            end,
            visual_width: self.canvas.visible_area().width(),
            samples_per_pixel: self.samples_per_pixel,
            channel: self.channel,
            amplitude: self.region_amplitude,
            region_start: self.region_start,
            region_end: self.region_end(),
            style,
            cancel: CancelFlag::new(),
            output: Mutex::new(None),
        };

        self.service.send_request(Arc::new(request));
    }

    /// The GUI-thread handler for this view's `ImageReady` signal.
    pub fn image_ready(&self) {
        log::debug!("{}: new image ready", self.debug_name());
        self.canvas.request_redraw();
    }

    /* -- property mutations --------------------------------------- */

    /// Cancel in-flight work, drop the held image and invalidate the
    /// cache group matching the current settings. For use before a
    /// change to any property that is baked into rendered pixels.
    fn invalidate_image_cache(&mut self) {
        self.service.cancel_view_request(self.id);
        self.image = None;
        self.image_offset = 0.0;
        let source = self.region.source(self.channel);
        self.service.invalidate_group(&source, &self.visual_key());
    }

    /// Cancel in-flight work and drop the held image only; cached
    /// images remain valid (region geometry changes do not alter the
    /// pixels of an image keyed by absolute source positions).
    fn invalidate_image(&mut self) {
        self.service.cancel_view_request(self.id);
        self.image = None;
        self.image_offset = 0.0;
    }

    pub fn set_samples_per_pixel(&mut self, samples_per_pixel: f64) {
        if samples_per_pixel != self.samples_per_pixel {
            self.invalidate_image_cache();
            self.samples_per_pixel = samples_per_pixel;
            self.canvas.request_redraw();
        }
    }

    pub fn set_height(&mut self, height: u32) {
        if height != self.height {
            self.invalidate_image_cache();
            self.height = height;
            self.canvas.request_redraw();
        }
    }

    pub fn set_channel(&mut self, channel: u32) {
        if channel != self.channel {
            self.invalidate_image_cache();
            self.channel = channel;
            self.canvas.request_redraw();
        }
    }

    pub fn set_shape(&mut self, shape: Shape) {
        if shape != self.shape {
            self.invalidate_image_cache();
            self.shape = shape;
            self.canvas.request_redraw();
        }
    }

    pub fn set_logscaled(&mut self, logscaled: bool) {
        if logscaled != self.logscaled {
            self.invalidate_image_cache();
            self.logscaled = logscaled;
            self.canvas.request_redraw();
        }
    }

    pub fn set_gradient_depth(&mut self, depth: f64) {
        if depth != self.gradient_depth {
            self.invalidate_image_cache();
            self.gradient_depth = depth;
            self.canvas.request_redraw();
        }
    }

    pub fn set_fill_color(&mut self, color: Color) {
        if color != self.fill_color {
            self.invalidate_image_cache();
            self.fill_color = color;
            self.canvas.request_redraw();
        }
    }

    pub fn set_outline_color(&mut self, color: Color) {
        if color != self.outline_color {
            self.invalidate_image_cache();
            self.outline_color = color;
            self.canvas.request_redraw();
        }
    }

    pub fn set_zero_color(&mut self, color: Color) {
        if color != self.zero_color {
            self.invalidate_image_cache();
            self.zero_color = color;
            self.canvas.request_redraw();
        }
    }

    pub fn set_clip_color(&mut self, color: Color) {
        if color != self.clip_color {
            self.invalidate_image_cache();
            self.clip_color = color;
            self.canvas.request_redraw();
        }
    }

    pub fn set_show_zero_line(&mut self, show: bool) {
        if show != self.show_zero {
            self.invalidate_image_cache();
            self.show_zero = show;
            self.canvas.request_redraw();
        }
    }

    pub fn show_zero_line(&self) -> bool {
        self.show_zero
    }

    pub fn set_amplitude_above_axis(&mut self, amplitude: f64) {
        if amplitude != self.amplitude_above_axis {
            self.invalidate_image_cache();
            self.amplitude_above_axis = amplitude;
            self.canvas.request_redraw();
        }
    }

    pub fn amplitude_above_axis(&self) -> f64 {
        self.amplitude_above_axis
    }

    /// Shift the first drawn position right by `pixels`; must be
    /// positive. Embedders use this to avoid drawing the first pixel
    /// of a waveform over a region border.
    pub fn set_start_shift(&mut self, pixels: f64) {
        if pixels < 0.0 {
            return;
        }
        self.start_shift = pixels;
        self.canvas.request_redraw();
    }

    pub fn set_shape_independent(&mut self, independent: bool) {
        self.shape_independent = independent;
    }

    pub fn set_logscaled_independent(&mut self, independent: bool) {
        self.logscaled_independent = independent;
    }

    pub fn set_gradient_depth_independent(&mut self, independent: bool) {
        self.gradient_depth_independent = independent;
    }

    pub fn set_region_start(&mut self, start: SamplePos) {
        if start != self.region_start {
            self.invalidate_image();
            self.region_start = start;
            self.canvas.request_redraw();
        }
    }

    /// Called when the region's gain changes.
    pub fn gain_changed(&mut self) {
        self.invalidate_image_cache();
        self.region_amplitude = self.region.scale_amplitude();
        self.canvas.request_redraw();
    }

    /// Called when the region's start or end (thus length) changes.
    pub fn region_resized(&mut self) {
        self.invalidate_image();
        self.region_start = self.region.start();
        self.canvas.request_redraw();
    }

    /* -- global property handlers ---------------------------------- */

    /// Adopt changed global visual properties, unless the matching
    /// independence flag keeps this view on its own value.
    pub fn handle_visual_property_change(&mut self) {
        let globals = self.service.globals();
        let mut changed = false;

        if !self.shape_independent && self.shape != globals.shape {
            self.shape = globals.shape;
            changed = true;
        }
        if !self.logscaled_independent && self.logscaled != globals.logscaled {
            self.logscaled = globals.logscaled;
            changed = true;
        }
        if !self.gradient_depth_independent && self.gradient_depth != globals.gradient_depth {
            self.gradient_depth = globals.gradient_depth;
            changed = true;
        }

        if changed {
            self.invalidate_image_cache();
            self.canvas.request_redraw();
        }
    }

    /// Adopt a changed clip threshold or clip-indicator toggle.
    pub fn handle_clip_level_change(&mut self) {
        self.invalidate_image_cache();
        self.canvas.request_redraw();
    }
}

impl Drop for WaveView {
    fn drop(&mut self) {
        /* cancel and unqueue so the worker never observes this view
         * after destruction */
        self.service.cancel_view_request(self.id);
    }
}
