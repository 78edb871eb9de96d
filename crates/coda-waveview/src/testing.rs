//! Shared test doubles for the crate's test modules.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use coda_core::region::AudioRegion;
use coda_core::source::{AudioSource, PeakReadError, PeakResult, SourceHandle};
use coda_core::types::{PeakData, SampleCnt, SamplePos};
use kurbo::Rect;

use crate::style::{RenderStyle, Shape};
use crate::view::Canvas;
use crate::worker::{CancelFlag, RenderRequest, RequestKind, ViewId};
use crate::Color;

/// Source returning a constant peak for every column.
pub(crate) struct StubSource {
    peak: PeakData,
    fail: bool,
    delay: Duration,
}

impl AudioSource for StubSource {
    fn read_peaks(
        &self,
        dest: &mut [PeakData],
        _start: SamplePos,
        _count: SampleCnt,
        _channel: u32,
        _samples_per_pixel: f64,
    ) -> PeakResult<()> {
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        if self.fail {
            return Err(PeakReadError::Io(String::from("stub read failure")));
        }
        dest.fill(self.peak);
        Ok(())
    }
}

pub(crate) fn test_source() -> SourceHandle {
    SourceHandle::new(Arc::new(StubSource {
        peak: PeakData::new(-0.5, 0.5),
        fail: false,
        delay: Duration::ZERO,
    }))
}

pub(crate) fn failing_source() -> SourceHandle {
    SourceHandle::new(Arc::new(StubSource {
        peak: PeakData::default(),
        fail: true,
        delay: Duration::ZERO,
    }))
}

/// Source whose reads take long enough that a test can race a
/// cancellation against the in-flight render.
pub(crate) fn slow_source(delay_ms: u64) -> SourceHandle {
    SourceHandle::new(Arc::new(StubSource {
        peak: PeakData::new(-0.5, 0.5),
        fail: false,
        delay: Duration::from_millis(delay_ms),
    }))
}

pub(crate) fn test_style(height: u32) -> RenderStyle {
    RenderStyle {
        height,
        shape: Shape::Normal,
        logscaled: false,
        gradient_depth: 0.0,
        fill_color: Color::from_rgb(0.0, 1.0, 0.0),
        outline_color: Color::from_rgb(0.0, 0.0, 1.0),
        zero_color: Color::from_rgb(1.0, 1.0, 0.0),
        clip_color: Color::from_rgb(1.0, 0.0, 0.0),
        show_zero: false,
        show_clipping: true,
        clip_level: crate::style::DEFAULT_CLIP_LEVEL,
    }
}

pub(crate) fn draw_request(
    view: ViewId,
    source: &SourceHandle,
    start: SamplePos,
    end: SamplePos,
) -> RenderRequest {
    RenderRequest {
        kind: RequestKind::Draw,
        view,
        source: source.downgrade(),
        start,
        end,
        visual_width: 100.0,
        samples_per_pixel: 100.0,
        channel: 0,
        amplitude: 1.0,
        region_start: 0,
        region_end: 1_000_000,
        style: test_style(64),
        cancel: CancelFlag::new(),
        output: Mutex::new(None),
    }
}

/// Region over a stub source with adjustable gain.
pub(crate) struct StubRegion {
    source: SourceHandle,
    start: SamplePos,
    length: SampleCnt,
    amplitude: Mutex<f32>,
}

impl StubRegion {
    pub fn new(source: SourceHandle, start: SamplePos, length: SampleCnt) -> Self {
        Self {
            source,
            start,
            length,
            amplitude: Mutex::new(1.0),
        }
    }

    pub fn set_amplitude(&self, amplitude: f32) {
        *self.amplitude.lock().unwrap() = amplitude;
    }
}

impl AudioRegion for StubRegion {
    fn source(&self, _channel: u32) -> SourceHandle {
        self.source.clone()
    }

    fn start(&self) -> SamplePos {
        self.start
    }

    fn length(&self) -> SampleCnt {
        self.length
    }

    fn scale_amplitude(&self) -> f32 {
        *self.amplitude.lock().unwrap()
    }

    fn name(&self) -> String {
        String::from("stub-region")
    }
}

/// Canvas double: fixed visible area, pure-translation transform,
/// counted redraw requests.
pub(crate) struct StubCanvas {
    pub visible_width: f64,
    pub origin: (f64, f64),
    pub redraws: AtomicUsize,
}

impl StubCanvas {
    pub fn new() -> Self {
        Self {
            visible_width: 500.0,
            origin: (0.0, 0.0),
            redraws: AtomicUsize::new(0),
        }
    }

    pub fn redraw_count(&self) -> usize {
        self.redraws.load(Ordering::SeqCst)
    }
}

impl Canvas for StubCanvas {
    fn visible_area(&self) -> Rect {
        Rect::new(0.0, 0.0, self.visible_width, 400.0)
    }

    fn item_to_window(&self, r: Rect) -> Rect {
        Rect::new(
            r.x0 + self.origin.0,
            r.y0 + self.origin.1,
            r.x1 + self.origin.0,
            r.y1 + self.origin.1,
        )
    }

    fn window_to_item(&self, r: Rect) -> Rect {
        Rect::new(
            r.x0 - self.origin.0,
            r.y0 - self.origin.1,
            r.x1 - self.origin.0,
            r.y1 - self.origin.1,
        )
    }

    fn request_redraw(&self) {
        self.redraws.fetch_add(1, Ordering::SeqCst);
    }
}

/// Poll `condition` until it holds or five seconds pass.
pub(crate) fn wait_until(condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    false
}
