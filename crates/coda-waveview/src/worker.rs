//! Background waveform rendering
//!
//! A single render thread services draw requests so peak reads and
//! pixel composition never block the GUI thread. The queue is a set
//! of requestor identities, not a list of requests: each view has at
//! most one outstanding request, and the worker reads the view's
//! current request at dequeue time, so re-enqueueing silently
//! supersedes whatever was pending.
//!
//! Cancellation is advisory. The view flips the request's atomic flag
//! (on a property change, on supersede, on destruction) and the worker
//! polls it on entry and at the composer's checkpoints; a cancelled
//! request produces no image and no notification.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use coda_core::source::WeakSourceHandle;
use coda_core::types::{PeakData, SampleCnt, SamplePos};

use crate::compose::render_peaks;
use crate::image::WaveImage;
use crate::service::Notification;
use crate::style::RenderStyle;

const QUEUE_LOCK: &str = "render queue lock";
const OUTPUT_LOCK: &str = "render request output lock";

/// Identity of a waveform view, used as the request-queue key and in
/// completion notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ViewId(pub(crate) u64);

impl std::fmt::Display for ViewId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "view#{}", self.0)
    }
}

/// What a queued request asks of the render thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Render an image
    Draw,
    /// Placeholder for a superseded request; nothing to do
    Cancel,
    /// Stop the render thread
    Quit,
}

/// Advisory cancellation flag shared between a view and the render
/// thread. A single atomic word; polled, never waited on.
#[derive(Debug, Default)]
pub struct CancelFlag(AtomicBool);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A render request, jointly owned by the originating view's queue
/// slot and (briefly) the render thread.
pub(crate) struct RenderRequest {
    pub kind: RequestKind,
    pub view: ViewId,
    /// Weak so a queued request never extends source lifetime
    pub source: WeakSourceHandle,
    pub start: SamplePos,
    pub end: SamplePos,
    /// Visible canvas width in pixels; the rendered image spans about
    /// twice this
    pub visual_width: f64,
    pub samples_per_pixel: f64,
    pub channel: u32,
    pub amplitude: f32,
    pub region_start: SamplePos,
    pub region_end: SamplePos,
    pub style: RenderStyle,
    pub cancel: CancelFlag,
    pub output: Mutex<Option<RequestOutput>>,
}

/// The worker's result, written once when a render completes.
pub(crate) struct RequestOutput {
    pub image: Arc<WaveImage>,
    /// Sample range the image actually covers
    pub start: SamplePos,
    pub end: SamplePos,
    /// Blit offset in pixels from the region origin
    pub offset: f64,
}

impl RenderRequest {
    pub fn cancel(&self) {
        self.cancel.set();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_set()
    }
}

pub(crate) struct QueueState {
    pub queue: BTreeSet<ViewId>,
    pub requests: HashMap<ViewId, Arc<RenderRequest>>,
    pub should_quit: bool,
}

/// The request queue: one mutex guards the requestor set, every
/// view's current request, and the quit flag; the condition variable
/// wakes the render thread.
pub(crate) struct RequestQueue {
    pub state: Mutex<QueueState>,
    pub cond: Condvar,
}

impl RequestQueue {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                queue: BTreeSet::new(),
                requests: HashMap::new(),
                should_quit: false,
            }),
            cond: Condvar::new(),
        }
    }

    /// Store `req` as its view's current request and enqueue the view.
    /// Supersedes (and cancels) any previous request of the same view.
    /// Never blocks on the render thread.
    pub fn send(&self, req: Arc<RenderRequest>) {
        {
            let mut state = self.state.lock().expect(QUEUE_LOCK);
            if req.kind == RequestKind::Draw {
                if let Some(old) = state.requests.get(&req.view) {
                    /* stop any long-lived render of the old request */
                    old.cancel();
                }
            }
            let view = req.view;
            state.requests.insert(view, req);
            state.queue.insert(view);
        }
        self.cond.notify_one();
    }

    /// Cancel and drop a view's outstanding request and remove the
    /// view from the queue, so the worker never observes the view
    /// after this returns.
    pub fn cancel_view(&self, view: ViewId) {
        let mut state = self.state.lock().expect(QUEUE_LOCK);
        if let Some(req) = state.requests.get(&view) {
            req.cancel();
        }
        state.queue.remove(&view);
        state.requests.remove(&view);
    }

    /// Ask the render thread to exit; the caller joins afterwards.
    pub fn shutdown(&self) {
        self.state.lock().expect(QUEUE_LOCK).should_quit = true;
        self.cond.notify_all();
    }
}

/// Start the render thread.
pub(crate) fn spawn(queue: Arc<RequestQueue>, notify: Sender<Notification>) -> JoinHandle<()> {
    thread::Builder::new()
        .name("waveview-render".to_string())
        .spawn(move || render_thread(queue, notify))
        .expect("failed to spawn waveform render thread")
}

fn render_thread(queue: Arc<RequestQueue>, notify: Sender<Notification>) {
    log::debug!("waveform render thread starting");

    let mut failed_sources: HashSet<usize> = HashSet::new();
    let mut state = queue.state.lock().expect(QUEUE_LOCK);

    loop {
        while !state.should_quit && state.queue.is_empty() {
            state = queue.cond.wait(state).expect(QUEUE_LOCK);
        }
        if state.should_quit {
            break;
        }

        let Some(view) = state.queue.pop_first() else {
            continue;
        };

        /* snapshot the view's current request at dequeue time; the
         * request present at enqueue time may have been superseded */
        let request = state.requests.get(&view).cloned();
        drop(state);

        if let Some(req) = request {
            match req.kind {
                RequestKind::Draw => generate(&req, &notify, &mut failed_sources),
                RequestKind::Cancel => {}
                RequestKind::Quit => {
                    queue.state.lock().expect(QUEUE_LOCK).should_quit = true;
                }
            }
        }

        state = queue.state.lock().expect(QUEUE_LOCK);
    }

    log::debug!("waveform render thread shutting down");
}

/// Produce an image for one draw request.
///
/// The image spans about twice the visible width, centred on the
/// requested range, clamped to the region bounds; the range actually
/// used is recorded back onto the request.
fn generate(
    req: &Arc<RenderRequest>,
    notify: &Sender<Notification>,
    failed_sources: &mut HashSet<usize>,
) {
    if req.is_cancelled() {
        return;
    }

    let Some(source) = req.source.upgrade() else {
        log::debug!("render request for {} dropped: source is gone", req.view);
        return;
    };

    let spp = req.samples_per_pixel;
    debug_assert!(spp > 0.0, "render request with zero samples-per-pixel");
    if spp <= 0.0 {
        return;
    }

    let center = req.start + (req.end - req.start) / 2;
    let image_samples = (req.visual_width * spp) as SampleCnt;
    let sample_start = req.region_start.max(center - image_samples);
    let sample_end = req.region_end.min(center + image_samples);

    let n_peaks = ((sample_end - sample_start) as f64 / spp).round() as usize;
    if n_peaks == 0 {
        return;
    }

    let started = Instant::now();

    let mut peaks = vec![PeakData::default(); n_peaks];
    if let Err(e) = source.read_peaks(
        &mut peaks,
        sample_start,
        sample_end - sample_start,
        req.channel,
        spp,
    ) {
        /* no image; the view stays blank and retries on its next
         * render or property change */
        if failed_sources.insert(source.id()) {
            log::warn!("peak read failed for source {:#x}: {}", source.id(), e);
        }
        return;
    }

    if req.amplitude != 1.0 {
        for peak in &mut peaks {
            *peak = peak.scaled(req.amplitude);
        }
    }

    match render_peaks(&peaks, &req.style, &req.cancel) {
        Ok(Some(image)) => {
            if req.is_cancelled() {
                return;
            }
            let offset = (sample_start - req.region_start) as f64 / spp;
            *req.output.lock().expect(OUTPUT_LOCK) = Some(RequestOutput {
                image: Arc::new(image),
                start: sample_start,
                end: sample_end,
                offset,
            });
            log::debug!(
                "rendered {} peaks for {} in {:?} ({} .. {})",
                n_peaks,
                req.view,
                started.elapsed(),
                sample_start,
                sample_end
            );
            let _ = notify.send(Notification::ImageReady(req.view));
        }
        Ok(None) => {
            /* cancelled at a checkpoint; discard silently */
        }
        Err(e) => {
            log::warn!("waveform render failed for {}: {}", req.view, e);
            req.output.lock().expect(OUTPUT_LOCK).take();
        }
    }
}
