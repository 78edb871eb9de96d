//! The waveform render service
//!
//! One service value owns everything process-wide: the image cache,
//! the request queue and its render thread, the global visual
//! properties, and the notification channel the GUI thread drains.
//! It is created at startup and passed by shared handle to each view;
//! there are no free-standing globals, so tests get full isolation.
//!
//! ## Locking
//!
//! Two locks: the request-queue lock (also the condition variable's
//! mutex) and the cache lock. Where both are needed they are taken in
//! that order; the render thread never holds both at once.
//!
//! ## Notifications
//!
//! Completion and style-change signals cross threads over an mpsc
//! channel. The application drains it on the GUI thread (typically in
//! its tick handler) and routes `ImageReady` to the matching view; a
//! notification for a view that no longer exists is simply dropped at
//! the drain site.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use coda_core::db::db_to_coefficient;
use coda_core::source::SourceHandle;
use coda_core::types::SamplePos;

use crate::cache::{CacheEntry, ImageCache, VisualKey};
use crate::image::WaveImage;
use crate::style::{GlobalVisuals, Shape, WaveViewConfig};
use crate::worker::{self, RenderRequest, RequestQueue, ViewId};

const CACHE_LOCK: &str = "waveform cache lock";
const VISUALS_LOCK: &str = "waveform visuals lock";

/// Events delivered to the GUI thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    /// An asynchronous render finished for the given view
    ImageReady(ViewId),
    /// A global style property changed; views re-read the globals
    VisualPropertiesChanged,
    /// The clip threshold or clip-indicator toggle changed
    ClipLevelChanged,
}

/// Shared handle to the waveform rendering subsystem.
pub struct WaveRenderService {
    queue: Arc<RequestQueue>,
    cache: Mutex<ImageCache>,
    visuals: Mutex<GlobalVisuals>,
    defaults: WaveViewConfig,
    notify_tx: Sender<Notification>,
    notify_rx: Mutex<Receiver<Notification>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    next_view_id: AtomicU64,
}

impl WaveRenderService {
    /// Start the service with default configuration.
    pub fn spawn() -> Arc<Self> {
        Self::with_config(WaveViewConfig::default())
    }

    /// Start the service, seeding the global visual properties and
    /// per-view color defaults from `config`.
    pub fn with_config(config: WaveViewConfig) -> Arc<Self> {
        let queue = Arc::new(RequestQueue::new());
        let (notify_tx, notify_rx) = std::sync::mpsc::channel();
        let handle = worker::spawn(queue.clone(), notify_tx.clone());

        log::info!("waveform render service started");

        Arc::new(Self {
            queue,
            cache: Mutex::new(ImageCache::new()),
            visuals: Mutex::new(config.global_visuals()),
            defaults: config,
            notify_tx,
            notify_rx: Mutex::new(notify_rx),
            worker: Mutex::new(Some(handle)),
            next_view_id: AtomicU64::new(1),
        })
    }

    /// Stop the render thread and wait for it. Idempotent.
    pub fn shutdown(&self) {
        let handle = self.worker.lock().expect("render worker handle lock").take();
        if let Some(handle) = handle {
            self.queue.shutdown();
            if handle.join().is_err() {
                log::error!("waveform render thread panicked");
            } else {
                log::info!("waveform render service stopped");
            }
        }
    }

    /// Drain one pending notification, if any. Call from the GUI
    /// thread until it returns `None`.
    pub fn try_recv(&self) -> Option<Notification> {
        match self.notify_rx.lock().expect("notification receiver lock").try_recv() {
            Ok(notification) => Some(notification),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                log::error!("waveform notification channel disconnected");
                None
            }
        }
    }

    /// Per-view color defaults from the startup configuration.
    pub fn defaults(&self) -> &WaveViewConfig {
        &self.defaults
    }

    /// Snapshot of the global visual properties.
    pub fn globals(&self) -> GlobalVisuals {
        self.visuals.lock().expect(VISUALS_LOCK).clone()
    }

    pub fn set_global_shape(&self, shape: Shape) {
        let changed = {
            let mut visuals = self.visuals.lock().expect(VISUALS_LOCK);
            let changed = visuals.shape != shape;
            visuals.shape = shape;
            changed
        };
        if changed {
            let _ = self.notify_tx.send(Notification::VisualPropertiesChanged);
        }
    }

    pub fn set_global_logscaled(&self, logscaled: bool) {
        let changed = {
            let mut visuals = self.visuals.lock().expect(VISUALS_LOCK);
            let changed = visuals.logscaled != logscaled;
            visuals.logscaled = logscaled;
            changed
        };
        if changed {
            let _ = self.notify_tx.send(Notification::VisualPropertiesChanged);
        }
    }

    pub fn set_global_gradient_depth(&self, depth: f64) {
        let changed = {
            let mut visuals = self.visuals.lock().expect(VISUALS_LOCK);
            let changed = visuals.gradient_depth != depth;
            visuals.gradient_depth = depth;
            changed
        };
        if changed {
            let _ = self.notify_tx.send(Notification::VisualPropertiesChanged);
        }
    }

    pub fn set_global_show_waveform_clipping(&self, show: bool) {
        let changed = {
            let mut visuals = self.visuals.lock().expect(VISUALS_LOCK);
            let changed = visuals.show_waveform_clipping != show;
            visuals.show_waveform_clipping = show;
            changed
        };
        if changed {
            let _ = self.notify_tx.send(Notification::ClipLevelChanged);
        }
    }

    /// Set the clip threshold in dBFS.
    pub fn set_clip_level(&self, db: f32) {
        let clip_level = db_to_coefficient(db);
        let changed = {
            let mut visuals = self.visuals.lock().expect(VISUALS_LOCK);
            let changed = visuals.clip_level != clip_level;
            visuals.clip_level = clip_level;
            changed
        };
        if changed {
            let _ = self.notify_tx.send(Notification::ClipLevelChanged);
        }
    }

    pub(crate) fn allocate_view_id(&self) -> ViewId {
        ViewId(self.next_view_id.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) fn send_request(&self, req: Arc<RenderRequest>) {
        self.queue.send(req);
    }

    pub(crate) fn cancel_view_request(&self, view: ViewId) {
        self.queue.cancel_view(view);
    }

    /// If the view's outstanding request completed, publish its image
    /// to the cache (consolidating the group) and return it for
    /// adoption; in every case the view's request slot is dropped.
    ///
    /// Takes the queue lock then the cache lock.
    pub(crate) fn collect_request(
        &self,
        view: ViewId,
        source: &SourceHandle,
        key: &VisualKey,
    ) -> Option<(Arc<WaveImage>, f64)> {
        let mut state = self.queue.state.lock().expect("render queue lock");
        let mut cache = self.cache.lock().expect(CACHE_LOCK);

        let mut adopted = None;
        if let Some(req) = state.requests.get(&view) {
            if !req.is_cancelled() {
                if let Some(output) = req.output.lock().expect("render request output lock").as_ref()
                {
                    log::debug!(
                        "{}: publishing rendered image {} .. {}",
                        view,
                        output.start,
                        output.end
                    );
                    cache.insert(
                        source,
                        CacheEntry {
                            key: key.clone(),
                            start: output.start,
                            end: output.end,
                            image: output.image.clone(),
                        },
                    );
                    cache.consolidate(source, key);
                    adopted = Some((output.image.clone(), output.offset));
                }
            }
        }

        /* drop our handle on the current request */
        state.requests.remove(&view);

        adopted
    }

    pub(crate) fn lookup_image(
        &self,
        source: &SourceHandle,
        key: &VisualKey,
        start: SamplePos,
        end: SamplePos,
        region_start: SamplePos,
        samples_per_pixel: f64,
    ) -> Option<(Arc<WaveImage>, f64)> {
        self.cache
            .lock()
            .expect(CACHE_LOCK)
            .lookup(source, key, start, end, region_start, samples_per_pixel)
    }

    pub(crate) fn invalidate_group(&self, source: &SourceHandle, key: &VisualKey) {
        self.cache.lock().expect(CACHE_LOCK).invalidate(source, key);
    }

    #[cfg(test)]
    pub(crate) fn cache_group_len(&self, source: &SourceHandle, key: &VisualKey) -> usize {
        self.cache.lock().expect(CACHE_LOCK).group_len(source, key)
    }

    #[cfg(test)]
    pub(crate) fn queued_request(&self, view: ViewId) -> Option<Arc<RenderRequest>> {
        self.queue
            .state
            .lock()
            .expect("render queue lock")
            .requests
            .get(&view)
            .cloned()
    }
}

impl Drop for WaveRenderService {
    fn drop(&mut self) {
        self.shutdown();
    }
}
