//! Asynchronous waveform rendering and caching for the Coda timeline
//!
//! Painting a waveform must never block the GUI thread, so this crate
//! splits the work in two: views translate paint requests into sample
//! ranges and blit pre-rendered images, while a single background
//! thread turns peak data into images. Finished images live in a
//! process-wide cache keyed by source identity plus the visual
//! parameters baked into their pixels.
//!
//! ## Architecture
//!
//! - [`WaveRenderService`]: the shared subsystem handle — image
//!   cache, request queue, render thread, global style properties and
//!   the notification channel the GUI thread drains
//! - [`WaveView`]: per-displayed-region state; translates window
//!   rectangles to sample ranges, consults the cache, queues render
//!   requests and produces [`Blit`]s
//! - [`compose::render_peaks`]: the deterministic peak-to-pixel
//!   function (masks, clip indicators, log scaling, gradient)
//!
//! ## Usage
//!
//! ```ignore
//! let service = WaveRenderService::with_config(config);
//! let mut view = WaveView::new(service.clone(), canvas, region);
//! view.set_samples_per_pixel(256.0);
//!
//! // in the paint handler:
//! if let Some(blit) = view.render(dirty_rect) {
//!     frame.draw_image(&blit);
//! }
//!
//! // in the tick handler:
//! while let Some(note) = service.try_recv() {
//!     match note {
//!         Notification::ImageReady(id) => views[&id].image_ready(),
//!         Notification::VisualPropertiesChanged => {
//!             views.values_mut().for_each(|v| v.handle_visual_property_change())
//!         }
//!         Notification::ClipLevelChanged => {
//!             views.values_mut().for_each(|v| v.handle_clip_level_change())
//!         }
//!     }
//! }
//! ```

mod cache;
mod color;
pub mod compose;
mod image;
mod service;
mod style;
mod view;
mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::{VisualKey, CACHE_HIGH_WATER};
pub use color::Color;
pub use image::{ImageError, WaveImage};
pub use service::{Notification, WaveRenderService};
pub use style::{GlobalVisuals, RenderStyle, Shape, WaveViewConfig, DEFAULT_CLIP_LEVEL};
pub use view::{Blit, Canvas, WaveView};
pub use worker::{CancelFlag, RequestKind, ViewId};
