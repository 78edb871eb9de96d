//! Region model consumed by the display layer
//!
//! A region is a window onto an immutable audio source: a start
//! offset into the source, a length, and a gain factor. The display
//! layer reads these through a trait so that it never depends on the
//! session/engine crates; the application wires region change signals
//! (gain, resize) to the corresponding view methods.

use crate::source::SourceHandle;
use crate::types::{SampleCnt, SamplePos};

/// A view onto a span of an audio source, as displayed on the
/// timeline.
pub trait AudioRegion: Send + Sync {
    /// Handle for the source backing the given channel.
    fn source(&self, channel: u32) -> SourceHandle;

    /// Offset of the region into its source, in samples.
    fn start(&self) -> SamplePos;

    /// Length of the region, in samples.
    fn length(&self) -> SampleCnt;

    /// The region's own gain factor, applied to peak data before
    /// display.
    fn scale_amplitude(&self) -> f32;

    /// Name for log output.
    fn name(&self) -> String {
        String::from("region")
    }
}
