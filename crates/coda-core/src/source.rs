//! Audio source access for display code
//!
//! The display layer never touches raw sample data; it reads
//! pre-reduced min/max peaks from an [`AudioSource`] at a given
//! samples-per-pixel density. Sources are shared-ownership objects
//! whose identity (not contents) keys the image cache, so the handle
//! type compares and hashes by pointer.

use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};

use thiserror::Error;

use crate::types::{PeakData, SampleCnt, SamplePos};

/// Errors that can occur while reading peak data from a source.
#[derive(Error, Debug)]
pub enum PeakReadError {
    /// The source's backing data is gone (file removed, track unloaded)
    #[error("audio source is unavailable: {0}")]
    Unavailable(String),

    /// Reading the peak data failed
    #[error("failed to read peaks: {0}")]
    Io(String),
}

/// Result type for peak reads
pub type PeakResult<T> = Result<T, PeakReadError>;

/// One channel of an immutable audio source, read as peaks.
///
/// Implementations block in `read_peaks`; the display layer only calls
/// it from its background render thread.
pub trait AudioSource: Send + Sync {
    /// Fill `dest` with min/max pairs covering `count` samples starting
    /// at `start`, reduced at `samples_per_pixel` density. One pair is
    /// produced per element of `dest`.
    fn read_peaks(
        &self,
        dest: &mut [PeakData],
        start: SamplePos,
        count: SampleCnt,
        channel: u32,
        samples_per_pixel: f64,
    ) -> PeakResult<()>;
}

/// Shared handle to an audio source.
///
/// Equality and hashing are pointer identity: two handles are equal
/// iff they refer to the same source object. Anything holding a
/// `SourceHandle` keeps the source alive.
#[derive(Clone)]
pub struct SourceHandle(Arc<dyn AudioSource>);

impl SourceHandle {
    pub fn new(source: Arc<dyn AudioSource>) -> Self {
        Self(source)
    }

    /// Stable identity token for this source, usable as a map key or
    /// in log output. Valid only while some handle is alive.
    pub fn id(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }

    pub fn downgrade(&self) -> WeakSourceHandle {
        WeakSourceHandle(Arc::downgrade(&self.0))
    }

    pub fn read_peaks(
        &self,
        dest: &mut [PeakData],
        start: SamplePos,
        count: SampleCnt,
        channel: u32,
        samples_per_pixel: f64,
    ) -> PeakResult<()> {
        self.0.read_peaks(dest, start, count, channel, samples_per_pixel)
    }
}

impl PartialEq for SourceHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for SourceHandle {}

impl Hash for SourceHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl std::fmt::Debug for SourceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SourceHandle({:#x})", self.id())
    }
}

/// Weak counterpart of [`SourceHandle`]; held by queued render
/// requests so the queue never extends source lifetime.
#[derive(Clone)]
pub struct WeakSourceHandle(Weak<dyn AudioSource>);

impl WeakSourceHandle {
    pub fn upgrade(&self) -> Option<SourceHandle> {
        self.0.upgrade().map(SourceHandle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullSource;

    impl AudioSource for NullSource {
        fn read_peaks(
            &self,
            dest: &mut [PeakData],
            _start: SamplePos,
            _count: SampleCnt,
            _channel: u32,
            _samples_per_pixel: f64,
        ) -> PeakResult<()> {
            dest.fill(PeakData::default());
            Ok(())
        }
    }

    #[test]
    fn handles_compare_by_identity() {
        let a = SourceHandle::new(Arc::new(NullSource));
        let b = SourceHandle::new(Arc::new(NullSource));
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn weak_handle_drops_with_source() {
        let a = SourceHandle::new(Arc::new(NullSource));
        let weak = a.downgrade();
        assert!(weak.upgrade().is_some());
        drop(a);
        assert!(weak.upgrade().is_none());
    }
}
