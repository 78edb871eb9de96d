//! Process-wide waveform image cache
//!
//! Rendered images are keyed by audio source identity plus the visual
//! parameters that change their pixels' meaning: channel, height,
//! amplitude scale and fill color. Per source the entries form an
//! insertion-ordered list; insertion order is eviction order. After a
//! consolidation pass no entry in a (source, key) group is fully
//! contained by another, and each group is trimmed FIFO once it grows
//! past the high-water mark.
//!
//! The cache itself is not synchronized; the render service wraps it
//! in its cache lock.

use std::collections::HashMap;
use std::sync::Arc;

use coda_core::source::SourceHandle;
use coda_core::types::SamplePos;

use crate::color::Color;
use crate::image::WaveImage;

/// Retained entries per (source, visual key) group before FIFO
/// trimming kicks in.
pub const CACHE_HIGH_WATER: usize = 2;

/// The visual parameters that participate in cache equality and
/// invalidation.
#[derive(Debug, Clone, PartialEq)]
pub struct VisualKey {
    pub channel: u32,
    pub height: u32,
    pub amplitude: f32,
    pub fill_color: Color,
}

/// One cached image and the sample range it covers.
#[derive(Debug, Clone)]
pub(crate) struct CacheEntry {
    pub key: VisualKey,
    pub start: SamplePos,
    pub end: SamplePos,
    pub image: Arc<WaveImage>,
}

#[derive(Default)]
pub(crate) struct ImageCache {
    entries: HashMap<SourceHandle, Vec<CacheEntry>>,
}

impl ImageCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// First entry whose key matches and whose range encloses the
    /// query; returns the image and its blit offset in pixels from the
    /// region origin.
    pub fn lookup(
        &self,
        source: &SourceHandle,
        key: &VisualKey,
        start: SamplePos,
        end: SamplePos,
        region_start: SamplePos,
        samples_per_pixel: f64,
    ) -> Option<(Arc<WaveImage>, f64)> {
        let entries = self.entries.get(source)?;

        for entry in entries {
            if entry.key != *key {
                continue;
            }
            /* an entry's zoom level is implied by its range width and
             * image width; a mismatch means it was rendered for a
             * different samples-per-pixel */
            let implied_width =
                ((entry.end - entry.start) as f64 / samples_per_pixel).round() as u32;
            if implied_width != entry.image.width() {
                continue;
            }
            if start >= entry.start && end <= entry.end {
                let offset = (entry.start - region_start) as f64 / samples_per_pixel;
                return Some((entry.image.clone(), offset));
            }
        }

        None
    }

    /// Append an entry to the tail of the per-source list. Does not
    /// evict; callers run `consolidate` next.
    pub fn insert(&mut self, source: &SourceHandle, entry: CacheEntry) {
        self.entries.entry(source.clone()).or_default().push(entry);
    }

    /// Remove entries of the given group that are fully contained by
    /// another, then trim the per-source list FIFO while the group
    /// exceeds the high-water mark plus the other-key entry count.
    pub fn consolidate(&mut self, source: &SourceHandle, key: &VisualKey) {
        let Some(entries) = self.entries.get_mut(source) else {
            return;
        };

        let mut i = 0;
        while i < entries.len() {
            if entries[i].key != *key {
                i += 1;
                continue;
            }
            let (start, end) = (entries[i].start, entries[i].end);

            /* check all later entries for subsets of this range */
            let mut j = i + 1;
            while j < entries.len() {
                if entries[j].key == *key && entries[j].start >= start && entries[j].end <= end {
                    entries.remove(j);
                } else {
                    j += 1;
                }
            }
            i += 1;
        }

        loop {
            let in_group = entries.iter().filter(|e| e.key == *key).count();
            let other = entries.len() - in_group;
            if in_group <= CACHE_HIGH_WATER + other {
                break;
            }
            /* drop the least-recently added entry, whatever its key */
            entries.remove(0);
        }

        if entries.is_empty() {
            self.entries.remove(source);
        }
    }

    /// Drop every entry of the given group. Entries with other keys
    /// may be in active use elsewhere and are preserved.
    pub fn invalidate(&mut self, source: &SourceHandle, key: &VisualKey) {
        let Some(entries) = self.entries.get_mut(source) else {
            return;
        };

        entries.retain(|e| e.key != *key);

        if entries.is_empty() {
            self.entries.remove(source);
        }
    }

    #[cfg(test)]
    pub fn group_len(&self, source: &SourceHandle, key: &VisualKey) -> usize {
        self.entries
            .get(source)
            .map(|v| v.iter().filter(|e| e.key == *key).count())
            .unwrap_or(0)
    }

    #[cfg(test)]
    pub fn source_len(&self, source: &SourceHandle) -> usize {
        self.entries.get(source).map(Vec::len).unwrap_or(0)
    }

    #[cfg(test)]
    pub fn has_source(&self, source: &SourceHandle) -> bool {
        self.entries.contains_key(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_source;

    fn key(height: u32) -> VisualKey {
        VisualKey {
            channel: 0,
            height,
            amplitude: 1.0,
            fill_color: Color::from_rgb(0.2, 0.4, 0.8),
        }
    }

    // images sized for the samples-per-pixel of 100.0 the tests use
    fn entry(key: VisualKey, start: SamplePos, end: SamplePos) -> CacheEntry {
        let width = ((end - start) as f64 / 100.0).round() as u32;
        CacheEntry {
            key,
            start,
            end,
            image: Arc::new(WaveImage::try_new(width, 4).unwrap()),
        }
    }

    #[test]
    fn lookup_requires_enclosing_range_and_matching_key() {
        let source = test_source();
        let mut cache = ImageCache::new();
        cache.insert(&source, entry(key(64), 1_000, 9_000));

        assert!(cache.lookup(&source, &key(64), 2_000, 8_000, 0, 100.0).is_some());
        assert!(cache.lookup(&source, &key(64), 500, 8_000, 0, 100.0).is_none());
        assert!(cache.lookup(&source, &key(64), 2_000, 9_500, 0, 100.0).is_none());
        assert!(cache.lookup(&source, &key(32), 2_000, 8_000, 0, 100.0).is_none());
    }

    #[test]
    fn lookup_reports_offset_from_region_origin() {
        let source = test_source();
        let mut cache = ImageCache::new();
        cache.insert(&source, entry(key(64), 4_000, 20_000));

        let (_, offset) = cache
            .lookup(&source, &key(64), 5_000, 15_000, 1_000, 100.0)
            .unwrap();
        assert_eq!(offset, (4_000 - 1_000) as f64 / 100.0);
    }

    #[test]
    fn lookup_skips_entries_rendered_at_another_zoom() {
        let source = test_source();
        let mut cache = ImageCache::new();
        cache.insert(&source, entry(key(64), 0, 20_000));

        assert!(cache.lookup(&source, &key(64), 2_000, 8_000, 0, 100.0).is_some());
        // same key and range, but the image was built for spp = 100
        assert!(cache.lookup(&source, &key(64), 2_000, 8_000, 0, 50.0).is_none());
    }

    #[test]
    fn consolidate_removes_contained_ranges() {
        let source = test_source();
        let mut cache = ImageCache::new();
        cache.insert(&source, entry(key(64), 0, 20_000));
        cache.insert(&source, entry(key(64), 5_000, 15_000));
        cache.consolidate(&source, &key(64));

        assert_eq!(cache.group_len(&source, &key(64)), 1);
        // the surviving entry is the enclosing one
        assert!(cache.lookup(&source, &key(64), 0, 20_000, 0, 100.0).is_some());
    }

    #[test]
    fn consolidate_keeps_overlapping_but_not_nested_ranges() {
        let source = test_source();
        let mut cache = ImageCache::new();
        cache.insert(&source, entry(key(64), 0, 10_000));
        cache.insert(&source, entry(key(64), 5_000, 15_000));
        cache.consolidate(&source, &key(64));

        assert_eq!(cache.group_len(&source, &key(64)), 2);
    }

    #[test]
    fn consolidate_ignores_subsets_under_other_keys() {
        let source = test_source();
        let mut cache = ImageCache::new();
        cache.insert(&source, entry(key(64), 0, 20_000));
        cache.insert(&source, entry(key(32), 5_000, 15_000));
        cache.consolidate(&source, &key(64));

        assert_eq!(cache.source_len(&source), 2);
    }

    #[test]
    fn fifo_trim_bounds_group_size() {
        let source = test_source();
        let mut cache = ImageCache::new();
        for i in 0..4 {
            let start = i * 10_000;
            cache.insert(&source, entry(key(64), start, start + 5_000));
            cache.consolidate(&source, &key(64));
        }

        assert_eq!(cache.group_len(&source, &key(64)), CACHE_HIGH_WATER);
        // the survivors are the two newest, disjoint ranges
        assert!(cache.lookup(&source, &key(64), 31_000, 34_000, 0, 100.0).is_some());
        assert!(cache.lookup(&source, &key(64), 1_000, 4_000, 0, 100.0).is_none());
    }

    #[test]
    fn entries_of_other_groups_survive_trimming() {
        let source = test_source();
        let mut cache = ImageCache::new();
        for (i, height) in [16u32, 32, 48, 64].iter().enumerate() {
            let start = i as SamplePos * 10_000;
            cache.insert(&source, entry(key(*height), start, start + 5_000));
            cache.consolidate(&source, &key(*height));
        }

        // four distinct keys: every group is within its own bound
        for height in [16u32, 32, 48, 64] {
            assert_eq!(cache.group_len(&source, &key(height)), 1);
        }
        assert_eq!(cache.source_len(&source), 4);
    }

    #[test]
    fn invalidate_preserves_other_keys() {
        let source = test_source();
        let mut cache = ImageCache::new();
        cache.insert(&source, entry(key(64), 0, 5_000));
        cache.insert(&source, entry(key(32), 0, 5_000));
        cache.invalidate(&source, &key(64));

        assert_eq!(cache.group_len(&source, &key(64)), 0);
        assert_eq!(cache.group_len(&source, &key(32)), 1);
    }

    #[test]
    fn emptied_source_lists_are_pruned() {
        let source = test_source();
        let mut cache = ImageCache::new();
        cache.insert(&source, entry(key(64), 0, 5_000));
        cache.invalidate(&source, &key(64));
        assert!(!cache.has_source(&source));
    }
}
