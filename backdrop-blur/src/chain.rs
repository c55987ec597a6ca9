//! Render target chains and their cache.
//!
//! ## Usage
//!
//! Keep the intermediate surfaces of recent blur sizes alive across frames.
//!
//! A chain for `(iterations, width, height)` holds `iterations + 1` levels.
//! Level 0 has the base size and each following level halves both dimensions,
//! never going below one pixel. Chains are cached in a small LRU map so that
//! several differently sized blur regions in the same frame do not rebuild
//! each other's targets.

use std::num::NonZeroUsize;

use lru::LruCache;
use smallvec::SmallVec;
use tracing::debug;

use crate::{backend::GpuBackend, error::BlurError, surface::Surface};

/// Identity of a render target chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChainKey {
    /// Number of downsample steps.
    pub iterations: u32,
    /// Level 0 width.
    pub width: u32,
    /// Level 0 height.
    pub height: u32,
}

impl ChainKey {
    /// Creates a key.
    pub fn new(iterations: u32, width: u32, height: u32) -> Self {
        Self {
            iterations,
            width,
            height,
        }
    }

    /// Returns the number of levels a chain with this key holds.
    pub fn level_count(&self) -> usize {
        self.iterations as usize + 1
    }

    /// Returns the size of `level`.
    pub fn level_extent(&self, level: u32) -> (u32, u32) {
        let halve = |value: u32| value.checked_shr(level).unwrap_or(0).max(1);
        (halve(self.width), halve(self.height))
    }
}

/// Levels of progressively smaller surfaces.
pub struct RenderTargetChain<B: GpuBackend> {
    key: ChainKey,
    levels: SmallVec<[Surface<B>; 8]>,
}

impl<B: GpuBackend> RenderTargetChain<B> {
    /// Allocates every level for `key`.
    ///
    /// On failure the levels created so far are released and nothing is returned.
    pub fn build(backend: &mut B, key: ChainKey) -> Result<Self, BlurError> {
        let mut levels = SmallVec::with_capacity(key.level_count());
        for level in 0..=key.iterations {
            let (width, height) = key.level_extent(level);
            match Surface::create(backend, width, height) {
                Ok(surface) => levels.push(surface),
                Err(err) => {
                    debug!("Chain {key:?} failed at level {level}: {err}");
                    for surface in levels {
                        Surface::release(surface, backend);
                    }
                    return Err(BlurError::Backend(err));
                }
            }
        }
        Ok(Self { key, levels })
    }

    /// Returns the chain key.
    pub fn key(&self) -> ChainKey {
        self.key
    }

    /// Returns every level, base first.
    pub fn levels(&self) -> &[Surface<B>] {
        &self.levels
    }

    /// Returns `level`, if present.
    pub fn level(&self, level: usize) -> Option<&Surface<B>> {
        self.levels.get(level)
    }

    /// Returns the number of levels.
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// Returns `true` when the chain has no levels.
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Returns `true` when every level exists with the size its key demands.
    pub fn is_complete(&self) -> bool {
        self.levels.len() == self.key.level_count()
            && self
                .levels
                .iter()
                .zip(0..)
                .all(|(surface, level)| surface.extent() == self.key.level_extent(level))
    }

    /// Releases every level.
    pub fn release(self, backend: &mut B) {
        for surface in self.levels {
            surface.release(backend);
        }
    }
}

/// LRU cache of render target chains.
pub struct ChainCache<B: GpuBackend> {
    chains: LruCache<ChainKey, RenderTargetChain<B>>,
    rebuilds: u64,
}

impl<B: GpuBackend> ChainCache<B> {
    /// Creates a cache holding up to `capacity` chains.
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            chains: LruCache::new(capacity),
            rebuilds: 0,
        }
    }

    /// Returns the chain for `key`, building it on a miss.
    ///
    /// A hit makes no backend calls. A miss counts one rebuild and may release
    /// the least recently used chain to make room.
    pub fn ensure(
        &mut self,
        backend: &mut B,
        key: ChainKey,
    ) -> Result<&RenderTargetChain<B>, BlurError> {
        if !self.chains.contains(&key) {
            let chain = RenderTargetChain::build(backend, key)?;
            self.rebuilds += 1;
            debug!(
                "Built render target chain {key:?} with {} levels",
                chain.len()
            );
            if let Some((evicted, chain)) = self.chains.push(key, chain) {
                debug!("Evicted render target chain {evicted:?}");
                chain.release(backend);
            }
        }
        self.chains
            .get(&key)
            .ok_or(BlurError::ChainUnavailable(key))
    }

    /// Returns the cached chain for `key` without touching recency.
    pub fn peek(&self, key: &ChainKey) -> Option<&RenderTargetChain<B>> {
        self.chains.peek(key)
    }

    /// Returns how many chains have been built so far.
    pub fn rebuilds(&self) -> u64 {
        self.rebuilds
    }

    /// Returns the number of cached chains.
    pub fn len(&self) -> usize {
        self.chains.len()
    }

    /// Returns `true` when no chain is cached.
    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }

    /// Returns the maximum number of cached chains.
    pub fn capacity(&self) -> usize {
        self.chains.cap().get()
    }

    /// Releases every cached chain.
    pub fn clear(&mut self, backend: &mut B) {
        while let Some((_, chain)) = self.chains.pop_lru() {
            chain.release(backend);
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::testing::SoftBackend;

    fn cache(capacity: usize) -> ChainCache<SoftBackend> {
        ChainCache::new(NonZeroUsize::new(capacity).unwrap())
    }

    #[test]
    fn test_level_sizes_for_800x600() {
        let mut backend = SoftBackend::new();
        let mut cache = cache(1);
        let chain = cache
            .ensure(&mut backend, ChainKey::new(3, 800, 600))
            .unwrap();
        let sizes: Vec<_> = chain.levels().iter().map(Surface::extent).collect();
        assert_eq!(sizes, vec![(800, 600), (400, 300), (200, 150), (100, 75)]);
        assert!(chain.is_complete());
    }

    #[test]
    fn test_levels_clamp_to_one_pixel() {
        let key = ChainKey::new(12, 640, 3);
        assert_eq!(key.level_extent(2), (160, 1));
        assert_eq!(key.level_extent(12), (1, 1));
        assert_eq!(key.level_extent(40), (1, 1));
    }

    #[test]
    fn test_hit_makes_no_backend_calls() {
        let mut backend = SoftBackend::new();
        let mut cache = cache(1);
        let key = ChainKey::new(2, 64, 64);
        cache.ensure(&mut backend, key).unwrap();
        backend.clear_calls();
        cache.ensure(&mut backend, key).unwrap();
        assert!(backend.calls().is_empty());
        assert_eq!(cache.rebuilds(), 1);
    }

    #[test]
    fn test_single_slot_replaces_chain() {
        let mut backend = SoftBackend::new();
        let mut cache = cache(1);
        cache
            .ensure(&mut backend, ChainKey::new(2, 64, 64))
            .unwrap();
        assert_eq!(backend.live_textures(), 3);
        cache
            .ensure(&mut backend, ChainKey::new(1, 32, 32))
            .unwrap();
        assert_eq!(backend.live_textures(), 2);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.rebuilds(), 2);
    }

    #[test]
    fn test_lru_eviction_keeps_recent_chains() {
        let mut backend = SoftBackend::new();
        let mut cache = cache(2);
        let a = ChainKey::new(1, 100, 100);
        let b = ChainKey::new(1, 50, 50);
        let c = ChainKey::new(1, 25, 25);
        cache.ensure(&mut backend, a).unwrap();
        cache.ensure(&mut backend, b).unwrap();
        // Touch `a` so `b` becomes the eviction candidate.
        cache.ensure(&mut backend, a).unwrap();
        cache.ensure(&mut backend, c).unwrap();

        assert!(cache.peek(&a).is_some());
        assert!(cache.peek(&b).is_none());
        assert!(cache.peek(&c).is_some());
        assert_eq!(cache.rebuilds(), 3);
        assert_eq!(backend.live_textures(), 4);
    }

    #[test]
    fn test_failed_build_releases_partial_levels() {
        let mut backend = SoftBackend::new();
        backend.fail_textures_after(Some(2));
        let mut cache = cache(1);
        let result = cache.ensure(&mut backend, ChainKey::new(3, 64, 64));
        assert!(result.is_err());
        assert_eq!(backend.live_textures(), 0);
        assert!(cache.is_empty());
        assert_eq!(cache.rebuilds(), 0);

        // The next request retries.
        backend.fail_textures_after(None);
        assert!(cache.ensure(&mut backend, ChainKey::new(3, 64, 64)).is_ok());
        assert_eq!(cache.rebuilds(), 1);
    }

    #[test]
    fn test_clear_releases_everything() {
        let mut backend = SoftBackend::new();
        let mut cache = cache(3);
        cache
            .ensure(&mut backend, ChainKey::new(1, 10, 10))
            .unwrap();
        cache
            .ensure(&mut backend, ChainKey::new(2, 10, 10))
            .unwrap();
        cache.clear(&mut backend);
        assert!(cache.is_empty());
        assert_eq!(backend.live_textures(), 0);
    }

    proptest! {
        #[test]
        fn prop_same_key_rebuilds_once(iterations in 1u32..6, width in 1u32..512, height in 1u32..512) {
            let mut backend = SoftBackend::new();
            let mut cache = cache(1);
            let key = ChainKey::new(iterations, width, height);
            cache.ensure(&mut backend, key).unwrap();
            cache.ensure(&mut backend, key).unwrap();
            prop_assert_eq!(cache.rebuilds(), 1);
        }

        #[test]
        fn prop_new_key_rebuilds_fully(
            iterations in 1u32..6,
            width in 1u32..512,
            height in 1u32..512,
            other in 0usize..3,
        ) {
            let mut backend = SoftBackend::new();
            let mut cache = cache(1);
            let first = ChainKey::new(iterations, width, height);
            let mut second = first;
            match other {
                0 => second.iterations += 1,
                1 => second.width += 1,
                _ => second.height += 1,
            }
            cache.ensure(&mut backend, first).unwrap();
            let chain = cache.ensure(&mut backend, second).unwrap();
            prop_assert_eq!(chain.len(), second.iterations as usize + 1);
            for (level, surface) in chain.levels().iter().enumerate() {
                let divisor = 1u32 << level;
                let expected = ((second.width / divisor).max(1), (second.height / divisor).max(1));
                prop_assert_eq!(surface.extent(), expected);
            }
            prop_assert_eq!(cache.rebuilds(), 2);
        }
    }
}
