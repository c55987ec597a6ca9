//! Two-generation parameter retirement.
//!
//! ## Usage
//!
//! Keep blur parameters alive until the deferred render step has used them.
//!
//! Parameters submitted during frame N are still readable throughout frame
//! N + 1 and are freed by the second [`DeferredParams::collect`] after their
//! submission. Handles are generational, so a handle outliving its entry reads
//! back as `None` instead of aliasing a newer submission.

use slotmap::{SlotMap, new_key_type};

use crate::params::BlurParameters;

new_key_type! {
    /// Handle to parameters scheduled by [`BackdropBlur::process`](crate::BackdropBlur::process).
    pub struct BlurHandle;
}

/// Arena of in-flight blur parameters.
#[derive(Default)]
pub struct DeferredParams {
    slots: SlotMap<BlurHandle, BlurParameters>,
    current: Vec<BlurHandle>,
    previous: Vec<BlurHandle>,
    freed: u64,
}

impl DeferredParams {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `params` in the current generation.
    pub fn submit(&mut self, params: BlurParameters) -> BlurHandle {
        let handle = self.slots.insert(params);
        self.current.push(handle);
        handle
    }

    /// Returns the parameters behind `handle` if they have not been freed.
    pub fn get(&self, handle: BlurHandle) -> Option<&BlurParameters> {
        self.slots.get(handle)
    }

    /// Frees the previous generation and retires the current one.
    ///
    /// Returns how many entries were freed.
    pub fn collect(&mut self) -> usize {
        let mut freed = 0;
        for handle in self.previous.drain(..) {
            if self.slots.remove(handle).is_some() {
                freed += 1;
            }
        }
        std::mem::swap(&mut self.previous, &mut self.current);
        self.current.clear();
        self.freed += freed as u64;
        freed
    }

    /// Returns the number of live entries.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Returns how many entries have been freed in total.
    pub fn freed(&self) -> u64 {
        self.freed
    }

    /// Drops every entry regardless of generation.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.current.clear();
        self.previous.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::BlurSettings;

    fn params(iterations: u32) -> BlurParameters {
        BlurParameters::new(BlurSettings::default().iterations(iterations), 16).unwrap()
    }

    #[test]
    fn test_survives_one_full_frame() {
        let mut store = DeferredParams::new();
        let handle = store.submit(params(1));

        assert_eq!(store.collect(), 0);
        assert_eq!(store.get(handle).map(BlurParameters::iterations), Some(1));

        assert_eq!(store.collect(), 1);
        assert!(store.get(handle).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_generations_over_many_frames() {
        let mut store = DeferredParams::new();
        let mut frames: Vec<Vec<BlurHandle>> = Vec::new();
        for frame in 0..6u32 {
            frames.push((0..=frame).map(|i| store.submit(params(i))).collect());
            let freed = store.collect();

            let expected = if frame == 0 { 0 } else { frame as usize };
            assert_eq!(freed, expected, "frame {frame}");

            for (age, handles) in frames.iter().rev().enumerate() {
                let alive = age < 1;
                for handle in handles {
                    assert_eq!(store.get(*handle).is_some(), alive, "frame {frame} age {age}");
                }
            }
        }
        assert_eq!(store.freed(), 15);
    }

    #[test]
    fn test_stale_handle_does_not_alias() {
        let mut store = DeferredParams::new();
        let old = store.submit(params(1));
        store.collect();
        store.collect();
        let new = store.submit(params(2));
        assert!(store.get(old).is_none());
        assert_eq!(store.get(new).map(BlurParameters::iterations), Some(2));
    }
}
