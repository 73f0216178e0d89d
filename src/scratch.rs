//! Scratch buffers for the intermediate Winograd tensors.
//!
//! Every stage allocates its output through a [`ScratchAllocator`] and
//! hands the consumed input back with [`ScratchAllocator::release`], so
//! nothing but the transformed filter outlives a `convolve` call.

use std::sync::{Mutex, PoisonError};

use tracing::trace;

use crate::error::Result;
use crate::tensor::F16x8;

/// Source of zero-filled lane buffers.
pub trait ScratchAllocator: Send + Sync {
    /// Zero-filled buffer of exactly `len` lanes.
    ///
    /// Allocation failure is reported, not aborted on.
    fn allocate(&self, len: usize) -> Result<Vec<F16x8>>;

    /// Returns a buffer the caller no longer needs.
    fn release(&self, buf: Vec<F16x8>) {
        drop(buf);
    }
}

/// Fresh heap allocation per request.
#[derive(Clone, Copy, Debug, Default)]
pub struct HeapAllocator;

impl ScratchAllocator for HeapAllocator {
    fn allocate(&self, len: usize) -> Result<Vec<F16x8>> {
        let mut buf = Vec::new();
        buf.try_reserve_exact(len)?;
        buf.resize(len, F16x8::ZERO);
        trace!(len, "scratch allocated");
        Ok(buf)
    }
}

/// Keeps released buffers and reuses the smallest one that fits.
///
/// After the first inference at a given shape, later calls allocate
/// nothing. Holds at most `max_cached` idle buffers.
#[derive(Debug)]
pub struct RecyclingAllocator {
    free: Mutex<Vec<Vec<F16x8>>>,
    max_cached: usize,
}

impl RecyclingAllocator {
    pub fn new(max_cached: usize) -> Self {
        Self {
            free: Mutex::new(Vec::new()),
            max_cached,
        }
    }

    /// Idle buffers currently held.
    pub fn cached(&self) -> usize {
        self.free.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl Default for RecyclingAllocator {
    fn default() -> Self {
        // one slot per scratch tensor a convolve call keeps alive at once
        Self::new(6)
    }
}

impl ScratchAllocator for RecyclingAllocator {
    fn allocate(&self, len: usize) -> Result<Vec<F16x8>> {
        let reused = {
            let mut free = self.free.lock().unwrap_or_else(PoisonError::into_inner);
            let best = free
                .iter()
                .enumerate()
                .filter(|(_, buf)| buf.capacity() >= len)
                .min_by_key(|(_, buf)| buf.capacity())
                .map(|(i, _)| i);
            best.map(|i| free.swap_remove(i))
        };

        match reused {
            Some(mut buf) => {
                buf.clear();
                buf.resize(len, F16x8::ZERO);
                trace!(len, capacity = buf.capacity(), "scratch reused");
                Ok(buf)
            }
            None => HeapAllocator.allocate(len),
        }
    }

    fn release(&self, buf: Vec<F16x8>) {
        let mut free = self.free.lock().unwrap_or_else(PoisonError::into_inner);
        if free.len() < self.max_cached {
            free.push(buf);
        }
    }
}

#[cfg(test)]
mod tests {
    use half::f16;

    use super::*;

    #[test]
    fn test_heap_allocation_is_zeroed() {
        let buf = HeapAllocator.allocate(37).unwrap();
        assert_eq!(buf.len(), 37);
        assert!(buf.iter().all(|v| *v == F16x8::ZERO));
    }

    #[test]
    fn test_recycled_buffer_is_rezeroed() {
        let alloc = RecyclingAllocator::new(2);
        let mut buf = alloc.allocate(64).unwrap();
        buf.fill(F16x8::splat(f16::ONE));
        let ptr = buf.as_ptr();
        alloc.release(buf);
        assert_eq!(alloc.cached(), 1);

        let again = alloc.allocate(48).unwrap();
        assert_eq!(again.as_ptr(), ptr);
        assert_eq!(again.len(), 48);
        assert!(again.iter().all(|v| *v == F16x8::ZERO));
        assert_eq!(alloc.cached(), 0);
    }

    #[test]
    fn test_picks_smallest_fitting_buffer() {
        let alloc = RecyclingAllocator::new(4);
        let big = alloc.allocate(1024).unwrap();
        let small = alloc.allocate(128).unwrap();
        let small_ptr = small.as_ptr();
        alloc.release(big);
        alloc.release(small);

        assert_eq!(alloc.allocate(100).unwrap().as_ptr(), small_ptr);
    }

    #[test]
    fn test_cache_is_bounded() {
        let alloc = RecyclingAllocator::new(1);
        alloc.release(vec![F16x8::ZERO; 8]);
        alloc.release(vec![F16x8::ZERO; 8]);
        assert_eq!(alloc.cached(), 1);
    }
}
