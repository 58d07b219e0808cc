//! Memory-cap interface (spec.md §4.3/C3).
//!
//! `town-engine` calls through this trait on every interpreter-level
//! allocation; `town-rt`'s `VM` is the implementation, holding the single
//! `used`/`limit` pair the cap is enforced against. Splitting the trait out
//! here (rather than putting it on a concrete `town-rt` type) keeps
//! `town-engine` from depending on `town-rt`.

/// A shared, per-VM allocation budget.
///
/// Mirrors the original `lua_allocator`'s `used`/`limit` bookkeeping
/// (`original_source/src/luau.cpp`), generalized to a trait so any engine
/// can interpose on its own allocations without linking against the
/// scheduler crate.
pub trait MemoryTracker: Send + Sync {
    /// Attempt to account for `bytes` more memory. Returns `false` (and
    /// accounts for nothing) if doing so would exceed the VM's cap.
    fn try_reserve(&self, bytes: usize) -> bool;

    /// Give back `bytes` previously reserved via `try_reserve`.
    fn release(&self, bytes: usize);

    /// Current accounted usage, for diagnostics and tests.
    fn used_bytes(&self) -> usize;
}

/// A simple `MemoryTracker` backed by an atomic counter, usable standalone
/// in engine-level tests without pulling in `town-rt`.
pub struct AtomicMemoryTracker {
    used: std::sync::atomic::AtomicUsize,
    limit: usize,
}

impl AtomicMemoryTracker {
    pub fn new(limit: usize) -> Self {
        Self {
            used: std::sync::atomic::AtomicUsize::new(0),
            limit,
        }
    }
}

impl MemoryTracker for AtomicMemoryTracker {
    fn try_reserve(&self, bytes: usize) -> bool {
        use std::sync::atomic::Ordering;
        let mut current = self.used.load(Ordering::Relaxed);
        loop {
            let next = current.saturating_add(bytes);
            if next > self.limit {
                return false;
            }
            match self.used.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(observed) => current = observed,
            }
        }
    }

    fn release(&self, bytes: usize) {
        use std::sync::atomic::Ordering;
        self.used.fetch_sub(bytes, Ordering::AcqRel);
    }

    fn used_bytes(&self) -> usize {
        self.used.load(std::sync::atomic::Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserve_fails_past_the_limit() {
        let tracker = AtomicMemoryTracker::new(100);
        assert!(tracker.try_reserve(60));
        assert!(!tracker.try_reserve(50));
        assert_eq!(tracker.used_bytes(), 60);
    }

    #[test]
    fn release_frees_room_for_further_reservations() {
        let tracker = AtomicMemoryTracker::new(100);
        assert!(tracker.try_reserve(80));
        tracker.release(80);
        assert_eq!(tracker.used_bytes(), 0);
        assert!(tracker.try_reserve(90));
    }
}
