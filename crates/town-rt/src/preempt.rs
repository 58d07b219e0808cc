//! Preemption clock (C4, spec.md §4.4).
//!
//! Before each interpreter resumption the scheduler arms a thread-CPU-time
//! deadline; the engine's own periodic safepoint hook (mirroring
//! `snow-rt::actor::stack`'s `CURRENT_YIELDER` + `snow_reduction_check`,
//! generalized from a reduction counter to a CPU-time budget per
//! `SPEC_FULL.md` §5) tests that deadline and requests a cooperative break
//! when it is reached. `town-rt` only arms the deadline and reacts to the
//! resulting `CoroutineOutcome::Preempted`; it never touches the
//! interpreter's stack directly (spec.md §9 "preemption without signals").

use town_common::thread_cpu_nanos;

/// A single slice's deadline, expressed as an absolute thread-CPU-time
/// reading (`town_common::thread_cpu_nanos()` is comparable only against
/// other readings taken on the same OS thread).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreemptDeadline(u64);

impl PreemptDeadline {
    /// Arm a new deadline `slice_nanos` of thread-CPU time from now.
    pub fn arm(slice_nanos: u64) -> Self {
        PreemptDeadline(thread_cpu_nanos().saturating_add(slice_nanos))
    }

    pub fn as_nanos(self) -> u64 {
        self.0
    }

    /// Whether the current thread's CPU time has reached this deadline.
    /// This is the check an engine's interrupt hook runs at its own safe
    /// points; it must stay allocation-free (spec.md §4.4).
    pub fn has_elapsed(self) -> bool {
        thread_cpu_nanos() >= self.0
    }
}
