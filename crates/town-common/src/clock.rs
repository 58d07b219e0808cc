//! Timing utilities shared by the preemption clock (C4) and the reference
//! script engine's own safepoints (spec.md §4.9, §9 "Shared timing
//! utilities").
//!
//! Two distinct clocks are used throughout the service:
//!
//! - **Thread-CPU time** for preemption deadlines and penalty/strike
//!   accounting. This is the critical property called out in the spec: a
//!   thread spinning CPU inside a blocking call on another OS thread must
//!   not burn *this* thread's budget, which rules out wall-clock elapsed
//!   time for this purpose.
//! - **Monotonic wall time** for user-requested sleeps and message-bus
//!   waits, where wall-clock behavior (affected by the OS scheduler moving
//!   threads around) is exactly what's wanted.

use std::time::Instant;

/// Monotonic wall-clock instant, used for sleep wake-ups and bus waits.
pub type Monotonic = Instant;

pub fn monotonic_now() -> Monotonic {
    Instant::now()
}

/// Current thread's CPU time, in nanoseconds since an unspecified epoch.
/// Only differences between two calls on the *same* OS thread are
/// meaningful.
#[cfg(unix)]
pub fn thread_cpu_nanos() -> u64 {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    // Safety: CLOCK_THREAD_CPUTIME_ID and a stack-local timespec are always
    // valid arguments; clock_gettime cannot fail for this clock id on any
    // supported platform.
    unsafe {
        libc::clock_gettime(libc::CLOCK_THREAD_CPUTIME_ID, &mut ts);
    }
    ts.tv_sec as u64 * 1_000_000_000 + ts.tv_nsec as u64
}

/// Fallback for non-Unix targets: wall-clock elapsed time since the first
/// call on this thread. Coarser than true CPU time (it also counts time
/// this thread spent blocked or preempted by the OS scheduler), documented
/// as a known approximation rather than a silent correctness gap.
#[cfg(not(unix))]
pub fn thread_cpu_nanos() -> u64 {
    thread_local! {
        static THREAD_START: Instant = Instant::now();
    }
    THREAD_START.with(|start| start.elapsed().as_nanos() as u64)
}
