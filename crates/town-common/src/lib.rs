//! Shared ids, constants, and error types for the Tilemap Town scripting
//! service. Kept dependency-free so both the wire format and the scheduler
//! can depend on it without pulling in concurrency or encoding crates.

pub mod callback;
pub mod clock;
pub mod error;
pub mod memory;
pub mod message;

pub use callback::{CallbackTypeId, CALLBACK_COUNT};
pub use clock::{monotonic_now, thread_cpu_nanos, Monotonic};
pub use error::{ScriptError, ScriptErrorKind};
pub use memory::{AtomicMemoryTracker, MemoryTracker};
pub use message::MessageType;

/// VM identity. Negative values denote anonymous/temporary users (§3).
pub type UserId = i32;

/// Script identity within a VM. Negative values denote temporary entities.
pub type EntityId = i32;

/// Meaning varies by message type: callback id, API result key, or unused.
pub type OtherId = i32;

/// Key used to correlate an `API_CALL_GET` request with its eventual
/// response in a VM's `api_results` map.
pub type ApiKey = i32;

// ---------------------------------------------------------------------------
// Tunables (spec.md §3, §4.4, §4.5, §4.6, §4.9)
// ---------------------------------------------------------------------------

/// Length of one preemption slice, in nanoseconds of thread-CPU time (C4).
pub const TIME_SLICE_NANOS: u64 = 10 * 1_000_000;

/// Accumulated per-slice CPU time after which a thread is forced to sleep.
pub const PENALTY_THRESHOLD_MS: u64 = 500;

/// Duration of the forced penalty sleep.
pub const PENALTY_SLEEP_MS: u64 = 2_500;

/// Number of forced penalty sleeps after which a thread is stopped.
pub const TERMINATE_THREAD_AFTER_STRIKES: u32 = 3;

/// Number of force-terminated threads after which a script is torn down.
pub const TERMINATE_SCRIPT_AFTER_STRIKES: u32 = 3;

/// How long a thread may wait for an `API_CALL_GET` response before it is
/// released with zero return values.
pub const API_RESULT_TIMEOUT_SECS: u64 = 30;

/// Maximum live `ScriptThread`s per `Script`; further spawns are rejected.
pub const MAX_SCRIPT_THREAD_COUNT: usize = 10;

/// Default per-VM memory ceiling enforced by the memory-cap allocator.
pub const DEFAULT_MEMORY_LIMIT_BYTES: usize = 2 * 1024 * 1024;
