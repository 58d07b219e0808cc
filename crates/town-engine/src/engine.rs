//! The trait boundary between `town-rt`'s scheduler and an embedded
//! language runtime (spec.md §1 Non-goals: the runtime itself is out of
//! scope). A real deployment plugs a Luau/Lua host in behind these two
//! traits; `reference::ReferenceEngine` is the stand-in used here.
//!
//! State ownership deliberately stays where spec.md puts it: the engine
//! only reports what happened (`CoroutineOutcome`), never mutates
//! `ScriptThread`/`Script`/`VM` fields itself. `town-rt` is the sole place
//! that turns an outcome into a state transition, strike, or wake-up time —
//! matching how the original native API functions route back through a
//! stored `ScriptThread*` to update scheduler state directly, generalized
//! to a data boundary a trait object can cross.

use std::sync::Arc;

use town_common::MemoryTracker;
use town_common::ScriptError;
use town_wire::ApiValue;

use crate::program::Program;

/// What the scheduler hands a thread on each resume.
#[derive(Debug, Clone)]
pub struct ResumeInput {
    /// Thread-CPU-time deadline (spec.md §4.9) this slice may run until,
    /// read with `town_common::thread_cpu_nanos()`.
    pub deadline_cpu_nanos: u64,
    pub payload: ResumePayload,
}

#[derive(Debug, Clone)]
pub enum ResumePayload {
    /// The very first resume of a freshly spawned thread.
    Initial,
    /// Resuming a thread that was sleeping or had just been preempted;
    /// nothing to deliver.
    Continue,
    /// Resuming a thread that was waiting on an API result. Empty on
    /// timeout (spec.md §4.6).
    ApiResult(Vec<ApiValue>),
}

/// What a thread reported back mid-execution (a suspension) or on exit.
#[derive(Debug, Clone)]
pub enum CoroutineOutcome {
    /// The program ran to completion; `_0` are its result values.
    Finished(Vec<ApiValue>),
    /// The program raised a runtime error.
    Error(ScriptError),
    /// The thread's CPU-time slice expired mid-execution (C4).
    Preempted,
    /// The thread called a sleep primitive and should not be resumed
    /// before `_0` milliseconds of wall-clock time pass.
    Sleep(u32),
    /// The thread invoked a host API call.
    ApiCall {
        name: String,
        args: Vec<ApiValue>,
        await_response: bool,
    },
    /// The thread produced a line of output.
    Print(String),
}

/// One schedulable unit of interpreter execution: a coroutine, green
/// thread, or whatever the embedded engine uses under the hood.
pub trait EngineThread: Send {
    /// Resume execution until the next suspension or completion.
    fn resume(&mut self, input: ResumeInput) -> CoroutineOutcome;

    /// Whether this thread has already finished (successfully or not).
    fn is_finished(&self) -> bool;
}

/// A script engine capable of spawning `EngineThread`s that execute a
/// `Program` against a shared per-VM memory budget.
///
/// Returns a boxed trait object rather than an associated type so a `VM`
/// (`town-rt`) can hold one engine behind `Arc<dyn ScriptEngine>` without
/// itself becoming generic over the concrete engine.
pub trait ScriptEngine: Send + Sync {
    fn spawn(&self, program: Program, memory: Arc<dyn MemoryTracker>) -> Box<dyn EngineThread>;
}
