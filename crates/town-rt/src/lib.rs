//! The scheduler: C3 (memory cap), C4 (preemption clock), C5 (ScriptThread),
//! C6 (Script), and C7 (VM) of `spec.md`.
//!
//! Layering, outer to inner: [`vm::Vm`] owns a set of [`script::Script`]s
//! keyed by entity id; each `Script` owns a set of [`thread::ScriptThread`]s.
//! `preempt` and `memcap` are the two cross-cutting mechanisms both other
//! levels rely on; `config` holds the tunables everything else reads.

pub mod config;
pub mod memcap;
pub mod preempt;
pub mod script;
pub mod thread;
pub mod vm;

pub use config::VmConfig;
pub use memcap::MemoryCap;
pub use script::{Script, ScriptEvent, ScriptStatus};
pub use thread::{RunOutcome, ScriptThread, ThreadState};
pub use vm::{Vm, VmHandle, VmOutcome};
