//! The trait boundary between the scheduler (`town-rt`) and an embedded
//! script runtime (out of scope, spec.md §1), plus a minimal reference
//! engine used by tests and the example binary.

pub mod bootstrap;
pub mod compile;
pub mod engine;
pub mod program;
pub mod reference;

pub use bootstrap::bootstrap_program;
pub use compile::compile;
pub use engine::{CoroutineOutcome, EngineThread, ResumeInput, ResumePayload, ScriptEngine};
pub use program::{Instr, Program};
pub use reference::{ReferenceEngine, ReferenceThread};
