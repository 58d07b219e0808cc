//! Error kinds surfaced outside a script (spec.md §7).
//!
//! `Preempted`, `ApiTimeout`, and `StrikeTerminated` are scheduling signals
//! rather than user-visible errors; they are represented separately by the
//! scheduler (`town-rt`) and never constructed here.

use std::fmt;

/// An error produced while compiling, loading, or running a script.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptError {
    pub kind: ScriptErrorKind,
    /// Human-readable message, optionally followed by a backtrace.
    pub message: String,
}

impl ScriptError {
    pub fn new(kind: ScriptErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// The specific kind of script-level error (spec.md §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptErrorKind {
    /// Bytecode compilation failed.
    Compile,
    /// Compiled bytecode was rejected by the runtime.
    Load,
    /// The script raised an error while running.
    Runtime,
    /// The memory-cap allocator refused an allocation.
    MemoryExhausted,
}

impl fmt::Display for ScriptErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compile => write!(f, "compile error"),
            Self::Load => write!(f, "load error"),
            Self::Runtime => write!(f, "runtime error"),
            Self::MemoryExhausted => write!(f, "memory exhausted"),
        }
    }
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for ScriptError {}
