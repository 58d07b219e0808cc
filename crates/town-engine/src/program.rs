//! A minimal instruction list standing in for compiled interpreter bytecode
//! (spec.md §1 Non-goals: the embedded language and its bytecode compiler
//! are out of scope). Exercises the scheduler's contract with an engine —
//! sleeps, API calls, printed output, runaway loops, allocation growth —
//! without claiming to be Luau.

use town_wire::ApiValue;

/// One step of a script program.
#[derive(Debug, Clone)]
pub enum Instr {
    /// Emit a line of text (e.g. the source's `print(...)`).
    Print(String),
    /// Suspend for at least `_0` milliseconds of wall-clock time.
    Sleep(u32),
    /// Invoke a host API call by name. If `await_response` is set, the
    /// thread blocks for the result before moving to the next instruction;
    /// otherwise it's fire-and-forget.
    ApiCall {
        name: String,
        args: Vec<ApiValue>,
        await_response: bool,
    },
    /// Account for an interpreter-level allocation of `_0` bytes against
    /// the owning VM's memory cap. Fails the thread with a `MemoryExhausted`
    /// error if the cap would be exceeded.
    AllocBytes(usize),
    /// Unconditionally continue execution at instruction index `_0`.
    Jump(usize),
    /// Terminate the program, returning `_0` as the call's result values.
    Halt(Vec<ApiValue>),
    /// Emit the most recently delivered API response as a printed line
    /// (the target of a source-level `print(some_awaited_call(...))`).
    PrintLastResult,
}

/// A full script program: a flat instruction list plus the instruction
/// pointer it starts at.
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub instrs: Vec<Instr>,
}

impl Program {
    pub fn new(instrs: Vec<Instr>) -> Self {
        Program { instrs }
    }
}
