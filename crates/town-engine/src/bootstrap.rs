//! The "bootstrap script" named in spec.md §4.7 and `SPEC_FULL.md` §5: a
//! small chunk every VM runs once, before accepting any `RUN_CODE`, that
//! wraps each call-then-await API primitive with a helper performing the
//! call and then fetching its eventual result — so script authors can treat
//! those APIs as ordinary synchronous calls.
//!
//! The reference engine's [`crate::compile`] has no real front end to patch
//! with such a wrapper; it already expands `print(storage.load(...))`
//! directly into an awaited call plus a result print at the single call
//! site. This constant exists so `town-rt::vm::Vm` still has a concrete
//! chunk to compile once and install into every VM, matching how a real
//! embedding compiles its bootstrap bytecode once at process start and
//! shares it between VMs by value, never by reference.

use crate::program::{Instr, Program};

/// The bootstrap chunk every VM runs once at construction, before the
/// first `RUN_CODE`. A no-op in the reference engine's instruction format;
/// a real embedding would load its synchronous-API-wrapper source here.
pub fn bootstrap_program() -> Program {
    Program::new(vec![Instr::Halt(Vec::new())])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstrap_program_finishes_with_no_result_values() {
        let program = bootstrap_program();
        assert!(matches!(program.instrs.as_slice(), [Instr::Halt(values)] if values.is_empty()));
    }
}
