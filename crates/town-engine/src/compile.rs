//! Translates the handful of source shapes exercised by this service's test
//! scenarios into a `Program` (spec.md §1 Non-goals: no general parser, no
//! language semantics). This stands in for a real front end: a production
//! embedding would hand `RUN_CODE`'s source to an actual compiler and only
//! the resulting bytecode would ever reach a `ScriptEngine`.
//!
//! Recognizes, per statement (statements are split on `;`):
//! - `tt.sleep(<ms>)` -> `Instr::Sleep`
//! - `tt.owner_say('<text>')` -> a fire-and-forget `ownersay` API call
//! - `print(storage.load('<key>'))` -> an awaited `s_load` call followed by
//!   `Instr::PrintLastResult`
//!
//! Two whole-source shapes are special-cased rather than split into
//! statements: the literal runaway loop `while true do end`, and any source
//! mentioning `string.rep` (a memory-growth loop).
//!
//! Anything else is silently dropped — unrecognized statements produce no
//! instructions, matching a front end that would reject them earlier in a
//! real pipeline.

use town_wire::ApiValue;

use crate::program::{Instr, Program};

pub fn compile(source: &str) -> Program {
    let trimmed = source.trim();

    if trimmed == "while true do end" {
        return Program::new(vec![Instr::Jump(0)]);
    }

    if trimmed.contains("string.rep") {
        return Program::new(vec![Instr::AllocBytes(1024), Instr::Jump(0)]);
    }

    let mut instrs = Vec::new();
    for stmt in trimmed.split(';') {
        let stmt = stmt.trim();
        if stmt.is_empty() {
            continue;
        }
        compile_statement(stmt, &mut instrs);
    }
    instrs.push(Instr::Halt(Vec::new()));
    Program::new(instrs)
}

fn compile_statement(stmt: &str, instrs: &mut Vec<Instr>) {
    if let Some(inner) = extract_call(stmt, "tt.sleep(") {
        if let Ok(ms) = inner.trim().parse::<u32>() {
            instrs.push(Instr::Sleep(ms));
        }
        return;
    }

    if let Some(inner) = extract_call(stmt, "tt.owner_say(") {
        if let Some(text) = string_literal(inner.trim()) {
            instrs.push(Instr::ApiCall {
                name: "ownersay".to_string(),
                args: vec![ApiValue::Str(text.into_bytes())],
                await_response: false,
            });
        }
        return;
    }

    if let Some(inner) = extract_call(stmt, "print(") {
        let inner = inner.trim();
        if let Some(load_arg) = extract_call(inner, "storage.load(") {
            if let Some(key) = string_literal(load_arg.trim()) {
                instrs.push(Instr::ApiCall {
                    name: "s_load".to_string(),
                    args: vec![ApiValue::Str(key.into_bytes())],
                    await_response: true,
                });
                instrs.push(Instr::PrintLastResult);
                return;
            }
        }
        if let Some(text) = string_literal(inner) {
            instrs.push(Instr::Print(text));
        }
    }
}

/// Strips a `prefix` like `"tt.sleep("` and a matching trailing `')'` or
/// `)`, returning the content between them. `None` if `stmt` doesn't start
/// with `prefix` or doesn't close with `)`.
fn extract_call<'a>(stmt: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = stmt.strip_prefix(prefix)?;
    rest.strip_suffix(')')
}

/// Strips a single layer of matching single quotes from a string literal.
fn string_literal(s: &str) -> Option<String> {
    let s = s.trim();
    let inner = s.strip_prefix('\'')?.strip_suffix('\'')?;
    Some(inner.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runaway_loop_compiles_to_a_self_jump() {
        let program = compile("while true do end");
        assert!(matches!(program.instrs.as_slice(), [Instr::Jump(0)]));
    }

    #[test]
    fn string_rep_source_compiles_to_a_growing_allocation_loop() {
        let program = compile("local s = string.rep('x', 1024)");
        assert!(matches!(
            program.instrs.as_slice(),
            [Instr::AllocBytes(1024), Instr::Jump(0)]
        ));
    }

    #[test]
    fn sleep_call_compiles_to_a_sleep_instruction() {
        let program = compile("tt.sleep(250)");
        assert!(matches!(program.instrs.as_slice(), [Instr::Sleep(250), Instr::Halt(_)]));
    }

    #[test]
    fn owner_say_compiles_to_a_fire_and_forget_api_call() {
        let program = compile("tt.owner_say('hi')");
        match program.instrs.as_slice() {
            [Instr::ApiCall { name, args, await_response }, Instr::Halt(_)] => {
                assert_eq!(name, "ownersay");
                assert_eq!(args, &vec![ApiValue::Str(b"hi".to_vec())]);
                assert!(!await_response);
            }
            other => panic!("unexpected program: {other:?}"),
        }
    }

    #[test]
    fn print_of_storage_load_compiles_to_an_awaited_call_then_print_last_result() {
        let program = compile("print(storage.load('k'))");
        match program.instrs.as_slice() {
            [Instr::ApiCall { name, args, await_response }, Instr::PrintLastResult, Instr::Halt(_)] => {
                assert_eq!(name, "s_load");
                assert_eq!(args, &vec![ApiValue::Str(b"k".to_vec())]);
                assert!(await_response);
            }
            other => panic!("unexpected program: {other:?}"),
        }
    }

    #[test]
    fn multiple_statements_compile_in_order() {
        let program = compile("tt.sleep(100); tt.owner_say('hi')");
        assert!(matches!(
            program.instrs.as_slice(),
            [Instr::Sleep(100), Instr::ApiCall { .. }, Instr::Halt(_)]
        ));
    }

    #[test]
    fn unrecognized_statements_are_silently_dropped() {
        let program = compile("some.unknown.call(1, 2)");
        assert!(matches!(program.instrs.as_slice(), [Instr::Halt(_)]));
    }
}
