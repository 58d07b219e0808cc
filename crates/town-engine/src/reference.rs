//! A minimal reference `ScriptEngine`, used by `town-rt`'s own tests and by
//! the example binary. Not a Lua/Luau implementation (§1 Non-goals) — just
//! enough of an interpreter to drive every scheduler-visible event a real
//! engine could produce.
//!
//! Coroutine plumbing follows `snow-rt::actor::stack::CoroutineHandle`:
//! a stackful `corosensei` coroutine on a fixed-size stack, resumed with an
//! input value and yielding output values back to the resumer.

use std::sync::Arc;

use corosensei::stack::DefaultStack;
use corosensei::{Coroutine, CoroutineResult, Yielder};

use town_common::{thread_cpu_nanos, MemoryTracker, ScriptError, ScriptErrorKind};
use town_wire::ApiValue;

use crate::engine::{CoroutineOutcome, EngineThread, ResumeInput, ResumePayload, ScriptEngine};
use crate::program::{Instr, Program};

/// Stack size for each reference-engine thread, matching the teacher's own
/// per-actor default.
const STACK_SIZE: usize = 64 * 1024;

type Input = ResumeInput;
type Yield = EngineYield;
type Return = Result<Vec<ApiValue>, ScriptError>;

/// Mid-execution suspensions the interpreter loop can produce. Distinct
/// from `CoroutineOutcome` only in that `Finished`/`Error` aren't
/// suspensions — they end the coroutine and travel as corosensei's
/// `Return` value instead.
#[derive(Debug, Clone)]
enum EngineYield {
    Preempted,
    Sleep(u32),
    ApiCall {
        name: String,
        args: Vec<ApiValue>,
        await_response: bool,
    },
    Print(String),
}

impl From<EngineYield> for CoroutineOutcome {
    fn from(y: EngineYield) -> Self {
        match y {
            EngineYield::Preempted => CoroutineOutcome::Preempted,
            EngineYield::Sleep(ms) => CoroutineOutcome::Sleep(ms),
            EngineYield::ApiCall {
                name,
                args,
                await_response,
            } => CoroutineOutcome::ApiCall {
                name,
                args,
                await_response,
            },
            EngineYield::Print(s) => CoroutineOutcome::Print(s),
        }
    }
}

/// The reference `ScriptEngine`: spawns `ReferenceThread`s that interpret a
/// flat `Program`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReferenceEngine;

impl ScriptEngine for ReferenceEngine {
    fn spawn(&self, program: Program, memory: Arc<dyn MemoryTracker>) -> Box<dyn EngineThread> {
        Box::new(ReferenceThread::spawn(program, memory))
    }
}

/// One interpreter coroutine running a `Program` to completion.
pub struct ReferenceThread {
    coro: Coroutine<Input, Yield, Return>,
    finished: bool,
}

impl ReferenceThread {
    fn spawn(program: Program, memory: Arc<dyn MemoryTracker>) -> Self {
        let stack = DefaultStack::new(STACK_SIZE).expect("failed to allocate coroutine stack");
        let coro = Coroutine::with_stack(stack, move |yielder: &Yielder<Input, Yield>, input: Input| {
            interpret(&program, memory.as_ref(), yielder, input)
        });
        ReferenceThread {
            coro,
            finished: false,
        }
    }
}

impl EngineThread for ReferenceThread {
    fn resume(&mut self, input: ResumeInput) -> CoroutineOutcome {
        match self.coro.resume(input) {
            CoroutineResult::Yield(y) => y.into(),
            CoroutineResult::Return(Ok(values)) => {
                self.finished = true;
                CoroutineOutcome::Finished(values)
            }
            CoroutineResult::Return(Err(e)) => {
                self.finished = true;
                CoroutineOutcome::Error(e)
            }
        }
    }

    fn is_finished(&self) -> bool {
        self.finished || self.coro.done()
    }
}

/// Runs `program` to completion, suspending through `yielder` at every
/// instruction that the scheduler needs to observe and at every point the
/// thread's CPU-time budget has run out.
fn interpret(
    program: &Program,
    memory: &dyn MemoryTracker,
    yielder: &Yielder<Input, Yield>,
    first_input: Input,
) -> Result<Vec<ApiValue>, ScriptError> {
    let mut reserved = 0usize;
    let result = run_body(program, memory, yielder, first_input, &mut reserved);
    // Whatever this thread still had reserved is freed as part of unwinding
    // on both the success and error path -- a finished or failed script's
    // locals are no longer reachable.
    memory.release(reserved);
    result
}

fn run_body(
    program: &Program,
    memory: &dyn MemoryTracker,
    yielder: &Yielder<Input, Yield>,
    first_input: Input,
    reserved: &mut usize,
) -> Result<Vec<ApiValue>, ScriptError> {
    let mut deadline = first_input.deadline_cpu_nanos;
    let mut pc = 0usize;
    let mut last_api_result: Vec<ApiValue> = Vec::new();

    loop {
        if pc >= program.instrs.len() {
            return Ok(Vec::new());
        }

        if thread_cpu_nanos() >= deadline {
            let resumed = yielder.suspend(EngineYield::Preempted);
            deadline = resumed.deadline_cpu_nanos;
            continue;
        }

        match &program.instrs[pc] {
            Instr::Print(text) => {
                let resumed = yielder.suspend(EngineYield::Print(text.clone()));
                deadline = resumed.deadline_cpu_nanos;
                pc += 1;
            }
            Instr::Sleep(ms) => {
                let resumed = yielder.suspend(EngineYield::Sleep(*ms));
                deadline = resumed.deadline_cpu_nanos;
                pc += 1;
            }
            Instr::ApiCall {
                name,
                args,
                await_response,
            } => {
                let resumed = yielder.suspend(EngineYield::ApiCall {
                    name: name.clone(),
                    args: args.clone(),
                    await_response: *await_response,
                });
                deadline = resumed.deadline_cpu_nanos;
                if *await_response {
                    if let ResumePayload::ApiResult(values) = resumed.payload {
                        last_api_result = values;
                    }
                }
                pc += 1;
            }
            Instr::AllocBytes(bytes) => {
                if !memory.try_reserve(*bytes) {
                    return Err(ScriptError::new(
                        ScriptErrorKind::MemoryExhausted,
                        format!("allocation of {bytes} bytes exceeds the VM's memory cap"),
                    ));
                }
                *reserved += bytes;
                pc += 1;
            }
            Instr::Jump(target) => pc = *target,
            Instr::Halt(values) => return Ok(values.clone()),
            Instr::PrintLastResult => {
                let text = render_for_print(&last_api_result);
                let resumed = yielder.suspend(EngineYield::Print(text));
                deadline = resumed.deadline_cpu_nanos;
                pc += 1;
            }
        }
    }
}

/// Render a delivered API response the way a script's `print` would show
/// it: strings/JSON as their own text, everything else via `Debug`.
fn render_for_print(values: &[ApiValue]) -> String {
    match values.first() {
        Some(ApiValue::Str(bytes)) => String::from_utf8_lossy(bytes).into_owned(),
        Some(ApiValue::Json(s)) => s.clone(),
        Some(other) => format!("{other:?}"),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use town_common::AtomicMemoryTracker;

    fn far_future_deadline() -> u64 {
        thread_cpu_nanos() + 10_000_000_000
    }

    fn initial(deadline: u64) -> ResumeInput {
        ResumeInput {
            deadline_cpu_nanos: deadline,
            payload: ResumePayload::Initial,
        }
    }

    fn cont(deadline: u64) -> ResumeInput {
        ResumeInput {
            deadline_cpu_nanos: deadline,
            payload: ResumePayload::Continue,
        }
    }

    #[test]
    fn program_with_no_instructions_finishes_immediately() {
        let engine = ReferenceEngine;
        let tracker: Arc<dyn MemoryTracker> = Arc::new(AtomicMemoryTracker::new(1024));
        let mut thread = engine.spawn(Program::default(), tracker);
        let outcome = thread.resume(initial(far_future_deadline()));
        assert!(matches!(outcome, CoroutineOutcome::Finished(v) if v.is_empty()));
        assert!(thread.is_finished());
    }

    #[test]
    fn print_then_halt_yields_print_then_finishes() {
        let engine = ReferenceEngine;
        let tracker: Arc<dyn MemoryTracker> = Arc::new(AtomicMemoryTracker::new(1024));
        let program = Program::new(vec![
            Instr::Print("hi".to_string()),
            Instr::Halt(vec![ApiValue::Integer(1)]),
        ]);
        let mut thread = engine.spawn(program, tracker);

        let deadline = far_future_deadline();
        match thread.resume(initial(deadline)) {
            CoroutineOutcome::Print(s) => assert_eq!(s, "hi"),
            other => panic!("expected Print, got {other:?}"),
        }
        assert!(!thread.is_finished());

        match thread.resume(cont(deadline)) {
            CoroutineOutcome::Finished(values) => {
                assert_eq!(values, vec![ApiValue::Integer(1)]);
            }
            other => panic!("expected Finished, got {other:?}"),
        }
        assert!(thread.is_finished());
    }

    #[test]
    fn sleep_yields_and_resumes_to_the_next_instruction() {
        let engine = ReferenceEngine;
        let tracker: Arc<dyn MemoryTracker> = Arc::new(AtomicMemoryTracker::new(1024));
        let program = Program::new(vec![Instr::Sleep(100), Instr::Halt(vec![])]);
        let mut thread = engine.spawn(program, tracker);

        let deadline = far_future_deadline();
        match thread.resume(initial(deadline)) {
            CoroutineOutcome::Sleep(ms) => assert_eq!(ms, 100),
            other => panic!("expected Sleep, got {other:?}"),
        }
        match thread.resume(cont(deadline)) {
            CoroutineOutcome::Finished(values) => assert!(values.is_empty()),
            other => panic!("expected Finished, got {other:?}"),
        }
    }

    #[test]
    fn allocation_past_the_cap_fails_the_thread() {
        let engine = ReferenceEngine;
        let tracker: Arc<dyn MemoryTracker> = Arc::new(AtomicMemoryTracker::new(100));
        let program = Program::new(vec![Instr::AllocBytes(1_000), Instr::Halt(vec![])]);
        let mut thread = engine.spawn(program, tracker);

        match thread.resume(initial(far_future_deadline())) {
            CoroutineOutcome::Error(e) => assert_eq!(e.kind, ScriptErrorKind::MemoryExhausted),
            other => panic!("expected Error, got {other:?}"),
        }
        assert!(thread.is_finished());
    }

    #[test]
    fn print_last_result_renders_the_most_recent_api_response() {
        let engine = ReferenceEngine;
        let tracker: Arc<dyn MemoryTracker> = Arc::new(AtomicMemoryTracker::new(1024));
        let program = Program::new(vec![
            Instr::ApiCall {
                name: "s_load".to_string(),
                args: vec![ApiValue::Str(b"k".to_vec())],
                await_response: true,
            },
            Instr::PrintLastResult,
            Instr::Halt(vec![]),
        ]);
        let mut thread = engine.spawn(program, tracker);

        let deadline = far_future_deadline();
        match thread.resume(initial(deadline)) {
            CoroutineOutcome::ApiCall { name, await_response, .. } => {
                assert_eq!(name, "s_load");
                assert!(await_response);
            }
            other => panic!("expected ApiCall, got {other:?}"),
        }

        let resume = ResumeInput {
            deadline_cpu_nanos: deadline,
            payload: ResumePayload::ApiResult(vec![ApiValue::Str(b"v".to_vec())]),
        };
        match thread.resume(resume) {
            CoroutineOutcome::Print(s) => assert_eq!(s, "v"),
            other => panic!("expected Print, got {other:?}"),
        }

        match thread.resume(cont(deadline)) {
            CoroutineOutcome::Finished(values) => assert!(values.is_empty()),
            other => panic!("expected Finished, got {other:?}"),
        }
    }

    #[test]
    fn memory_reserved_by_a_finished_thread_is_released() {
        let engine = ReferenceEngine;
        let tracker: Arc<dyn MemoryTracker> = Arc::new(AtomicMemoryTracker::new(1024));
        let program = Program::new(vec![Instr::AllocBytes(512), Instr::Halt(vec![])]);
        let mut thread = engine.spawn(program, tracker.clone());

        match thread.resume(initial(far_future_deadline())) {
            CoroutineOutcome::Finished(values) => assert!(values.is_empty()),
            other => panic!("expected Finished, got {other:?}"),
        }
        assert_eq!(tracker.used_bytes(), 0);
    }

    #[test]
    fn memory_reserved_before_a_failed_allocation_is_released() {
        let engine = ReferenceEngine;
        let tracker: Arc<dyn MemoryTracker> = Arc::new(AtomicMemoryTracker::new(1024));
        let program = Program::new(vec![
            Instr::AllocBytes(512),
            Instr::AllocBytes(1_000),
            Instr::Halt(vec![]),
        ]);
        let mut thread = engine.spawn(program, tracker.clone());

        match thread.resume(initial(far_future_deadline())) {
            CoroutineOutcome::Error(e) => assert_eq!(e.kind, ScriptErrorKind::MemoryExhausted),
            other => panic!("expected Error, got {other:?}"),
        }
        assert_eq!(tracker.used_bytes(), 0);
    }

    #[test]
    fn a_tight_loop_is_preempted_once_its_slice_expires() {
        let engine = ReferenceEngine;
        let tracker: Arc<dyn MemoryTracker> = Arc::new(AtomicMemoryTracker::new(1024));
        // "while true do end", expressed as an unconditional jump to itself.
        let program = Program::new(vec![Instr::Jump(0)]);
        let mut thread = engine.spawn(program, tracker);

        // An already-past deadline forces the very first preemption check to trip.
        let outcome = thread.resume(initial(thread_cpu_nanos()));
        assert!(matches!(outcome, CoroutineOutcome::Preempted));
        assert!(!thread.is_finished());
    }
}
