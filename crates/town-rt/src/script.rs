//! Script (C6): the set of ScriptThreads belonging to one entity (spec.md
//! §4.6).
//!
//! Threads are kept in an `FxHashMap` keyed by a locally-assigned id rather
//! than a plain `Vec`, so that an API call a thread is waiting on can be
//! tracked back to it (for `begin_waiting_for_api`) without an index that
//! shifts under removal — the spec calls the owned collection "an
//! unordered set", which a hash map models directly.

use std::sync::Arc;
use std::time::Instant;

use rustc_hash::FxHashMap;

use town_common::{CallbackTypeId, MemoryTracker, ScriptError, CALLBACK_COUNT};
use town_engine::{Program, ScriptEngine};
use town_wire::ApiValue;

use crate::config::VmConfig;
use crate::thread::{RunOutcome, ScriptThread, SweepOutcome};

/// A thing a Script produced this sweep that the owning VM must act on —
/// forward an API call, print a line, surface an error, or notify the host
/// of a callback registration change.
#[derive(Debug, Clone)]
pub enum ScriptEvent {
    ApiCall {
        thread_id: u64,
        name: String,
        args: Vec<ApiValue>,
        await_response: bool,
    },
    Print(String),
    ScriptError(ScriptError),
    SetCallback {
        callback_id: CallbackTypeId,
        enabled: bool,
    },
}

/// The aggregate result of one `run_threads()` sweep (spec.md §4.6 step 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptStatus {
    Finished,
    KeepGoing,
    AllWaiting,
    Preempted,
}

pub struct Script {
    entity_id: i32,
    threads: FxHashMap<u64, ScriptThread>,
    next_thread_id: u64,
    callback_refs: [bool; CALLBACK_COUNT],
    count_force_terminate: u32,
    count_preempt: u32,
    /// Used by the VM's own outer sweep over Scripts (spec.md §3), distinct
    /// from each owned thread's own flag of the same name.
    pub was_scheduled_yet: bool,
    was_preempted: bool,
    pending_events: Vec<ScriptEvent>,
}

impl Script {
    pub fn new(entity_id: i32) -> Self {
        Script {
            entity_id,
            threads: FxHashMap::default(),
            next_thread_id: 0,
            callback_refs: [false; CALLBACK_COUNT],
            count_force_terminate: 0,
            count_preempt: 0,
            was_scheduled_yet: false,
            was_preempted: false,
            pending_events: Vec::new(),
        }
    }

    pub fn entity_id(&self) -> i32 {
        self.entity_id
    }

    pub fn thread_count(&self) -> usize {
        self.threads.len()
    }

    pub fn count_force_terminate(&self) -> u32 {
        self.count_force_terminate
    }

    pub fn count_preempt(&self) -> u32 {
        self.count_preempt
    }

    pub fn was_preempted(&self) -> bool {
        self.was_preempted
    }

    pub fn take_events(&mut self) -> Vec<ScriptEvent> {
        std::mem::take(&mut self.pending_events)
    }

    /// `(any_thread_sleeping, earliest_wake_at)` across this Script's
    /// threads (spec.md §3 invariant).
    pub fn sleeping_summary(&self) -> (bool, Option<Instant>) {
        let mut earliest: Option<Instant> = None;
        for thread in self.threads.values() {
            if let Some(at) = thread.wake_up_at() {
                earliest = Some(earliest.map_or(at, |e| e.min(at)));
            }
        }
        (earliest.is_some(), earliest)
    }

    /// Deliver a reply to one of this Script's threads waiting on
    /// `api_response_key == key`. No-op if no thread is waiting on it.
    pub fn deliver_api_result(&mut self, key: i32, values: Vec<ApiValue>) -> bool {
        for thread in self.threads.values_mut() {
            if thread.api_response_key() == Some(key) {
                thread.deliver_api_result(values);
                return true;
            }
        }
        false
    }

    /// Record the key the VM assigned a thread's `API_CALL_GET` so it can
    /// be matched against a later response or timeout.
    pub fn assign_api_key(&mut self, thread_id: u64, key: i32) {
        if let Some(thread) = self.threads.get_mut(&thread_id) {
            thread.begin_waiting_for_api(key);
        }
    }

    /// Toggle a callback registration, notifying the host via a
    /// `ScriptEvent::SetCallback` (spec.md §4.6 `SET_CALLBACK`).
    pub fn set_callback(&mut self, callback_id: CallbackTypeId, enabled: bool) {
        self.callback_refs[callback_id.index()] = enabled;
        self.pending_events.push(ScriptEvent::SetCallback {
            callback_id,
            enabled,
        });
    }

    /// `compile_and_start(source)` (spec.md §4.6): compile and resume a new
    /// thread once. Returns whether a thread was actually added (a thread
    /// that finishes on its first resume is discarded immediately, and the
    /// attempt is silently rejected once `max_threads` is reached).
    pub fn compile_and_start(
        &mut self,
        source: &str,
        engine: &dyn ScriptEngine,
        memory: Arc<dyn MemoryTracker>,
        config: &VmConfig,
    ) -> bool {
        let program = town_engine::compile(source);
        self.start_program(program, engine, memory, config)
    }

    /// `start_callback(callback_id, args)` (spec.md §4.6). If no handler is
    /// registered, the arguments are simply dropped and the call "succeeds
    /// trivially" with no new thread. Otherwise a thread is spawned to run
    /// the registered handler.
    ///
    /// The reference engine has no notion of a stored interpreter function
    /// value to resume, so a registered handler is represented here as a
    /// thread that immediately returns its arguments — standing in for "the
    /// handler ran and produced some result", not a faithful invocation.
    pub fn start_callback(
        &mut self,
        callback_id: CallbackTypeId,
        args: Vec<ApiValue>,
        engine: &dyn ScriptEngine,
        memory: Arc<dyn MemoryTracker>,
        config: &VmConfig,
    ) -> bool {
        if !self.callback_refs[callback_id.index()] {
            return true;
        }
        let program = Program::new(vec![town_engine::Instr::Halt(args)]);
        self.start_program(program, engine, memory, config)
    }

    /// `start_thread(from_state)` (spec.md §4.6): add a new thread without
    /// resuming it yet. `program` stands in for "a function already pushed
    /// by script code", since the reference engine has no separate notion
    /// of a pushed-but-not-yet-running function value.
    pub fn start_thread(&mut self, program: Program, engine: &dyn ScriptEngine, memory: Arc<dyn MemoryTracker>) -> bool {
        if self.threads.len() >= town_common::MAX_SCRIPT_THREAD_COUNT {
            return false;
        }
        let id = self.next_thread_id;
        self.next_thread_id += 1;
        self.threads
            .insert(id, ScriptThread::new(engine.spawn(program, memory)));
        true
    }

    fn start_program(
        &mut self,
        program: Program,
        engine: &dyn ScriptEngine,
        memory: Arc<dyn MemoryTracker>,
        config: &VmConfig,
    ) -> bool {
        if self.threads.len() >= config.max_script_thread_count {
            return false;
        }
        let id = self.next_thread_id;
        self.next_thread_id += 1;
        let mut thread = ScriptThread::new(engine.spawn(program, memory));

        match thread.run_in_sweep(config) {
            SweepOutcome::Skipped => {
                // A freshly spawned thread is never sleeping or
                // waiting-for-API, so this never actually happens; treated
                // the same as "ran and kept going" for safety.
                self.threads.insert(id, thread);
            }
            SweepOutcome::Ran(report) => {
                self.collect_events(id, &mut thread, report.strike_terminated);
                match report.outcome {
                    RunOutcome::Finished => {}
                    RunOutcome::NotFinished | RunOutcome::Preempted => {
                        if matches!(report.outcome, RunOutcome::Preempted) {
                            self.count_preempt += 1;
                        }
                        self.threads.insert(id, thread);
                    }
                }
            }
        }
        true
    }

    /// Inner scheduling pass (spec.md §4.6 `run_threads()`): a two-phase
    /// sweep with a single fair-chance retry so a thread created mid-pass
    /// (by a callback firing) still gets a turn this tick.
    pub fn run_threads(&mut self, config: &VmConfig) -> ScriptStatus {
        let mut retried = false;
        let mut preempted = false;
        let mut any_ran = false;

        'outer: loop {
            let mut newly_scheduled = false;
            let ids: Vec<u64> = self.threads.keys().copied().collect();

            for id in ids {
                let already_scheduled = match self.threads.get(&id) {
                    Some(t) => t.was_scheduled_yet,
                    None => continue,
                };
                if already_scheduled {
                    continue;
                }
                newly_scheduled = true;
                if let Some(thread) = self.threads.get_mut(&id) {
                    thread.was_scheduled_yet = true;
                }

                let outcome = self.threads.get_mut(&id).unwrap().run_in_sweep(config);
                match outcome {
                    SweepOutcome::Skipped => continue,
                    SweepOutcome::Ran(report) => {
                        any_ran = true;
                        let mut thread = self.threads.remove(&id).unwrap();
                        self.collect_events(id, &mut thread, report.strike_terminated);

                        match report.outcome {
                            RunOutcome::Finished => {}
                            RunOutcome::Preempted => {
                                self.count_preempt += 1;
                                self.threads.insert(id, thread);
                                preempted = true;
                                break 'outer;
                            }
                            RunOutcome::NotFinished => {
                                self.threads.insert(id, thread);
                            }
                        }
                    }
                }
            }

            if !newly_scheduled {
                if retried {
                    break;
                }
                for thread in self.threads.values_mut() {
                    thread.was_scheduled_yet = false;
                }
                retried = true;
                continue;
            }
            break;
        }

        self.was_preempted = preempted;

        if preempted {
            return ScriptStatus::Preempted;
        }
        if self.threads.is_empty() {
            ScriptStatus::Finished
        } else if !any_ran {
            ScriptStatus::AllWaiting
        } else {
            ScriptStatus::KeepGoing
        }
    }

    /// `shutdown()` (spec.md §4.6): deliver `MiscShutdown` one last time if
    /// registered, ignoring the thread-count cap since the Script is about
    /// to be destructed regardless.
    pub fn shutdown(&mut self, engine: &dyn ScriptEngine, memory: Arc<dyn MemoryTracker>, config: &VmConfig) {
        if self.callback_refs[CallbackTypeId::MiscShutdown.index()] {
            self.start_program(Program::new(vec![town_engine::Instr::Halt(Vec::new())]), engine, memory, config);
        }
    }

    fn collect_events(&mut self, thread_id: u64, thread: &mut ScriptThread, strike_terminated: bool) {
        if strike_terminated {
            self.count_force_terminate += 1;
        }
        for line in thread.take_prints() {
            self.pending_events.push(ScriptEvent::Print(line));
        }
        if let Some(err) = thread.take_error() {
            self.pending_events.push(ScriptEvent::ScriptError(err));
        }
        if let Some(call) = thread.take_pending_api_call() {
            self.pending_events.push(ScriptEvent::ApiCall {
                thread_id,
                name: call.name,
                args: call.args,
                await_response: call.await_response,
            });
        }
    }
}
