//! ScriptThread (C5): one schedulable coroutine belonging to a Script
//! (spec.md §4.5).
//!
//! The nested-coroutine "resume the innermost interrupted coroutine first"
//! bookkeeping from §4.5 point 2 is absorbed into the engine boundary: a
//! `town_engine::EngineThread` already resumes exactly where it last
//! suspended, nested or not, so `ScriptThread` itself carries no
//! `interrupted` back-pointer — the engine is the only thing that needs to
//! know how its own coroutines nest.

use std::time::{Duration, Instant};

use town_common::{monotonic_now, thread_cpu_nanos, ScriptError};
use town_engine::{CoroutineOutcome, EngineThread, ResumePayload};
use town_wire::ApiValue;

use crate::config::VmConfig;

/// A thread's position in the state machine of spec.md §4.5.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    Fresh,
    Running,
    Sleeping,
    WaitingApi,
    Finished,
    Stopped,
}

/// An API call a thread yielded, awaiting pickup by the owning Script.
#[derive(Debug, Clone)]
pub struct PendingApiCall {
    pub name: String,
    pub args: Vec<ApiValue>,
    pub await_response: bool,
}

/// What the Script-level sweep (`run_threads`) needs to know after a
/// `run()` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Finished,
    NotFinished,
    Preempted,
}

/// Full report from one `run()` call: the sweep-visible outcome plus
/// whether this resume pushed the thread over its strike limit (spec.md
/// §4.5 "stop the thread and increment script/VM force-terminate
/// counters" — the increment itself is the owning Script's job, since only
/// it can see the VM-wide counters).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub strike_terminated: bool,
}

enum PenaltyEffect {
    None,
    ForcedSleep,
    StrikeTerminated,
}

/// What happened when a Script's sweep (`Script::run_threads`) offered this
/// thread a turn.
#[derive(Debug, Clone, Copy)]
pub enum SweepOutcome {
    /// Still sleeping, still waiting on an API response, or already stopped
    /// — the thread was not resumed this turn.
    Skipped,
    Ran(RunReport),
}

pub struct ScriptThread {
    engine_thread: Box<dyn EngineThread>,
    state: ThreadState,
    nanoseconds: u64,
    total_nanoseconds: u64,
    wake_up_at: Option<Instant>,
    api_response_key: Option<i32>,
    started_waiting_for_api_at: Option<Instant>,
    was_preempted: bool,
    pub was_scheduled_yet: bool,
    count_force_sleeps: u32,
    pending_api_call: Option<PendingApiCall>,
    pending_api_result: Option<Vec<ApiValue>>,
    pending_prints: Vec<String>,
    last_error: Option<ScriptError>,
    last_result: Vec<ApiValue>,
}

impl ScriptThread {
    pub fn new(engine_thread: Box<dyn EngineThread>) -> Self {
        ScriptThread {
            engine_thread,
            state: ThreadState::Fresh,
            nanoseconds: 0,
            total_nanoseconds: 0,
            wake_up_at: None,
            api_response_key: None,
            started_waiting_for_api_at: None,
            was_preempted: false,
            was_scheduled_yet: false,
            count_force_sleeps: 0,
            pending_api_call: None,
            pending_api_result: None,
            pending_prints: Vec::new(),
            last_error: None,
            last_result: Vec::new(),
        }
    }

    pub fn state(&self) -> ThreadState {
        self.state
    }

    pub fn is_sleeping(&self) -> bool {
        self.state == ThreadState::Sleeping
    }

    pub fn is_waiting_for_api(&self) -> bool {
        self.state == ThreadState::WaitingApi
    }

    pub fn is_stopped(&self) -> bool {
        self.state == ThreadState::Stopped
    }

    pub fn was_preempted(&self) -> bool {
        self.was_preempted
    }

    pub fn wake_up_at(&self) -> Option<Instant> {
        self.wake_up_at
    }

    pub fn is_due(&self) -> bool {
        self.wake_up_at.is_some_and(|at| monotonic_now() >= at)
    }

    pub fn total_nanoseconds(&self) -> u64 {
        self.total_nanoseconds
    }

    pub fn count_force_sleeps(&self) -> u32 {
        self.count_force_sleeps
    }

    pub fn api_response_key(&self) -> Option<i32> {
        self.api_response_key
    }

    pub fn started_waiting_for_api_at(&self) -> Option<Instant> {
        self.started_waiting_for_api_at
    }

    pub fn has_timed_out(&self, timeout: Duration) -> bool {
        self.started_waiting_for_api_at
            .is_some_and(|at| at.elapsed() >= timeout)
    }

    pub fn take_pending_api_call(&mut self) -> Option<PendingApiCall> {
        self.pending_api_call.take()
    }

    pub fn take_prints(&mut self) -> Vec<String> {
        std::mem::take(&mut self.pending_prints)
    }

    pub fn take_error(&mut self) -> Option<ScriptError> {
        self.last_error.take()
    }

    pub fn last_result(&self) -> &[ApiValue] {
        &self.last_result
    }

    /// Record the key the owning VM assigned this thread's outstanding
    /// `API_CALL_GET` (spec.md §4.5 "`api_response_key ← vm.next_api_key++`").
    pub fn begin_waiting_for_api(&mut self, key: i32) {
        self.api_response_key = Some(key);
        self.started_waiting_for_api_at = Some(Instant::now());
    }

    /// Stop the thread. Idempotent (spec.md §8 "idempotence of stop").
    pub fn stop(&mut self) {
        self.state = ThreadState::Stopped;
    }

    /// Hand a reply to an outstanding `API_CALL_GET`, to be consumed the
    /// next time `run_in_sweep` offers this thread a turn. Does nothing if
    /// the thread isn't currently waiting on one.
    pub fn deliver_api_result(&mut self, values: Vec<ApiValue>) {
        self.pending_api_result = Some(values);
    }

    /// One step of a Script's "fair-chance" sweep (spec.md §4.6 step 2a):
    /// skip a thread that's sleeping-but-not-due or waiting-for-API with no
    /// response and no timeout, otherwise pick the right resume payload for
    /// its current state and run it.
    pub fn run_in_sweep(&mut self, config: &VmConfig) -> SweepOutcome {
        if self.is_stopped() || self.state == ThreadState::Finished {
            return SweepOutcome::Ran(self.run(config, ResumePayload::Continue));
        }

        if self.is_sleeping() && !self.is_due() {
            return SweepOutcome::Skipped;
        }

        let payload = if self.is_waiting_for_api() {
            if let Some(values) = self.pending_api_result.take() {
                ResumePayload::ApiResult(values)
            } else if self.has_timed_out(config.api_result_timeout) {
                ResumePayload::ApiResult(Vec::new())
            } else {
                return SweepOutcome::Skipped;
            }
        } else if self.state == ThreadState::Fresh {
            ResumePayload::Initial
        } else {
            ResumePayload::Continue
        };

        SweepOutcome::Ran(self.run(config, payload))
    }

    /// Resume the thread once. `payload` carries whatever the caller knows
    /// about why this resume is happening (fresh start, waking from sleep,
    /// or an API response/timeout delivering values).
    pub fn run(&mut self, config: &VmConfig, payload: ResumePayload) -> RunReport {
        if matches!(self.state, ThreadState::Stopped | ThreadState::Finished) {
            return RunReport {
                outcome: RunOutcome::Finished,
                strike_terminated: false,
            };
        }

        self.wake_up_at = None;
        self.api_response_key = None;
        self.started_waiting_for_api_at = None;
        self.was_preempted = false;
        self.state = ThreadState::Running;

        let cpu_start = thread_cpu_nanos();
        let deadline = crate::preempt::PreemptDeadline::arm(config.time_slice_nanos).as_nanos();

        let mut next_payload = payload;
        let outcome = loop {
            let outcome = self.engine_thread.resume(town_engine::ResumeInput {
                deadline_cpu_nanos: deadline,
                payload: next_payload,
            });
            match outcome {
                CoroutineOutcome::Print(text) => {
                    self.pending_prints.push(text);
                    next_payload = ResumePayload::Continue;
                }
                other => break other,
            }
        };

        let delta = thread_cpu_nanos().saturating_sub(cpu_start);
        self.nanoseconds += delta;
        self.total_nanoseconds += delta;

        let mut run_outcome = match outcome {
            CoroutineOutcome::Finished(values) => {
                self.last_result = values;
                self.state = ThreadState::Finished;
                RunOutcome::Finished
            }
            CoroutineOutcome::Error(err) => {
                self.last_error = Some(err);
                self.state = ThreadState::Finished;
                RunOutcome::Finished
            }
            CoroutineOutcome::Preempted => {
                self.was_preempted = true;
                RunOutcome::Preempted
            }
            CoroutineOutcome::ApiCall {
                name,
                args,
                await_response,
            } => {
                self.state = if await_response {
                    ThreadState::WaitingApi
                } else {
                    ThreadState::Running
                };
                self.pending_api_call = Some(PendingApiCall {
                    name,
                    args,
                    await_response,
                });
                RunOutcome::NotFinished
            }
            CoroutineOutcome::Sleep(ms) => {
                self.enter_sleep_due_to_request(ms);
                RunOutcome::NotFinished
            }
            CoroutineOutcome::Print(_) => unreachable!("consumed by the resume loop above"),
        };

        let penalty = if matches!(self.state, ThreadState::Finished) {
            PenaltyEffect::None
        } else {
            self.apply_penalty_policy(config)
        };

        let strike_terminated = matches!(penalty, PenaltyEffect::StrikeTerminated);
        if strike_terminated {
            run_outcome = RunOutcome::Finished;
        }

        RunReport {
            outcome: run_outcome,
            strike_terminated,
        }
    }

    fn enter_sleep_due_to_request(&mut self, ms: u32) {
        self.state = ThreadState::Sleeping;
        self.wake_up_at = Some(monotonic_now() + Duration::from_millis(ms as u64));
        if ms >= 500 {
            let reward_ns = (ms as u64) * 1_000_000 / 2;
            self.nanoseconds = self.nanoseconds.saturating_sub(reward_ns);
        }
    }

    fn enter_forced_penalty_sleep(&mut self, ms: u64) {
        self.state = ThreadState::Sleeping;
        self.wake_up_at = Some(monotonic_now() + Duration::from_millis(ms));
    }

    fn apply_penalty_policy(&mut self, config: &VmConfig) -> PenaltyEffect {
        let threshold_ns = config.penalty_threshold_ms * 1_000_000;
        if self.nanoseconds <= threshold_ns {
            return PenaltyEffect::None;
        }
        self.nanoseconds = 0;
        self.count_force_sleeps += 1;
        if self.count_force_sleeps >= config.terminate_thread_after_strikes {
            self.stop();
            PenaltyEffect::StrikeTerminated
        } else {
            self.enter_forced_penalty_sleep(config.penalty_sleep_ms);
            PenaltyEffect::ForcedSleep
        }
    }
}
