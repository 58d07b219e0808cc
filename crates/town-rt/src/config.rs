//! Per-VM tunables (spec.md §3, §4.5–§4.7).
//!
//! Plain `const`s cover the default values; `VmConfig` makes them
//! overridable per VM the way the teacher's `DEFAULT_REDUCTIONS` /
//! `DEFAULT_STACK_SIZE` are constructor arguments rather than hardcoded,
//! which tests lean on to run scenarios like S4/S7 on a useful timescale.

use std::time::Duration;

use town_common::{
    API_RESULT_TIMEOUT_SECS, DEFAULT_MEMORY_LIMIT_BYTES, MAX_SCRIPT_THREAD_COUNT,
    PENALTY_SLEEP_MS, PENALTY_THRESHOLD_MS, TERMINATE_SCRIPT_AFTER_STRIKES,
    TERMINATE_THREAD_AFTER_STRIKES, TIME_SLICE_NANOS,
};

#[derive(Debug, Clone, Copy)]
pub struct VmConfig {
    pub time_slice_nanos: u64,
    pub penalty_threshold_ms: u64,
    pub penalty_sleep_ms: u64,
    pub terminate_thread_after_strikes: u32,
    pub terminate_script_after_strikes: u32,
    pub api_result_timeout: Duration,
    pub max_script_thread_count: usize,
    pub memory_limit_bytes: usize,
}

impl Default for VmConfig {
    fn default() -> Self {
        VmConfig {
            time_slice_nanos: TIME_SLICE_NANOS,
            penalty_threshold_ms: PENALTY_THRESHOLD_MS,
            penalty_sleep_ms: PENALTY_SLEEP_MS,
            terminate_thread_after_strikes: TERMINATE_THREAD_AFTER_STRIKES,
            terminate_script_after_strikes: TERMINATE_SCRIPT_AFTER_STRIKES,
            api_result_timeout: Duration::from_secs(API_RESULT_TIMEOUT_SECS),
            max_script_thread_count: MAX_SCRIPT_THREAD_COUNT,
            memory_limit_bytes: DEFAULT_MEMORY_LIMIT_BYTES,
        }
    }
}
