//! VM (C7): a per-user container of Scripts, the embedded interpreter's
//! memory cap, the incoming-message queue, and the API-result
//! correlation table (spec.md §4.7).
//!
//! Grounded on `original_source/src/luau.cpp`'s `VM::run_scripts` /
//! `VM::thread_function` for the outer two-phase sweep and the worker
//! loop's drain-then-run-then-block shape, and on
//! `snow-rt::actor::scheduler`'s run-queue pattern (`SPEC_FULL.md` §5) for
//! expressing that shape over `crossbeam-channel` instead of a condvar.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use rustc_hash::FxHashMap;

use town_common::{CallbackTypeId, MemoryTracker};
use town_engine::ScriptEngine;
use town_wire::value::{decode_values, encode_values};
use town_wire::{ApiValue, Message, MessageType};

use crate::config::VmConfig;
use crate::memcap::MemoryCap;
use crate::script::{Script, ScriptEvent, ScriptStatus};

/// Where a `Vm` sends outbound messages (the host pipe in production, a
/// recording fake in tests). Implementations must serialize concurrent
/// sends from different VM worker threads themselves — in production this
/// is `town_wire::PipeWriter`'s single process-wide mutex (spec.md §4.1,
/// §5 "Shared resources").
pub trait Outbox: Send + Sync {
    fn send(&self, msg: Message);
}

/// The aggregate result of one `run_scripts()` sweep (spec.md §4.7,
/// mirroring `ScriptStatus` one level up).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmOutcome {
    Finished,
    KeepGoing,
    AllWaiting,
    Preempted,
}

/// A cheap, cloneable handle a `Router` holds to push messages into one
/// VM's inbox and wake its worker thread.
#[derive(Clone)]
pub struct VmHandle {
    sender: Sender<Message>,
}

impl VmHandle {
    /// Enqueue `msg` for this VM's worker. The worker is woken whether it
    /// was blocked on an empty inbox or sleeping until a scripted wake-up
    /// (spec.md §4.7 step 5) — `crossbeam-channel` wakes both `recv` and
    /// `recv_timeout` on send.
    pub fn send(&self, msg: Message) {
        // The receiver only disconnects when the worker thread has exited
        // (after a SHUTDOWN); a send racing that exit is simply dropped,
        // matching "a stopped script/VM observes no further effect" (§8).
        let _ = self.sender.send(msg);
    }
}

/// Per-user container of `Script`s, the embedded interpreter's memory cap,
/// and the API-result correlation table (spec.md §3 "VM").
pub struct Vm {
    user_id: i32,
    scripts: FxHashMap<i32, Script>,
    engine: Arc<dyn ScriptEngine>,
    memory: Arc<MemoryCap>,
    config: VmConfig,
    outbox: Arc<dyn Outbox>,
    /// `api_key -> entity_id`, standing in for spec.md §3's
    /// `api_key → Message` map: rather than holding the inbound message
    /// until a consumer polls for it, the VM delivers a response straight
    /// to the waiting `Script` the moment it is drained from the inbox
    /// (spec.md §5 "an API response becomes visible to a waiting thread
    /// strictly after it is drained from the inbox") and this map instead
    /// tracks which Script owns each outstanding key, so delivery doesn't
    /// need to search every Script in the VM.
    api_owner: FxHashMap<i32, i32>,
    next_api_key: i32,
    count_force_terminate: u64,
    count_preempt: u64,
}

impl Vm {
    /// Construct a VM and run its bootstrap chunk (spec.md §4.7) once,
    /// before accepting any `RUN_CODE`.
    pub fn new(user_id: i32, engine: Arc<dyn ScriptEngine>, outbox: Arc<dyn Outbox>, config: VmConfig) -> Self {
        let memory = Arc::new(MemoryCap::new(config.memory_limit_bytes));
        let mut vm = Vm {
            user_id,
            scripts: FxHashMap::default(),
            engine,
            memory,
            config,
            outbox,
            api_owner: FxHashMap::default(),
            next_api_key: 1,
            count_force_terminate: 0,
            count_preempt: 0,
        };
        vm.run_bootstrap();
        vm
    }

    fn run_bootstrap(&mut self) {
        let memory: Arc<dyn MemoryTracker> = self.memory.clone();
        let mut thread = self.engine.spawn(town_engine::bootstrap_program(), memory);
        let deadline = crate::preempt::PreemptDeadline::arm(self.config.time_slice_nanos).as_nanos();
        thread.resume(town_engine::ResumeInput {
            deadline_cpu_nanos: deadline,
            payload: town_engine::ResumePayload::Initial,
        });
    }

    /// Spawn a VM's dedicated worker OS thread (spec.md §5 "one worker
    /// thread per VM") and return the handle a `Router` uses to feed it
    /// messages.
    pub fn spawn_worker(
        user_id: i32,
        engine: Arc<dyn ScriptEngine>,
        outbox: Arc<dyn Outbox>,
        config: VmConfig,
    ) -> (VmHandle, std::thread::JoinHandle<()>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let vm = Vm::new(user_id, engine, outbox, config);
        let join = std::thread::Builder::new()
            .name(format!("town-vm-{user_id}"))
            .spawn(move || vm.run_worker(rx))
            .expect("failed to spawn VM worker thread");
        (VmHandle { sender: tx }, join)
    }

    pub fn user_id(&self) -> i32 {
        self.user_id
    }

    pub fn script_count(&self) -> usize {
        self.scripts.len()
    }

    pub fn memory_used_bytes(&self) -> usize {
        self.memory.used_bytes()
    }

    pub fn count_preempt(&self) -> u64 {
        self.count_preempt
    }

    pub fn count_force_terminate(&self) -> u64 {
        self.count_force_terminate
    }

    /// `(any_script_sleeping, earliest_wake_at)` across every Script's
    /// threads (spec.md §3 invariant, restated at VM level).
    pub fn sleeping_summary(&self) -> (bool, Option<Instant>) {
        let earliest = self.earliest_wake_at();
        (earliest.is_some(), earliest)
    }

    fn earliest_wake_at(&self) -> Option<Instant> {
        self.scripts
            .values()
            .filter_map(|s| s.sleeping_summary().1)
            .min()
    }

    /// Outer scheduling pass (spec.md §4.7 `run_scripts()`): the same
    /// two-phase sweep-with-retry as `Script::run_threads`, one level up.
    pub fn run_scripts(&mut self) -> VmOutcome {
        let mut retried = false;
        let mut preempted = false;
        let mut any_ran = false;

        'outer: loop {
            let mut newly_scheduled = false;
            let ids: Vec<i32> = self.scripts.keys().copied().collect();

            for id in ids {
                let already_scheduled = match self.scripts.get(&id) {
                    Some(s) => s.was_scheduled_yet,
                    None => continue,
                };
                if already_scheduled {
                    continue;
                }
                newly_scheduled = true;
                if let Some(s) = self.scripts.get_mut(&id) {
                    s.was_scheduled_yet = true;
                }

                let status = self.scripts.get_mut(&id).unwrap().run_threads(&self.config);
                self.drain_script_events(id);

                match status {
                    ScriptStatus::Preempted => {
                        self.count_preempt += 1;
                        any_ran = true;
                        preempted = true;
                        break 'outer;
                    }
                    ScriptStatus::KeepGoing => any_ran = true,
                    ScriptStatus::Finished | ScriptStatus::AllWaiting => {}
                }
            }

            if !newly_scheduled {
                if retried {
                    break;
                }
                for s in self.scripts.values_mut() {
                    s.was_scheduled_yet = false;
                }
                retried = true;
                continue;
            }
            break;
        }

        if preempted {
            return VmOutcome::Preempted;
        }
        if self.scripts.is_empty() {
            VmOutcome::Finished
        } else if !any_ran {
            VmOutcome::AllWaiting
        } else {
            VmOutcome::KeepGoing
        }
    }

    /// Turn a Script's pending events (produced by `compile_and_start`,
    /// `start_callback`, or a `run_threads` sweep) into outbound messages,
    /// assigning a fresh `api_key` for every awaited API call.
    fn drain_script_events(&mut self, entity_id: i32) {
        let events = match self.scripts.get_mut(&entity_id) {
            Some(s) => s.take_events(),
            None => return,
        };
        for event in events {
            match event {
                ScriptEvent::ApiCall {
                    thread_id,
                    name,
                    args,
                    await_response,
                } => self.emit_api_call(entity_id, thread_id, name, args, await_response),
                ScriptEvent::Print(text) => {
                    self.outbox.send(Message::with_data(
                        MessageType::ScriptPrint,
                        self.user_id,
                        entity_id,
                        0,
                        0,
                        text.into_bytes(),
                    ));
                }
                ScriptEvent::ScriptError(err) => {
                    eprintln!(
                        "town-rt: script error (user {}, entity {entity_id}): {err}",
                        self.user_id
                    );
                    self.outbox.send(Message::with_data(
                        MessageType::ScriptError,
                        self.user_id,
                        entity_id,
                        0,
                        0,
                        err.to_string().into_bytes(),
                    ));
                }
                ScriptEvent::SetCallback {
                    callback_id,
                    enabled,
                } => {
                    self.outbox.send(Message::empty(
                        MessageType::SetCallback,
                        self.user_id,
                        entity_id,
                        callback_id.index() as i32,
                        enabled as u8,
                    ));
                }
            }
        }
    }

    /// Encode and send one API call. The call name travels as the first
    /// packed `STRING` value ahead of the actual arguments (spec.md §8 S2),
    /// so `status` carries the *total* encoded value count rather than a
    /// bare argument count — see `DESIGN.md` for why this resolves the
    /// apparent S2/S6 discrepancy in `spec.md`.
    fn emit_api_call(&mut self, entity_id: i32, thread_id: u64, name: String, args: Vec<ApiValue>, await_response: bool) {
        let mut values = Vec::with_capacity(args.len() + 1);
        values.push(ApiValue::Str(name.into_bytes()));
        values.extend(args);
        let status = values.len().min(u8::MAX as usize) as u8;
        let payload = encode_values(&values);

        if await_response {
            let key = self.next_api_key;
            self.next_api_key += 1;
            self.api_owner.insert(key, entity_id);
            if let Some(script) = self.scripts.get_mut(&entity_id) {
                script.assign_api_key(thread_id, key);
            }
            self.outbox.send(Message::with_data(
                MessageType::ApiCallGet,
                self.user_id,
                entity_id,
                key,
                status,
                payload,
            ));
        } else {
            self.outbox.send(Message::with_data(
                MessageType::ApiCall,
                self.user_id,
                entity_id,
                0,
                status,
                payload,
            ));
        }
    }

    /// Dispatch one inbound message (spec.md §4.7 "message dispatch").
    /// Returns `true` if this was a `SHUTDOWN`, telling the worker loop to
    /// tear down and exit rather than run another scheduling pass.
    pub fn dispatch_message(&mut self, msg: Message) -> bool {
        match msg.message_type() {
            Some(MessageType::Ping) => {
                self.outbox.send(Message::empty(
                    MessageType::Pong,
                    msg.user_id,
                    msg.entity_id,
                    msg.other_id,
                    msg.status,
                ));
            }
            Some(MessageType::StartScript) => {
                self.scripts
                    .entry(msg.entity_id)
                    .or_insert_with(|| Script::new(msg.entity_id));
            }
            Some(MessageType::RunCode) => {
                let source = String::from_utf8_lossy(&msg.data).into_owned();
                if self.scripts.contains_key(&msg.entity_id) {
                    let memory: Arc<dyn MemoryTracker> = self.memory.clone();
                    self.scripts.get_mut(&msg.entity_id).unwrap().compile_and_start(
                        &source,
                        self.engine.as_ref(),
                        memory,
                        &self.config,
                    );
                    self.drain_script_events(msg.entity_id);
                } else {
                    eprintln!(
                        "town-rt: RUN_CODE for unknown entity {} (user {})",
                        msg.entity_id, self.user_id
                    );
                }
            }
            Some(MessageType::StopScript) => {
                self.scripts.remove(&msg.entity_id);
                self.api_owner.retain(|_, owner| *owner != msg.entity_id);
            }
            Some(MessageType::ApiCallGet) => {
                if let Some(&owner) = self.api_owner.get(&msg.other_id) {
                    let values = decode_values(&msg.data, msg.status as usize);
                    if let Some(script) = self.scripts.get_mut(&owner) {
                        script.deliver_api_result(msg.other_id, values);
                    }
                    self.api_owner.remove(&msg.other_id);
                }
            }
            Some(MessageType::ApiCallUnref) => {
                // Drop a pending result the caller no longer wants without
                // leaking the slot (spec.md §9 Open Questions, resolved in
                // SPEC_FULL.md §7 for the caller-initiated case).
                self.api_owner.remove(&msg.other_id);
            }
            Some(MessageType::Callback) => {
                if let Some(callback_id) = usize::try_from(msg.other_id)
                    .ok()
                    .and_then(CallbackTypeId::from_index)
                {
                    let values = decode_values(&msg.data, msg.status as usize);
                    if self.scripts.contains_key(&msg.entity_id) {
                        let memory: Arc<dyn MemoryTracker> = self.memory.clone();
                        self.scripts.get_mut(&msg.entity_id).unwrap().start_callback(
                            callback_id,
                            values,
                            self.engine.as_ref(),
                            memory,
                            &self.config,
                        );
                        self.drain_script_events(msg.entity_id);
                    }
                }
            }
            Some(MessageType::StatusQuery) => {
                if msg.status == 0 {
                    let report = self.status_report();
                    self.outbox.send(Message::with_data(
                        MessageType::StatusQuery,
                        msg.user_id,
                        msg.entity_id,
                        msg.other_id,
                        1,
                        report.into_bytes(),
                    ));
                }
            }
            Some(MessageType::Shutdown) => return true,
            // Pong, VersionCheck, SetCallback, ScriptError, ScriptPrint
            // travel svc->host only; an unknown raw type is likewise a
            // no-op at this layer (spec.md §4.7).
            _ => {}
        }
        false
    }

    /// A rendered diagnostic string for `STATUS_QUERY` (spec.md §6).
    fn status_report(&self) -> String {
        format!(
            "user={} scripts={} threads={} memory={}/{} preempts={} force_terminates={}",
            self.user_id,
            self.scripts.len(),
            self.scripts.values().map(Script::thread_count).sum::<usize>(),
            self.memory.used_bytes(),
            self.config.memory_limit_bytes,
            self.count_preempt,
            self.count_force_terminate,
        )
    }

    /// Deliver `CALLBACK_MISC_SHUTDOWN` to every Script one last time, then
    /// drop them all (spec.md §4.6 `shutdown()`, §4.7 "tear down all
    /// Scripts and exit").
    fn teardown_all(&mut self) {
        let ids: Vec<i32> = self.scripts.keys().copied().collect();
        for id in ids {
            let memory: Arc<dyn MemoryTracker> = self.memory.clone();
            if let Some(script) = self.scripts.get_mut(&id) {
                script.shutdown(self.engine.as_ref(), memory, &self.config);
                self.drain_script_events(id);
            }
        }
        self.scripts.clear();
        eprintln!("town-rt: VM for user {} shut down", self.user_id);
    }

    /// Erase every Script whose force-terminate strikes reached the limit
    /// (spec.md §4.7 "Scripts whose `count_force_terminate` ... are erased
    /// after the sweep").
    fn purge_terminated_scripts(&mut self) {
        let dead: Vec<i32> = self
            .scripts
            .iter()
            .filter(|(_, s)| s.count_force_terminate() >= self.config.terminate_script_after_strikes)
            .map(|(id, _)| *id)
            .collect();
        for id in dead {
            self.scripts.remove(&id);
            self.api_owner.retain(|_, owner| *owner != id);
            self.count_force_terminate += 1;
            eprintln!(
                "town-rt: entity {id} (user {}) terminated after repeated strikes",
                self.user_id
            );
        }
    }

    /// The worker thread's main loop (spec.md §4.7 `thread_function()`).
    /// Consumes `self` since a VM never outlives its single dedicated
    /// thread.
    pub fn run_worker(mut self, inbox: Receiver<Message>) {
        loop {
            for msg in inbox.try_iter() {
                if self.dispatch_message(msg) {
                    self.teardown_all();
                    return;
                }
            }

            let status = self.run_scripts();
            self.purge_terminated_scripts();

            match status {
                VmOutcome::Preempted | VmOutcome::KeepGoing => continue,
                VmOutcome::AllWaiting => {
                    if let Some(wake_at) = self.earliest_wake_at() {
                        let now = Instant::now();
                        let wait = wake_at.saturating_duration_since(now).max(Duration::from_millis(0));
                        match inbox.recv_timeout(wait) {
                            Ok(msg) => {
                                if self.dispatch_message(msg) {
                                    self.teardown_all();
                                    return;
                                }
                            }
                            Err(RecvTimeoutError::Timeout) => {}
                            Err(RecvTimeoutError::Disconnected) => return,
                        }
                    } else if !self.block_on_inbox(&inbox) {
                        return;
                    }
                }
                VmOutcome::Finished => {
                    if !self.block_on_inbox(&inbox) {
                        return;
                    }
                }
            }
        }
    }

    /// Block indefinitely for the next message, dispatching it. Returns
    /// `false` if the inbox disconnected (the `Router` dropped every
    /// `VmHandle`), telling the caller to exit.
    fn block_on_inbox(&mut self, inbox: &Receiver<Message>) -> bool {
        match inbox.recv() {
            Ok(msg) => {
                if self.dispatch_message(msg) {
                    self.teardown_all();
                    false
                } else {
                    true
                }
            }
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use town_engine::ReferenceEngine;

    struct RecordingOutbox {
        sent: Mutex<Vec<Message>>,
    }

    impl RecordingOutbox {
        fn new() -> Arc<Self> {
            Arc::new(RecordingOutbox { sent: Mutex::new(Vec::new()) })
        }
        fn drain(&self) -> Vec<Message> {
            std::mem::take(&mut self.sent.lock())
        }
    }

    impl Outbox for RecordingOutbox {
        fn send(&self, msg: Message) {
            self.sent.lock().push(msg);
        }
    }

    fn new_vm(outbox: Arc<RecordingOutbox>) -> Vm {
        Vm::new(1, Arc::new(ReferenceEngine), outbox, VmConfig::default())
    }

    #[test]
    fn ping_is_echoed_as_pong() {
        let outbox = RecordingOutbox::new();
        let mut vm = new_vm(outbox.clone());
        let shutdown = vm.dispatch_message(Message::empty(MessageType::Ping, 7, 0, 42, 9));
        assert!(!shutdown);
        let sent = outbox.drain();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].message_type(), Some(MessageType::Pong));
        assert_eq!(sent[0].user_id, 7);
        assert_eq!(sent[0].other_id, 42);
        assert_eq!(sent[0].status, 9);
    }

    #[test]
    fn happy_path_runs_code_and_emits_an_api_call() {
        let outbox = RecordingOutbox::new();
        let mut vm = new_vm(outbox.clone());
        vm.dispatch_message(Message::empty(MessageType::StartScript, 1, 5, 0, 0));
        vm.dispatch_message(Message::with_data(
            MessageType::RunCode,
            1,
            5,
            0,
            0,
            b"tt.owner_say('hi')".to_vec(),
        ));

        let sent = outbox.drain();
        assert_eq!(sent.len(), 1);
        let msg = &sent[0];
        assert_eq!(msg.message_type(), Some(MessageType::ApiCall));
        assert_eq!(msg.other_id, 0);
        let values = decode_values(&msg.data, msg.status as usize);
        assert_eq!(
            values,
            vec![
                ApiValue::Str(b"ownersay".to_vec()),
                ApiValue::Str(b"hi".to_vec())
            ]
        );
    }

    #[test]
    fn run_code_for_an_unstarted_entity_is_a_no_op() {
        let outbox = RecordingOutbox::new();
        let mut vm = new_vm(outbox.clone());
        vm.dispatch_message(Message::with_data(
            MessageType::RunCode,
            1,
            9,
            0,
            0,
            b"tt.owner_say('hi')".to_vec(),
        ));
        assert!(outbox.drain().is_empty());
        assert_eq!(vm.script_count(), 0);
    }

    #[test]
    fn api_call_get_response_resumes_a_waiting_script() {
        let outbox = RecordingOutbox::new();
        let mut vm = new_vm(outbox.clone());
        vm.dispatch_message(Message::empty(MessageType::StartScript, 1, 5, 0, 0));
        vm.dispatch_message(Message::with_data(
            MessageType::RunCode,
            1,
            5,
            0,
            0,
            b"print(storage.load('k'))".to_vec(),
        ));

        let sent = outbox.drain();
        assert_eq!(sent.len(), 1);
        let request = &sent[0];
        assert_eq!(request.message_type(), Some(MessageType::ApiCallGet));
        let key = request.other_id;
        assert!(key > 0);

        let response_payload = encode_values(&[ApiValue::Str(b"v".to_vec())]);
        let shutdown = vm.dispatch_message(Message::with_data(
            MessageType::ApiCallGet,
            1,
            5,
            key,
            1,
            response_payload,
        ));
        assert!(!shutdown);

        let status = vm.run_scripts();
        assert_eq!(status, VmOutcome::Finished);
        let sent = outbox.drain();
        assert!(sent
            .iter()
            .any(|m| m.message_type() == Some(MessageType::ScriptPrint) && m.data == b"v"));
    }

    #[test]
    fn a_runaway_allocation_loop_fails_with_a_script_error_and_frees_its_memory() {
        let outbox = RecordingOutbox::new();
        let mut config = VmConfig::default();
        config.memory_limit_bytes = 4096; // a handful of 1024-byte grows, then the cap trips
        let mut vm = Vm::new(1, Arc::new(ReferenceEngine), outbox.clone(), config);

        vm.dispatch_message(Message::empty(MessageType::StartScript, 1, 5, 0, 0));
        vm.dispatch_message(Message::with_data(
            MessageType::RunCode,
            1,
            5,
            0,
            0,
            b"local t={}; for i=1,1e9 do t[i]=string.rep('x',1024) end".to_vec(),
        ));

        // the allocation loop has no preemption-check between grows, so the
        // cap trips and the thread fails within the dispatch above already;
        // a few more sweeps are harmless no-ops on the now-empty script.
        for _ in 0..8 {
            vm.run_scripts();
        }

        assert!(vm.memory_used_bytes() <= config.memory_limit_bytes);
        assert_eq!(vm.memory_used_bytes(), 0);
        let sent = outbox.drain();
        assert!(sent
            .iter()
            .any(|m| m.message_type() == Some(MessageType::ScriptError)));
    }

    #[test]
    fn status_query_echoes_a_diagnostic_reply() {
        let outbox = RecordingOutbox::new();
        let mut vm = new_vm(outbox.clone());
        vm.dispatch_message(Message::empty(MessageType::StatusQuery, 1, 0, 0, 0));
        let sent = outbox.drain();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].status, 1);
        let text = String::from_utf8(sent[0].data.clone()).unwrap();
        assert!(text.contains("user=1"));
    }

    #[test]
    fn shutdown_is_reported_to_the_worker_loop() {
        let outbox = RecordingOutbox::new();
        let mut vm = new_vm(outbox.clone());
        assert!(vm.dispatch_message(Message::empty(MessageType::Shutdown, 1, 0, 0, 0)));
    }

    #[test]
    fn stop_script_removes_it_and_future_messages_are_no_ops() {
        let outbox = RecordingOutbox::new();
        let mut vm = new_vm(outbox.clone());
        vm.dispatch_message(Message::empty(MessageType::StartScript, 1, 5, 0, 0));
        vm.dispatch_message(Message::empty(MessageType::StopScript, 1, 5, 0, 0));
        assert_eq!(vm.script_count(), 0);

        outbox.drain();
        vm.dispatch_message(Message::with_data(
            MessageType::RunCode,
            1,
            5,
            0,
            0,
            b"tt.owner_say('hi')".to_vec(),
        ));
        assert!(outbox.drain().is_empty());
    }

    #[test]
    fn a_runaway_script_is_eventually_purged_while_the_vm_stays_responsive() {
        let outbox = RecordingOutbox::new();
        let mut config = VmConfig::default();
        config.time_slice_nanos = 0;
        config.penalty_threshold_ms = 0;
        config.penalty_sleep_ms = 0;
        config.terminate_thread_after_strikes = 1;
        config.terminate_script_after_strikes = 1;
        let mut vm = Vm::new(1, Arc::new(ReferenceEngine), outbox.clone(), config);

        vm.dispatch_message(Message::empty(MessageType::StartScript, 1, 5, 0, 0));
        vm.dispatch_message(Message::with_data(
            MessageType::RunCode,
            1,
            5,
            0,
            0,
            b"while true do end".to_vec(),
        ));

        for _ in 0..10 {
            vm.run_scripts();
            vm.purge_terminated_scripts();
        }
        assert_eq!(vm.script_count(), 0);
        assert!(vm.count_preempt() >= 1);

        // the VM itself is still responsive afterward.
        let shutdown = vm.dispatch_message(Message::empty(MessageType::Ping, 1, 0, 3, 0));
        assert!(!shutdown);
        assert!(outbox
            .drain()
            .iter()
            .any(|m| m.message_type() == Some(MessageType::Pong)));
    }
}
