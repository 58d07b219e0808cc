//! Router (C8, spec.md §4.8): the single reader thread on the host pipe.
//! Finds or creates the `Vm` for each message's `user_id`, spawning its
//! worker thread on first contact, and forwards the message — except the
//! three global message types addressed to `user_id = 0`, which are
//! handled here directly rather than handed to any one VM.
//!
//! Grounded on `snow-rt::dist::node::accept_loop`'s "single thread,
//! spawn-per-new-key" shape (`SPEC_FULL.md` §5), generalized from
//! accepting new TCP connections to dispatching framed-stdio messages to
//! per-user workers.

use std::io::Read;
use std::sync::Arc;
use std::time::Instant;

use rustc_hash::FxHashMap;

use town_common::UserId;
use town_engine::ScriptEngine;
use town_rt::vm::{Outbox, Vm, VmHandle};
use town_rt::VmConfig;
use town_wire::frame::{read_message, FrameError};
use town_wire::{Message, MessageType};

struct VmEntry {
    handle: VmHandle,
    join: std::thread::JoinHandle<()>,
}

/// Process-level entry point. Owns every VM this process has spawned and
/// the shared outbound pipe they all write through.
pub struct Router {
    vms: FxHashMap<UserId, VmEntry>,
    outbox: Arc<dyn Outbox>,
    engine: Arc<dyn ScriptEngine>,
    config: VmConfig,
}

impl Router {
    pub fn new(outbox: Arc<dyn Outbox>, engine: Arc<dyn ScriptEngine>) -> Self {
        Router {
            vms: FxHashMap::default(),
            outbox,
            engine,
            config: VmConfig::default(),
        }
    }

    /// Read framed messages from `reader` until the stream closes or a
    /// global `SHUTDOWN` is received. Per spec.md §7, a framing-layer
    /// error (anything but a clean EOF) terminates the router; the caller
    /// is expected to exit the process with a nonzero status on `Err`.
    pub fn run<R: Read>(&mut self, reader: &mut R) -> Result<(), FrameError> {
        loop {
            let raw = match read_message(reader) {
                Ok(raw) => raw,
                Err(FrameError::ShortRead) => {
                    eprintln!("town-router: host pipe closed, shutting down all VMs");
                    self.shutdown_all();
                    return Ok(());
                }
                Err(e) => return Err(e),
            };
            let msg = Message::from_raw(raw, Instant::now());
            if self.route(msg) {
                return Ok(());
            }
        }
    }

    /// Dispatch one message. Returns `true` if this was a global `SHUTDOWN`
    /// and the router should stop reading.
    fn route(&mut self, msg: Message) -> bool {
        if msg.user_id == 0 {
            match msg.message_type() {
                Some(MessageType::Shutdown) => {
                    self.shutdown_all();
                    return true;
                }
                Some(MessageType::StatusQuery) if msg.status == 0 => {
                    self.broadcast_status_query(&msg);
                    return false;
                }
                Some(MessageType::VersionCheck) => {
                    self.reply_version_check(&msg);
                    return false;
                }
                _ => {}
            }
        }

        let handle = self.find_or_create_vm(msg.user_id);
        handle.send(msg);
        false
    }

    fn find_or_create_vm(&mut self, user_id: UserId) -> VmHandle {
        if let Some(entry) = self.vms.get(&user_id) {
            return entry.handle.clone();
        }
        let (handle, join) = Vm::spawn_worker(user_id, self.engine.clone(), self.outbox.clone(), self.config);
        eprintln!("town-router: spawned VM for user {user_id}");
        self.vms.insert(user_id, VmEntry { handle: handle.clone(), join });
        handle
    }

    /// Fan a `SHUTDOWN` out to every live VM and wait for each worker
    /// thread to finish tearing down before returning.
    fn shutdown_all(&mut self) {
        let entries: Vec<VmEntry> = self.vms.drain().map(|(_, e)| e).collect();
        for entry in &entries {
            entry.handle.send(Message::empty(MessageType::Shutdown, 0, 0, 0, 0));
        }
        for entry in entries {
            let _ = entry.join.join();
        }
    }

    /// Fan a global `STATUS_QUERY` out to every live VM, re-tagging each
    /// copy with that VM's own `user_id` so its eventual reply (emitted
    /// independently by that VM through the shared outbox) is
    /// attributable to it.
    fn broadcast_status_query(&self, msg: &Message) {
        for (&user_id, entry) in &self.vms {
            entry.handle.send(Message::with_data(
                MessageType::StatusQuery,
                user_id,
                msg.entity_id,
                msg.other_id,
                0,
                msg.data.clone(),
            ));
        }
    }

    /// `VERSION_CHECK` touches no VM state, so the router answers it
    /// synchronously off the shared outbox rather than routing it.
    fn reply_version_check(&self, msg: &Message) {
        self.outbox.send(Message::empty(
            MessageType::VersionCheck,
            0,
            msg.entity_id,
            msg.other_id,
            msg.status,
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::io::Cursor;
    use town_engine::ReferenceEngine;
    use town_wire::frame::write_message;

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

    fn router(outbox: Arc<RecordingOutbox>) -> Router {
        Router::new(outbox, Arc::new(ReferenceEngine))
    }

    fn encode(msg: &Message) -> Vec<u8> {
        let mut buf = Vec::new();
        write_message(&mut buf, &msg.clone().into_raw()).unwrap();
        buf
    }

    #[test]
    fn ping_is_forwarded_to_its_vm_and_gets_a_pong() {
        let outbox = RecordingOutbox::new();
        let mut r = router(outbox.clone());
        // the Ping is queued ahead of the Shutdown on the same VM inbox, so by
        // the time `run` returns (after `shutdown_all` has joined the worker)
        // the Pong reply is already sitting in the outbox.
        let mut stream = Cursor::new({
            let mut buf = encode(&Message::empty(MessageType::Ping, 7, 0, 42, 9));
            buf.extend(encode(&Message::empty(MessageType::Shutdown, 0, 0, 0, 0)));
            buf
        });
        r.run(&mut stream).unwrap();

        let sent = outbox.drain();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].message_type(), Some(MessageType::Pong));
        assert_eq!(sent[0].user_id, 7);
        assert_eq!(sent[0].other_id, 42);
        assert_eq!(sent[0].status, 9);
    }

    #[test]
    fn global_shutdown_tears_down_every_vm() {
        let outbox = RecordingOutbox::new();
        let mut r = router(outbox.clone());
        let mut stream = Cursor::new({
            let mut buf = encode(&Message::empty(MessageType::StartScript, 1, 5, 0, 0));
            buf.extend(encode(&Message::empty(MessageType::Shutdown, 0, 0, 0, 0)));
            buf
        });
        r.run(&mut stream).unwrap();
        assert!(r.vms.is_empty());
    }

    #[test]
    fn version_check_is_answered_synchronously_without_spawning_a_vm() {
        let outbox = RecordingOutbox::new();
        let mut r = router(outbox.clone());
        let mut stream = Cursor::new(encode(&Message::empty(MessageType::VersionCheck, 0, 0, 3, 0)));
        r.run(&mut stream).unwrap();
        assert!(r.vms.is_empty());
        let sent = outbox.drain();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].message_type(), Some(MessageType::VersionCheck));
        assert_eq!(sent[0].other_id, 3);
    }

    #[test]
    fn truncated_stream_shuts_down_cleanly() {
        let outbox = RecordingOutbox::new();
        let mut r = router(outbox);
        let mut stream = Cursor::new(vec![0u8; 3]); // shorter than one header
        assert!(r.run(&mut stream).is_ok());
    }
}
