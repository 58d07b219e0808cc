//! End-to-end test of the framed stdio surface: encode requests the way a
//! real host would, feed them through `Router::run`, and decode whatever
//! comes back out the other side.

use std::io::{Cursor, Write};
use std::sync::{Arc, Mutex};

use town_engine::ReferenceEngine;
use town_router::{PipeOutbox, Router};
use town_wire::frame::{read_message, write_message, RawMessage};
use town_wire::{Message, MessageType, PipeWriter};

#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().write(buf)
    }
    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn encode_all(msgs: &[Message]) -> Vec<u8> {
    let mut buf = Vec::new();
    for m in msgs {
        write_message(&mut buf, &m.clone().into_raw()).unwrap();
    }
    buf
}

fn decode_all(buf: &[u8]) -> Vec<RawMessage> {
    let mut out = Vec::new();
    let mut cursor = Cursor::new(buf);
    while let Ok(msg) = read_message(&mut cursor) {
        out.push(msg);
    }
    out
}

#[test]
fn ping_round_trips_through_the_framed_pipe() {
    let sink = SharedBuf::default();
    let outbox = Arc::new(PipeOutbox::new(PipeWriter::new(sink.clone())));
    let mut router = Router::new(outbox, Arc::new(ReferenceEngine));

    let input = encode_all(&[Message::empty(MessageType::Ping, 3, 0, 11, 5)]);
    let mut reader = Cursor::new(input);
    router.run(&mut reader).unwrap();

    let out_bytes = sink.0.lock().unwrap().clone();
    let replies = decode_all(&out_bytes);
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].header.msg_type, MessageType::Pong.as_u8());
    assert_eq!(replies[0].header.user_id, 3);
    assert_eq!(replies[0].header.other_id, 11);
    assert_eq!(replies[0].header.status, 5);
}

#[test]
fn run_code_produces_an_outbound_api_call_for_its_vm() {
    let sink = SharedBuf::default();
    let outbox = Arc::new(PipeOutbox::new(PipeWriter::new(sink.clone())));
    let mut router = Router::new(outbox, Arc::new(ReferenceEngine));

    let input = encode_all(&[
        Message::empty(MessageType::StartScript, 1, 5, 0, 0),
        Message::with_data(MessageType::RunCode, 1, 5, 0, 0, b"tt.owner_say('hi')".to_vec()),
    ]);
    let mut reader = Cursor::new(input);
    router.run(&mut reader).unwrap();

    let out_bytes = sink.0.lock().unwrap().clone();
    let replies = decode_all(&out_bytes);
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].header.msg_type, MessageType::ApiCall.as_u8());
    assert_eq!(replies[0].header.entity_id, 5);
}

#[test]
fn truncated_trailing_bytes_terminate_the_router_cleanly() {
    let sink = SharedBuf::default();
    let outbox = Arc::new(PipeOutbox::new(PipeWriter::new(sink.clone())));
    let mut router = Router::new(outbox, Arc::new(ReferenceEngine));

    let mut input = encode_all(&[Message::empty(MessageType::Ping, 1, 0, 0, 0)]);
    input.push(7); // one stray byte, not a full header
    let mut reader = Cursor::new(input);
    assert!(router.run(&mut reader).is_ok());
}
