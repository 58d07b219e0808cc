//! Process-level entry point for the Tilemap Town scripting service
//! (spec.md §4.8, C8): a single reader thread on the host pipe that
//! routes each framed message to the right per-user VM.

pub mod router;

use std::io::Write;
use std::sync::Arc;

use town_rt::vm::Outbox;
use town_wire::{Message, PipeWriter};

pub use router::Router;

/// Adapts a [`PipeWriter`] (shared, mutex-serialized) to the [`Outbox`]
/// trait every `Vm` worker writes through.
pub struct PipeOutbox<W: Write + Send> {
    writer: PipeWriter<W>,
}

impl<W: Write + Send> PipeOutbox<W> {
    pub fn new(writer: PipeWriter<W>) -> Self {
        PipeOutbox { writer }
    }
}

impl<W: Write + Send> Outbox for PipeOutbox<W> {
    fn send(&self, msg: Message) {
        if let Err(e) = self.writer.send(&msg.into_raw()) {
            eprintln!("town-router: failed writing outbound message: {e}");
        }
    }
}

/// Convenience constructor for the common case: a `townd` binary wiring
/// an arbitrary writer (stdout in production, a `Vec<u8>` in tests).
pub fn pipe_outbox<W: Write + Send + 'static>(writer: W) -> Arc<dyn Outbox> {
    Arc::new(PipeOutbox::new(PipeWriter::new(writer)))
}
