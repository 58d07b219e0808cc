//! Wire-level concerns for the Tilemap Town scripting service: the
//! framed-pipe codec (C1) and the API value wire format (C2).

pub mod frame;
pub mod message;
pub mod value;

pub use frame::{FrameError, MessageHeader, PipeWriter, RawMessage, HEADER_SIZE};
pub use message::Message;
pub use town_common::MessageType;
pub use value::{ApiValue, WireError};
