//! The decoded, typed form of a `RawMessage` (spec.md §3, §6): a `RawMessage`
//! with its `msg_type` byte resolved against `MessageType` and a receipt
//! timestamp attached, ready for the VM's dispatch loop.

use std::time::Instant;

use town_common::MessageType;

use crate::frame::RawMessage;

/// A fully decoded inbound or outbound message.
///
/// `data` transfers ownership with the message (spec.md §3): whoever holds
/// a `Message` is responsible for consuming `data` exactly once.
#[derive(Debug, Clone)]
pub struct Message {
    /// The raw type byte, kept even when it doesn't resolve to a known
    /// `MessageType` so dispatch can still treat it as a harmless no-op
    /// (spec.md §4.7) instead of discarding the message silently.
    pub raw_type: u8,
    pub user_id: i32,
    pub entity_id: i32,
    pub other_id: i32,
    pub status: u8,
    pub data: Vec<u8>,
    pub received_at: Instant,
}

impl Message {
    pub fn from_raw(raw: RawMessage, received_at: Instant) -> Self {
        Message {
            raw_type: raw.header.msg_type,
            user_id: raw.header.user_id,
            entity_id: raw.header.entity_id,
            other_id: raw.header.other_id,
            status: raw.header.status,
            data: raw.data,
            received_at,
        }
    }

    pub fn message_type(&self) -> Option<MessageType> {
        MessageType::from_u8(self.raw_type)
    }

    /// Build an outbound message of a known type with no payload.
    pub fn empty(
        msg_type: MessageType,
        user_id: i32,
        entity_id: i32,
        other_id: i32,
        status: u8,
    ) -> Self {
        Message {
            raw_type: msg_type.as_u8(),
            user_id,
            entity_id,
            other_id,
            status,
            data: Vec::new(),
            received_at: Instant::now(),
        }
    }

    /// Build an outbound message carrying `data`.
    pub fn with_data(
        msg_type: MessageType,
        user_id: i32,
        entity_id: i32,
        other_id: i32,
        status: u8,
        data: Vec<u8>,
    ) -> Self {
        Message {
            raw_type: msg_type.as_u8(),
            user_id,
            entity_id,
            other_id,
            status,
            data,
            received_at: Instant::now(),
        }
    }

    pub fn into_raw(self) -> RawMessage {
        RawMessage {
            header: crate::frame::MessageHeader {
                msg_type: self.raw_type,
                data_len: self.data.len() as u32,
                user_id: self.user_id,
                entity_id: self.entity_id,
                other_id: self.other_id,
                status: self.status,
            },
            data: self.data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::MessageHeader;

    #[test]
    fn round_trips_through_raw_message() {
        let raw = RawMessage {
            header: MessageHeader {
                msg_type: MessageType::Ping.as_u8(),
                data_len: 0,
                user_id: 7,
                entity_id: 0,
                other_id: 42,
                status: 9,
            },
            data: Vec::new(),
        };
        let msg = Message::from_raw(raw, Instant::now());
        assert_eq!(msg.message_type(), Some(MessageType::Ping));
        let back = msg.into_raw();
        assert_eq!(back.header.user_id, 7);
    }

    #[test]
    fn unknown_raw_type_is_not_discarded() {
        let raw = RawMessage {
            header: MessageHeader {
                msg_type: 250,
                data_len: 0,
                user_id: 0,
                entity_id: 0,
                other_id: 0,
                status: 0,
            },
            data: Vec::new(),
        };
        let msg = Message::from_raw(raw, Instant::now());
        assert_eq!(msg.message_type(), None);
    }
}
