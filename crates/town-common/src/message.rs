//! The message taxonomy carried over the framed pipe (spec.md §6).

use std::fmt;

/// The `type` byte of a framed message header.
///
/// `ApiCallUnref` and `ScriptPrint` are not named in the distilled message
/// table but are present in `original_source/src/scripting.hpp`'s
/// `VM_MessageType` enum (see `SPEC_FULL.md` §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    Ping = 0,
    Pong = 1,
    VersionCheck = 2,
    Shutdown = 3,
    StartScript = 4,
    RunCode = 5,
    StopScript = 6,
    ApiCall = 7,
    ApiCallGet = 8,
    Callback = 9,
    SetCallback = 10,
    ScriptError = 11,
    StatusQuery = 12,
    ScriptPrint = 13,
    ApiCallUnref = 14,
}

impl MessageType {
    /// Decode the wire `type` byte. Unknown values are not an error at the
    /// framing layer (§4.1); the router treats them as a harmless no-op.
    pub fn from_u8(b: u8) -> Option<Self> {
        Some(match b {
            0 => Self::Ping,
            1 => Self::Pong,
            2 => Self::VersionCheck,
            3 => Self::Shutdown,
            4 => Self::StartScript,
            5 => Self::RunCode,
            6 => Self::StopScript,
            7 => Self::ApiCall,
            8 => Self::ApiCallGet,
            9 => Self::Callback,
            10 => Self::SetCallback,
            11 => Self::ScriptError,
            12 => Self::StatusQuery,
            13 => Self::ScriptPrint,
            14 => Self::ApiCallUnref,
            _ => return None,
        })
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_known_type() {
        for b in 0..=14u8 {
            let ty = MessageType::from_u8(b).expect("known type");
            assert_eq!(ty.as_u8(), b);
        }
    }

    #[test]
    fn unknown_type_is_none() {
        assert_eq!(MessageType::from_u8(200), None);
    }
}
