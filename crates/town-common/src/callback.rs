//! Callback type catalog (spec.md §3, §4.6).
//!
//! A `Script`'s callback table is a fixed-size array indexed by
//! `CallbackTypeId as usize`; `CALLBACK_COUNT` is the array length.

/// Identifies one of the host-originated events a script may register a
/// handler for via `SET_CALLBACK`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CallbackTypeId {
    MiscShutdown = 0,
    MapJoin,
    MapLeave,
    MapChat,
    MapBump,
    MapZoneEnter,
    MapZoneLeave,
    MapZoneMove,
    SelfPrivateMessage,
    SelfGotPermission,
    SelfTookControls,
    SelfKeyPress,
    SelfClick,
    SelfBotMessageButton,
    SelfRequestReceived,
    SelfUse,
    SelfSwitchMap,
}

/// Number of distinct callback slots in a `Script`'s callback table.
pub const CALLBACK_COUNT: usize = 17;

impl CallbackTypeId {
    /// All callback ids in table order, for iterating a callback array.
    pub const ALL: [CallbackTypeId; CALLBACK_COUNT] = [
        CallbackTypeId::MiscShutdown,
        CallbackTypeId::MapJoin,
        CallbackTypeId::MapLeave,
        CallbackTypeId::MapChat,
        CallbackTypeId::MapBump,
        CallbackTypeId::MapZoneEnter,
        CallbackTypeId::MapZoneLeave,
        CallbackTypeId::MapZoneMove,
        CallbackTypeId::SelfPrivateMessage,
        CallbackTypeId::SelfGotPermission,
        CallbackTypeId::SelfTookControls,
        CallbackTypeId::SelfKeyPress,
        CallbackTypeId::SelfClick,
        CallbackTypeId::SelfBotMessageButton,
        CallbackTypeId::SelfRequestReceived,
        CallbackTypeId::SelfUse,
        CallbackTypeId::SelfSwitchMap,
    ];

    /// Index into a `[T; CALLBACK_COUNT]` callback table.
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Reconstruct a `CallbackTypeId` from its wire/table index.
    pub fn from_index(idx: usize) -> Option<Self> {
        Self::ALL.get(idx).copied()
    }
}
