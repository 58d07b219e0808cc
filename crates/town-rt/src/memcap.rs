//! Per-VM memory cap (spec.md §4.3/C3).
//!
//! The tracker itself lives in `town-common` (so `town-engine` can depend
//! on the trait without depending on `town-rt`); this module just names
//! the concrete type a `VM` uses, matching the original `lua_allocator`'s
//! `used`/`limit` pair.

pub use town_common::AtomicMemoryTracker as MemoryCap;
