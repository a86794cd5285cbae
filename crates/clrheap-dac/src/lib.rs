//! Bindings for the SOS DAC `ISOSDac13` interface.
//!
//! The DAC (Data Access Component) exposes the runtime's memory bookkeeping
//! through versioned COM interfaces. This crate wraps `ISOSDac13`, which covers
//! loader allocator heaps and the GC / handle-table memory region enumerators.
//!
//! # Architecture
//!
//! - [`SosDac13`] - Typed binding, one safe method per native entry
//! - [`SosDac13Raw`] - One method per vtable slot; [`NativeSosDac13`] performs the
//!   actual `extern "system"` calls
//! - [`SosMemoryEnum`] - Lazy iterator over an opaque native region cursor
//!
//! Variable-length results use the DAC's two-phase protocol: ask for the count
//! with an empty buffer, then call again with an exactly sized one.

pub mod dac;
pub mod error;
pub mod hresult;
pub mod memory_enum;
pub mod native;
pub mod raw;
pub mod records;
mod retrieval;
pub mod sos_dac13;
mod visitor;

#[cfg(test)]
mod testing;

pub use dac::{ClrDataAddress, IID_ISOS_DAC13, IID_ISOS_MEMORY_ENUM, ISOSDac13, ISOSMemoryEnum};
pub use error::{Error, Result};
pub use hresult::{Status, to_presence};
pub use memory_enum::SosMemoryEnum;
pub use native::{NativeSosDac13, NativeSosMemoryEnum};
pub use raw::{SosDac13Raw, SosMemoryEnumRaw};
pub use records::{
    CodeHeapKind, JitCodeHeapInfo, LoaderAllocatorHeap, LoaderHeapBlock, LoaderHeapKind,
    SosMemoryRegion,
};
pub use sos_dac13::SosDac13;
pub use windows_core::{GUID, HRESULT};
