//! Fixed-layout records exchanged with the DAC.
//!
//! Kind tags are `#[repr(transparent)]` newtypes rather than Rust enums: the
//! native side writes raw integers into our buffers and may produce values we
//! do not know about.

use std::fmt;

use crate::dac::ClrDataAddress;

/// Which loader heap implementation a heap address refers to.
#[repr(transparent)]
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct LoaderHeapKind(pub i32);

impl LoaderHeapKind {
    /// A `LoaderHeap` in the runtime.
    pub const NORMAL: Self = Self(0);
    /// An `ExplicitControlLoaderHeap` in the runtime.
    pub const EXPLICIT_CONTROL: Self = Self(1);

    pub fn name(self) -> Option<&'static str> {
        match self {
            Self::NORMAL => Some("Normal"),
            Self::EXPLICIT_CONTROL => Some("ExplicitControl"),
            _ => None,
        }
    }
}

impl fmt::Debug for LoaderHeapKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "LoaderHeapKind({})", self.0),
        }
    }
}

/// Kind of a JIT code heap.
#[repr(transparent)]
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CodeHeapKind(pub i32);

impl CodeHeapKind {
    pub const LOADER: Self = Self(0);
    pub const HOST: Self = Self(1);
    pub const UNKNOWN: Self = Self(2);
}

impl fmt::Debug for CodeHeapKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::LOADER => f.write_str("Loader"),
            Self::HOST => f.write_str("Host"),
            Self::UNKNOWN => f.write_str("Unknown"),
            other => write!(f, "CodeHeapKind({})", other.0),
        }
    }
}

/// JIT code heap descriptor.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JitCodeHeapInfo {
    pub kind: CodeHeapKind,
    pub address: ClrDataAddress,
    pub current_address: ClrDataAddress,
}

/// One memory region produced by an `ISOSMemoryEnum`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SosMemoryRegion {
    /// Start address of the region
    pub start: ClrDataAddress,
    /// Size of the region in bytes
    pub size: ClrDataAddress,
    /// Region specific payload (e.g. handle table type, GC generation)
    pub extra_data: ClrDataAddress,
    /// Owning GC heap index, 0 for workstation GC
    pub heap: i32,
}

impl SosMemoryRegion {
    /// One past the last byte of the region.
    pub fn end(&self) -> ClrDataAddress {
        self.start.saturating_add(self.size)
    }
}

/// A loader allocator heap: its address and implementation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoaderAllocatorHeap {
    pub address: ClrDataAddress,
    pub kind: LoaderHeapKind,
}

impl From<(ClrDataAddress, LoaderHeapKind)> for LoaderAllocatorHeap {
    fn from((address, kind): (ClrDataAddress, LoaderHeapKind)) -> Self {
        Self { address, kind }
    }
}

/// A block reported while traversing a loader heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoaderHeapBlock {
    pub address: ClrDataAddress,
    pub size: usize,
    /// Whether this is the block the heap is currently allocating from.
    pub is_current: bool,
}
