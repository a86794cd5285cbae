//! Typed binding over `ISOSDac13`.
//!
//! Every method issues at most the native calls needed for its answer and
//! never reports per-call failures as errors: a failed call produces the same
//! neutral value (`0`, empty, `None`) as a call that found nothing.
//!
//! Calls are synchronous and the DAC is not re-entrant per session. The
//! binding holds raw COM pointers and is therefore neither `Send` nor `Sync`.

use std::ffi::{CStr, c_char, c_void};

use windows_core::HRESULT;

use crate::dac::{ClrDataAddress, LoaderHeapTraverse};
use crate::error::Result;
use crate::hresult::to_presence;
use crate::memory_enum::SosMemoryEnum;
use crate::native::NativeSosDac13;
use crate::raw::SosDac13Raw;
use crate::records::{LoaderAllocatorHeap, LoaderHeapBlock, LoaderHeapKind};
use crate::retrieval;
use crate::visitor::{self, VisitorScope};

/// Binding to one DAC session's `ISOSDac13` interface.
#[derive(Debug, Clone)]
pub struct SosDac13<R = NativeSosDac13> {
    raw: R,
}

impl SosDac13<NativeSosDac13> {
    /// Bind to a live DAC object.
    ///
    /// Fails with [`crate::Error::InterfaceNotSupported`] if the object does not
    /// implement `ISOSDac13` (older runtimes). The caller keeps its own
    /// reference on `ptr`.
    ///
    /// # Safety
    /// `ptr` must be null or a live COM object from the DAC.
    pub unsafe fn from_raw(ptr: *mut c_void) -> Result<Self> {
        let raw = unsafe { NativeSosDac13::from_raw(ptr) }?;
        Ok(Self { raw })
    }

    pub fn as_raw(&self) -> *mut c_void {
        self.raw.as_raw()
    }
}

impl<R: SosDac13Raw> SosDac13<R> {
    /// Bind to any implementation of the raw interface.
    pub fn with_raw(raw: R) -> Self {
        Self { raw }
    }

    /// Walk the blocks of a loader heap, calling `visitor` once per block.
    ///
    /// The visitor stays alive until the native call has returned. A panic in
    /// the visitor stops delivery of further blocks and is resumed once the
    /// DAC returns control.
    pub fn traverse_loader_heap<F>(
        &self,
        heap: ClrDataAddress,
        kind: LoaderHeapKind,
        mut visitor: F,
    ) -> HRESULT
    where
        F: FnMut(LoaderHeapBlock),
    {
        let scope = VisitorScope::enter(&mut visitor);
        let hr = self.raw.traverse_loader_heap(heap, kind, visitor::trampoline);
        if let Some(payload) = scope.exit() {
            std::panic::resume_unwind(payload);
        }
        if hr.is_err() {
            tracing::debug!(heap, ?kind, hr = hr.0, "TraverseLoaderHeap failed");
        }
        hr
    }

    /// Like [`Self::traverse_loader_heap`] with a caller-provided native callback.
    pub fn traverse_loader_heap_raw(
        &self,
        heap: ClrDataAddress,
        kind: LoaderHeapKind,
        callback: LoaderHeapTraverse,
    ) -> HRESULT {
        self.raw.traverse_loader_heap(heap, kind, callback)
    }

    /// Loader allocator of an app domain.
    ///
    /// Returns `0` both when the domain has no allocator and when the query
    /// failed; the two cannot be told apart. A `0` domain is answered without
    /// calling the DAC.
    pub fn domain_loader_allocator(&self, domain: ClrDataAddress) -> ClrDataAddress {
        if domain == 0 {
            return 0;
        }

        let mut allocator = 0;
        let hr = self.raw.get_domain_loader_allocator(domain, &mut allocator);
        if to_presence(hr) {
            allocator
        } else {
            tracing::debug!(domain, hr = hr.0, "GetDomainLoaderAllocator failed");
            0
        }
    }

    /// Names of the heaps every loader allocator owns, in DAC order.
    pub fn loader_allocator_heap_names(&self) -> Vec<String> {
        retrieval::collect(
            "GetLoaderAllocatorHeapNames",
            std::ptr::null(),
            |names, needed| self.raw.get_loader_allocator_heap_names(names, needed),
        )
        .into_iter()
        // SAFETY: `SosDac13Raw` implementors hand out null or live C strings
        .map(|name| unsafe { narrow_string(name) })
        .collect()
    }

    /// Heaps of one loader allocator. A `0` allocator yields nothing without
    /// calling the DAC.
    pub fn loader_allocator_heaps(&self, allocator: ClrDataAddress) -> Vec<LoaderAllocatorHeap> {
        if allocator == 0 {
            return Vec::new();
        }

        retrieval::collect_pairs(
            "GetLoaderAllocatorHeaps",
            (0, LoaderHeapKind::default()),
            |addresses, kinds, needed| {
                self.raw.get_loader_allocator_heaps(allocator, addresses, kinds, needed)
            },
        )
        .into_iter()
        .map(LoaderAllocatorHeap::from)
        .collect()
    }

    pub fn handle_table_regions(&self) -> Option<SosMemoryEnum<'_, R::MemoryEnum>> {
        self.open_regions("GetHandleTableMemoryRegions", |out| {
            self.raw.get_handle_table_memory_regions(out)
        })
    }

    pub fn gc_bookkeeping_regions(&self) -> Option<SosMemoryEnum<'_, R::MemoryEnum>> {
        self.open_regions("GetGCBookkeepingMemoryRegions", |out| {
            self.raw.get_gc_bookkeeping_memory_regions(out)
        })
    }

    pub fn gc_free_regions(&self) -> Option<SosMemoryEnum<'_, R::MemoryEnum>> {
        self.open_regions("GetGCFreeRegions", |out| self.raw.get_gc_free_regions(out))
    }

    /// Ask the DAC to flush its cached view of the target.
    pub fn locked_flush(&self) {
        let _ = self.raw.locked_flush();
    }

    fn open_regions(
        &self,
        operation: &str,
        call: impl FnOnce(&mut Option<R::MemoryEnum>) -> HRESULT,
    ) -> Option<SosMemoryEnum<'_, R::MemoryEnum>> {
        let mut cursor = None;
        let hr = call(&mut cursor);
        if !to_presence(hr) {
            tracing::debug!(operation, hr = hr.0, "region query failed");
            return None;
        }
        cursor.map(SosMemoryEnum::new)
    }
}

/// Decode a DAC-owned narrow string. Null becomes `""`; bytes that are not
/// UTF-8 are replaced, never dropped.
unsafe fn narrow_string(ptr: *const c_char) -> String {
    if ptr.is_null() {
        return String::new();
    }
    unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
}
