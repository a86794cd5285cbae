//! One method per native entry point.
//!
//! These traits mirror the vtables slot for slot but take slices and
//! out-params instead of raw pointers. An empty slice stands for the null
//! buffer of a count query. [`crate::NativeSosDac13`] is the implementation
//! that calls into the DAC; anything else (tests, replayed captures) can stand
//! in for it.

use std::ffi::c_char;

use windows_core::HRESULT;

use crate::dac::{ClrDataAddress, LoaderHeapTraverse};
use crate::records::{LoaderHeapKind, SosMemoryRegion};

/// # Safety
///
/// [`crate::SosDac13`] reads every non-null pointer that
/// [`Self::get_loader_allocator_heap_names`] writes into `names` as a
/// NUL-terminated string. Each such pointer must stay valid for as long as the
/// implementor is alive.
pub unsafe trait SosDac13Raw {
    type MemoryEnum: SosMemoryEnumRaw;

    /// `callback` is only invoked before this call returns.
    fn traverse_loader_heap(
        &self,
        heap: ClrDataAddress,
        kind: LoaderHeapKind,
        callback: LoaderHeapTraverse,
    ) -> HRESULT;

    fn get_domain_loader_allocator(
        &self,
        domain: ClrDataAddress,
        allocator: &mut ClrDataAddress,
    ) -> HRESULT;

    /// Heap names are pointers to NUL-terminated narrow strings owned by the DAC.
    fn get_loader_allocator_heap_names(
        &self,
        names: &mut [*const c_char],
        needed: &mut i32,
    ) -> HRESULT;

    /// `addresses` and `kinds` always have the same length.
    ///
    /// # Panics
    /// Implementations may panic if the two buffers differ in length.
    fn get_loader_allocator_heaps(
        &self,
        allocator: ClrDataAddress,
        addresses: &mut [ClrDataAddress],
        kinds: &mut [LoaderHeapKind],
        needed: &mut i32,
    ) -> HRESULT;

    fn get_handle_table_memory_regions(&self, regions: &mut Option<Self::MemoryEnum>) -> HRESULT;

    fn get_gc_bookkeeping_memory_regions(
        &self,
        regions: &mut Option<Self::MemoryEnum>,
    ) -> HRESULT;

    fn get_gc_free_regions(&self, regions: &mut Option<Self::MemoryEnum>) -> HRESULT;

    fn locked_flush(&self) -> HRESULT;
}

pub trait SosMemoryEnumRaw {
    fn skip(&self, count: u32) -> HRESULT;

    fn get_count(&self, count: &mut u32) -> HRESULT;

    /// Fills up to `regions.len()` entries; `fetched` receives how many.
    fn next(&self, regions: &mut [SosMemoryRegion], fetched: &mut u32) -> HRESULT;
}
