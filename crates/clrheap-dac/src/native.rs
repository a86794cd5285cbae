//! Vtable calls into a live DAC.
//!
//! All pointer marshaling and `unsafe` dispatch for `ISOSDac13` and
//! `ISOSMemoryEnum` lives here.

use std::ffi::{c_char, c_void};

use windows_core::{HRESULT, IUnknown, Interface};

use crate::dac::{
    ClrDataAddress, ISOSDac13, ISOSDac13Vtbl, ISOSMemoryEnum, ISOSMemoryEnumVtbl,
    LoaderHeapTraverse,
};
use crate::error::{Error, Result};
use crate::hresult::E_NOINTERFACE;
use crate::raw::{SosDac13Raw, SosMemoryEnumRaw};
use crate::records::{LoaderHeapKind, SosMemoryRegion};

/// `ISOSDac13` reached through its vtable.
#[derive(Debug, Clone)]
pub struct NativeSosDac13 {
    dac: ISOSDac13,
}

impl NativeSosDac13 {
    /// `QueryInterface` the given DAC object for `ISOSDac13`.
    ///
    /// The caller keeps its own reference on `ptr`.
    ///
    /// # Safety
    /// `ptr` must be null or a live COM object (typically the `IXCLRDataProcess`
    /// returned by `CLRDataCreateInstance`).
    pub unsafe fn from_raw(ptr: *mut c_void) -> Result<Self> {
        let unknown = unsafe { IUnknown::from_raw_borrowed(&ptr) }.ok_or(Error::NullInterface)?;
        Ok(Self {
            dac: cast(unknown)?,
        })
    }

    pub fn as_raw(&self) -> *mut c_void {
        self.dac.as_raw()
    }

    fn vtbl(&self) -> &ISOSDac13Vtbl {
        self.dac.vtable()
    }

    fn open_regions(
        &self,
        entry: unsafe extern "system" fn(*mut c_void, *mut *mut c_void) -> HRESULT,
        regions: &mut Option<NativeSosMemoryEnum>,
    ) -> HRESULT {
        *regions = None;
        let mut out: *mut c_void = std::ptr::null_mut();
        let hr = unsafe { entry(self.as_raw(), &mut out) };
        if out.is_null() {
            return hr;
        }

        // An out-param reference is ours even if the call reported failure
        let unknown = unsafe { IUnknown::from_raw(out) };
        if hr.is_err() {
            return hr;
        }

        match cast::<ISOSMemoryEnum>(&unknown) {
            Ok(cursor) => {
                *regions = Some(NativeSosMemoryEnum { cursor });
                hr
            }
            Err(e) => {
                tracing::debug!(error = %e, "region enumerator rejected ISOSMemoryEnum");
                E_NOINTERFACE
            }
        }
    }
}

/// `QueryInterface` through windows-core, keeping the IID in the error.
fn cast<T: Interface>(unknown: &IUnknown) -> Result<T> {
    unknown.cast::<T>().map_err(|e| Error::InterfaceNotSupported {
        iid: T::IID,
        hr: e.code(),
    })
}

// SAFETY: heap names come straight from the DAC, which owns them for the
// lifetime of the process object this binding holds a reference on.
unsafe impl SosDac13Raw for NativeSosDac13 {
    type MemoryEnum = NativeSosMemoryEnum;

    fn traverse_loader_heap(
        &self,
        heap: ClrDataAddress,
        kind: LoaderHeapKind,
        callback: LoaderHeapTraverse,
    ) -> HRESULT {
        unsafe { (self.vtbl().traverse_loader_heap)(self.as_raw(), heap, kind, callback) }
    }

    fn get_domain_loader_allocator(
        &self,
        domain: ClrDataAddress,
        allocator: &mut ClrDataAddress,
    ) -> HRESULT {
        unsafe { (self.vtbl().get_domain_loader_allocator)(self.as_raw(), domain, allocator) }
    }

    fn get_loader_allocator_heap_names(
        &self,
        names: &mut [*const c_char],
        needed: &mut i32,
    ) -> HRESULT {
        unsafe {
            (self.vtbl().get_loader_allocator_heap_names)(
                self.as_raw(),
                capacity(names.len()),
                buffer_ptr(names),
                needed,
            )
        }
    }

    fn get_loader_allocator_heaps(
        &self,
        allocator: ClrDataAddress,
        addresses: &mut [ClrDataAddress],
        kinds: &mut [LoaderHeapKind],
        needed: &mut i32,
    ) -> HRESULT {
        assert_eq!(
            addresses.len(),
            kinds.len(),
            "heap address and kind buffers must have equal length"
        );
        unsafe {
            (self.vtbl().get_loader_allocator_heaps)(
                self.as_raw(),
                allocator,
                capacity(addresses.len()),
                buffer_ptr(addresses),
                buffer_ptr(kinds),
                needed,
            )
        }
    }

    fn get_handle_table_memory_regions(
        &self,
        regions: &mut Option<NativeSosMemoryEnum>,
    ) -> HRESULT {
        self.open_regions(self.vtbl().get_handle_table_memory_regions, regions)
    }

    fn get_gc_bookkeeping_memory_regions(
        &self,
        regions: &mut Option<NativeSosMemoryEnum>,
    ) -> HRESULT {
        self.open_regions(self.vtbl().get_gc_bookkeeping_memory_regions, regions)
    }

    fn get_gc_free_regions(&self, regions: &mut Option<NativeSosMemoryEnum>) -> HRESULT {
        self.open_regions(self.vtbl().get_gc_free_regions, regions)
    }

    fn locked_flush(&self) -> HRESULT {
        unsafe { (self.vtbl().locked_flush)(self.as_raw()) }
    }
}

/// `ISOSMemoryEnum` reached through its vtable.
#[derive(Debug)]
pub struct NativeSosMemoryEnum {
    cursor: ISOSMemoryEnum,
}

impl NativeSosMemoryEnum {
    fn vtbl(&self) -> &ISOSMemoryEnumVtbl {
        self.cursor.vtable()
    }
}

impl SosMemoryEnumRaw for NativeSosMemoryEnum {
    fn skip(&self, count: u32) -> HRESULT {
        unsafe { (self.vtbl().skip)(self.cursor.as_raw(), count) }
    }

    fn get_count(&self, count: &mut u32) -> HRESULT {
        unsafe { (self.vtbl().get_count)(self.cursor.as_raw(), count) }
    }

    fn next(&self, regions: &mut [SosMemoryRegion], fetched: &mut u32) -> HRESULT {
        let count = u32::try_from(regions.len()).unwrap_or(u32::MAX);
        unsafe { (self.vtbl().next)(self.cursor.as_raw(), count, buffer_ptr(regions), fetched) }
    }
}

/// Element count as the DAC's `int` capacity parameter.
fn capacity(len: usize) -> i32 {
    i32::try_from(len).unwrap_or(i32::MAX)
}

/// Null for an empty slice, as the count-query phase expects.
fn buffer_ptr<T>(buf: &mut [T]) -> *mut T {
    if buf.is_empty() {
        std::ptr::null_mut()
    } else {
        buf.as_mut_ptr()
    }
}
