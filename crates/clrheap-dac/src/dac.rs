//! DAC (Data Access Component) interface definitions for `ISOSDac13`.
//!
//! Manual vtables: the slot order below is the binary contract. Any change to
//! it is a different interface with a different IID.

use std::ffi::{c_char, c_void};
use windows_core::{GUID, HRESULT, IUnknown, IUnknown_Vtbl, Interface};

use crate::records::{LoaderHeapKind, SosMemoryRegion};

/// Target-process address as the DAC reports it (always 64 bits wide).
pub type ClrDataAddress = u64;

// GUIDs for DAC interfaces
pub const IID_ISOS_DAC13: GUID = GUID::from_u128(0x3176a8ed_597b_4f54_a71f_83695c6a8c5e);
pub const IID_ISOS_MEMORY_ENUM: GUID = GUID::from_u128(0xE4B860EC_337A_40C0_A591_F09A9680690F);

/// Loader heap visitor: `(block address, block size, is current block)`.
pub type LoaderHeapTraverse = unsafe extern "system" fn(ClrDataAddress, usize, i32);

/// `ISOSDac13` interface pointer. Reference counting comes from [`IUnknown`].
#[repr(transparent)]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ISOSDac13(IUnknown);

unsafe impl Interface for ISOSDac13 {
    type Vtable = ISOSDac13Vtbl;
    const IID: GUID = IID_ISOS_DAC13;
}

impl std::ops::Deref for ISOSDac13 {
    type Target = IUnknown;

    fn deref(&self) -> &IUnknown {
        &self.0
    }
}

/// `ISOSMemoryEnum` interface pointer.
#[repr(transparent)]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ISOSMemoryEnum(IUnknown);

unsafe impl Interface for ISOSMemoryEnum {
    type Vtable = ISOSMemoryEnumVtbl;
    const IID: GUID = IID_ISOS_MEMORY_ENUM;
}

impl std::ops::Deref for ISOSMemoryEnum {
    type Target = IUnknown;

    fn deref(&self) -> &IUnknown {
        &self.0
    }
}

#[repr(C)]
pub struct ISOSDac13Vtbl {
    pub base: IUnknown_Vtbl,
    pub traverse_loader_heap: unsafe extern "system" fn(
        *mut c_void,
        ClrDataAddress,
        LoaderHeapKind,
        LoaderHeapTraverse,
    ) -> HRESULT,
    pub get_domain_loader_allocator:
        unsafe extern "system" fn(*mut c_void, ClrDataAddress, *mut ClrDataAddress) -> HRESULT,
    pub get_loader_allocator_heap_names:
        unsafe extern "system" fn(*mut c_void, i32, *mut *const c_char, *mut i32) -> HRESULT,
    pub get_loader_allocator_heaps: unsafe extern "system" fn(
        *mut c_void,
        ClrDataAddress,
        i32,
        *mut ClrDataAddress,
        *mut LoaderHeapKind,
        *mut i32,
    ) -> HRESULT,
    pub get_handle_table_memory_regions:
        unsafe extern "system" fn(*mut c_void, *mut *mut c_void) -> HRESULT,
    pub get_gc_bookkeeping_memory_regions:
        unsafe extern "system" fn(*mut c_void, *mut *mut c_void) -> HRESULT,
    pub get_gc_free_regions: unsafe extern "system" fn(*mut c_void, *mut *mut c_void) -> HRESULT,
    pub locked_flush: unsafe extern "system" fn(*mut c_void) -> HRESULT,
}

/// `ISOSMemoryEnum : ISOSEnum : IUnknown`
#[repr(C)]
pub struct ISOSMemoryEnumVtbl {
    pub base: IUnknown_Vtbl,
    // ISOSEnum
    pub skip: unsafe extern "system" fn(*mut c_void, u32) -> HRESULT,
    pub reset: unsafe extern "system" fn(*mut c_void) -> HRESULT,
    pub get_count: unsafe extern "system" fn(*mut c_void, *mut u32) -> HRESULT,
    // ISOSMemoryEnum
    pub next:
        unsafe extern "system" fn(*mut c_void, u32, *mut SosMemoryRegion, *mut u32) -> HRESULT,
}
