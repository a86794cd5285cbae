//! In-process fake DAC objects for tests.
//!
//! Each fake is a `#[repr(C)]` struct whose first field is a pointer to a
//! static vtable of `extern "system"` functions, laid out exactly like the real
//! `ISOSDac13` / `ISOSMemoryEnum` objects. Reference counts are tracked but
//! never free anything: the test handle owns the allocation.

use std::cell::{Cell, RefCell};
use std::ffi::{CStr, c_char, c_void};
use std::rc::Rc;

use windows_core::{GUID, HRESULT, IUnknown, IUnknown_Vtbl, Interface};

use crate::dac::{
    ClrDataAddress, IID_ISOS_DAC13, IID_ISOS_MEMORY_ENUM, ISOSDac13Vtbl, ISOSMemoryEnumVtbl,
    LoaderHeapTraverse,
};
use crate::hresult::{E_FAIL, E_INVALIDARG, E_NOINTERFACE, E_POINTER, S_FALSE, S_OK};
use crate::records::{LoaderHeapBlock, LoaderHeapKind, SosMemoryRegion};

// =============================================================================
// FakeSosDac13
// =============================================================================

#[repr(C)]
struct DacObject {
    // Read by callers through the object pointer
    #[allow(dead_code)]
    vtbl: *const ISOSDac13Vtbl,
    ref_count: Cell<u32>,
    supports_dac13: bool,
    heap_names: Vec<&'static CStr>,
    heaps: Vec<(ClrDataAddress, LoaderHeapKind)>,
    domain_allocators: Vec<(ClrDataAddress, ClrDataAddress)>,
    blocks: Vec<LoaderHeapBlock>,
    between_blocks: RefCell<Option<Box<dyn FnMut(usize)>>>,
    handle_table_regions: Option<FakeMemoryEnum>,
    bookkeeping_regions: Option<FakeMemoryEnum>,
    free_regions: Option<FakeMemoryEnum>,
    list_status: HRESULT,
    fill_status: HRESULT,
    region_status: HRESULT,
    native_calls: Cell<u32>,
    flush_calls: Cell<u32>,
    last_buffer_null: Cell<Option<bool>>,
    last_traversal: Cell<Option<(ClrDataAddress, LoaderHeapKind)>>,
}

static DAC_VTBL: ISOSDac13Vtbl = ISOSDac13Vtbl {
    base: IUnknown_Vtbl {
        QueryInterface: dac_query_interface,
        AddRef: dac_add_ref,
        Release: dac_release,
    },
    traverse_loader_heap: dac_traverse_loader_heap,
    get_domain_loader_allocator: dac_get_domain_loader_allocator,
    get_loader_allocator_heap_names: dac_get_loader_allocator_heap_names,
    get_loader_allocator_heaps: dac_get_loader_allocator_heaps,
    get_handle_table_memory_regions: dac_get_handle_table_memory_regions,
    get_gc_bookkeeping_memory_regions: dac_get_gc_bookkeeping_memory_regions,
    get_gc_free_regions: dac_get_gc_free_regions,
    locked_flush: dac_locked_flush,
};

/// Test-side handle to a fake `ISOSDac13` object.
pub(crate) struct FakeSosDac13 {
    object: Box<DacObject>,
}

impl FakeSosDac13 {
    pub(crate) fn builder() -> FakeSosDac13Builder {
        FakeSosDac13Builder {
            object: DacObject {
                vtbl: &DAC_VTBL,
                ref_count: Cell::new(1),
                supports_dac13: true,
                heap_names: Vec::new(),
                heaps: Vec::new(),
                domain_allocators: Vec::new(),
                blocks: Vec::new(),
                between_blocks: RefCell::new(None),
                handle_table_regions: None,
                bookkeeping_regions: None,
                free_regions: None,
                list_status: S_OK,
                fill_status: S_OK,
                region_status: S_OK,
                native_calls: Cell::new(0),
                flush_calls: Cell::new(0),
                last_buffer_null: Cell::new(None),
                last_traversal: Cell::new(None),
            },
        }
    }

    pub(crate) fn as_raw(&self) -> *mut c_void {
        &*self.object as *const DacObject as *mut c_void
    }

    pub(crate) fn ref_count(&self) -> u32 {
        self.object.ref_count.get()
    }

    /// Calls to `ISOSDac13` methods (IUnknown excluded).
    pub(crate) fn native_calls(&self) -> u32 {
        self.object.native_calls.get()
    }

    pub(crate) fn flush_calls(&self) -> u32 {
        self.object.flush_calls.get()
    }

    /// Whether the last list call passed a null destination buffer.
    pub(crate) fn last_buffer_was_null(&self) -> Option<bool> {
        self.object.last_buffer_null.get()
    }

    pub(crate) fn last_traversal(&self) -> Option<(ClrDataAddress, LoaderHeapKind)> {
        self.object.last_traversal.get()
    }
}

pub(crate) struct FakeSosDac13Builder {
    object: DacObject,
}

impl FakeSosDac13Builder {
    pub(crate) fn without_dac13(mut self) -> Self {
        self.object.supports_dac13 = false;
        self
    }

    pub(crate) fn heap_names(mut self, names: &[&'static CStr]) -> Self {
        self.object.heap_names = names.to_vec();
        self
    }

    pub(crate) fn heaps(mut self, heaps: &[(ClrDataAddress, LoaderHeapKind)]) -> Self {
        self.object.heaps = heaps.to_vec();
        self
    }

    pub(crate) fn domain_allocator(
        mut self,
        domain: ClrDataAddress,
        allocator: ClrDataAddress,
    ) -> Self {
        self.object.domain_allocators.push((domain, allocator));
        self
    }

    pub(crate) fn blocks(mut self, blocks: &[LoaderHeapBlock]) -> Self {
        self.object.blocks = blocks.to_vec();
        self
    }

    /// Runs after each visited block with the index of that block.
    pub(crate) fn between_blocks(self, hook: impl FnMut(usize) + 'static) -> Self {
        *self.object.between_blocks.borrow_mut() = Some(Box::new(hook));
        self
    }

    pub(crate) fn handle_table_regions(mut self, regions: FakeMemoryEnum) -> Self {
        self.object.handle_table_regions = Some(regions);
        self
    }

    pub(crate) fn bookkeeping_regions(mut self, regions: FakeMemoryEnum) -> Self {
        self.object.bookkeeping_regions = Some(regions);
        self
    }

    pub(crate) fn free_regions(mut self, regions: FakeMemoryEnum) -> Self {
        self.object.free_regions = Some(regions);
        self
    }

    /// Status of every list / lookup call.
    pub(crate) fn list_status(mut self, hr: HRESULT) -> Self {
        self.object.list_status = hr;
        self
    }

    /// Status of list calls that receive a destination buffer.
    pub(crate) fn fill_status(mut self, hr: HRESULT) -> Self {
        self.object.fill_status = hr;
        self
    }

    pub(crate) fn region_status(mut self, hr: HRESULT) -> Self {
        self.object.region_status = hr;
        self
    }

    pub(crate) fn build(self) -> FakeSosDac13 {
        FakeSosDac13 {
            object: Box::new(self.object),
        }
    }
}

unsafe fn dac<'a>(this: *mut c_void) -> &'a DacObject {
    unsafe { &*(this as *const DacObject) }
}

unsafe extern "system" fn dac_query_interface(
    this: *mut c_void,
    riid: *const GUID,
    ppv_object: *mut *mut c_void,
) -> HRESULT {
    if ppv_object.is_null() || riid.is_null() {
        return E_POINTER;
    }

    let object = unsafe { dac(this) };
    let riid = unsafe { *riid };
    if riid == IUnknown::IID || (riid == IID_ISOS_DAC13 && object.supports_dac13) {
        unsafe {
            *ppv_object = this;
            dac_add_ref(this);
        }
        return S_OK;
    }

    unsafe { *ppv_object = std::ptr::null_mut() };
    E_NOINTERFACE
}

unsafe extern "system" fn dac_add_ref(this: *mut c_void) -> u32 {
    let object = unsafe { dac(this) };
    object.ref_count.set(object.ref_count.get() + 1);
    object.ref_count.get()
}

unsafe extern "system" fn dac_release(this: *mut c_void) -> u32 {
    let object = unsafe { dac(this) };
    object.ref_count.set(object.ref_count.get() - 1);
    object.ref_count.get()
}

unsafe extern "system" fn dac_traverse_loader_heap(
    this: *mut c_void,
    heap: ClrDataAddress,
    kind: LoaderHeapKind,
    callback: LoaderHeapTraverse,
) -> HRESULT {
    let object = unsafe { dac(this) };
    object.native_calls.set(object.native_calls.get() + 1);
    object.last_traversal.set(Some((heap, kind)));
    if object.list_status.is_err() {
        return object.list_status;
    }

    for (index, block) in object.blocks.iter().enumerate() {
        unsafe { callback(block.address, block.size, block.is_current as i32) };
        if let Some(hook) = object.between_blocks.borrow_mut().as_mut() {
            hook(index);
        }
    }
    S_OK
}

unsafe extern "system" fn dac_get_domain_loader_allocator(
    this: *mut c_void,
    domain: ClrDataAddress,
    allocator: *mut ClrDataAddress,
) -> HRESULT {
    let object = unsafe { dac(this) };
    object.native_calls.set(object.native_calls.get() + 1);
    if object.list_status.is_err() {
        return object.list_status;
    }

    match object.domain_allocators.iter().find(|(d, _)| *d == domain) {
        Some(&(_, found)) => {
            unsafe { *allocator = found };
            S_OK
        }
        None => E_INVALIDARG,
    }
}

/// Shared fill logic: report the total, copy as much as fits.
fn fill_list<T: Copy>(
    object: &DacObject,
    items: &[T],
    capacity: i32,
    dest: *mut T,
    needed: *mut i32,
) -> HRESULT {
    object.native_calls.set(object.native_calls.get() + 1);
    object.last_buffer_null.set(Some(dest.is_null()));
    if object.list_status.is_err() {
        return object.list_status;
    }

    if !needed.is_null() {
        unsafe { *needed = items.len() as i32 };
    }
    if dest.is_null() {
        return S_OK;
    }
    if object.fill_status.is_err() {
        return object.fill_status;
    }

    let n = (capacity.max(0) as usize).min(items.len());
    unsafe { std::ptr::copy_nonoverlapping(items.as_ptr(), dest, n) };
    if n < items.len() { S_FALSE } else { S_OK }
}

unsafe extern "system" fn dac_get_loader_allocator_heap_names(
    this: *mut c_void,
    count: i32,
    names: *mut *const c_char,
    needed: *mut i32,
) -> HRESULT {
    let object = unsafe { dac(this) };
    let pointers: Vec<*const c_char> = object.heap_names.iter().map(|s| s.as_ptr()).collect();
    fill_list(object, &pointers, count, names, needed)
}

unsafe extern "system" fn dac_get_loader_allocator_heaps(
    this: *mut c_void,
    _allocator: ClrDataAddress,
    count: i32,
    addresses: *mut ClrDataAddress,
    kinds: *mut LoaderHeapKind,
    needed: *mut i32,
) -> HRESULT {
    let object = unsafe { dac(this) };
    let (heap_addresses, heap_kinds): (Vec<_>, Vec<_>) = object.heaps.iter().copied().unzip();

    let hr = fill_list(object, &heap_addresses, count, addresses, needed);
    if hr.is_ok() && !kinds.is_null() {
        let n = (count.max(0) as usize).min(heap_kinds.len());
        unsafe { std::ptr::copy_nonoverlapping(heap_kinds.as_ptr(), kinds, n) };
    }
    hr
}

fn hand_out_regions(
    object: &DacObject,
    regions: Option<&FakeMemoryEnum>,
    out: *mut *mut c_void,
) -> HRESULT {
    object.native_calls.set(object.native_calls.get() + 1);
    if out.is_null() {
        return E_POINTER;
    }

    match regions {
        Some(regions) => {
            // Handed out even on failure, the caller still owns the reference
            unsafe { *out = regions.add_ref_raw() };
            object.region_status
        }
        None => {
            unsafe { *out = std::ptr::null_mut() };
            E_FAIL
        }
    }
}

unsafe extern "system" fn dac_get_handle_table_memory_regions(
    this: *mut c_void,
    out: *mut *mut c_void,
) -> HRESULT {
    let object = unsafe { dac(this) };
    hand_out_regions(object, object.handle_table_regions.as_ref(), out)
}

unsafe extern "system" fn dac_get_gc_bookkeeping_memory_regions(
    this: *mut c_void,
    out: *mut *mut c_void,
) -> HRESULT {
    let object = unsafe { dac(this) };
    hand_out_regions(object, object.bookkeeping_regions.as_ref(), out)
}

unsafe extern "system" fn dac_get_gc_free_regions(
    this: *mut c_void,
    out: *mut *mut c_void,
) -> HRESULT {
    let object = unsafe { dac(this) };
    hand_out_regions(object, object.free_regions.as_ref(), out)
}

unsafe extern "system" fn dac_locked_flush(this: *mut c_void) -> HRESULT {
    let object = unsafe { dac(this) };
    object.native_calls.set(object.native_calls.get() + 1);
    object.flush_calls.set(object.flush_calls.get() + 1);
    // Callers never look at this
    E_FAIL
}

// =============================================================================
// FakeMemoryEnum
// =============================================================================

#[repr(C)]
struct EnumObject {
    #[allow(dead_code)]
    vtbl: *const ISOSMemoryEnumVtbl,
    ref_count: Cell<u32>,
    supports_memory_enum: Cell<bool>,
    regions: Vec<SosMemoryRegion>,
    position: Cell<usize>,
    next_calls: Cell<u32>,
    next_status: Cell<HRESULT>,
}

static ENUM_VTBL: ISOSMemoryEnumVtbl = ISOSMemoryEnumVtbl {
    base: IUnknown_Vtbl {
        QueryInterface: enum_query_interface,
        AddRef: enum_add_ref,
        Release: enum_release,
    },
    skip: enum_skip,
    reset: enum_reset,
    get_count: enum_get_count,
    next: enum_next,
};

/// Test-side handle to a fake `ISOSMemoryEnum`. Clones share the object.
#[derive(Clone)]
pub(crate) struct FakeMemoryEnum {
    object: Rc<EnumObject>,
}

impl FakeMemoryEnum {
    pub(crate) fn new(regions: Vec<SosMemoryRegion>) -> Self {
        Self {
            object: Rc::new(EnumObject {
                vtbl: &ENUM_VTBL,
                ref_count: Cell::new(1),
                supports_memory_enum: Cell::new(true),
                regions,
                position: Cell::new(0),
                next_calls: Cell::new(0),
                next_status: Cell::new(S_OK),
            }),
        }
    }

    pub(crate) fn ref_count(&self) -> u32 {
        self.object.ref_count.get()
    }

    pub(crate) fn next_calls(&self) -> u32 {
        self.object.next_calls.get()
    }

    pub(crate) fn set_supports_memory_enum(&self, supported: bool) {
        self.object.supports_memory_enum.set(supported);
    }

    /// Forces `Next` to fail with `hr` from now on.
    pub(crate) fn fail_next(&self, hr: HRESULT) {
        self.object.next_status.set(hr);
    }

    fn add_ref_raw(&self) -> *mut c_void {
        let raw = Rc::as_ptr(&self.object) as *mut c_void;
        unsafe { enum_add_ref(raw) };
        raw
    }
}

unsafe fn cursor<'a>(this: *mut c_void) -> &'a EnumObject {
    unsafe { &*(this as *const EnumObject) }
}

unsafe extern "system" fn enum_query_interface(
    this: *mut c_void,
    riid: *const GUID,
    ppv_object: *mut *mut c_void,
) -> HRESULT {
    if ppv_object.is_null() || riid.is_null() {
        return E_POINTER;
    }

    let object = unsafe { cursor(this) };
    let riid = unsafe { *riid };
    if riid == IUnknown::IID
        || (riid == IID_ISOS_MEMORY_ENUM && object.supports_memory_enum.get())
    {
        unsafe {
            *ppv_object = this;
            enum_add_ref(this);
        }
        return S_OK;
    }

    unsafe { *ppv_object = std::ptr::null_mut() };
    E_NOINTERFACE
}

unsafe extern "system" fn enum_add_ref(this: *mut c_void) -> u32 {
    let object = unsafe { cursor(this) };
    object.ref_count.set(object.ref_count.get() + 1);
    object.ref_count.get()
}

unsafe extern "system" fn enum_release(this: *mut c_void) -> u32 {
    let object = unsafe { cursor(this) };
    object.ref_count.set(object.ref_count.get() - 1);
    object.ref_count.get()
}

unsafe extern "system" fn enum_skip(this: *mut c_void, count: u32) -> HRESULT {
    let object = unsafe { cursor(this) };
    let remaining = object.regions.len() - object.position.get();
    let skipped = (count as usize).min(remaining);
    object.position.set(object.position.get() + skipped);
    if skipped == count as usize { S_OK } else { S_FALSE }
}

unsafe extern "system" fn enum_reset(this: *mut c_void) -> HRESULT {
    let object = unsafe { cursor(this) };
    object.position.set(0);
    S_OK
}

unsafe extern "system" fn enum_get_count(this: *mut c_void, count: *mut u32) -> HRESULT {
    if count.is_null() {
        return E_POINTER;
    }
    let object = unsafe { cursor(this) };
    unsafe { *count = object.regions.len() as u32 };
    S_OK
}

unsafe extern "system" fn enum_next(
    this: *mut c_void,
    count: u32,
    regions: *mut SosMemoryRegion,
    fetched: *mut u32,
) -> HRESULT {
    let object = unsafe { cursor(this) };
    object.next_calls.set(object.next_calls.get() + 1);
    if object.next_status.get().is_err() {
        return object.next_status.get();
    }
    if regions.is_null() || fetched.is_null() {
        return E_POINTER;
    }

    let start = object.position.get();
    let n = (count as usize).min(object.regions.len() - start);
    unsafe {
        std::ptr::copy_nonoverlapping(object.regions[start..].as_ptr(), regions, n);
        *fetched = n as u32;
    }
    object.position.set(start + n);
    if n == count as usize { S_OK } else { S_FALSE }
}
