//! Passing Rust closures to `TraverseLoaderHeap`.
//!
//! The native visitor signature carries no context pointer, so the closure is
//! parked in a thread-local stack for the duration of the native call and a
//! plain `extern "system"` trampoline forwards each block to the top entry.
//! The DAC invokes the visitor synchronously on the calling thread.

use std::any::Any;
use std::cell::RefCell;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};

use crate::dac::ClrDataAddress;
use crate::records::LoaderHeapBlock;

type Visitor = dyn FnMut(LoaderHeapBlock);

struct Frame {
    visitor: *mut Visitor,
    panic: Option<Box<dyn Any + Send>>,
}

thread_local! {
    static FRAMES: RefCell<Vec<Frame>> = const { RefCell::new(Vec::new()) };
}

/// Keeps a visitor reachable from [`trampoline`] until the scope ends.
///
/// Dropping the scope (including during unwinding) unregisters the visitor.
pub(crate) struct VisitorScope<'v> {
    depth: usize,
    _visitor: PhantomData<&'v mut (dyn FnMut(LoaderHeapBlock) + 'v)>,
}

impl<'v> VisitorScope<'v> {
    pub(crate) fn enter(visitor: &'v mut (dyn FnMut(LoaderHeapBlock) + 'v)) -> Self {
        // SAFETY: the erased pointer is only dereferenced while this scope is alive
        let visitor: *mut Visitor = unsafe {
            std::mem::transmute::<*mut (dyn FnMut(LoaderHeapBlock) + 'v), *mut Visitor>(visitor)
        };
        let depth = FRAMES.with(|frames| {
            let mut frames = frames.borrow_mut();
            frames.push(Frame {
                visitor,
                panic: None,
            });
            frames.len()
        });
        Self {
            depth,
            _visitor: PhantomData,
        }
    }

    /// Ends the scope and hands back a panic raised by the visitor, if any.
    pub(crate) fn exit(self) -> Option<Box<dyn Any + Send>> {
        let panic = self.pop();
        std::mem::forget(self);
        panic
    }

    fn pop(&self) -> Option<Box<dyn Any + Send>> {
        FRAMES.with(|frames| {
            let mut frames = frames.borrow_mut();
            debug_assert_eq!(frames.len(), self.depth, "visitor scopes must nest");
            frames.truncate(self.depth);
            frames.pop().and_then(|frame| frame.panic)
        })
    }
}

impl Drop for VisitorScope<'_> {
    fn drop(&mut self) {
        self.pop();
    }
}

/// Native-callable entry that forwards to the innermost live visitor.
pub(crate) unsafe extern "system" fn trampoline(
    address: ClrDataAddress,
    size: usize,
    is_current: i32,
) {
    let top = FRAMES.with(|frames| {
        let frames = frames.borrow();
        let index = frames.len().checked_sub(1)?;
        let frame = &frames[index];
        // Once the visitor panicked, the remaining blocks are dropped
        frame.panic.is_none().then_some((index, frame.visitor))
    });
    let Some((index, visitor)) = top else {
        return;
    };

    let block = LoaderHeapBlock {
        address,
        size,
        is_current: is_current != 0,
    };

    // The borrow is released before calling out so a visitor may start a
    // nested traversal.
    let result = panic::catch_unwind(AssertUnwindSafe(|| unsafe { (*visitor)(block) }));
    if let Err(payload) = result {
        FRAMES.with(|frames| {
            if let Some(frame) = frames.borrow_mut().get_mut(index) {
                frame.panic = Some(payload);
            }
        });
    }
}
