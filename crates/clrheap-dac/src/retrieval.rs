//! Two-phase retrieval of variable-length DAC results.
//!
//! The DAC cannot allocate on our behalf, so list-returning entries are called
//! twice: once with an empty buffer to learn the count, then again with a
//! buffer of exactly that size. Failures at either phase yield an empty list.
//!
//! The count is only valid if the target does not change between the two
//! calls. Nothing on the native side guarantees that; the second-phase count
//! is re-checked and the result truncated to what was actually written.

use windows_core::HRESULT;

use crate::hresult::to_presence;

/// One output stream.
///
/// `call` receives the destination buffer (empty on the first phase) and an
/// out-param for the element count.
pub(crate) fn collect<T, F>(operation: &str, fill: T, mut call: F) -> Vec<T>
where
    T: Copy,
    F: FnMut(&mut [T], &mut i32) -> HRESULT,
{
    let Some(capacity) = query_count(operation, |needed| call(&mut [], needed)) else {
        return Vec::new();
    };

    let mut buffer = vec![fill; capacity];
    let mut written = 0i32;
    let hr = call(&mut buffer, &mut written);
    if !to_presence(hr) {
        tracing::debug!(operation, hr = hr.0, "fill call failed");
        return Vec::new();
    }

    buffer.truncate(usable_len(operation, capacity, written));
    buffer
}

/// Two output streams filled by the same call, zipped index-wise.
pub(crate) fn collect_pairs<A, B, F>(operation: &str, fill: (A, B), mut call: F) -> Vec<(A, B)>
where
    A: Copy,
    B: Copy,
    F: FnMut(&mut [A], &mut [B], &mut i32) -> HRESULT,
{
    let Some(capacity) = query_count(operation, |needed| call(&mut [], &mut [], needed)) else {
        return Vec::new();
    };

    let mut buffers = PairedBuffers::new(capacity, fill);
    let mut written = 0i32;
    let hr = call(&mut buffers.first, &mut buffers.second, &mut written);
    if !to_presence(hr) {
        tracing::debug!(operation, hr = hr.0, "fill call failed");
        return Vec::new();
    }

    buffers.into_pairs(usable_len(operation, capacity, written))
}

/// First phase. `None` means "stop, the answer is empty".
fn query_count(operation: &str, call: impl FnOnce(&mut i32) -> HRESULT) -> Option<usize> {
    let mut needed = 0i32;
    let hr = call(&mut needed);
    if !to_presence(hr) {
        tracing::debug!(operation, hr = hr.0, "count query failed");
        return None;
    }

    tracing::trace!(operation, needed, "count query");
    usize::try_from(needed).ok().filter(|&n| n > 0)
}

/// Number of elements that are both allocated and reported as written.
fn usable_len(operation: &str, capacity: usize, written: i32) -> usize {
    let written = usize::try_from(written).unwrap_or(0);
    if written != capacity {
        tracing::warn!(operation, capacity, written, "element count changed between calls");
    }
    written.min(capacity)
}

/// Parallel output arrays that only ever leave this module zipped together.
struct PairedBuffers<A, B> {
    first: Vec<A>,
    second: Vec<B>,
}

impl<A: Copy, B: Copy> PairedBuffers<A, B> {
    fn new(len: usize, (a, b): (A, B)) -> Self {
        Self {
            first: vec![a; len],
            second: vec![b; len],
        }
    }

    fn into_pairs(self, len: usize) -> Vec<(A, B)> {
        assert_eq!(
            self.first.len(),
            self.second.len(),
            "parallel DAC output arrays must have equal length"
        );
        self.first
            .into_iter()
            .zip(self.second)
            .take(len)
            .collect()
    }
}
