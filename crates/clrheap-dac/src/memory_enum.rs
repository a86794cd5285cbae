//! Iterator over an `ISOSMemoryEnum` cursor.

use std::iter::FusedIterator;
use std::marker::PhantomData;

use crate::hresult::{Status, to_presence};
use crate::raw::SosMemoryEnumRaw;
use crate::records::SosMemoryRegion;

/// Lazy, finite sequence of memory regions owned by the DAC.
///
/// Regions are pulled one at a time. The sequence cannot be restarted: once
/// it ends (exhaustion or a failed `Next`) the native cursor is released and
/// every further call yields `None`. It borrows the binding it came from so it
/// cannot outlive the DAC session.
pub struct SosMemoryEnum<'dac, E: SosMemoryEnumRaw> {
    cursor: Option<E>,
    _session: PhantomData<&'dac ()>,
}

impl<E: SosMemoryEnumRaw> SosMemoryEnum<'_, E> {
    pub(crate) fn new(cursor: E) -> Self {
        Self {
            cursor: Some(cursor),
            _session: PhantomData,
        }
    }

    /// Total number of regions the cursor reports, if it can tell.
    pub fn region_count(&self) -> Option<u32> {
        let cursor = self.cursor.as_ref()?;
        let mut count = 0;
        to_presence(cursor.get_count(&mut count)).then_some(count)
    }

    /// Advance past `count` regions without reading them.
    ///
    /// Returns `false` if fewer than `count` regions remained; the sequence is
    /// then finished.
    pub fn skip_regions(&mut self, count: u32) -> bool {
        let Some(cursor) = self.cursor.as_ref() else {
            return count == 0;
        };
        let hr = cursor.skip(count);
        if Status::classify(hr) == Status::Success {
            return true;
        }
        tracing::trace!(count, hr = hr.0, "skip ran past the end");
        self.finish();
        false
    }

    pub fn is_finished(&self) -> bool {
        self.cursor.is_none()
    }

    fn finish(&mut self) {
        self.cursor = None;
    }
}

impl<E: SosMemoryEnumRaw> Iterator for SosMemoryEnum<'_, E> {
    type Item = SosMemoryRegion;

    fn next(&mut self) -> Option<SosMemoryRegion> {
        let cursor = self.cursor.as_ref()?;

        let mut region = [SosMemoryRegion::default()];
        let mut fetched = 0u32;
        let hr = cursor.next(&mut region, &mut fetched);
        if !to_presence(hr) {
            tracing::debug!(hr = hr.0, "ISOSMemoryEnum::Next failed");
            self.finish();
            return None;
        }
        if fetched == 0 {
            self.finish();
            return None;
        }
        Some(region[0])
    }
}

impl<E: SosMemoryEnumRaw> FusedIterator for SosMemoryEnum<'_, E> {}

impl<E: SosMemoryEnumRaw> std::fmt::Debug for SosMemoryEnum<'_, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SosMemoryEnum")
            .field("finished", &self.is_finished())
            .finish()
    }
}
