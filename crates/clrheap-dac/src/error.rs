//! Error types for clrheap.

use thiserror::Error;
use windows_core::{GUID, HRESULT};

/// Construction-time failures. Per-call DAC failures never surface here; they
/// degrade to empty results instead.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Interface pointer is null")]
    NullInterface,

    #[error("Interface {iid:?} not supported: 0x{:08X}", .hr.0)]
    InterfaceNotSupported { iid: GUID, hr: HRESULT },
}

pub type Result<T> = std::result::Result<T, Error>;
