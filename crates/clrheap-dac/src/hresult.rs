//! HRESULT constants and classification.

pub use windows_core::HRESULT;

pub const S_OK: HRESULT = HRESULT(0);
pub const S_FALSE: HRESULT = HRESULT(1);
pub const E_NOTIMPL: HRESULT = HRESULT(0x8000_4001_u32 as i32);
pub const E_NOINTERFACE: HRESULT = HRESULT(0x8000_4002_u32 as i32);
pub const E_POINTER: HRESULT = HRESULT(0x8000_4003_u32 as i32);
pub const E_FAIL: HRESULT = HRESULT(0x8000_4005_u32 as i32);
pub const E_INVALIDARG: HRESULT = HRESULT(0x8007_0057_u32 as i32);

/// Coarse outcome of a DAC call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// `S_OK`
    Success,
    /// Non-negative but not `S_OK`, e.g. `S_FALSE` ("ok, nothing more").
    SuccessWithCaveat,
    /// Negative code.
    Failure,
}

impl Status {
    pub fn classify(hr: HRESULT) -> Self {
        match hr.0 {
            0 => Status::Success,
            code if code > 0 => Status::SuccessWithCaveat,
            _ => Status::Failure,
        }
    }

    pub fn is_success(self) -> bool {
        self != Status::Failure
    }
}

/// Collapses a status into "did the call produce something".
///
/// This is lossy on purpose: every caller in this crate treats a failed call
/// the same way as a call that found nothing, and the failure code is dropped.
#[inline]
pub fn to_presence(hr: HRESULT) -> bool {
    Status::classify(hr).is_success()
}
