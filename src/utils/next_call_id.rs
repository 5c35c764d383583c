use crate::constants::CALL_ID_MASK;
use std::sync::atomic::{AtomicU32, Ordering};

/// Process-wide counter shared by every client.
static CALL_ID_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Returns the next call id in `[0, 2^31 - 1]`.
///
/// The underlying 32-bit counter wraps, so an id repeats only after 2^31
/// further calls.
#[inline]
pub fn next_call_id() -> i32 {
    mask_call_id(CALL_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
}

#[inline]
pub const fn mask_call_id(raw: u32) -> i32 {
    (raw & CALL_ID_MASK) as i32
}
