//! Sentinel-based memory-integrity checks.
//!
//! Every long-lived state block carries a `magic_start` and `magic_end`
//! field initialized to `MAGIC`. A mismatch means something scribbled over
//! the block (hardware fault, wild pointer in unsafe glue) and must provoke
//! a deterministic alarm rather than silent misbehavior.

use gantry_traits::Fault;

pub(crate) const MAGIC: u16 = 0x12EF;

#[inline]
pub(crate) fn check(magic_start: u16, magic_end: u16, fault: Fault) -> Result<(), Fault> {
    if magic_start != MAGIC || magic_end != MAGIC {
        return Err(fault);
    }
    Ok(())
}
