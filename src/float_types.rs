//! Scalar type and the crate-wide geometric tolerance

#[cfg(feature = "f32")]
pub type Real = f32;
#[cfg(feature = "f64")]
pub type Real = f64;

use core::str::FromStr;
use std::sync::OnceLock;

static TOLERANCE: OnceLock<Real> = OnceLock::new();

#[cfg(feature = "f32")]
const DEFAULT_TOLERANCE: Real = 1e-4;
#[cfg(feature = "f64")]
const DEFAULT_TOLERANCE: Real = 1e-6;

/// Length below which a bounding box side or a face normal counts as zero.
///
/// Taken from `ISOGRID_TOLERANCE` at build time when that parses as a [`Real`],
/// from [`set_tolerance`] when it ran first, and from a precision-dependent
/// default otherwise.
pub fn tolerance() -> Real {
    *TOLERANCE.get_or_init(|| {
        option_env!("ISOGRID_TOLERANCE")
            .and_then(|raw| Real::from_str(raw).ok())
            .map_or(DEFAULT_TOLERANCE, |value| value.max(Real::EPSILON))
    })
}

/// Fix the tolerance before first use. Later calls have no effect.
pub fn set_tolerance(value: Real) {
    if TOLERANCE.set(value.max(Real::EPSILON)).is_err() {
        tracing::debug!(value, "tolerance already fixed, ignoring override");
    }
}
