//! Numeric conversions shared across layers.

use num_traits::Float;

/// Convert an `f64` constant into `T`.
///
/// Conversions into the supported float types never fail; NaN is returned
/// for types that cannot represent the value so the problem stays visible.
#[inline]
pub fn lit<T: Float>(value: f64) -> T {
    T::from(value).unwrap_or_else(T::nan)
}

/// Convert a count into `T`.
#[inline]
pub fn count<T: Float>(n: usize) -> T {
    T::from(n).unwrap_or_else(T::nan)
}

/// Convert `T` into `f64` for diagnostics and error payloads.
#[inline]
pub fn to_f64<T: Float>(value: T) -> f64 {
    value.to_f64().unwrap_or(f64::NAN)
}
