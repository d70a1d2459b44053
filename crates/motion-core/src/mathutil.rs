//! A small dual std/no_std f32 math shim.
//!
//! Every call site goes through here instead of calling `libm` or the f32
//! inherent methods directly, so the `std`/no_std split lives in exactly one
//! place.

#[cfg(feature = "std")]
#[inline]
pub fn sqrtf(x: f32) -> f32 {
    x.sqrt()
}
#[cfg(not(feature = "std"))]
#[inline]
pub fn sqrtf(x: f32) -> f32 {
    libm::sqrtf(x)
}

#[cfg(feature = "std")]
#[inline]
pub fn fabsf(x: f32) -> f32 {
    x.abs()
}
#[cfg(not(feature = "std"))]
#[inline]
pub fn fabsf(x: f32) -> f32 {
    libm::fabsf(x)
}

#[cfg(feature = "std")]
#[inline]
pub fn roundf(x: f32) -> f32 {
    x.round()
}
#[cfg(not(feature = "std"))]
#[inline]
pub fn roundf(x: f32) -> f32 {
    libm::roundf(x)
}

#[cfg(feature = "std")]
#[inline]
pub fn acosf(x: f32) -> f32 {
    x.acos()
}
#[cfg(not(feature = "std"))]
#[inline]
pub fn acosf(x: f32) -> f32 {
    libm::acosf(x)
}

#[cfg(feature = "std")]
#[inline]
pub fn sinf(x: f32) -> f32 {
    x.sin()
}
#[cfg(not(feature = "std"))]
#[inline]
pub fn sinf(x: f32) -> f32 {
    libm::sinf(x)
}

#[cfg(feature = "std")]
#[inline]
pub fn cosf(x: f32) -> f32 {
    x.cos()
}
#[cfg(not(feature = "std"))]
#[inline]
pub fn cosf(x: f32) -> f32 {
    libm::cosf(x)
}

#[cfg(feature = "std")]
#[inline]
pub fn atan2f(y: f32, x: f32) -> f32 {
    y.atan2(x)
}
#[cfg(not(feature = "std"))]
#[inline]
pub fn atan2f(y: f32, x: f32) -> f32 {
    libm::atan2f(y, x)
}
