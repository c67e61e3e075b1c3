//! Numeric normalization shared by every adapter.
//!
//! - sticks / free axes → `[-1.0, 1.0]`
//! - triggers / force → `[0.0, 1.0]`
//!
//! Raw samples outside the declared range are clamped to the nearest bound
//! *before* normalization. NaN samples map to the neutral value.

/// Clamp into `[-1, 1]`.
#[inline]
pub fn clamp_unit(v: f32) -> f32 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(-1.0, 1.0)
    }
}

/// Clamp into `[0, 1]`.
#[inline]
pub fn clamp_positive(v: f32) -> f32 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}

/// Map a raw integer sample in `[min, max]` onto `[-1, 1]`.
pub fn signed_to_unit(raw: i32, min: i32, max: i32) -> f32 {
    if max <= min {
        return 0.0;
    }
    let raw = raw.clamp(min, max);
    let span = (max as f64) - (min as f64);
    (((raw as f64 - min as f64) / span) * 2.0 - 1.0) as f32
}

/// Map a raw integer sample in `[min, max]` onto `[0, 1]`.
pub fn unsigned_to_unit(raw: i32, min: i32, max: i32) -> f32 {
    if max <= min {
        return 0.0;
    }
    let raw = raw.clamp(min, max);
    ((raw as f64 - min as f64) / ((max as f64) - (min as f64))) as f32
}

/// Normalize a signed 16-bit thumbstick sample into `[-1, 1]`.
///
/// The negative half has one more step than the positive half, so each side is
/// scaled separately to reach both bounds exactly.
#[inline]
pub fn thumb_to_unit(v: i16) -> f32 {
    if v >= 0 {
        (v as f32) / 32767.0
    } else {
        (v as f32) / 32768.0
    }
}

/// Normalize an unsigned byte stick sample (centre 0x80) into `[-1, 1]`.
#[inline]
pub fn byte_to_unit(v: u8) -> f32 {
    if v >= 0x80 {
        (v as f32 - 128.0) / 127.0
    } else {
        (v as f32 - 128.0) / 128.0
    }
}

/// Normalize an unsigned byte trigger into `[0, 1]`.
#[inline]
pub fn byte_to_positive(v: u8) -> f32 {
    (v as f32) / 255.0
}

/// Convert a trigger reported on a full signed axis (`-1` released, `+1` pulled) into `[0, 1]`.
#[inline]
pub fn signed_axis_to_trigger(v: f32) -> f32 {
    (clamp_unit(v) + 1.0) / 2.0
}

/// Tri-state stick Z overlay: `-1.0` while the thumb button is pressed, else `0.0`.
#[inline]
pub fn thumb_press_overlay(pressed: bool) -> f32 {
    if pressed {
        -1.0
    } else {
        0.0
    }
}
