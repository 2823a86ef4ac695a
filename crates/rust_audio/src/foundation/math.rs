//! Math utilities and types
//!
//! Interpolation, epsilon comparison and volume domain conversion shared by
//! the music, effect and mixer systems.

pub use nalgebra::Vector3;

/// 3D vector type used for effect locations
pub type Vec3 = Vector3<f32>;

/// Tolerance used when comparing volumes for drift detection
pub const VOLUME_EPSILON: f32 = 1e-3;

/// Lowest value of the external mixer's decibel-like domain
pub const MIXER_DB_MIN: f32 = -80.0;

/// Highest value of the external mixer's decibel-like domain
pub const MIXER_DB_MAX: f32 = 20.0;

/// Linear interpolation between `a` and `b`, with `t` clamped to `[0, 1]`
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    let t = clamp01(t);
    a + (b - a) * t
}

/// Clamp a value into `[0, 1]`, mapping NaN to 0
pub fn clamp01(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Compare two floats within an explicit absolute tolerance
pub fn approx_eq(a: f32, b: f32, epsilon: f32) -> bool {
    approx::abs_diff_eq!(a, b, epsilon = epsilon)
}

/// Compare two volumes within [`VOLUME_EPSILON`]
pub fn nearly_equal(a: f32, b: f32) -> bool {
    approx_eq(a, b, VOLUME_EPSILON)
}

/// Convert a linear `[0, 1]` volume to the external mixer domain
pub fn linear_to_mixer_db(linear: f32) -> f32 {
    MIXER_DB_MIN + clamp01(linear) * (MIXER_DB_MAX - MIXER_DB_MIN)
}

/// Convert an external mixer value back to a linear `[0, 1]` volume
pub fn mixer_db_to_linear(db: f32) -> f32 {
    clamp01((db - MIXER_DB_MIN) / (MIXER_DB_MAX - MIXER_DB_MIN))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_lerp_clamps_parameter() {
        assert_relative_eq!(lerp(0.0, 0.8, 0.5), 0.4);
        assert_relative_eq!(lerp(0.0, 0.8, 2.0), 0.8);
        assert_relative_eq!(lerp(0.0, 0.8, -1.0), 0.0);
    }

    #[test]
    fn test_clamp01_nan() {
        assert_eq!(clamp01(f32::NAN), 0.0);
        assert_eq!(clamp01(1.5), 1.0);
    }

    #[test]
    fn test_mixer_conversion() {
        assert_relative_eq!(linear_to_mixer_db(0.0), -80.0);
        assert_relative_eq!(linear_to_mixer_db(1.0), 20.0);
        assert_relative_eq!(linear_to_mixer_db(0.8), 0.0, epsilon = 1e-4);
        assert_relative_eq!(mixer_db_to_linear(-30.0), 0.5);
        assert_relative_eq!(mixer_db_to_linear(-200.0), 0.0);
    }

    #[test]
    fn test_nearly_equal() {
        assert!(nearly_equal(0.5, 0.5004));
        assert!(!nearly_equal(0.5, 0.51));
    }
}
