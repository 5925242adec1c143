//! Stretch curve
//!
//! Pure functions turning a drag distance into the vertical scale applied to
//! an overscrolled container.

use std::fmt;

/// Exponent of the power-law compression; below 1 so growth softens
pub const STRETCH_EXPONENT: f64 = 0.8;

/// Edge the scale transform is anchored to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformOrigin {
    Top,
    Bottom,
}

impl TransformOrigin {
    /// Downward drags anchor at the top, upward drags at the bottom
    pub fn for_drag(total_delta: f64) -> Self {
        if total_delta > 0.0 {
            TransformOrigin::Top
        } else {
            TransformOrigin::Bottom
        }
    }

    pub fn as_css(&self) -> &'static str {
        match self {
            TransformOrigin::Top => "top",
            TransformOrigin::Bottom => "bottom",
        }
    }
}

/// Resistance-scaled drag with sign-preserving power compression
#[inline]
pub fn adjusted_stretch(total_delta: f64, resistance: f64) -> f64 {
    let stretch = total_delta * resistance;
    let direction = if total_delta > 0.0 { 1.0 } else { -1.0 };
    stretch.abs().powf(STRETCH_EXPONENT) * direction
}

/// Vertical scale factor for a drag of `total_delta` pixels
///
/// Always in `[1, 1 + max_stretch]`. A container with no height yields the cap.
pub fn scale_factor(total_delta: f64, resistance: f64, max_stretch: f64, height: f64) -> f64 {
    let adjusted = adjusted_stretch(total_delta, resistance).abs();
    let ratio = if height > 0.0 {
        adjusted / height
    } else if adjusted > 0.0 {
        f64::INFINITY
    } else {
        0.0
    };
    1.0 + ratio.min(max_stretch)
}

/// Transform produced by one move frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StretchFrame {
    pub scale: f64,
    pub origin: TransformOrigin,
}

impl StretchFrame {
    pub fn compute(total_delta: f64, resistance: f64, max_stretch: f64, height: f64) -> Self {
        Self {
            scale: scale_factor(total_delta, resistance, max_stretch, height),
            origin: TransformOrigin::for_drag(total_delta),
        }
    }

    /// CSS `transform` value
    pub fn transform_css(&self) -> String {
        format!("scaleY({})", self.scale)
    }
}

impl fmt::Display for StretchFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scaleY({:.4}) @ {}", self.scale, self.origin.as_css())
    }
}

/// Read the scale back out of a `scaleY(..)` transform; `none` is 1
pub fn parse_scale_y(transform: &str) -> Option<f64> {
    let transform = transform.trim();
    if transform.is_empty() || transform == "none" {
        return Some(1.0);
    }
    transform
        .strip_prefix("scaleY(")?
        .strip_suffix(')')?
        .trim()
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worked_example() {
        // 400px container, 100px drag at the top
        let adjusted = adjusted_stretch(100.0, 0.3);
        assert!((adjusted - 30f64.powf(0.8)).abs() < 1e-9);
        assert!((adjusted - 15.22).abs() < 0.5);

        let scale = scale_factor(100.0, 0.3, 0.15, 400.0);
        assert!((scale - (1.0 + 30f64.powf(0.8) / 400.0)).abs() < 1e-9);
        assert!((scale - 1.0395).abs() < 0.002);
    }

    #[test]
    fn test_scale_is_capped() {
        let scale = scale_factor(100_000.0, 0.3, 0.15, 400.0);
        assert!((scale - 1.15).abs() < 1e-9);
    }

    #[test]
    fn test_scale_monotonic_in_distance() {
        let mut prev = 1.0;
        for d in (0..2000).step_by(25) {
            let scale = scale_factor(d as f64, 0.3, 0.15, 400.0);
            assert!(scale >= prev);
            assert!(scale <= 1.15 + 1e-12);
            prev = scale;
        }
    }

    #[test]
    fn test_sign_does_not_affect_magnitude() {
        let down = StretchFrame::compute(80.0, 0.3, 0.15, 400.0);
        let up = StretchFrame::compute(-80.0, 0.3, 0.15, 400.0);
        assert_eq!(down.scale, up.scale);
        assert_eq!(down.origin, TransformOrigin::Top);
        assert_eq!(up.origin, TransformOrigin::Bottom);
    }

    #[test]
    fn test_zero_height_hits_cap() {
        assert_eq!(scale_factor(10.0, 0.3, 0.15, 0.0), 1.15);
        assert_eq!(scale_factor(0.0, 0.3, 0.15, 0.0), 1.0);
    }

    #[test]
    fn test_parse_scale_y() {
        let frame = StretchFrame::compute(100.0, 0.3, 0.15, 400.0);
        assert_eq!(parse_scale_y(&frame.transform_css()), Some(frame.scale));
        assert_eq!(parse_scale_y("none"), Some(1.0));
        assert_eq!(parse_scale_y("rotate(3deg)"), None);
    }
}
