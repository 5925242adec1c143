//! CSS timing functions for the recovery transition
//!
//! Maps the `animation_function` option onto a curve that takes progress in
//! [0, 1] to eased progress in [0, 1]. The browser evaluates the curve itself;
//! the headless host uses it to interpolate the transform between frames.

use tracing::warn;

/// Parsed CSS easing curve
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Easing {
    Linear,
    CubicBezier { x1: f64, y1: f64, x2: f64, y2: f64 },
    StepStart,
    StepEnd,
}

impl Default for Easing {
    fn default() -> Self {
        Self::EASE_OUT
    }
}

impl Easing {
    pub const EASE: Easing = Easing::CubicBezier { x1: 0.25, y1: 0.1, x2: 0.25, y2: 1.0 };
    pub const EASE_IN: Easing = Easing::CubicBezier { x1: 0.42, y1: 0.0, x2: 1.0, y2: 1.0 };
    pub const EASE_OUT: Easing = Easing::CubicBezier { x1: 0.0, y1: 0.0, x2: 0.58, y2: 1.0 };
    pub const EASE_IN_OUT: Easing = Easing::CubicBezier { x1: 0.42, y1: 0.0, x2: 0.58, y2: 1.0 };

    /// Parse a CSS timing function name
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        match name.as_str() {
            "linear" => Some(Easing::Linear),
            "ease" => Some(Self::EASE),
            "ease-in" => Some(Self::EASE_IN),
            "ease-out" => Some(Self::EASE_OUT),
            "ease-in-out" => Some(Self::EASE_IN_OUT),
            "step-start" => Some(Easing::StepStart),
            "step-end" => Some(Easing::StepEnd),
            _ => parse_cubic_bezier(&name),
        }
    }

    /// Parse, falling back to `ease-out` for unknown names
    pub fn parse_or_default(name: &str) -> Self {
        Self::parse(name).unwrap_or_else(|| {
            warn!("Unknown easing function '{}', using ease-out", name);
            Self::default()
        })
    }

    /// Apply the curve to a progress value
    ///
    /// # Arguments
    /// * `t` - Progress value in range [0, 1]
    ///
    /// # Returns
    /// Eased value; in [0, 1] unless a bezier control point overshoots
    pub fn apply(&self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match *self {
            Easing::Linear => t,
            Easing::StepStart => {
                if t > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Easing::StepEnd => {
                if t < 1.0 {
                    0.0
                } else {
                    1.0
                }
            }
            Easing::CubicBezier { x1, y1, x2, y2 } => {
                if t <= 0.0 || t >= 1.0 {
                    return t;
                }
                let s = solve_bezier_x(t, x1, x2);
                bezier(s, y1, y2)
            }
        }
    }
}

/// `cubic-bezier(x1, y1, x2, y2)`; x control points must lie in [0, 1]
fn parse_cubic_bezier(name: &str) -> Option<Easing> {
    let inner = name.strip_prefix("cubic-bezier(")?.strip_suffix(')')?;
    let values: Vec<f64> = inner
        .split(',')
        .map(|v| v.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .ok()?;
    let [x1, y1, x2, y2] = values.as_slice() else {
        return None;
    };
    if !(0.0..=1.0).contains(x1) || !(0.0..=1.0).contains(x2) {
        return None;
    }
    Some(Easing::CubicBezier { x1: *x1, y1: *y1, x2: *x2, y2: *y2 })
}

/// One-dimensional cubic bezier with endpoints fixed at 0 and 1
#[inline]
fn bezier(s: f64, p1: f64, p2: f64) -> f64 {
    let inv = 1.0 - s;
    3.0 * inv * inv * s * p1 + 3.0 * inv * s * s * p2 + s * s * s
}

#[inline]
fn bezier_slope(s: f64, p1: f64, p2: f64) -> f64 {
    let inv = 1.0 - s;
    3.0 * inv * inv * p1 + 6.0 * inv * s * (p2 - p1) + 3.0 * s * s * (1.0 - p2)
}

/// Find the curve parameter whose x equals `x`
fn solve_bezier_x(x: f64, x1: f64, x2: f64) -> f64 {
    // Newton first, bisection if the slope flattens out
    let mut s = x;
    for _ in 0..8 {
        let err = bezier(s, x1, x2) - x;
        if err.abs() < 1e-7 {
            return s;
        }
        let slope = bezier_slope(s, x1, x2);
        if slope.abs() < 1e-6 {
            break;
        }
        s -= err / slope;
    }

    let (mut lo, mut hi) = (0.0, 1.0);
    s = x;
    for _ in 0..50 {
        let value = bezier(s, x1, x2);
        if (value - x).abs() < 1e-7 {
            break;
        }
        if value < x {
            lo = s;
        } else {
            hi = s;
        }
        s = (lo + hi) / 2.0;
    }
    s
}
