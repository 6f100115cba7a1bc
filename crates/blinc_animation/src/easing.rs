//! Easing functions for animations
//!
//! The named curves match the ones motion designers expect from web tooling:
//! the three standard CSS beziers, circular, back and anticipate variants.

use serde::{Deserialize, Serialize};

/// Easing function type
#[derive(Clone, Copy, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Easing {
    Linear,
    EaseIn,
    EaseOut,
    #[default]
    EaseInOut,
    CircIn,
    CircOut,
    CircInOut,
    BackIn,
    BackOut,
    BackInOut,
    Anticipate,
    CubicBezier(f32, f32, f32, f32),
}

impl Easing {
    /// Apply the easing function to a progress value (0.0 to 1.0)
    pub fn apply(&self, t: f32) -> f32 {
        match self {
            Easing::Linear => t,
            Easing::EaseIn => cubic_bezier_ease(t, 0.42, 0.0, 1.0, 1.0),
            Easing::EaseOut => cubic_bezier_ease(t, 0.0, 0.0, 0.58, 1.0),
            Easing::EaseInOut => cubic_bezier_ease(t, 0.42, 0.0, 0.58, 1.0),
            Easing::CircIn => circ_in(t),
            Easing::CircOut => reverse(circ_in, t),
            Easing::CircInOut => mirror(circ_in, t),
            Easing::BackIn => back_in(t),
            Easing::BackOut => back_out(t),
            Easing::BackInOut => mirror(back_in, t),
            Easing::Anticipate if t >= 1.0 => 1.0,
            Easing::Anticipate => {
                let t = t * 2.0;
                if t < 1.0 {
                    0.5 * back_in(t)
                } else {
                    0.5 * (2.0 - 2f32.powf(-10.0 * (t - 1.0)))
                }
            }
            Easing::CubicBezier(x1, y1, x2, y2) => cubic_bezier_ease(t, *x1, *y1, *x2, *y2),
        }
    }
}

fn circ_in(t: f32) -> f32 {
    1.0 - (1.0 - t.clamp(0.0, 1.0) * t.clamp(0.0, 1.0)).sqrt()
}

fn back_out(t: f32) -> f32 {
    cubic_bezier_ease(t, 0.33, 1.53, 0.69, 0.99)
}

fn back_in(t: f32) -> f32 {
    reverse(back_out, t)
}

/// Play an ease-in curve as its ease-out counterpart
#[inline]
fn reverse(ease: fn(f32) -> f32, t: f32) -> f32 {
    1.0 - ease(1.0 - t)
}

/// First half runs the curve, second half runs it backwards
#[inline]
fn mirror(ease: fn(f32) -> f32, t: f32) -> f32 {
    if t <= 0.5 {
        ease(2.0 * t) / 2.0
    } else {
        (2.0 - ease(2.0 * (1.0 - t))) / 2.0
    }
}

/// Cubic bezier easing calculation (matches browser `cubic-bezier()` output).
///
/// Uses Newton-Raphson with binary-search fallback for robustness.
/// Computes in f64 internally to avoid f32 precision jitter at 120fps.
fn cubic_bezier_ease(t: f32, x1: f32, y1: f32, x2: f32, y2: f32) -> f32 {
    // Endpoints are always exact
    if t <= 0.0 {
        return 0.0;
    }
    if t >= 1.0 {
        return 1.0;
    }

    let x = t as f64;
    let (x1, y1, x2, y2) = (x1 as f64, y1 as f64, x2 as f64, y2 as f64);

    let mut p = x;
    for _ in 0..8 {
        let err = bezier_sample(p, x1, x2) - x;
        if err.abs() < 1e-7 {
            return bezier_sample(p, y1, y2) as f32;
        }
        let slope = bezier_slope(p, x1, x2);
        if slope.abs() < 1e-7 {
            break;
        }
        p -= err / slope;
    }

    let mut lo = 0.0_f64;
    let mut hi = 1.0_f64;
    p = x;
    for _ in 0..20 {
        let val = bezier_sample(p, x1, x2);
        if (val - x).abs() < 1e-7 {
            break;
        }
        if val < x {
            lo = p;
        } else {
            hi = p;
        }
        p = (lo + hi) * 0.5;
    }

    bezier_sample(p, y1, y2) as f32
}

/// Evaluate cubic bezier at parameter t: B(t) = 3(1-t)²t·p1 + 3(1-t)t²·p2 + t³
#[inline]
fn bezier_sample(t: f64, p1: f64, p2: f64) -> f64 {
    let a = 1.0 - 3.0 * p2 + 3.0 * p1;
    let b = 3.0 * p2 - 6.0 * p1;
    let c = 3.0 * p1;
    ((a * t + b) * t + c) * t
}

#[inline]
fn bezier_slope(t: f64, p1: f64, p2: f64) -> f64 {
    let a = 1.0 - 3.0 * p2 + 3.0 * p1;
    let b = 3.0 * p2 - 6.0 * p1;
    let c = 3.0 * p1;
    (3.0 * a * t + 2.0 * b) * t + c
}
