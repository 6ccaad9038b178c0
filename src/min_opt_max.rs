//! Elastic lengths used for spacing, glue and layout budgets.

use core::fmt;
use core::ops::{Add, AddAssign, Neg, Sub, SubAssign};

/// Length in millipoints (1/1000 pt).
pub type Length = i32;

/// Elastic length with a minimum, optimum and maximum.
///
/// Every value keeps `min <= opt <= max`. Arithmetic never breaks the
/// invariant: subtraction pairs the minimum of one side with the maximum of
/// the other, and scaling by a negative factor swaps the bounds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct MinOptMax {
    min: Length,
    opt: Length,
    max: Length,
}

/// Result of fitting an elastic length into an available length.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AdjustmentRatio {
    /// Negative when shrinking, positive when stretching.
    pub ratio: f64,
    /// The available length lies outside `[min, max]`.
    pub overflow: bool,
}

impl MinOptMax {
    /// Zero-sized rigid length.
    pub const ZERO: Self = Self {
        min: 0,
        opt: 0,
        max: 0,
    };

    /// Build an elastic length, widening the bounds to enclose `opt`.
    pub fn new(min: Length, opt: Length, max: Length) -> Self {
        Self {
            min: min.min(opt),
            opt,
            max: max.max(opt),
        }
    }

    /// Rigid length.
    pub const fn fixed(value: Length) -> Self {
        Self {
            min: value,
            opt: value,
            max: value,
        }
    }

    /// Length that may grow without bound.
    pub fn unbounded(opt: Length) -> Self {
        Self::new(opt, opt, Length::MAX / 4)
    }

    pub fn min(&self) -> Length {
        self.min
    }

    pub fn opt(&self) -> Length {
        self.opt
    }

    pub fn max(&self) -> Length {
        self.max
    }

    /// Room to grow beyond the optimum.
    pub fn stretch(&self) -> Length {
        self.max - self.opt
    }

    /// Room to shrink below the optimum.
    pub fn shrink(&self) -> Length {
        self.opt - self.min
    }

    pub fn is_elastic(&self) -> bool {
        self.min != self.opt || self.opt != self.max
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// Elementwise sum.
    pub fn plus(self, other: Self) -> Self {
        Self {
            min: self.min.saturating_add(other.min),
            opt: self.opt.saturating_add(other.opt),
            max: self.max.saturating_add(other.max),
        }
    }

    /// Difference that keeps the invariant: the smallest result pairs our
    /// minimum with the other maximum.
    pub fn minus(self, other: Self) -> Self {
        Self {
            min: self.min.saturating_sub(other.max),
            opt: self.opt.saturating_sub(other.opt),
            max: self.max.saturating_sub(other.min),
        }
    }

    /// Componentwise maximum; the size of content laid out side by side.
    pub fn max_with(self, other: Self) -> Self {
        Self {
            min: self.min.max(other.min),
            opt: self.opt.max(other.opt),
            max: self.max.max(other.max),
        }
    }

    /// Split into two halves that sum exactly to `self`.
    pub fn split_half(self) -> (Self, Self) {
        let first = Self {
            min: self.min / 2,
            opt: self.opt / 2,
            max: self.max / 2,
        };
        let second = Self {
            min: self.min - first.min,
            opt: self.opt - first.opt,
            max: self.max - first.max,
        };
        (first, second)
    }

    /// Scale every bound by an integer factor.
    pub fn scale(self, factor: i32) -> Self {
        let a = self.min.saturating_mul(factor);
        let b = self.opt.saturating_mul(factor);
        let c = self.max.saturating_mul(factor);
        if factor < 0 {
            Self {
                min: c,
                opt: b,
                max: a,
            }
        } else {
            Self {
                min: a,
                opt: b,
                max: c,
            }
        }
    }

    /// Scale by a rational ratio `num / den`, rounding each bound to nearest.
    pub fn scale_by_ratio(self, num: i32, den: i32) -> Self {
        if den == 0 {
            return Self::ZERO;
        }
        let scale = |v: Length| -> Length {
            let wide = i64::from(v) * i64::from(num);
            let den = i64::from(den);
            let half = den.abs() / 2;
            let rounded = if (wide >= 0) == (den > 0) {
                (wide.abs() + half) / den.abs()
            } else {
                -((wide.abs() + half) / den.abs())
            };
            rounded.clamp(i64::from(Length::MIN), i64::from(Length::MAX)) as Length
        };
        Self::new(
            scale(self.min).min(scale(self.max)),
            scale(self.opt),
            scale(self.min).max(scale(self.max)),
        )
    }

    /// Ratio needed to stretch or shrink this length to `available`.
    ///
    /// `(available - opt) / (max - opt)` when stretching and
    /// `(available - opt) / (opt - min)` when shrinking. A ratio outside
    /// `[-1, 1]` means the hard bounds cannot be met.
    pub fn adjustment_ratio(&self, available: Length) -> AdjustmentRatio {
        let diff = i64::from(available) - i64::from(self.opt);
        let ratio = if diff > 0 {
            let stretch = i64::from(self.stretch());
            if stretch > 0 {
                diff as f64 / stretch as f64
            } else {
                f64::INFINITY
            }
        } else if diff < 0 {
            let shrink = i64::from(self.shrink());
            if shrink > 0 {
                diff as f64 / shrink as f64
            } else {
                f64::NEG_INFINITY
            }
        } else {
            0.0
        };
        AdjustmentRatio {
            ratio,
            overflow: !(-1.0..=1.0).contains(&ratio),
        }
    }

    /// Length this value takes when adjusted by `ratio` (clamped to `[-1, 1]`).
    pub fn adjusted(&self, ratio: f64) -> Length {
        let ratio = ratio.clamp(-1.0, 1.0);
        let delta = if ratio >= 0.0 {
            f64::from(self.stretch()) * ratio
        } else {
            f64::from(self.shrink()) * ratio
        };
        self.opt.saturating_add(delta.round() as Length)
    }
}

impl Add for MinOptMax {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        self.plus(rhs)
    }
}

impl AddAssign for MinOptMax {
    fn add_assign(&mut self, rhs: Self) {
        *self = self.plus(rhs);
    }
}

impl Sub for MinOptMax {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        self.minus(rhs)
    }
}

impl SubAssign for MinOptMax {
    fn sub_assign(&mut self, rhs: Self) {
        *self = self.minus(rhs);
    }
}

impl Neg for MinOptMax {
    type Output = Self;

    fn neg(self) -> Self {
        self.scale(-1)
    }
}

impl From<Length> for MinOptMax {
    fn from(value: Length) -> Self {
        Self::fixed(value)
    }
}

impl fmt::Display for MinOptMax {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.min, self.opt, self.max)
    }
}
