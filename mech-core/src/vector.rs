//! Dimension-generic vector arithmetic.
//!
//! The environment is generic over a [`SpaceVector`], so the dimensionality
//! of a simulation is fixed when it is instantiated: `f64` for 1-D,
//! [`DVec2`] for 2-D and [`DVec3`] for 3-D. Kernels written against the
//! trait are monomorphized once per dimensionality.

use glam::{DVec2, DVec3};
use rand::Rng;
use std::f64::consts::TAU;
use std::fmt::Debug;
use std::ops::{Add, AddAssign, Mul, Sub};

/// Lengths at or below this are normalized to the zero vector.
pub const ZERO_THRESHOLD: f64 = 1e-16;

/// A position, velocity or direction in 1, 2 or 3 dimensions.
pub trait SpaceVector:
    Copy
    + Debug
    + Default
    + PartialEq
    + Send
    + Sync
    + 'static
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<f64, Output = Self>
    + AddAssign
{
    /// Number of spatial axes.
    const DIMS: usize;

    const ZERO: Self;

    /// Euclidean length.
    fn length(self) -> f64;

    /// Component along `axis` (`0..DIMS`).
    fn axis(self, axis: usize) -> f64;

    fn axis_mut(&mut self, axis: usize) -> &mut f64;

    /// Builds a vector from a per-axis generator, called for `0..DIMS`.
    fn from_axes(f: impl FnMut(usize) -> f64) -> Self;

    /// Draws a uniformly distributed unit direction.
    ///
    /// 1-D yields `±1` with equal probability, 2-D a uniform angle on the
    /// circle, 3-D a uniform point on the sphere. `restrict_to_2d` only
    /// matters in 3-D, where it draws in the xy-plane with a zero z.
    fn random_unit<R: Rng + ?Sized>(rng: &mut R, restrict_to_2d: bool) -> Self;

    /// Rescales to length `scale`, or returns zero for (near) zero vectors.
    #[inline]
    fn normalize_and_scale(self, scale: f64) -> Self {
        let length = self.length();
        if length > ZERO_THRESHOLD {
            self * (scale / length)
        } else {
            Self::ZERO
        }
    }

    #[inline]
    fn distance(self, other: Self) -> f64 {
        (self - other).length()
    }
}

impl SpaceVector for f64 {
    const DIMS: usize = 1;
    const ZERO: Self = 0.0;

    #[inline]
    fn length(self) -> f64 {
        self.abs()
    }

    #[inline]
    fn axis(self, axis: usize) -> f64 {
        debug_assert_eq!(axis, 0);
        self
    }

    #[inline]
    fn axis_mut(&mut self, axis: usize) -> &mut f64 {
        debug_assert_eq!(axis, 0);
        self
    }

    fn from_axes(mut f: impl FnMut(usize) -> f64) -> Self {
        f(0)
    }

    fn random_unit<R: Rng + ?Sized>(rng: &mut R, _restrict_to_2d: bool) -> Self {
        if rng.random::<f64>() < 0.5 { -1.0 } else { 1.0 }
    }
}

impl SpaceVector for DVec2 {
    const DIMS: usize = 2;
    const ZERO: Self = DVec2::ZERO;

    #[inline]
    fn length(self) -> f64 {
        DVec2::length(self)
    }

    #[inline]
    fn axis(self, axis: usize) -> f64 {
        self[axis]
    }

    #[inline]
    fn axis_mut(&mut self, axis: usize) -> &mut f64 {
        &mut self[axis]
    }

    fn from_axes(mut f: impl FnMut(usize) -> f64) -> Self {
        DVec2::new(f(0), f(1))
    }

    fn random_unit<R: Rng + ?Sized>(rng: &mut R, _restrict_to_2d: bool) -> Self {
        let theta = rng.random_range(0.0..TAU);
        DVec2::new(theta.cos(), theta.sin())
    }
}

impl SpaceVector for DVec3 {
    const DIMS: usize = 3;
    const ZERO: Self = DVec3::ZERO;

    #[inline]
    fn length(self) -> f64 {
        DVec3::length(self)
    }

    #[inline]
    fn axis(self, axis: usize) -> f64 {
        self[axis]
    }

    #[inline]
    fn axis_mut(&mut self, axis: usize) -> &mut f64 {
        &mut self[axis]
    }

    fn from_axes(mut f: impl FnMut(usize) -> f64) -> Self {
        DVec3::new(f(0), f(1), f(2))
    }

    fn random_unit<R: Rng + ?Sized>(rng: &mut R, restrict_to_2d: bool) -> Self {
        if restrict_to_2d {
            return DVec2::random_unit(rng, true).extend(0.0);
        }

        let theta = rng.random_range(0.0..TAU);
        let z: f64 = rng.random_range(-1.0..1.0);
        let r = (1.0 - z * z).sqrt();

        DVec3::new(theta.cos() * r, theta.sin() * r, z)
    }
}
