//! Fixed-width integer vectors with per-element predicate masks.
//!
//! A [`Vector`] is the unit a lane fetches, computes on, and stores.
//! Conditional logic is expressed the way a lane-masked vector unit does
//! it: compare to build a [`Mask`], then assign only the active elements.

use std::ops::{Add, Mul, Shr, Sub};

/// Widest vector a [`Mask`] can describe (one bit per element).
pub const MAX_VECTOR_WIDTH: usize = 64;

/// Per-element predicate over a vector of a given width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mask {
    bits: u64,
    width: usize,
}

impl Mask {
    /// Builds a mask by evaluating `pred` for every element index.
    pub fn from_fn(width: usize, mut pred: impl FnMut(usize) -> bool) -> Self {
        debug_assert!(width <= MAX_VECTOR_WIDTH);
        let bits = (0..width)
            .filter(|&i| pred(i))
            .fold(0u64, |acc, i| acc | (1u64 << i));
        Self { bits, width }
    }

    /// Returns true if element `i` is active.
    #[inline]
    pub fn test(&self, i: usize) -> bool {
        i < self.width && self.bits & (1u64 << i) != 0
    }

    /// Returns true if no element is active.
    #[inline]
    pub fn none(&self) -> bool {
        self.bits == 0
    }

    /// Width of the vector this mask applies to.
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }
}

/// A group of intensity values processed together by one lane.
///
/// Elements live inline; slots past `width` are always zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vector {
    elems: [i32; MAX_VECTOR_WIDTH],
    width: usize,
}

impl Default for Vector {
    fn default() -> Self {
        Self::zeros(0)
    }
}

impl Vector {
    /// Copies a slice into a new vector.
    ///
    /// # Panics
    ///
    /// Panics if the slice is wider than [`MAX_VECTOR_WIDTH`].
    pub fn from_slice(values: &[i32]) -> Self {
        let mut v = Self::zeros(values.len());
        v.elems[..values.len()].copy_from_slice(values);
        v
    }

    /// A vector of zeros.
    pub fn zeros(width: usize) -> Self {
        assert!(
            width <= MAX_VECTOR_WIDTH,
            "vector width {} exceeds {}",
            width,
            MAX_VECTOR_WIDTH
        );
        Self {
            elems: [0; MAX_VECTOR_WIDTH],
            width,
        }
    }

    /// Number of elements.
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns true for the empty vector produced by an out-of-range fetch.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0
    }

    /// Element values.
    #[inline]
    pub fn as_slice(&self) -> &[i32] {
        &self.elems[..self.width]
    }

    /// Mask of elements where `self == other`.
    pub fn eq_mask(&self, other: &Vector) -> Mask {
        self.compare(other, |a, b| a == b)
    }

    /// Mask of elements where `self > other`.
    pub fn gt_mask(&self, other: &Vector) -> Mask {
        self.compare(other, |a, b| a > b)
    }

    /// Mask of elements where `self < other`.
    pub fn lt_mask(&self, other: &Vector) -> Mask {
        self.compare(other, |a, b| a < b)
    }

    fn compare(&self, other: &Vector, op: impl Fn(i32, i32) -> bool) -> Mask {
        debug_assert_eq!(self.width, other.width);
        Mask::from_fn(self.width, |i| op(self.elems[i], other.elems[i]))
    }

    /// Overwrites the elements active in `mask` with the matching elements of `src`.
    ///
    /// Inactive elements keep their previous value.
    pub fn assign_where(&mut self, mask: Mask, src: &Vector) {
        debug_assert_eq!(self.width, mask.width());
        debug_assert_eq!(self.width, src.width);
        if mask.none() {
            return;
        }
        for i in 0..self.width {
            if mask.test(i) {
                self.elems[i] = src.elems[i];
            }
        }
    }

    /// Writes every element into `dst`, which must be exactly as wide.
    pub fn store(&self, dst: &mut [i32]) {
        dst.copy_from_slice(self.as_slice());
    }

    fn zip_with(&self, other: &Vector, op: impl Fn(i32, i32) -> i32) -> Vector {
        debug_assert_eq!(self.width, other.width);
        let mut out = Vector::zeros(self.width);
        for i in 0..self.width {
            out.elems[i] = op(self.elems[i], other.elems[i]);
        }
        out
    }

    fn map(&self, op: impl Fn(i32) -> i32) -> Vector {
        let mut out = Vector::zeros(self.width);
        for i in 0..self.width {
            out.elems[i] = op(self.elems[i]);
        }
        out
    }
}

impl Add for &Vector {
    type Output = Vector;

    fn add(self, rhs: &Vector) -> Vector {
        self.zip_with(rhs, i32::wrapping_add)
    }
}

impl Sub for &Vector {
    type Output = Vector;

    fn sub(self, rhs: &Vector) -> Vector {
        self.zip_with(rhs, i32::wrapping_sub)
    }
}

impl Mul<i32> for &Vector {
    type Output = Vector;

    fn mul(self, rhs: i32) -> Vector {
        self.map(|a| a.wrapping_mul(rhs))
    }
}

impl Shr<u32> for &Vector {
    type Output = Vector;

    /// Arithmetic shift, matching integer division by `2^rhs` for non-negative values.
    fn shr(self, rhs: u32) -> Vector {
        self.map(|a| a >> rhs)
    }
}
