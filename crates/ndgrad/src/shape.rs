//! Dimensionality descriptor and broadcasting rules.
//!
//! A [`Shape`] is an immutable ordered sequence of positive dimensions.
//! The empty sequence is the scalar shape with size 1.
//!
//! Broadcasting follows right-aligned pairing: two shapes are compatible
//! if, comparing dimensions from the last axis backwards, each pair is
//! either equal or one of the pair is 1. The result dimension is the
//! maximum of the pair.

use crate::error::{Result, TensorError};

/// Immutable shape of an n-dimensional tensor.
///
/// # Examples
///
/// ```
/// use ndgrad::Shape;
///
/// let s = Shape::of(&[2, 3, 4]).unwrap();
/// assert_eq!(s.ndim(), 3);
/// assert_eq!(s.size(), 24);
///
/// // Zero dimensions are rejected
/// assert!(Shape::of(&[2, 0]).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shape {
    dims: Vec<usize>,
}

impl Shape {
    /// Create a shape from dimensions. All dimensions must be positive.
    ///
    /// # Errors
    ///
    /// Returns `TensorError::InvalidDimension` if any dimension is zero.
    pub fn of(dims: &[usize]) -> Result<Self> {
        for (axis, &dim) in dims.iter().enumerate() {
            if dim == 0 {
                return Err(TensorError::InvalidDimension { dim, axis });
            }
        }
        Ok(Self {
            dims: dims.to_vec(),
        })
    }

    /// The scalar shape (rank 0, size 1).
    pub fn scalar() -> Self {
        Self { dims: Vec::new() }
    }

    /// Dimensions as a slice.
    #[inline]
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Size of one axis.
    #[inline]
    pub fn dim(&self, axis: usize) -> usize {
        self.dims[axis]
    }

    /// Number of dimensions (rank).
    #[inline]
    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    /// Total number of elements (product of dimensions, 1 for scalars).
    #[inline]
    pub fn size(&self) -> usize {
        self.dims.iter().product()
    }

    /// Whether this is the scalar shape.
    #[inline]
    pub fn is_scalar(&self) -> bool {
        self.dims.is_empty()
    }

    /// Normalize a possibly-negative axis index.
    ///
    /// Negative axes count from the end: `-1` is the last axis.
    ///
    /// # Errors
    ///
    /// Returns `TensorError::NotSupportedAxis` if the axis is out of range.
    ///
    /// # Examples
    ///
    /// ```
    /// use ndgrad::Shape;
    ///
    /// let s = Shape::of(&[2, 3, 4]).unwrap();
    /// assert_eq!(s.normalize_axis(-1).unwrap(), 2);
    /// assert_eq!(s.normalize_axis(1).unwrap(), 1);
    /// assert!(s.normalize_axis(3).is_err());
    /// ```
    pub fn normalize_axis(&self, axis: isize) -> Result<usize> {
        let ndim = self.ndim() as isize;
        let normalized = if axis < 0 { axis + ndim } else { axis };
        if normalized < 0 || normalized >= ndim {
            return Err(TensorError::NotSupportedAxis {
                op: "normalize_axis",
                axis,
                ndim: self.ndim(),
            });
        }
        Ok(normalized as usize)
    }

    /// Compute the broadcast result shape of two shapes.
    ///
    /// Comparing dimensions right-aligned, each pair must be equal or one
    /// of the pair must be 1; the result dimension is the maximum of the
    /// pair. Broadcasting is symmetric: `a.broadcast(b) == b.broadcast(a)`.
    ///
    /// # Errors
    ///
    /// Returns `TensorError::ShapeMismatch` for incompatible shapes.
    ///
    /// # Examples
    ///
    /// ```
    /// use ndgrad::Shape;
    ///
    /// let a = Shape::of(&[2, 1, 4]).unwrap();
    /// let b = Shape::of(&[3, 4]).unwrap();
    /// assert_eq!(a.broadcast(&b).unwrap(), Shape::of(&[2, 3, 4]).unwrap());
    ///
    /// let c = Shape::of(&[2, 5]).unwrap();
    /// assert!(a.broadcast(&c).is_err());
    /// ```
    pub fn broadcast(&self, other: &Shape) -> Result<Shape> {
        let ndim = self.ndim().max(other.ndim());
        let mut dims = vec![0usize; ndim];
        for i in 0..ndim {
            // Right-aligned pairing; missing leading axes behave as size 1.
            let da = if i < ndim - self.ndim() {
                1
            } else {
                self.dims[i - (ndim - self.ndim())]
            };
            let db = if i < ndim - other.ndim() {
                1
            } else {
                other.dims[i - (ndim - other.ndim())]
            };
            if da != db && da != 1 && db != 1 {
                return Err(TensorError::ShapeMismatch {
                    op: "broadcast",
                    lhs: self.dims.clone(),
                    rhs: other.dims.clone(),
                });
            }
            dims[i] = da.max(db);
        }
        Ok(Shape { dims })
    }

    /// Whether this shape can be broadcast (expanded) to `target`.
    ///
    /// True when every right-aligned dimension pair is equal or this
    /// shape's dimension is 1.
    pub fn broadcastable_to(&self, target: &Shape) -> bool {
        if self.ndim() > target.ndim() {
            return false;
        }
        let offset = target.ndim() - self.ndim();
        self.dims
            .iter()
            .enumerate()
            .all(|(i, &d)| d == target.dims[i + offset] || d == 1)
    }
}

impl std::fmt::Display for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.dims)
    }
}
