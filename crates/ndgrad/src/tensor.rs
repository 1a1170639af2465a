//! Dense n-dimensional tensor type.
//!
//! An [`NdArray`] owns a flat `f64` buffer in row-major order together
//! with its [`Shape`]. Every operator in [`crate::ops`] is pure and
//! returns a new tensor; the only in-place mutation points are the
//! scatter-add kernel and the autodiff engine's gradient accumulator.

use crate::error::{Result, TensorError};
use crate::shape::Shape;
use crate::strides::{cartesian_to_linear, compute_strides};

/// A dense n-dimensional tensor of `f64` values.
///
/// # Examples
///
/// ```
/// use ndgrad::NdArray;
///
/// let t = NdArray::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]).unwrap();
/// assert_eq!(t.shape().dims(), &[2, 3]);
/// assert_eq!(t.get(&[0, 0]), Some(&1.0));
/// assert_eq!(t.get(&[1, 0]), Some(&4.0)); // Row-major: [1,0] is the fourth element
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct NdArray {
    data: Vec<f64>,
    shape: Shape,
    strides: Vec<usize>,
}

impl NdArray {
    /// Create a zero-initialized tensor.
    ///
    /// # Examples
    ///
    /// ```
    /// use ndgrad::NdArray;
    ///
    /// let t = NdArray::zeros(&[2, 3, 4]).unwrap();
    /// assert_eq!(t.len(), 24);
    /// ```
    pub fn zeros(dims: &[usize]) -> Result<Self> {
        let shape = Shape::of(dims)?;
        Ok(Self::filled(shape, 0.0))
    }

    /// Create a tensor filled with ones.
    pub fn ones(dims: &[usize]) -> Result<Self> {
        let shape = Shape::of(dims)?;
        Ok(Self::filled(shape, 1.0))
    }

    /// Create a tensor filled with a constant value.
    pub fn full(dims: &[usize], value: f64) -> Result<Self> {
        let shape = Shape::of(dims)?;
        Ok(Self::filled(shape, value))
    }

    /// Zeros with the same shape as another tensor.
    pub fn zeros_like(other: &NdArray) -> Self {
        Self::filled(other.shape.clone(), 0.0)
    }

    /// Ones with the same shape as another tensor.
    pub fn ones_like(other: &NdArray) -> Self {
        Self::filled(other.shape.clone(), 1.0)
    }

    fn filled(shape: Shape, value: f64) -> Self {
        let strides = compute_strides(shape.dims());
        Self {
            data: vec![value; shape.size()],
            shape,
            strides,
        }
    }

    /// Create a rank-0 tensor holding a single value.
    pub fn scalar(value: f64) -> Self {
        Self {
            data: vec![value],
            shape: Shape::scalar(),
            strides: Vec::new(),
        }
    }

    /// Create a tensor from a flat row-major buffer and an explicit shape.
    ///
    /// # Errors
    ///
    /// Returns `TensorError::ShapeMismatch` if the buffer length does not
    /// equal the shape's size, or `TensorError::InvalidDimension` for a
    /// zero dimension.
    ///
    /// # Examples
    ///
    /// ```
    /// use ndgrad::NdArray;
    ///
    /// let t = NdArray::from_vec(vec![1.0, 2.0, 3.0], &[3]).unwrap();
    /// assert_eq!(t.data(), &[1.0, 2.0, 3.0]);
    ///
    /// assert!(NdArray::from_vec(vec![1.0, 2.0], &[3]).is_err());
    /// ```
    pub fn from_vec(data: Vec<f64>, dims: &[usize]) -> Result<Self> {
        let shape = Shape::of(dims)?;
        if data.len() != shape.size() {
            return Err(TensorError::ShapeMismatch {
                op: "from_vec",
                lhs: vec![data.len()],
                rhs: dims.to_vec(),
            });
        }
        let strides = compute_strides(shape.dims());
        Ok(Self {
            data,
            shape,
            strides,
        })
    }

    /// Create a tensor with an already-validated shape (internal).
    pub(crate) fn from_shape_vec(data: Vec<f64>, shape: Shape) -> Self {
        debug_assert_eq!(data.len(), shape.size());
        let strides = compute_strides(shape.dims());
        Self {
            data,
            shape,
            strides,
        }
    }

    /// The tensor's shape.
    #[inline]
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Shape dimensions as a slice.
    #[inline]
    pub fn dims(&self) -> &[usize] {
        self.shape.dims()
    }

    /// Number of dimensions (rank).
    #[inline]
    pub fn ndim(&self) -> usize {
        self.shape.ndim()
    }

    /// Total number of elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Always false: shapes have positive dimensions, so at least one
    /// element exists (scalars have one).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Row-major strides.
    #[inline]
    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    /// Underlying data as a slice.
    #[inline]
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// Underlying data as a mutable slice.
    #[inline]
    pub fn data_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// Consume and return the underlying buffer.
    pub fn into_vec(self) -> Vec<f64> {
        self.data
    }

    /// Get element by cartesian indices.
    ///
    /// Returns `None` on out-of-bounds indices or wrong index count.
    pub fn get(&self, indices: &[usize]) -> Option<&f64> {
        if indices.len() != self.ndim() {
            return None;
        }
        for (&idx, &dim) in indices.iter().zip(self.dims().iter()) {
            if idx >= dim {
                return None;
            }
        }
        self.data.get(cartesian_to_linear(indices, &self.strides))
    }

    /// Get mutable element by cartesian indices.
    pub fn get_mut(&mut self, indices: &[usize]) -> Option<&mut f64> {
        if indices.len() != self.ndim() {
            return None;
        }
        for (&idx, &dim) in indices.iter().zip(self.shape.dims().iter()) {
            if idx >= dim {
                return None;
            }
        }
        let linear = cartesian_to_linear(indices, &self.strides);
        self.data.get_mut(linear)
    }

    /// Set element by cartesian indices.
    ///
    /// # Errors
    ///
    /// Returns `TensorError::IndexOutOfRange` on out-of-bounds indices and
    /// `TensorError::Arity` on a wrong index count.
    pub fn set(&mut self, indices: &[usize], value: f64) -> Result<()> {
        if indices.len() != self.ndim() {
            return Err(TensorError::Arity {
                op: "set",
                expected: self.ndim(),
                actual: indices.len(),
            });
        }
        for (axis, (&idx, &dim)) in indices.iter().zip(self.shape.dims().iter()).enumerate() {
            if idx >= dim {
                return Err(TensorError::IndexOutOfRange {
                    index: idx,
                    axis,
                    size: dim,
                });
            }
        }
        let linear = cartesian_to_linear(indices, &self.strides);
        self.data[linear] = value;
        Ok(())
    }

    /// Extract the single value of a one-element tensor.
    ///
    /// # Errors
    ///
    /// Returns `TensorError::ShapeMismatch` if the tensor holds more than
    /// one element.
    pub fn item(&self) -> Result<f64> {
        if self.data.len() != 1 {
            return Err(TensorError::ShapeMismatch {
                op: "item",
                lhs: self.dims().to_vec(),
                rhs: vec![1],
            });
        }
        Ok(self.data[0])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zeros() {
        let t = NdArray::zeros(&[2, 3]).unwrap();
        assert_eq!(t.dims(), &[2, 3]);
        assert_eq!(t.len(), 6);
        assert_eq!(t.strides(), &[3, 1]);
        assert!(t.data().iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_zeros_invalid_dim() {
        assert!(NdArray::zeros(&[2, 0]).is_err());
    }

    #[test]
    fn test_from_vec_row_major() {
        let t = NdArray::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]).unwrap();
        assert_eq!(t.get(&[0, 0]), Some(&1.0));
        assert_eq!(t.get(&[0, 1]), Some(&2.0));
        assert_eq!(t.get(&[0, 2]), Some(&3.0));
        assert_eq!(t.get(&[1, 0]), Some(&4.0));
        assert_eq!(t.get(&[1, 2]), Some(&6.0));
    }

    #[test]
    fn test_from_vec_length_mismatch() {
        let result = NdArray::from_vec(vec![1.0, 2.0, 3.0], &[2, 3]);
        assert!(matches!(result, Err(TensorError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_get_out_of_bounds() {
        let t = NdArray::zeros(&[2, 3]).unwrap();
        assert_eq!(t.get(&[2, 0]), None);
        assert_eq!(t.get(&[0, 3]), None);
        assert_eq!(t.get(&[0]), None);
        assert_eq!(t.get(&[0, 0, 0]), None);
    }

    #[test]
    fn test_set() {
        let mut t = NdArray::zeros(&[2, 3]).unwrap();
        t.set(&[1, 2], 42.0).unwrap();
        assert_eq!(t.get(&[1, 2]), Some(&42.0));
        assert!(matches!(
            t.set(&[1, 3], 0.0),
            Err(TensorError::IndexOutOfRange { .. })
        ));
    }

    #[test]
    fn test_scalar_tensor() {
        let t = NdArray::scalar(7.0);
        assert_eq!(t.ndim(), 0);
        assert_eq!(t.len(), 1);
        assert_eq!(t.item().unwrap(), 7.0);
    }

    #[test]
    fn test_item_non_scalar() {
        let t = NdArray::zeros(&[2]).unwrap();
        assert!(t.item().is_err());
    }

    #[test]
    fn test_ones_full_like() {
        let t = NdArray::full(&[2, 2], 3.5).unwrap();
        assert!(t.data().iter().all(|&x| x == 3.5));
        let z = NdArray::zeros_like(&t);
        assert_eq!(z.shape(), t.shape());
        assert!(z.data().iter().all(|&x| x == 0.0));
        let o = NdArray::ones_like(&t);
        assert!(o.data().iter().all(|&x| x == 1.0));
    }
}
