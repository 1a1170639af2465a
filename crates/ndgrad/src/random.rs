//! Random tensor construction.
//!
//! Uniform and standard-normal factories, with `_with_rng` variants for
//! reproducible seeded construction.

use rand::Rng;
use rand::distr::StandardUniform;
use rand_distr::StandardNormal;

use crate::error::Result;
use crate::tensor::NdArray;

impl NdArray {
    /// Create a tensor with uniform random values in `[0, 1)`.
    ///
    /// # Example
    ///
    /// ```
    /// use ndgrad::NdArray;
    ///
    /// let t = NdArray::random(&[2, 3]).unwrap();
    /// assert!(t.data().iter().all(|&v| (0.0..1.0).contains(&v)));
    /// ```
    pub fn random(dims: &[usize]) -> Result<Self> {
        Self::random_with_rng(dims, &mut rand::rng())
    }

    /// Uniform random tensor using a caller-provided RNG.
    ///
    /// # Example
    ///
    /// ```
    /// use ndgrad::NdArray;
    /// use rand::SeedableRng;
    /// use rand::rngs::StdRng;
    ///
    /// let t1 = NdArray::random_with_rng(&[2, 3], &mut StdRng::seed_from_u64(42)).unwrap();
    /// let t2 = NdArray::random_with_rng(&[2, 3], &mut StdRng::seed_from_u64(42)).unwrap();
    /// assert_eq!(t1.data(), t2.data());
    /// ```
    pub fn random_with_rng<R: Rng>(dims: &[usize], rng: &mut R) -> Result<Self> {
        let len: usize = dims.iter().product::<usize>().max(1);
        let data: Vec<f64> = (0..len).map(|_| rng.sample(StandardUniform)).collect();
        Self::from_vec(data, dims)
    }

    /// Create a tensor with standard normal random values.
    pub fn randn(dims: &[usize]) -> Result<Self> {
        Self::randn_with_rng(dims, &mut rand::rng())
    }

    /// Standard normal random tensor using a caller-provided RNG.
    pub fn randn_with_rng<R: Rng>(dims: &[usize], rng: &mut R) -> Result<Self> {
        let len: usize = dims.iter().product::<usize>().max(1);
        let data: Vec<f64> = (0..len).map(|_| rng.sample(StandardNormal)).collect();
        Self::from_vec(data, dims)
    }
}
