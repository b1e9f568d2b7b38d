use crate::{adapter::TensorAdapter, register_root, try_with_node_mut, Tensor};
use rand::{distributions::Uniform, Rng};
use rand_distr::StandardNormal;
use viewgrad_core::{
    array::NdArray,
    error::{Error, Result},
};

/// ## Factory & initialization helpers
///
/// * Generic constructors: `new`, `from_flatten_vec`, `from_array`, `constant`, `scalar`
/// * Pattern initializers: `zeros`, `ones`, `full`, `arange`, `randn`, `uniform`
///
/// Tensors made here are leaves owning fresh storage. They take part in
/// autodiff unless built with `constant`/`scalar` or marked afterwards with
/// [`with_constant`](Self::with_constant). Each infallible method is a thin
/// wrapper that panics around its `try_*` counterpart.
impl Tensor {
    /// Runs [`try_new`](Self::try_new) and panics on failure.
    ///
    /// # Examples
    /// ```
    /// use viewgrad_tensor::Tensor;
    ///
    /// let tensor = Tensor::new(vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
    /// assert_eq!(tensor.shape(), vec![2, 2]);
    /// ```
    pub fn new<T>(data: T) -> Self
    where
        T: TensorAdapter,
    {
        Self::try_new(data).expect("failed to create tensor")
    }

    pub fn try_new<T>(data: T) -> Result<Self>
    where
        T: TensorAdapter,
    {
        Ok(register_root(data.to_array()?, false))
    }

    /// A leaf that never receives gradients.
    pub fn constant<T>(data: T) -> Self
    where
        T: TensorAdapter,
    {
        Self::try_constant(data).expect("failed to create tensor")
    }

    pub fn try_constant<T>(data: T) -> Result<Self>
    where
        T: TensorAdapter,
    {
        Ok(register_root(data.to_array()?, true))
    }

    /// Constant 0-d tensor.
    pub fn scalar(value: f64) -> Self {
        register_root(NdArray::scalar(value), true)
    }

    pub fn from_flatten_vec(data: Vec<f64>, shape: &[usize]) -> Self {
        Self::try_from_flatten_vec(data, shape).expect("failed to create tensor")
    }

    pub fn try_from_flatten_vec(data: Vec<f64>, shape: &[usize]) -> Result<Self> {
        Ok(register_root(NdArray::new(data, shape)?, false))
    }

    pub fn from_array(array: NdArray) -> Self {
        register_root(array, false)
    }

    pub fn zeros(shape: &[usize]) -> Self {
        Self::full(shape, 0.0)
    }

    pub fn zeros_like(src: &Tensor) -> Self {
        Self::zeros(&src.shape())
    }

    pub fn ones(shape: &[usize]) -> Self {
        Self::full(shape, 1.0)
    }

    pub fn ones_like(src: &Tensor) -> Self {
        Self::ones(&src.shape())
    }

    pub fn full(shape: &[usize], value: f64) -> Self {
        register_root(NdArray::full(shape, value), false)
    }

    pub fn full_like(src: &Tensor, value: f64) -> Self {
        Self::full(&src.shape(), value)
    }

    /// Runs [`try_arange`](Self::try_arange) and panics on failure.
    pub fn arange(start: f64, end: f64, step: f64) -> Self {
        Self::try_arange(start, end, step).expect("failed to create arange tensor")
    }

    /// Values from `start` (inclusive) to `end` (exclusive) spaced by `step`.
    ///
    /// # Errors
    ///
    /// Returns an error if `step` is zero or any bound isn't finite.
    pub fn try_arange(start: f64, end: f64, step: f64) -> Result<Self> {
        if !(start.is_finite() && end.is_finite() && step.is_finite()) {
            return Err(Error::InvalidArgument(format!(
                "arange: bounds must be finite, got start={}, end={}, step={}",
                start, end, step
            )));
        }
        if step == 0.0 {
            return Err(Error::InvalidArgument("arange: step cannot be zero".to_string()));
        }
        let count = ((end - start) / step).ceil().max(0.0) as usize;
        let data: Vec<f64> = (0..count).map(|i| start + i as f64 * step).collect();
        Self::try_from_flatten_vec(data, &[count])
    }

    /// Standard normal samples from the thread-local generator.
    pub fn randn(shape: &[usize]) -> Self {
        Self::randn_with_rng(shape, &mut rand::thread_rng())
    }

    pub fn randn_like(src: &Tensor) -> Self {
        Self::randn(&src.shape())
    }

    pub fn randn_with_rng<R: Rng + ?Sized>(shape: &[usize], rng: &mut R) -> Self {
        let size: usize = shape.iter().product();
        let data: Vec<f64> = (0..size).map(|_| rng.sample(StandardNormal)).collect();
        Self::from_flatten_vec(data, shape)
    }

    /// Runs [`try_uniform`](Self::try_uniform) and panics on failure.
    pub fn uniform(shape: &[usize], low: f64, high: f64) -> Self {
        Self::try_uniform(shape, low, high).expect("failed to create uniform tensor")
    }

    pub fn try_uniform(shape: &[usize], low: f64, high: f64) -> Result<Self> {
        Self::try_uniform_with_rng(shape, low, high, &mut rand::thread_rng())
    }

    /// Samples from `[low, high)`.
    pub fn try_uniform_with_rng<R: Rng + ?Sized>(shape: &[usize], low: f64, high: f64, rng: &mut R) -> Result<Self> {
        if !(low < high) {
            return Err(Error::InvalidArgument(format!(
                "uniform: empty range [{}, {})",
                low, high
            )));
        }
        let dist = Uniform::new(low, high);
        let size: usize = shape.iter().product();
        let data: Vec<f64> = (0..size).map(|_| rng.sample(dist)).collect();
        Self::try_from_flatten_vec(data, shape)
    }

    /// Sets the constant flag of this tensor alone.
    pub fn try_with_constant(self, constant: bool) -> Result<Self> {
        try_with_node_mut(self.id(), |node| node.constant = constant)?;
        Ok(self)
    }

    pub fn with_constant(self, constant: bool) -> Self {
        self.try_with_constant(constant).expect("failed to set constant flag")
    }
}
