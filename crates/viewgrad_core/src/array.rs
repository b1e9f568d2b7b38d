use crate::{
    broadcast::{compute_broadcast_shape, pad_shape},
    error::{Error, Result},
    layout::Layout,
};

/// Contiguous, row-major `f64` values with a shape.
///
/// This is the currency of the numeric kernels: tensors materialize their
/// strided storage into an `NdArray`, kernels map arrays to arrays.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NdArray {
    shape: Vec<usize>,
    data: Vec<f64>,
}

impl NdArray {
    pub fn new(data: Vec<f64>, shape: &[usize]) -> Result<Self> {
        let size: usize = shape.iter().product();
        if size != data.len() {
            return Err(Error::InvalidShape {
                message: format!("{} values cannot fill shape {:?}", data.len(), shape),
            });
        }
        Ok(Self {
            shape: shape.to_vec(),
            data,
        })
    }

    pub fn full(shape: &[usize], value: f64) -> Self {
        Self {
            shape: shape.to_vec(),
            data: vec![value; shape.iter().product()],
        }
    }

    pub fn zeros(shape: &[usize]) -> Self {
        Self::full(shape, 0.0)
    }

    pub fn ones(shape: &[usize]) -> Self {
        Self::full(shape, 1.0)
    }

    pub fn scalar(value: f64) -> Self {
        Self {
            shape: vec![],
            data: vec![value],
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }
    pub fn len(&self) -> usize {
        self.data.len()
    }
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
    pub fn data(&self) -> &[f64] {
        &self.data
    }
    pub fn into_data(self) -> Vec<f64> {
        self.data
    }

    pub fn reshape(&self, shape: &[usize]) -> Result<Self> {
        Self::new(self.data.clone(), shape)
    }

    /// Gathers `self` through `layout`, which must address positions of `self.data`.
    pub fn gather(&self, layout: &Layout) -> Result<Self> {
        let values = layout
            .offsets()
            .into_iter()
            .map(|pos| {
                self.data.get(pos).copied().ok_or(Error::IndexOutOfBounds {
                    index: pos as i64,
                    size: self.data.len(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(values, layout.shape())
    }

    /// Adds `values` (shaped like `layout`) into the positions `layout` addresses.
    pub fn scatter_add(&mut self, layout: &Layout, values: &NdArray) -> Result<()> {
        if values.shape() != layout.shape() {
            return Err(Error::InvalidShape {
                message: format!(
                    "cannot scatter values of shape {:?} through a layout of shape {:?}",
                    values.shape(),
                    layout.shape()
                ),
            });
        }
        let size = self.data.len();
        for (pos, value) in layout.offsets().into_iter().zip(&values.data) {
            let slot = self.data.get_mut(pos).ok_or(Error::IndexOutOfBounds { index: pos as i64, size })?;
            *slot += value;
        }
        Ok(())
    }

    /// Zeroes the positions `layout` addresses.
    pub fn zero_region(&mut self, layout: &Layout) {
        for pos in layout.offsets() {
            if let Some(slot) = self.data.get_mut(pos) {
                *slot = 0.0;
            }
        }
    }

    pub fn broadcast_to(&self, shape: &[usize]) -> Result<Self> {
        if self.shape == shape {
            return Ok(self.clone());
        }
        let layout = Layout::from_shape(&self.shape).broadcast_to(shape)?;
        self.gather(&layout)
    }

    /// Sums broadcast axes away so the result has `shape`; the inverse of
    /// [`broadcast_to`](Self::broadcast_to) for gradients.
    pub fn sum_to(&self, shape: &[usize]) -> Result<Self> {
        if self.shape == shape {
            return Ok(self.clone());
        }
        if shape.len() > self.ndim() {
            return Err(Error::InvalidShape {
                message: format!("cannot reduce shape {:?} to {:?}", self.shape, shape),
            });
        }
        let padded = pad_shape(shape, self.ndim());
        for (&have, &want) in self.shape.iter().zip(&padded) {
            if want != have && want != 1 {
                return Err(Error::InvalidShape {
                    message: format!("cannot reduce shape {:?} to {:?}", self.shape, shape),
                });
            }
        }
        let mut out = Self::zeros(&padded);
        let layout = Layout::from_shape(&padded).broadcast_to(&self.shape)?;
        out.scatter_add(&layout, self)?;
        out.reshape(shape)
    }

    pub fn map<F>(&self, f: F) -> Self
    where
        F: Fn(f64) -> f64,
    {
        Self {
            shape: self.shape.clone(),
            data: self.data.iter().map(|&v| f(v)).collect(),
        }
    }

    /// Elementwise combination under broadcasting.
    pub fn zip_with<F>(&self, other: &Self, f: F) -> Result<Self>
    where
        F: Fn(f64, f64) -> f64,
    {
        let shape = compute_broadcast_shape(&self.shape, &other.shape)?;
        let lhs = self.broadcast_to(&shape)?;
        let rhs = other.broadcast_to(&shape)?;
        Ok(Self {
            data: lhs.data.iter().zip(&rhs.data).map(|(&a, &b)| f(a, b)).collect(),
            shape,
        })
    }

    pub fn add_assign(&mut self, other: &Self) -> Result<()> {
        if self.shape != other.shape {
            return Err(Error::InvalidShape {
                message: format!("cannot accumulate shape {:?} into {:?}", other.shape, self.shape),
            });
        }
        for (a, b) in self.data.iter_mut().zip(&other.data) {
            *a += b;
        }
        Ok(())
    }

    /// Sum over `axes` (all axes when `None`).
    pub fn sum_axes(&self, axes: Option<&[usize]>, keepdims: bool) -> Result<Self> {
        let reduce: Vec<bool> = match axes {
            None => vec![true; self.ndim()],
            Some(axes) => {
                let mut mask = vec![false; self.ndim()];
                for &axis in axes {
                    if axis >= self.ndim() {
                        return Err(Error::DimensionOutOfBounds {
                            dim: axis as i64,
                            ndim: self.ndim(),
                        });
                    }
                    mask[axis] = true;
                }
                mask
            },
        };
        let kept: Vec<usize> = self
            .shape
            .iter()
            .zip(&reduce)
            .map(|(&dim, &r)| if r { 1 } else { dim })
            .collect();
        let summed = self.sum_to(&kept)?;
        if keepdims {
            return Ok(summed);
        }
        let squeezed: Vec<usize> = self
            .shape
            .iter()
            .zip(&reduce)
            .filter(|(_, r)| !**r)
            .map(|(&dim, _)| dim)
            .collect();
        summed.reshape(&squeezed)
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.data.clone()
    }
}
