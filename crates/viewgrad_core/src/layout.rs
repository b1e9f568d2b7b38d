use crate::{
    error::{Error, Result},
    index::{resolve_slice, Index},
};

/// Strided description of how a tensor's elements sit in its storage.
///
/// Strides are signed so that reversed slices are plain layouts; `offset` is
/// the storage position of the first logical element. Every view-producing
/// operation is a pure function `Layout -> Layout` over the same storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Layout {
    shape: Vec<usize>,
    strides: Vec<isize>,
    offset: usize,
}

impl Layout {
    pub fn new(shape: &[usize], strides: &[isize], offset: usize) -> Self {
        Self {
            shape: shape.to_vec(),
            strides: strides.to_vec(),
            offset,
        }
    }

    pub fn from_shape(shape: &[usize]) -> Self {
        Self {
            shape: shape.to_vec(),
            strides: Self::compute_strides(shape),
            offset: 0,
        }
    }

    pub fn compute_strides(shape: &[usize]) -> Vec<isize> {
        let mut strides = vec![0isize; shape.len()];
        let mut acc = 1isize;
        for (stride, &dim) in strides.iter_mut().zip(shape).rev() {
            *stride = acc;
            acc *= dim.max(1) as isize;
        }
        strides
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }
    pub fn dim_size(&self, dim: usize) -> Option<usize> {
        self.shape.get(dim).copied()
    }
    pub fn size(&self) -> usize {
        self.shape.iter().product()
    }
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }
    pub fn strides(&self) -> &[isize] {
        &self.strides
    }
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Row-major with no gaps; axes of length 1 may carry any stride.
    pub fn is_contiguous(&self) -> bool {
        let expected = Self::compute_strides(&self.shape);
        self.shape
            .iter()
            .zip(self.strides.iter().zip(&expected))
            .all(|(&dim, (&s, &e))| dim <= 1 || s == e)
    }

    /// Storage positions of every element, in row-major logical order.
    pub fn offsets(&self) -> Vec<usize> {
        let size = self.size();
        let mut out = Vec::with_capacity(size);
        if size == 0 {
            return out;
        }
        let ndim = self.ndim();
        let mut index = vec![0usize; ndim];
        let mut pos = self.offset as isize;
        loop {
            out.push(pos as usize);
            let mut d = ndim;
            loop {
                if d == 0 {
                    return out;
                }
                d -= 1;
                index[d] += 1;
                pos += self.strides[d];
                if index[d] < self.shape[d] {
                    break;
                }
                pos -= self.strides[d] * self.shape[d] as isize;
                index[d] = 0;
            }
        }
    }

    /// Applies a basic index expression, yielding a layout over the same storage.
    pub fn index(&self, indices: &[Index]) -> Result<Self> {
        let ellipses = indices.iter().filter(|i| matches!(i, Index::Ellipsis)).count();
        if ellipses > 1 {
            return Err(Error::InvalidArgument(
                "an index can only have a single ellipsis".into(),
            ));
        }
        let consumed = indices.iter().filter(|i| i.consumes_axis()).count();
        if consumed > self.ndim() {
            return Err(Error::DimensionOutOfBounds {
                dim: consumed as i64,
                ndim: self.ndim(),
            });
        }

        let mut shape = Vec::with_capacity(self.ndim() + indices.len());
        let mut strides = Vec::with_capacity(self.ndim() + indices.len());
        let mut offset = self.offset as isize;
        let mut axis = 0;

        for entry in indices {
            match *entry {
                Index::Int(i) => {
                    let size = self.shape[axis];
                    let resolved = if i < 0 { i + size as isize } else { i };
                    if resolved < 0 || resolved >= size as isize {
                        return Err(Error::IndexOutOfBounds { index: i as i64, size });
                    }
                    offset += resolved * self.strides[axis];
                    axis += 1;
                },
                Index::Slice { start, stop, step } => {
                    if step == 0 {
                        return Err(Error::InvalidArgument("slice step cannot be zero".into()));
                    }
                    let (start, len, step) = resolve_slice(start, stop, step, self.shape[axis]);
                    if len > 0 {
                        offset += start * self.strides[axis];
                    }
                    shape.push(len);
                    strides.push(self.strides[axis] * step);
                    axis += 1;
                },
                Index::NewAxis => {
                    shape.push(1);
                    strides.push(0);
                },
                Index::Ellipsis => {
                    let skip = self.ndim() - consumed;
                    for _ in 0..skip {
                        shape.push(self.shape[axis]);
                        strides.push(self.strides[axis]);
                        axis += 1;
                    }
                },
            }
        }
        // trailing axes are implicitly fully sliced
        while axis < self.ndim() {
            shape.push(self.shape[axis]);
            strides.push(self.strides[axis]);
            axis += 1;
        }

        Ok(Self {
            shape,
            strides,
            offset: offset as usize,
        })
    }

    pub fn permute(&self, axes: &[usize]) -> Result<Self> {
        if axes.len() != self.ndim() {
            return Err(Error::InvalidArgument(format!(
                "axes {:?} don't match a layout with {} dimensions",
                axes,
                self.ndim()
            )));
        }
        let mut seen = vec![false; self.ndim()];
        for &axis in axes {
            if axis >= self.ndim() {
                return Err(Error::DimensionOutOfBounds {
                    dim: axis as i64,
                    ndim: self.ndim(),
                });
            }
            if seen[axis] {
                return Err(Error::InvalidArgument(format!("repeated axis in permutation {:?}", axes)));
            }
            seen[axis] = true;
        }
        Ok(Self {
            shape: axes.iter().map(|&a| self.shape[a]).collect(),
            strides: axes.iter().map(|&a| self.strides[a]).collect(),
            offset: self.offset,
        })
    }

    pub fn transpose(&self, dim0: usize, dim1: usize) -> Result<Self> {
        let mut axes: Vec<usize> = (0..self.ndim()).collect();
        if dim0 >= self.ndim() || dim1 >= self.ndim() {
            return Err(Error::DimensionOutOfBounds {
                dim: dim0.max(dim1) as i64,
                ndim: self.ndim(),
            });
        }
        axes.swap(dim0, dim1);
        self.permute(&axes)
    }

    /// Reverses all axes.
    pub fn t(&self) -> Self {
        Self {
            shape: self.shape.iter().rev().copied().collect(),
            strides: self.strides.iter().rev().copied().collect(),
            offset: self.offset,
        }
    }

    /// Reshapes without moving data; `Ok(None)` when the layout isn't contiguous.
    pub fn reshape(&self, new_shape: &[usize]) -> Result<Option<Self>> {
        let new_size: usize = new_shape.iter().product();
        if self.size() != new_size {
            return Err(Error::IncompatibleShape(format!(
                "Cannot reshape layout of size {} to shape {:?}",
                self.size(),
                new_shape
            )));
        }
        if !self.is_contiguous() {
            return Ok(None);
        }
        Ok(Some(Self {
            shape: new_shape.to_vec(),
            strides: Self::compute_strides(new_shape),
            offset: self.offset,
        }))
    }

    pub fn squeeze(&self, dim: usize) -> Result<Self> {
        match self.dim_size(dim) {
            None => Err(Error::DimensionOutOfBounds {
                dim: dim as i64,
                ndim: self.ndim(),
            }),
            Some(1) => {
                let mut out = self.clone();
                out.shape.remove(dim);
                out.strides.remove(dim);
                Ok(out)
            },
            Some(size) => Err(Error::InvalidShape {
                message: format!("cannot squeeze axis {} with size {}", dim, size),
            }),
        }
    }

    pub fn unsqueeze(&self, dim: usize) -> Result<Self> {
        if dim > self.ndim() {
            return Err(Error::DimensionOutOfBounds {
                dim: dim as i64,
                ndim: self.ndim(),
            });
        }
        let mut out = self.clone();
        out.shape.insert(dim, 1);
        out.strides.insert(dim, 0);
        Ok(out)
    }

    /// Main diagonal of a 2-d layout.
    pub fn diagonal(&self) -> Result<Self> {
        if self.ndim() != 2 {
            return Err(Error::InvalidShape {
                message: format!("diagonal requires a 2-d layout, got shape {:?}", self.shape),
            });
        }
        Ok(Self {
            shape: vec![self.shape[0].min(self.shape[1])],
            strides: vec![self.strides[0] + self.strides[1]],
            offset: self.offset,
        })
    }

    /// Read-only broadcast of this layout to `shape` (stride 0 on expanded axes).
    pub fn broadcast_to(&self, shape: &[usize]) -> Result<Self> {
        if shape.len() < self.ndim() {
            return Err(Error::InvalidShape {
                message: format!("cannot broadcast shape {:?} to {:?}", self.shape, shape),
            });
        }
        let lead = shape.len() - self.ndim();
        let mut strides = vec![0isize; shape.len()];
        for (i, (&dim, &stride)) in self.shape.iter().zip(&self.strides).enumerate() {
            let target = shape[lead + i];
            if dim == target {
                strides[lead + i] = stride;
            } else if dim != 1 {
                return Err(Error::InvalidShape {
                    message: format!("cannot broadcast shape {:?} to {:?}", self.shape, shape),
                });
            }
        }
        Ok(Self {
            shape: shape.to_vec(),
            strides,
            offset: self.offset,
        })
    }
}
