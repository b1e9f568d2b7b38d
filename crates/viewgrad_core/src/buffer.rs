use crate::{
    array::NdArray,
    error::{Error, Result},
    layout::Layout,
};

/// Flat `f64` storage shared by every tensor of a view family.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Buffer {
    data: Vec<f64>,
}

impl Buffer {
    pub fn new(len: usize) -> Self {
        Self { data: vec![0.0; len] }
    }

    pub fn from_vec(data: Vec<f64>) -> Self {
        Self { data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Gathers the elements addressed by `layout` into a contiguous array.
    pub fn read(&self, layout: &Layout) -> Result<NdArray> {
        let offsets = layout.offsets();
        let mut out = Vec::with_capacity(offsets.len());
        for pos in offsets {
            let value = self.data.get(pos).ok_or(Error::IndexOutOfBounds {
                index: pos as i64,
                size: self.data.len(),
            })?;
            out.push(*value);
        }
        NdArray::new(out, layout.shape())
    }

    /// Scatters `values` (already shaped like `layout`) into the addressed elements.
    ///
    /// Bounds are checked for every position before the first write.
    pub fn write(&mut self, layout: &Layout, values: &NdArray) -> Result<()> {
        if values.shape() != layout.shape() {
            return Err(Error::InvalidShape {
                message: format!(
                    "cannot write values of shape {:?} into a region of shape {:?}",
                    values.shape(),
                    layout.shape()
                ),
            });
        }
        let offsets = layout.offsets();
        if let Some(&pos) = offsets.iter().find(|&&pos| pos >= self.data.len()) {
            return Err(Error::IndexOutOfBounds {
                index: pos as i64,
                size: self.data.len(),
            });
        }
        for (pos, value) in offsets.into_iter().zip(values.data()) {
            self.data[pos] = *value;
        }
        Ok(())
    }

    /// Replaces the whole buffer, keeping its length.
    pub fn overwrite(&mut self, values: &[f64]) -> Result<()> {
        if values.len() != self.data.len() {
            return Err(Error::InvalidShape {
                message: format!("cannot overwrite {} elements with {}", self.data.len(), values.len()),
            });
        }
        self.data.copy_from_slice(values);
        Ok(())
    }
}
