use viewgrad_core::{
    array::NdArray,
    error::{Error, Result},
};

/// Nested host data that can become a tensor.
pub trait TensorAdapter: Sized {
    fn to_array(self) -> Result<NdArray>;
}

fn ragged(shape: &[usize]) -> Error {
    Error::InvalidShape {
        message: format!("ragged nested data, expected rows matching {:?}", shape),
    }
}

impl TensorAdapter for f64 {
    fn to_array(self) -> Result<NdArray> {
        Ok(NdArray::scalar(self))
    }
}

impl TensorAdapter for Vec<f64> {
    fn to_array(self) -> Result<NdArray> {
        let len = self.len();
        NdArray::new(self, &[len])
    }
}

impl TensorAdapter for &[f64] {
    fn to_array(self) -> Result<NdArray> {
        self.to_vec().to_array()
    }
}

impl<const N: usize> TensorAdapter for [f64; N] {
    fn to_array(self) -> Result<NdArray> {
        self.to_vec().to_array()
    }
}

impl TensorAdapter for Vec<Vec<f64>> {
    fn to_array(self) -> Result<NdArray> {
        let rows = self.len();
        let cols = self.first().map_or(0, |row| row.len());
        if self.iter().any(|row| row.len() != cols) {
            return Err(ragged(&[rows, cols]));
        }
        NdArray::new(self.into_iter().flatten().collect(), &[rows, cols])
    }
}

impl<const R: usize, const C: usize> TensorAdapter for [[f64; C]; R] {
    fn to_array(self) -> Result<NdArray> {
        NdArray::new(self.iter().flatten().copied().collect(), &[R, C])
    }
}

impl TensorAdapter for Vec<Vec<Vec<f64>>> {
    fn to_array(self) -> Result<NdArray> {
        let depth = self.len();
        let rows = self.first().map_or(0, |m| m.len());
        let cols = self.first().and_then(|m| m.first()).map_or(0, |row| row.len());
        let shape = [depth, rows, cols];
        let mut flat = Vec::with_capacity(depth * rows * cols);
        for matrix in self {
            if matrix.len() != rows {
                return Err(ragged(&shape));
            }
            for row in matrix {
                if row.len() != cols {
                    return Err(ragged(&shape));
                }
                flat.extend(row);
            }
        }
        NdArray::new(flat, &shape)
    }
}

impl TensorAdapter for NdArray {
    fn to_array(self) -> Result<NdArray> {
        Ok(self)
    }
}
