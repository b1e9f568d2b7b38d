use crate::error::{Error, Result};

pub fn compute_broadcast_shape(a: &[usize], b: &[usize]) -> Result<Vec<usize>> {
    let ndim = a.len().max(b.len());
    let a = pad_shape(a, ndim);
    let b = pad_shape(b, ndim);

    a.iter()
        .zip(&b)
        .map(|(&x, &y)| {
            if x == y || y == 1 {
                Ok(x)
            } else if x == 1 {
                Ok(y)
            } else {
                Err(Error::InvalidShape {
                    message: format!("Cannot broadcast shapes {:?} and {:?}", a, b),
                })
            }
        })
        .collect()
}

pub fn compute_broadcast_shape_all(shapes: &[&[usize]]) -> Result<Vec<usize>> {
    shapes
        .iter()
        .try_fold(Vec::new(), |acc, shape| compute_broadcast_shape(&acc, shape))
}

/// Left-pads `shape` with ones up to `ndim` axes.
pub fn pad_shape(shape: &[usize], ndim: usize) -> Vec<usize> {
    let mut padded = vec![1; ndim.saturating_sub(shape.len())];
    padded.extend_from_slice(shape);
    padded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broadcast_shapes() -> Result<()> {
        assert_eq!(compute_broadcast_shape(&[3, 1], &[4])?, vec![3, 4]);
        assert_eq!(compute_broadcast_shape(&[], &[2, 2])?, vec![2, 2]);
        assert_eq!(compute_broadcast_shape_all(&[&[2, 1], &[1, 3], &[3]])?, vec![2, 3]);
        assert!(compute_broadcast_shape(&[2], &[4]).is_err());
        Ok(())
    }
}
