mod utils;

use viewgrad_core::error::Result;
use viewgrad_tensor::Tensor;
use utils::{one_to, seeded_rng};

#[test]
fn new() -> Result<()> {
    let x = Tensor::try_new(vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]])?;
    assert_eq!(x.shape(), vec![2, 3]);
    assert_eq!(x.ndim(), 2);
    assert_eq!(x.size(), 6);
    assert_eq!(x.to_vec(), one_to(6));
    assert!(!x.is_constant());
    assert!(x.base().is_none());
    assert!(x.is_writeable());

    let cube = Tensor::try_new(vec![vec![vec![1.0], vec![2.0]], vec![vec![3.0], vec![4.0]]])?;
    assert_eq!(cube.shape(), vec![2, 2, 1]);

    let ragged = Tensor::try_new(vec![vec![1.0, 2.0], vec![3.0]]);
    assert!(ragged.unwrap_err().is_shape_error());
    Ok(())
}

#[test]
fn constant_and_scalar() -> Result<()> {
    let c = Tensor::try_constant([1.0, 2.0])?;
    assert!(c.is_constant());

    let s = Tensor::scalar(3.5);
    assert!(s.is_constant());
    assert!(s.shape().is_empty());
    assert_eq!(s.item(), 3.5);
    assert!(Tensor::new(vec![1.0, 2.0]).try_item().is_err());
    Ok(())
}

#[test]
fn from_flatten_vec() -> Result<()> {
    let x = Tensor::try_from_flatten_vec(one_to(6), &[3, 2])?;
    assert_eq!(x.shape(), vec![3, 2]);
    assert!(Tensor::try_from_flatten_vec(one_to(5), &[3, 2]).is_err());
    Ok(())
}

#[test]
fn filled() -> Result<()> {
    let z = Tensor::zeros(&[2, 2]);
    assert_eq!(z.to_vec(), vec![0.0; 4]);
    let o = Tensor::ones_like(&z);
    assert_eq!(o.to_vec(), vec![1.0; 4]);
    let f = Tensor::full_like(&o, 7.0);
    assert_eq!(f.to_vec(), vec![7.0; 4]);
    assert!(!f.shares_memory(&o));
    Ok(())
}

#[test]
fn arange() -> Result<()> {
    assert_eq!(Tensor::try_arange(1.0, 5.0, 1.0)?.to_vec(), one_to(4));
    assert_eq!(Tensor::try_arange(0.0, 1.0, 0.25)?.to_vec(), vec![0.0, 0.25, 0.5, 0.75]);
    assert_eq!(Tensor::try_arange(3.0, 0.0, -1.0)?.to_vec(), vec![3.0, 2.0, 1.0]);
    assert!(Tensor::try_arange(5.0, 1.0, 1.0)?.to_vec().is_empty());
    assert!(Tensor::try_arange(0.0, 1.0, 0.0).is_err());
    assert!(Tensor::try_arange(0.0, f64::INFINITY, 1.0).is_err());
    assert!(Tensor::try_arange(f64::NAN, 1.0, 1.0).is_err());
    assert!(Tensor::try_arange(0.0, 1.0, f64::NEG_INFINITY).is_err());
    Ok(())
}

#[test]
fn random() -> Result<()> {
    let mut rng = seeded_rng(7);
    let x = Tensor::try_uniform_with_rng(&[100], -2.0, 3.0, &mut rng)?;
    assert!(x.to_vec().iter().all(|&v| (-2.0..3.0).contains(&v)));
    assert!(Tensor::try_uniform(&[2], 1.0, 1.0).is_err());

    let a = Tensor::randn_with_rng(&[4, 4], &mut seeded_rng(3));
    let b = Tensor::randn_with_rng(&[4, 4], &mut seeded_rng(3));
    assert_eq!(a.to_vec(), b.to_vec());
    assert_eq!(Tensor::randn_like(&a).shape(), vec![4, 4]);
    Ok(())
}

#[test]
fn with_constant() -> Result<()> {
    let x = Tensor::new(one_to(2)).try_with_constant(true)?;
    assert!(x.is_constant());
    let y = x.try_with_constant(false)?;
    assert_eq!(x, y);
    assert!(!x.is_constant());
    Ok(())
}
