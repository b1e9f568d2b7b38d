#![cfg(feature = "serde")]

mod utils;

use viewgrad_core::error::{Error, Result};
use viewgrad_tensor::{
    io::{load, save},
    Tensor,
};
use utils::{grad_vec, one_to, setup_tensor_with_shape};

#[test]
fn bytes() -> Result<()> {
    let x = setup_tensor_with_shape(one_to(6), &[2, 3])?;
    let y = Tensor::from_bytes(&x.to_bytes()?)?;
    assert_ne!(x, y);
    assert_eq!(y.shape(), vec![2, 3]);
    assert_eq!(y.to_vec(), one_to(6));
    assert!(y.grad().is_none());
    assert!(Tensor::from_bytes(&[1, 2, 3]).is_err());
    Ok(())
}

#[test]
fn json_keeps_gradient() -> Result<()> {
    let x = setup_tensor_with_shape(one_to(3), &[3])?;
    x.try_mul_scalar(2.0)?.try_backward()?;

    let json = x.to_json()?;
    let y = Tensor::from_json(&json)?;
    assert_eq!(y.to_vec(), one_to(3));
    assert_eq!(grad_vec(&y), Some(vec![2.0; 3]));
    assert!(!y.has_creator());
    assert!(Tensor::from_json("{").is_err());
    Ok(())
}

#[test]
fn save_and_load() -> Result<()> {
    let path = std::env::temp_dir().join(format!("viewgrad-io-{}.bin", std::process::id()));
    let x = setup_tensor_with_shape(one_to(4), &[2, 2])?;
    x.try_exp()?.try_sum_all()?.try_backward()?;
    let expected = grad_vec(&x);

    save(&path, &x)?;
    let y = load(&path)?;
    std::fs::remove_file(&path)?;

    assert_eq!(y.shape(), vec![2, 2]);
    assert_eq!(y.to_vec(), one_to(4));
    assert_eq!(grad_vec(&y), expected);
    Ok(())
}

#[test]
fn save_rejects_other_types() {
    let path = std::env::temp_dir().join("viewgrad-io-rejected.bin");
    let err = save(&path, &vec![1.0f64]).unwrap_err();
    assert!(matches!(err, Error::TypeMismatch { .. }));
    assert!(!path.exists());
}

#[test]
fn load_missing_file() {
    let err = load("/nonexistent/viewgrad.bin").unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}
