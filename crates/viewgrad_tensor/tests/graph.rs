mod utils;

use viewgrad_core::{
    array::NdArray,
    error::{Error, Result},
};
use viewgrad_tensor::{is_tracking, no_autodiff, Tensor};
use utils::{ellipsis, grad_vec, one_to, setup_constant, setup_tensor};

mod test_functions {
    use super::*;

    pub fn constant_propagation_test(x_constant: bool, y_constant: bool) -> Result<()> {
        let x = setup_tensor(one_to(3))?.try_with_constant(x_constant)?;
        let y = setup_tensor(one_to(3))?.try_with_constant(y_constant)?;
        let z = x.try_mul(&y)?;
        assert_eq!(z.is_constant(), x_constant && y_constant);

        match z.try_sum_all()?.try_backward() {
            Ok(()) => {
                assert!(!z.is_constant());
                assert_eq!(x.grad().is_some(), !x_constant);
                assert_eq!(y.grad().is_some(), !y_constant);
                assert!(z.grad().is_some());
            },
            Err(err) => {
                assert!(z.is_constant());
                assert!(matches!(err, Error::ConstantTensor));
            },
        }
        Ok(())
    }
}

test_with_flags!([
    constant_propagation: [
        variable_variable => (false, false),
        variable_constant => (false, true),
        constant_variable => (true, false),
        constant_constant => (true, true),
    ],
]);

#[test]
fn basic() -> Result<()> {
    let x = setup_tensor(vec![2.0])?;
    let y = setup_tensor(vec![3.0])?;
    let m1 = Tensor::new(vec![vec![1.0, 2.0], vec![3.0, 4.0]]);

    let z1 = x.try_mul(&y)?;
    let z2 = x.try_sub(&y)?;
    let z3 = x.try_add(&y)?;
    let z4 = x.try_pow_scalar(2.0)?.try_add(&y.try_pow_scalar(3.0)?)?;
    let sr = z1.try_add(&z2)?.try_add(&z3)?.try_add(&z4)?;
    let mr = m1.try_mul_scalar(0.5)?.try_sum_all()?;

    let result = sr.try_add(&mr)?;
    result.try_backward()?;

    assert_eq!(result.to_vec(), vec![46.0]);
    // d/dx = y + 1 + 1 + 2x, d/dy = x - 1 + 1 + 3y^2
    assert_eq!(grad_vec(&x), Some(vec![9.0]));
    assert_eq!(grad_vec(&y), Some(vec![29.0]));
    assert_eq!(grad_vec(&m1), Some(vec![0.5; 4]));
    Ok(())
}

#[test]
fn upstream_gradient_broadcasts() -> Result<()> {
    let x = setup_tensor(one_to(4))?;
    let y = x.try_mul_scalar(3.0)?;
    y.try_backward_with(&NdArray::scalar(2.0))?;
    assert_eq!(grad_vec(&x), Some(vec![6.0; 4]));
    assert_eq!(grad_vec(&y), Some(vec![2.0; 4]));
    Ok(())
}

#[test]
fn gradients_are_constant() -> Result<()> {
    let x = setup_tensor(one_to(2))?;
    x.try_mul(&x)?.try_backward()?;
    let grad = x.grad().expect("x has a gradient");
    assert!(grad.is_constant());
    assert!(grad.try_backward().unwrap_err().is_graph_error());
    Ok(())
}

#[test]
fn backward_twice_has_no_graph() -> Result<()> {
    let x = setup_tensor(one_to(3))?;
    let y = x.try_exp()?;
    y.try_backward()?;
    assert!(!y.has_creator());
    assert!(matches!(y.try_backward(), Err(Error::NoGraph)));

    // a leaf still backpropagates onto itself
    x.try_backward()?;
    assert_eq!(grad_vec(&x), Some(vec![1.0; 3]));
    Ok(())
}

#[test]
fn backward_releases_only_unshared_nodes() -> Result<()> {
    let x = setup_tensor(one_to(2))?;
    let y = x.try_mul_scalar(2.0)?;
    let a = y.try_add_scalar(1.0)?;
    let b = y.try_mul_scalar(3.0)?;

    a.try_backward()?;
    assert_eq!(grad_vec(&x), Some(vec![2.0; 2]));
    // y still feeds b
    assert!(y.has_creator());

    b.try_backward()?;
    assert_eq!(grad_vec(&x), Some(vec![6.0; 2]));
    assert!(!y.has_creator());
    Ok(())
}

#[test]
fn clear_graph_is_idempotent() -> Result<()> {
    let x = setup_tensor(one_to(3))?;
    let y = x.try_positive()?.try_mul_scalar(2.0)?;
    y.try_backward()?;
    assert!(x.grad().is_some());

    y.try_clear_graph()?;
    y.try_clear_graph()?;
    assert!(y.grad().is_none());
    assert!(!y.has_creator());
    assert_eq!(y.to_vec(), vec![2.0, 4.0, 6.0]);
    Ok(())
}

#[test]
fn clear_graph_keeps_shared_upstream() -> Result<()> {
    let x = setup_tensor(one_to(2))?;
    let y = x.try_exp()?;
    let a = y.try_neg()?;
    let b = y.try_positive()?;

    a.try_clear_graph()?;
    assert!(!a.has_creator());
    assert!(y.has_creator());

    b.try_backward()?;
    let expected: Vec<f64> = one_to(2).iter().map(|v| v.exp()).collect();
    assert_eq!(grad_vec(&x), Some(expected));
    Ok(())
}

#[test]
fn no_autodiff_records_nothing() -> Result<()> {
    let x = setup_tensor(one_to(3))?;
    assert!(is_tracking());
    let y = {
        let _guard = no_autodiff();
        assert!(!is_tracking());
        x.try_mul_scalar(2.0)?
    };
    assert!(is_tracking());
    assert!(y.is_constant());
    assert!(!y.has_creator());
    assert!(x.is_writeable());
    assert_eq!(y.to_vec(), vec![2.0, 4.0, 6.0]);
    assert!(matches!(y.try_backward(), Err(Error::ConstantTensor)));
    Ok(())
}

#[test]
fn operations_null_operand_gradients() -> Result<()> {
    let x = setup_tensor(one_to(2))?;
    x.try_exp()?.try_backward()?;
    assert!(x.grad().is_some());

    let _ = x.try_neg()?;
    assert!(x.grad().is_none());
    Ok(())
}

#[test]
fn constant_leaf_gets_no_gradient() -> Result<()> {
    let c = setup_constant(one_to(2))?;
    let x = setup_tensor(one_to(2))?;
    c.try_mul(&x)?.try_sum_all()?.try_backward()?;
    assert!(c.grad().is_none());
    assert_eq!(grad_vec(&x), Some(one_to(2)));
    Ok(())
}

#[test]
fn creator_names() -> Result<()> {
    let x = setup_tensor(one_to(4))?;
    assert_eq!(x.creator_name(), None);
    assert_eq!(x.try_sum_all()?.creator_name(), Some("sum"));
    assert_eq!(x.try_reshape(&[2, 2])?.creator_name(), Some("reshape"));
    assert_eq!(x.try_take(&[0], None)?.creator_name(), Some("take"));
    x.try_set_scalar(&[viewgrad_core::index::Index::at(0)], 0.0)?;
    assert_eq!(x.creator_name(), Some("setitem"));
    Ok(())
}

#[test]
fn view_gradient_follows_touched_base() -> Result<()> {
    let x = setup_tensor(one_to(4))?;
    let y = x.try_positive()?;
    let w = y.try_index(&ellipsis())?;
    w.try_mul_scalar(2.0)?.try_backward()?;
    assert_eq!(grad_vec(&w), Some(vec![2.0; 4]));
    assert_eq!(w.grad().and_then(|g| g.base()), y.grad());

    let _ = y.try_positive()?;
    assert!(y.grad().is_none());
    assert!(w.grad().is_none());
    Ok(())
}

#[test]
fn view_gradient_follows_cleared_base() -> Result<()> {
    let x = setup_tensor(one_to(4))?;
    let y = x.try_positive()?;
    let w = y.try_index(&ellipsis())?;
    w.try_mul_scalar(2.0)?.try_backward()?;
    assert!(w.grad().is_some());

    y.try_clear_graph()?;
    assert!(y.grad().is_none());
    assert!(w.grad().is_none());
    Ok(())
}

#[test]
fn view_gradient_is_dropped_when_base_gradient_is_replaced() -> Result<()> {
    let x = setup_tensor(one_to(4))?;
    let w = x.try_index(&ellipsis())?;
    w.try_mul_scalar(2.0)?.try_backward()?;
    assert_eq!(grad_vec(&w), Some(vec![2.0; 4]));

    // reaches x alone; w's old gradient belongs to the previous pass
    x.try_mul_scalar(3.0)?.try_backward()?;
    assert_eq!(grad_vec(&x), Some(vec![3.0; 4]));
    assert!(w.grad().is_none());
    Ok(())
}
