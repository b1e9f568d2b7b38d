mod utils;

use viewgrad_core::{array::NdArray, error::Result};
use viewgrad_tensor::Tensor;
use utils::{assert_close, family_member, grad_vec, setup_tensor, setup_tensor_with_shape};

mod test_functions {
    use super::*;

    const LHS: [f64; 4] = [1.0, 2.0, 3.0, 4.0];
    const RHS: [f64; 4] = [4.0, 3.0, 2.0, 1.0];

    fn operands(on_view: bool) -> Result<(Tensor, Tensor)> {
        let x = family_member(&setup_tensor(LHS.to_vec())?, on_view)?;
        let y = family_member(&setup_tensor(RHS.to_vec())?, on_view)?;
        Ok((x, y))
    }

    pub fn add_test(on_view: bool) -> Result<()> {
        let (x, y) = operands(on_view)?;
        let z = x.try_add(&y)?;
        assert_eq!(z.to_vec(), vec![5.0, 5.0, 5.0, 5.0]);
        assert_eq!(z.creator_name(), Some("add"));

        z.try_sum_all()?.try_backward()?;
        assert_eq!(grad_vec(&x), Some(vec![1.0; 4]));
        assert_eq!(grad_vec(&y), Some(vec![1.0; 4]));
        Ok(())
    }

    pub fn sub_test(on_view: bool) -> Result<()> {
        let (x, y) = operands(on_view)?;
        let z = x.try_sub(&y)?;
        assert_eq!(z.to_vec(), vec![-3.0, -1.0, 1.0, 3.0]);

        z.try_sum_all()?.try_backward()?;
        assert_eq!(grad_vec(&x), Some(vec![1.0; 4]));
        assert_eq!(grad_vec(&y), Some(vec![-1.0; 4]));
        Ok(())
    }

    pub fn mul_test(on_view: bool) -> Result<()> {
        let (x, y) = operands(on_view)?;
        let z = x.try_mul(&y)?;
        assert_eq!(z.to_vec(), vec![4.0, 6.0, 6.0, 4.0]);

        z.try_sum_all()?.try_backward()?;
        assert_eq!(grad_vec(&x), Some(RHS.to_vec()));
        assert_eq!(grad_vec(&y), Some(LHS.to_vec()));
        Ok(())
    }

    pub fn div_test(on_view: bool) -> Result<()> {
        let (x, y) = operands(on_view)?;
        let z = x.try_div(&y)?;
        assert_close(&z.to_vec(), &[0.25, 2.0 / 3.0, 1.5, 4.0]);

        z.try_sum_all()?.try_backward()?;
        assert_close(&x.grad().expect("x has a gradient").to_vec(), &[0.25, 1.0 / 3.0, 0.5, 1.0]);
        assert_close(
            &y.grad().expect("y has a gradient").to_vec(),
            &[-1.0 / 16.0, -2.0 / 9.0, -0.75, -4.0],
        );
        Ok(())
    }

    pub fn pow_test(on_view: bool) -> Result<()> {
        let (x, y) = operands(on_view)?;
        let z = x.try_pow(&y)?;
        assert_close(&z.to_vec(), &[1.0, 8.0, 9.0, 4.0]);

        z.try_sum_all()?.try_backward()?;
        assert_close(&x.grad().expect("x has a gradient").to_vec(), &[4.0, 12.0, 6.0, 1.0]);
        assert_close(
            &y.grad().expect("y has a gradient").to_vec(),
            &[0.0, 8.0 * 2f64.ln(), 9.0 * 3f64.ln(), 4.0 * 4f64.ln()],
        );
        Ok(())
    }

    pub fn broadcast_test(on_view: bool) -> Result<()> {
        let x = family_member(&setup_tensor_with_shape(LHS.to_vec(), &[2, 2])?, on_view)?;
        let row = family_member(&setup_tensor(vec![10.0, 20.0])?, on_view)?;
        let z = x.try_add(&row)?;
        assert_eq!(z.shape(), vec![2, 2]);
        assert_eq!(z.to_vec(), vec![11.0, 22.0, 13.0, 24.0]);

        z.try_backward_with(&NdArray::new(vec![1.0, 2.0, 3.0, 4.0], &[2, 2])?)?;
        assert_eq!(grad_vec(&x), Some(LHS.to_vec()));
        assert_eq!(grad_vec(&row), Some(vec![4.0, 6.0]));
        Ok(())
    }

    pub fn scalar_test(on_view: bool) -> Result<()> {
        let (x, _) = operands(on_view)?;
        let z = x.try_mul_scalar(3.0)?.try_add_scalar(1.0)?.try_div_scalar(2.0)?;
        assert_eq!(z.to_vec(), vec![2.0, 3.5, 5.0, 6.5]);

        z.try_sum_all()?.try_backward()?;
        assert_eq!(grad_vec(&x), Some(vec![1.5; 4]));
        Ok(())
    }

    pub fn multiply_sequence_test(on_view: bool) -> Result<()> {
        let (x, y) = operands(on_view)?;
        let z = Tensor::try_multiply_sequence(&[x, y, x])?;
        assert_eq!(z.to_vec(), vec![4.0, 12.0, 18.0, 16.0]);

        z.try_sum_all()?.try_backward()?;
        // d(x*y*x)/dx = 2xy, d/dy = x^2
        assert_eq!(grad_vec(&x), Some(vec![8.0, 12.0, 12.0, 8.0]));
        assert_eq!(grad_vec(&y), Some(vec![1.0, 4.0, 9.0, 16.0]));
        Ok(())
    }

    pub fn operators_test(on_view: bool) -> Result<()> {
        let (x, y) = operands(on_view)?;
        let z = (&x * &y) - &x / 2.0 + 1.0;
        assert_eq!(z.to_vec(), vec![4.5, 6.0, 5.5, 3.0]);

        let w = -(2.0 * z);
        w.try_sum_all()?.try_backward()?;
        // dw/dx = -2 * (y - 0.5)
        assert_eq!(grad_vec(&x), Some(vec![-7.0, -5.0, -3.0, -1.0]));
        assert_eq!(grad_vec(&y), Some(vec![-2.0, -4.0, -6.0, -8.0]));
        Ok(())
    }
}

test_on_base_and_view!([add, sub, mul, div, pow, broadcast, scalar, multiply_sequence, operators]);

#[test]
fn incompatible_shapes() -> Result<()> {
    let x = setup_tensor(vec![1.0, 2.0, 3.0])?;
    let y = setup_tensor(vec![1.0, 2.0])?;
    let err = x.try_add(&y).unwrap_err();
    assert!(err.is_shape_error());
    // nothing got recorded on the operands
    x.try_sum_all()?.try_backward()?;
    assert_eq!(grad_vec(&y), None);
    Ok(())
}

#[test]
fn shared_operand_accumulates() -> Result<()> {
    let x = setup_tensor(vec![3.0])?;
    let y = x.try_mul(&x)?.try_add(&x)?;
    y.try_backward()?;
    assert_eq!(grad_vec(&x), Some(vec![7.0]));
    Ok(())
}
