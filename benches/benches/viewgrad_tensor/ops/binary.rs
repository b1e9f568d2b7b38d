use criterion::{black_box, Criterion};
use viewgrad_core::error::Result;
use viewgrad_tensor::Tensor;

// Constants for benchmark data sizes
const SIZES: [(usize, &str); 3] = [(100, "small"), (5000, "medium"), (10000, "large")];

fn bench_binary_op<F>(b: &mut criterion::Bencher, size: usize, op_fn: F)
where
    F: Fn(&Tensor, &Tensor) -> Result<Tensor>,
{
    let x_data: Vec<f64> = (0..size).map(|i| i as f64).collect();
    let y_data: Vec<f64> = (0..size).map(|i| i as f64 + 1.0).collect();

    b.iter(|| {
        let x = Tensor::new(x_data.clone());
        let y = Tensor::new(y_data.clone());
        let z = black_box(op_fn(&x, &y)).unwrap();
        z.try_clear_graph().unwrap();
    })
}

pub fn basic(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("binary/basic");
    group.warm_up_time(core::time::Duration::from_millis(500));
    group.measurement_time(core::time::Duration::from_secs(3));
    group.sample_size(50);

    let operations: Vec<(&str, fn(&Tensor, &Tensor) -> Result<Tensor>)> = vec![
        ("add", |x, y| x.try_add(y)),
        ("mul", |x, y| x.try_mul(y)),
        ("div", |x, y| x.try_div(y)),
        ("pow", |x, y| x.try_pow(y)),
    ];

    for (op_name, op_fn) in operations {
        for &(size, size_name) in &SIZES {
            let bench_name = format!("{}/{}", op_name, size_name);
            group.bench_function(bench_name, |b| bench_binary_op(b, size, op_fn));
        }
    }

    group.finish();
}
