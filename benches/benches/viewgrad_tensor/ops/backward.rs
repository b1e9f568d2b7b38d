use criterion::{black_box, Criterion};
use viewgrad_tensor::Tensor;

const DEPTHS: [(usize, &str); 3] = [(10, "shallow"), (100, "medium"), (500, "deep")];

// A chain of unary and scalar ops ending in a reduction.
fn bench_chain(b: &mut criterion::Bencher, depth: usize) {
    let data: Vec<f64> = (0..256).map(|i| i as f64 / 256.0).collect();

    b.iter(|| {
        let x = Tensor::new(data.clone());
        let mut y = x;
        for i in 0..depth {
            y = if i % 2 == 0 { y.try_mul_scalar(1.01).unwrap() } else { y.try_exp().unwrap().try_log().unwrap() };
        }
        y.try_sum_all().unwrap().try_backward().unwrap();
        black_box(x.grad())
    })
}

pub fn basic(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("backward/basic");
    group.warm_up_time(core::time::Duration::from_millis(500));
    group.measurement_time(core::time::Duration::from_secs(3));
    group.sample_size(50);

    for &(depth, depth_name) in &DEPTHS {
        group.bench_function(format!("chain/{}", depth_name), |b| bench_chain(b, depth));
    }

    group.finish();
}
