use criterion::{black_box, Criterion};
use viewgrad_core::index::Index;
use viewgrad_tensor::Tensor;

const SIZES: [(usize, &str); 3] = [(16, "small"), (64, "medium"), (128, "large")];

// Builds a square tensor with `views` live views before each write so the
// repair has a family to rewire.
fn bench_set(b: &mut criterion::Bencher, side: usize, views: usize) {
    let data: Vec<f64> = (0..side * side).map(|i| i as f64).collect();

    b.iter(|| {
        let x = Tensor::from_flatten_vec(data.clone(), &[side, side]);
        let y = x.try_mul_scalar(2.0).unwrap();
        let family: Vec<Tensor> = (0..views)
            .map(|i| y.try_index(&[Index::at((i % side) as isize)]).unwrap())
            .collect();
        let source = Tensor::ones(&[side]);
        y.try_set(&[Index::at(0)], &source).unwrap();
        black_box(&family);
        y.try_sum_all().unwrap().try_backward().unwrap();
    })
}

pub fn basic(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("mutation/basic");
    group.warm_up_time(core::time::Duration::from_millis(500));
    group.measurement_time(core::time::Duration::from_secs(3));
    group.sample_size(50);

    for views in [0, 4, 16] {
        for &(side, size_name) in &SIZES {
            let bench_name = format!("set/{}_views/{}", views, size_name);
            group.bench_function(bench_name, |b| bench_set(b, side, views));
        }
    }

    group.finish();
}
