use criterion::Criterion;
use criterion::{criterion_group, criterion_main};
use ndarray::prelude::*;
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rustgalerkin::bases::{cheb_dirichlet, fourier_r2c};
use rustgalerkin::{c64, TensorSpace};

const SIZES: [usize; 3] = [64, 128, 256];

pub fn bench_transform(c: &mut Criterion) {
    let mut group = c.benchmark_group("Transform");
    group.significance_level(0.1).sample_size(10);
    for n in SIZES.iter() {
        let space = TensorSpace::new(vec![
            cheb_dirichlet(*n).unwrap(),
            cheb_dirichlet(*n).unwrap(),
        ])
        .unwrap();
        let v = Array2::random((*n, *n), Uniform::new(-1., 1.))
            .mapv(|x| c64::new(x, 0.))
            .into_dyn();
        let name = format!("Size: {}", *n);
        group.bench_function(&name, |b| b.iter(|| space.forward(&v).unwrap()));
    }
    group.finish();
}

pub fn bench_transform_fourier(c: &mut Criterion) {
    let mut group = c.benchmark_group("TransformFourier");
    group.significance_level(0.1).sample_size(10);
    for n in SIZES.iter() {
        let space = TensorSpace::with_axes(
            vec![fourier_r2c(*n).unwrap(), cheb_dirichlet(*n).unwrap()],
            vec![1, 0],
        )
        .unwrap();
        let v = Array2::random((*n, *n), Uniform::new(-1., 1.))
            .mapv(|x| c64::new(x, 0.))
            .into_dyn();
        let name = format!("Size: {}", *n);
        group.bench_function(&name, |b| b.iter(|| space.forward(&v).unwrap()));
    }
    group.finish();
}

criterion_group!(benches, bench_transform, bench_transform_fourier);
criterion_main!(benches);
