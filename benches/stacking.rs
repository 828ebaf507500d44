use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use stacking_cv::prelude::*;

fn create_classification_data(n_rows: usize, n_features: usize) -> (Array2<f64>, Array1<f64>) {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let y = Array1::from_iter((0..n_rows).map(|i| (i % 3) as f64));
    let x = Array2::from_shape_fn((n_rows, n_features), |(i, j)| {
        y[i] * (j as f64 + 1.0) + rng.gen::<f64>() * 2.0
    });
    (x, y)
}

fn ensemble(n_jobs: Option<usize>) -> StackingCvClassifier {
    let mut config = StackingConfig::new().with_use_probas(true).with_random_state(0);
    config.n_jobs = n_jobs;
    StackingCvClassifier::new(
        vec![
            Box::new(RandomForest::new_classifier(25).with_random_state(1)),
            Box::new(GaussianNaiveBayes::new()),
            Box::new(KNNClassifier::with_k(5)),
        ],
        Box::new(LogisticRegression::new()),
    )
    .with_config(config)
}

fn bench_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("stacking_fit");
    group.sample_size(10); // Fewer samples for training benchmarks

    let iris = load_iris().unwrap();
    group.bench_function("iris", |b| {
        b.iter(|| {
            let mut sclf = ensemble(None);
            sclf.fit(black_box(&iris.data), black_box(&iris.target), None).unwrap();
        })
    });

    for n_rows in [500, 2000].iter() {
        let (x, y) = create_classification_data(*n_rows, 8);
        for (label, n_jobs) in [("sequential", None), ("parallel", Some(0))] {
            group.bench_with_input(BenchmarkId::new(label, n_rows), n_rows, |b, _| {
                b.iter(|| {
                    let mut sclf = ensemble(n_jobs);
                    sclf.fit(black_box(&x), black_box(&y), None).unwrap();
                })
            });
        }
    }
    group.finish();
}

fn bench_predict(c: &mut Criterion) {
    let (x, y) = create_classification_data(2000, 8);
    let mut sclf = ensemble(Some(0));
    sclf.fit(&x, &y, None).unwrap();

    c.bench_function("stacking_predict_proba_2000", |b| {
        b.iter(|| sclf.predict_proba(black_box(&x)).unwrap())
    });
}

criterion_group!(benches, bench_fit, bench_predict);
criterion_main!(benches);
