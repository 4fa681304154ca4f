use criterion::{black_box, criterion_group, criterion_main, Criterion};
use sminalib::config::ConfigMap;
use std::path::PathBuf;

fn test_data_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("test_data")
}

fn params(mode: Option<&str>) -> ConfigMap {
    let path = |name: &str| test_data_dir().join(name).display().to_string();
    let mut params = ConfigMap::new();
    params.insert("receptor".into(), path("receptor.pdbqt").into());
    params.insert("ligand".into(), path("ligand.pdbqt").into());
    for axis in ["x", "y", "z"] {
        params.insert(format!("center_{}", axis), 0.0.into());
        params.insert(format!("size_{}", axis), 12.0.into());
    }
    params.insert("seed".into(), 1.into());
    params.insert("exhaustiveness".into(), 2.into());
    params.insert("mc_steps".into(), 200.into());
    if let Some(mode) = mode {
        params.insert(mode.into(), true.into());
    }
    params
}

fn bench_complete_docking(c: &mut Criterion) {
    let params = params(None);
    let mut group = c.benchmark_group("run");
    group.sample_size(10);
    group.bench_function("dock", |b| {
        b.iter(|| {
            let sdf = sminalib::run(&params).unwrap();
            black_box(sdf);
        })
    });
    group.finish();
}

fn bench_score_and_minimize(c: &mut Criterion) {
    let score = params(Some("score_only"));
    let minimize = params(Some("minimize"));

    c.bench_function("score_only", |b| b.iter(|| black_box(sminalib::run(&score).unwrap())));
    c.bench_function("minimize", |b| b.iter(|| black_box(sminalib::run(&minimize).unwrap())));
}

criterion_group!(docking_benches, bench_complete_docking, bench_score_and_minimize);
criterion_main!(docking_benches);
