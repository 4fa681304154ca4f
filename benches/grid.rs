use criterion::{black_box, criterion_group, criterion_main, Criterion};
use nalgebra::Vector3;
use sminalib::forcefield::{ProbeType, ScoringFunction};
use sminalib::grid::Grid;
use sminalib::io::parse_pdbqt;
use sminalib::scoring::{PreparedLigand, Scorer};
use sminalib::search_space::SearchBox;
use std::path::PathBuf;

fn test_data_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("test_data")
}

fn bench_grid_creation(c: &mut Criterion) {
    c.bench_function("grid_creation", |b| {
        b.iter(|| {
            let grid = Grid::new(Vector3::zeros(), 0.375, Vector3::new(54, 54, 54)).unwrap();
            black_box(grid);
        })
    });
}

fn bench_grid_interpolation(c: &mut Criterion) {
    let mut grid = Grid::new(Vector3::zeros(), 0.375, Vector3::new(54, 54, 54)).unwrap();
    for (i, value) in grid.data.iter_mut().enumerate() {
        *value = (i % 17) as f64 * 0.1;
    }

    c.bench_function("grid_interpolation", |b| {
        b.iter(|| {
            let point = Vector3::new(10.1, 9.7, 10.3);
            black_box(grid.get_value(&point).unwrap());
        })
    });
}

fn bench_grid_population(c: &mut Criterion) {
    let receptor = parse_pdbqt(test_data_dir().join("receptor.pdbqt")).unwrap();
    let ligand = PreparedLigand::new(parse_pdbqt(test_data_dir().join("ligand.pdbqt")).unwrap());
    let mut probes: Vec<ProbeType> = ligand.heavy_types();
    probes.sort();
    probes.dedup();
    let search_box = SearchBox::new(Vector3::zeros(), Vector3::new(12.0, 12.0, 12.0)).unwrap();

    let mut group = c.benchmark_group("grid_population");
    group.sample_size(10);
    group.bench_function("vina", |b| {
        b.iter(|| {
            let mut scorer = Scorer::new(Box::new(ScoringFunction::builtin("vina").unwrap()), &receptor.atoms);
            scorer.set_search_box(search_box);
            scorer.build_cache(&probes).unwrap();
            black_box(scorer);
        })
    });
    group.finish();
}

criterion_group!(
    grid_benches,
    bench_grid_creation,
    bench_grid_interpolation,
    bench_grid_population
);
criterion_main!(grid_benches);
