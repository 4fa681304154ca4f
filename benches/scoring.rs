use criterion::{black_box, criterion_group, criterion_main, Criterion};
use nalgebra::Vector3;
use sminalib::forcefield::ScoringFunction;
use sminalib::io::parse_pdbqt;
use sminalib::scoring::{PreparedLigand, Scorer};
use std::path::PathBuf;

fn test_data_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("test_data")
}

fn bench_scoring_functions(c: &mut Criterion) {
    let receptor = parse_pdbqt(test_data_dir().join("receptor.pdbqt")).unwrap();
    let ligand = PreparedLigand::new(parse_pdbqt(test_data_dir().join("ligand.pdbqt")).unwrap());
    let coords: Vec<Vector3<f64>> = ligand.molecule.atoms.iter().map(|a| a.coordinates).collect();

    for name in ["vina", "vinardo", "ad4_scoring"] {
        let scorer = Scorer::new(Box::new(ScoringFunction::builtin(name).unwrap()), &receptor.atoms);
        c.bench_function(&format!("{}_scoring", name), |b| {
            b.iter(|| black_box(scorer.evaluate_coords(&ligand, &coords, 0.0)));
        });
    }
}

fn bench_atom_terms(c: &mut Criterion) {
    let receptor = parse_pdbqt(test_data_dir().join("receptor.pdbqt")).unwrap();
    let ligand = PreparedLigand::new(parse_pdbqt(test_data_dir().join("ligand.pdbqt")).unwrap());
    let coords: Vec<Vector3<f64>> = ligand.molecule.atoms.iter().map(|a| a.coordinates).collect();
    let scorer = Scorer::new(Box::new(ScoringFunction::builtin("vina").unwrap()), &receptor.atoms);

    c.bench_function("atom_terms", |b| {
        b.iter(|| black_box(scorer.atom_terms(&ligand, &coords)));
    });
}

criterion_group!(scoring_benches, bench_scoring_functions, bench_atom_terms);
criterion_main!(scoring_benches);
