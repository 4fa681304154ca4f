//! Integration tests for the sminalib `run` entry point

use std::fs;
use std::path::PathBuf;

use sminalib::config::{read_params_file, ConfigMap, ConfigValue};
use sminalib::{run, Error};
use tempfile::tempdir;

/// Get the path to test data directory
fn test_data_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("test_data")
}

fn data_path(name: &str) -> String {
    test_data_dir().join(name).display().to_string()
}

/// Options for a small, quick docking run around the synthetic pocket
fn dock_params() -> ConfigMap {
    let mut params = ConfigMap::new();
    params.insert("receptor".into(), data_path("receptor.pdbqt").into());
    params.insert("ligand".into(), data_path("ligand.pdbqt").into());
    params.insert("center_x".into(), 0.0.into());
    params.insert("center_y".into(), 0.0.into());
    params.insert("center_z".into(), 0.0.into());
    params.insert("size_x".into(), 12.0.into());
    params.insert("size_y".into(), 12.0.into());
    params.insert("size_z".into(), 12.0.into());
    params.insert("seed".into(), 42.into());
    params.insert("cpu".into(), 1.into());
    params.insert("exhaustiveness".into(), 2.into());
    params.insert("mc_steps".into(), 20.into());
    params.insert("minimize_iters".into(), 10.into());
    params
}

fn score_params() -> ConfigMap {
    let mut params = ConfigMap::new();
    params.insert("receptor".into(), data_path("receptor.pdbqt").into());
    params.insert("ligand".into(), data_path("ligand.pdbqt").into());
    params.insert("score_only".into(), true.into());
    params
}

/// Split SDF text into its records
fn records(sdf: &str) -> Vec<&str> {
    sdf.split("$$$$\n").filter(|r| !r.trim().is_empty()).collect()
}

fn property(record: &str, name: &str) -> Option<f64> {
    let tag = format!("> <{}>", name);
    let mut lines = record.lines();
    lines.find(|line| line.trim() == tag)?;
    lines.next()?.trim().parse().ok()
}

fn affinities(sdf: &str) -> Vec<f64> {
    records(sdf)
        .iter()
        .map(|r| property(r, "minimizedAffinity").expect("record without minimizedAffinity"))
        .collect()
}

#[test]
fn test_dock_produces_sorted_poses() {
    let sdf = run(&dock_params()).expect("Docking failed");
    assert!(!sdf.is_empty());
    assert!(sdf.ends_with("$$$$\n"));

    let energies = affinities(&sdf);
    assert!(!energies.is_empty());
    assert!(energies.len() <= 9, "default num_modes is 9");
    for pair in energies.windows(2) {
        assert!(pair[0] <= pair[1], "poses not sorted: {:?}", energies);
    }
    for energy in &energies {
        assert!(energy.is_finite());
        assert!(*energy <= energies[0] + 3.0, "pose outside the energy range");
    }
    for record in records(&sdf) {
        assert!(record.starts_with("ligand\n"));
        assert!(record.contains("V2000"));
        assert!(record.contains("M  END"));
    }
}

#[test]
fn test_dock_respects_num_modes_and_energy_range() {
    let mut params = dock_params();
    params.insert("num_modes".into(), 2.into());
    params.insert("energy_range".into(), 0.5.into());
    let sdf = run(&params).expect("Docking failed");

    let energies = affinities(&sdf);
    assert!(!energies.is_empty() && energies.len() <= 2);
    assert!(energies.iter().all(|e| *e <= energies[0] + 0.5));
}

#[test]
fn test_dock_is_deterministic_for_a_seed() {
    let first = run(&dock_params()).expect("Docking failed");
    let second = run(&dock_params()).expect("Docking failed");
    assert_eq!(first, second);
}

#[test]
fn test_multiple_ligands_in_order() {
    let mut params = dock_params();
    params.insert(
        "ligand".into(),
        ConfigValue::List(vec![data_path("ligand.pdbqt"), data_path("ligand2.pdbqt")]),
    );
    let sdf = run(&params).expect("Docking failed");

    let names: Vec<&str> = records(&sdf).into_iter().filter_map(|r| r.lines().next()).collect();
    assert!(names.len() >= 2);
    assert_eq!(names[0], "ligand");
    assert_eq!(*names.last().unwrap(), "ligand2");
    let first_ligand2 = names.iter().position(|n| *n == "ligand2").unwrap();
    assert!(names[first_ligand2..].iter().all(|n| *n == "ligand2"));
}

#[test]
fn test_bare_path_equals_single_item_list() {
    let bare = run(&score_params()).expect("Scoring failed");

    let mut listed = score_params();
    listed.insert("ligand".into(), ConfigValue::List(vec![data_path("ligand.pdbqt")]));
    assert_eq!(bare, run(&listed).expect("Scoring failed"));
}

#[test]
fn test_every_model_is_processed() {
    let mut params = score_params();
    params.insert("ligand".into(), data_path("ligand_models.pdbqt").into());
    let sdf = run(&params).expect("Scoring failed");
    assert_eq!(records(&sdf).len(), 2);
}

#[test]
fn test_score_only_keeps_input_pose() {
    let sdf = run(&score_params()).expect("Scoring failed");
    let recs = records(&sdf);
    assert_eq!(recs.len(), 1);

    let affinity = property(recs[0], "minimizedAffinity").unwrap();
    assert!(affinity.is_finite());
    assert!(property(recs[0], "minimizedRMSD").is_none());
    // first atom line carries the input coordinates of C1
    let atom_line = recs[0].lines().nth(4).unwrap();
    assert!(atom_line.starts_with("   -1.7000   -0.7000    0.0000 C"));
}

#[test]
fn test_score_only_with_other_scoring_functions() {
    let vina = affinities(&run(&score_params()).unwrap())[0];
    for name in ["vinardo", "ad4_scoring"] {
        let mut params = score_params();
        params.insert("scoring".into(), name.into());
        let energy = affinities(&run(&params).expect("Scoring failed"))[0];
        assert!(energy.is_finite());
        assert_ne!(energy, vina, "{} scored like vina", name);
    }
}

#[test]
fn test_user_grid_adds_to_the_score() {
    let plain = affinities(&run(&score_params()).unwrap())[0];

    let mut params = score_params();
    params.insert("user_grid".into(), data_path("uniform.map").into());
    let with_grid = affinities(&run(&params).expect("Scoring with a user grid failed"))[0];
    assert!(with_grid < plain);
}

#[test]
fn test_minimize_reports_rmsd() {
    let mut params = score_params();
    params.remove("score_only");
    params.insert("minimize".into(), true.into());
    params.insert("minimize_iters".into(), 50.into());
    let sdf = run(&params).expect("Minimization failed");

    let recs = records(&sdf);
    assert_eq!(recs.len(), 1);
    let rmsd = property(recs[0], "minimizedRMSD").expect("no minimizedRMSD");
    assert!(rmsd >= 0.0 && rmsd.is_finite());
    assert!(property(recs[0], "minimizedAffinity").unwrap().is_finite());
}

#[test]
fn test_randomize_only_places_ligand_in_box() {
    let mut params = dock_params();
    params.insert("randomize_only".into(), true.into());
    let sdf = run(&params).expect("Randomization failed");

    let recs = records(&sdf);
    assert_eq!(recs.len(), 1);
    let penalty = property(recs[0], "minimizedAffinity").unwrap();
    assert!(penalty >= 0.0);
}

#[test]
fn test_autobox_from_ligand() {
    let mut params = dock_params();
    for key in ["center_x", "center_y", "center_z", "size_x", "size_y", "size_z"] {
        params.remove(key);
    }
    params.insert("autobox_ligand".into(), data_path("ligand.pdbqt").into());
    let sdf = run(&params).expect("Docking with an automatic box failed");
    assert!(!affinities(&sdf).is_empty());
}

#[test]
fn test_atom_term_data_in_records() {
    let mut params = score_params();
    params.insert("atom_term_data".into(), true.into());
    let sdf = run(&params).expect("Scoring failed");
    assert!(sdf.contains("> <atomic_interaction_terms>"));
}

#[test]
fn test_output_and_log_files() {
    let dir = tempdir().expect("Failed to create temp directory");
    let sdf_path = dir.path().join("poses.sdf");
    let pdbqt_path = dir.path().join("poses.pdbqt");
    let log_path = dir.path().join("run.log");

    let mut params = dock_params();
    params.insert("out".into(), sdf_path.as_path().into());
    params.insert("log".into(), log_path.as_path().into());
    let sdf = run(&params).expect("Docking failed");
    assert_eq!(fs::read_to_string(&sdf_path).unwrap(), sdf);

    let log = fs::read_to_string(&log_path).unwrap();
    assert!(log.contains("mode |   affinity | dist from best mode"));
    assert!(log.contains("-----+------------+----------+----------"));

    params.insert("out".into(), pdbqt_path.as_path().into());
    run(&params).expect("Docking failed");
    let pdbqt = fs::read_to_string(&pdbqt_path).unwrap();
    assert!(pdbqt.contains("MODEL 1"));
    assert!(pdbqt.contains("ENDMDL"));
}

#[test]
fn test_score_only_log_lists_terms() {
    let dir = tempdir().unwrap();
    let log_path = dir.path().join("score.log");
    let mut params = score_params();
    params.insert("log".into(), log_path.as_path().into());
    run(&params).expect("Scoring failed");

    let log = fs::read_to_string(&log_path).unwrap();
    assert!(log.contains("Affinity:"));
    assert!(log.contains("Intramolecular energy:"));
    assert!(log.contains("## Name"));
    assert!(log.contains("## ligand"));
}

#[test]
fn test_missing_files_are_file_errors() {
    let mut params = score_params();
    params.insert("receptor".into(), data_path("missing_receptor.pdbqt").into());
    let err = run(&params).unwrap_err();
    assert!(err.is_file_error(), "unexpected error: {}", err);

    let mut params = score_params();
    params.insert(
        "ligand".into(),
        ConfigValue::List(vec![data_path("ligand.pdbqt"), data_path("missing_ligand.pdbqt")]),
    );
    assert!(run(&params).unwrap_err().is_file_error());
}

#[test]
fn test_invalid_options_are_usage_errors() {
    let mut params = score_params();
    params.remove("ligand");
    assert!(matches!(run(&params), Err(Error::Config(_))));

    let mut params = score_params();
    params.insert("flexres".into(), "A:42".into());
    assert!(matches!(run(&params), Err(Error::Config(_))));

    let mut params = dock_params();
    params.insert("size_x".into(), 0.into());
    assert!(matches!(run(&params), Err(Error::Config(_))));

    let mut params = score_params();
    params.insert("scoring".into(), "no_such_function".into());
    assert!(matches!(run(&params), Err(Error::ForceField(_))));
}

/// Heavy-atom coordinates of every record, read back from the atom block
fn heavy_coordinates(sdf: &str) -> Vec<Vec<[f64; 3]>> {
    records(sdf)
        .iter()
        .map(|record| {
            let lines: Vec<&str> = record.lines().collect();
            let num_atoms: usize = lines[3][0..3].trim().parse().unwrap();
            lines[4..4 + num_atoms]
                .iter()
                .filter(|line| line[31..34].trim() != "H")
                .map(|line| {
                    let field = |start: usize| line[start..start + 10].trim().parse::<f64>().unwrap();
                    [field(0), field(10), field(20)]
                })
                .collect()
        })
        .collect()
}

fn rmsd(a: &[[f64; 3]], b: &[[f64; 3]]) -> f64 {
    let sum: f64 = a
        .iter()
        .zip(b)
        .map(|(p, q)| (0..3).map(|k| (p[k] - q[k]).powi(2)).sum::<f64>())
        .sum();
    (sum / a.len() as f64).sqrt()
}

#[test]
fn test_dock_poses_are_distinct() {
    let mut params = dock_params();
    params.insert("min_rmsd_filter".into(), 1.5.into());
    params.insert("energy_range".into(), 10.0.into());
    let sdf = run(&params).expect("Docking failed");

    let poses = heavy_coordinates(&sdf);
    assert!(!poses.is_empty());
    assert!(poses.iter().all(|p| p.len() == 4));
    for i in 0..poses.len() {
        for j in (i + 1)..poses.len() {
            let d = rmsd(&poses[i], &poses[j]);
            assert!(d >= 1.5 - 1e-3, "modes {} and {} are {:.3} apart", i + 1, j + 1, d);
        }
    }
}

#[test]
fn test_dock_bare_path_equals_single_item_list() {
    let bare = run(&dock_params()).expect("Docking failed");

    let mut listed = dock_params();
    listed.insert("ligand".into(), ConfigValue::List(vec![data_path("ligand.pdbqt")]));
    assert_eq!(bare, run(&listed).expect("Docking failed"));
}

#[test]
fn test_atom_terms_file() {
    let dir = tempdir().unwrap();
    let terms_path = dir.path().join("terms.txt");
    let mut params = score_params();
    params.insert("atom_terms".into(), terms_path.as_path().into());
    run(&params).expect("Scoring failed");

    let text = fs::read_to_string(&terms_path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "## ligand");
    assert!(lines.len() > 1);
    for line in &lines[1..] {
        let fields: Vec<&str> = line.split_whitespace().collect();
        // element, x, y, z, then one value per term
        assert!(fields.len() > 4, "short atom terms line: {}", line);
        assert!(fields[1..].iter().all(|f| f.parse::<f64>().is_ok()));
    }
}

#[test]
fn test_user_grid_lambda_mixes_grid_and_scoring_function() {
    let dir = tempdir().unwrap();
    let custom = dir.path().join("gauss.txt");
    fs::write(&custom, "-1.0 gauss(o=0,_w=0.5,_c=8)\n").unwrap();

    let mut params = score_params();
    params.insert("custom_scoring".into(), custom.as_path().into());
    params.insert("user_grid".into(), data_path("uniform.map").into());

    // only the grid counts: four heavy atoms at -0.5 each
    params.insert("user_grid_lambda".into(), 0.0.into());
    let grid_only = affinities(&run(&params).expect("Scoring failed"))[0];
    assert!((grid_only + 2.0).abs() < 1e-4, "got {}", grid_only);

    // only the scoring function counts
    params.insert("user_grid_lambda".into(), 1.0.into());
    let function_only = affinities(&run(&params).expect("Scoring failed"))[0];
    params.remove("user_grid");
    params.remove("user_grid_lambda");
    let plain = affinities(&run(&params).expect("Scoring failed"))[0];
    assert_eq!(function_only, plain);
}

#[test]
fn test_custom_scoring_file() {
    let dir = tempdir().unwrap();
    let attractive = dir.path().join("attractive.txt");
    let repulsive = dir.path().join("repulsive.txt");
    fs::write(&attractive, "# attraction only\n-1.0 gauss(o=0,_w=0.5,_c=8)\n").unwrap();
    fs::write(&repulsive, "1.0 repulsion(o=0,_c=8)\n").unwrap();

    let mut params = score_params();
    params.insert("custom_scoring".into(), attractive.as_path().into());
    assert!(affinities(&run(&params).expect("Scoring failed"))[0] < 0.0);

    params.insert("custom_scoring".into(), repulsive.as_path().into());
    assert!(affinities(&run(&params).expect("Scoring failed"))[0] >= 0.0);
}

#[test]
fn test_local_only_refines_input_pose() {
    let dir = tempdir().unwrap();
    let log_path = dir.path().join("local.log");
    let mut params = score_params();
    params.remove("score_only");
    params.insert("local_only".into(), true.into());
    params.insert("log".into(), log_path.as_path().into());
    let sdf = run(&params).expect("Local optimization failed");

    let recs = records(&sdf);
    assert_eq!(recs.len(), 1);
    let rmsd = property(recs[0], "minimizedRMSD").expect("no minimizedRMSD");
    assert!(rmsd >= 0.0 && rmsd.is_finite());
    let log = fs::read_to_string(&log_path).unwrap();
    assert!(log.contains("RMSD:"));
}

#[test]
fn test_accurate_line_search_minimization() {
    let mut params = score_params();
    params.remove("score_only");
    params.insert("local_only".into(), true.into());
    params.insert("accurate_line".into(), true.into());
    let sdf = run(&params).expect("Local optimization failed");

    let recs = records(&sdf);
    assert_eq!(recs.len(), 1);
    assert!(property(recs[0], "minimizedAffinity").unwrap().is_finite());
    let rmsd = property(recs[0], "minimizedRMSD").expect("no minimizedRMSD");
    assert!(rmsd.is_finite());
    assert_eq!(sdf, run(&params).expect("Local optimization failed"));
}

#[test]
fn test_params_files() {
    let dir = tempdir().unwrap();
    let expected = run(&score_params()).expect("Scoring failed");

    let key_value = dir.path().join("score.conf");
    fs::write(
        &key_value,
        format!(
            "receptor = {}\nligand = {}  # the only ligand\n\nscore_only = true\n",
            data_path("receptor.pdbqt"),
            data_path("ligand.pdbqt")
        ),
    )
    .unwrap();
    let params = read_params_file(&key_value).expect("Failed to read key=value file");
    assert_eq!(run(&params).expect("Scoring failed"), expected);

    let json = dir.path().join("score.json");
    let value = serde_json::json!({
        "receptor": data_path("receptor.pdbqt"),
        "ligand": [data_path("ligand.pdbqt")],
        "score_only": true,
    });
    fs::write(&json, value.to_string()).unwrap();
    let params = read_params_file(&json).expect("Failed to read JSON file");
    assert_eq!(run(&params).expect("Scoring failed"), expected);
}
