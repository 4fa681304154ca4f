//! The `run` entry point: an option mapping in, docked poses as SDF text out

use log::{debug, info, warn};
use nalgebra::Vector3;
use rand::Rng;
use std::collections::BTreeSet;
use std::io::{Read, Write};
use std::path::Path;

use crate::config::{ConfigMap, DockingConfig, Mode};
use crate::error::{Error, Result};
use crate::forcefield::{ForceField, ProbeType, ScoringFunction};
use crate::grid::{Grid, GridError};
use crate::io::{self, IoError};
use crate::math;
use crate::molecule::{Conformation, LigandDescriptors, Molecule};
use crate::optimization::monte_carlo::heuristic_local_steps;
use crate::optimization::{
    remove_redundant, sort_poses, DockingResult, LineSearch, LocalOptimizer, LocalOptimizerParams, MonteCarlo,
    MonteCarloParams, OptimizationError, Optimizer, Pose,
};
use crate::scoring::{PreparedLigand, Scorer};
use crate::search_space::SearchBox;

/// Box penalty slope of the first refinement attempt
const REFINE_SLOPE: f64 = 10.0;

/// Refinement attempts, each with a ten times steeper slope
const REFINE_TRIES: usize = 5;

/// Dock, score, minimize or randomize every ligand named in `params`.
///
/// Returns one SDF record per pose: ligands in the given order, the models of
/// each file in file order, and poses best first.
pub fn run(params: &ConfigMap) -> Result<String> {
    let config = DockingConfig::from_map(params)?;
    run_config(&config)
}

/// Human-readable run log, mirrored to the logger unless quiet
struct RunLog {
    quiet: bool,
    text: String,
}

impl RunLog {
    fn new(quiet: bool) -> Self {
        Self {
            quiet,
            text: String::new(),
        }
    }

    fn line<S: AsRef<str>>(&mut self, line: S) {
        let line = line.as_ref();
        if !self.quiet {
            info!("{}", line);
        }
        self.text.push_str(line);
        self.text.push('\n');
    }
}

fn doing(config: &DockingConfig, step: &str) {
    if config.verbosity > 1 {
        info!("{}", step);
    } else {
        debug!("{}", step);
    }
}

/// Same as [`run`], for an already validated configuration
pub fn run_config(config: &DockingConfig) -> Result<String> {
    let seed = config.seed.unwrap_or_else(|| rand::thread_rng().gen::<u32>() as u64);
    let mut log = RunLog::new(config.quiet);
    if config.seed.is_none() || config.verbosity > 1 {
        log.line(format!("Using random seed: {}", seed));
    }
    if config.verbosity > 1 && config.cpu > config.exhaustiveness {
        warn!("At low exhaustiveness, it may be impossible to utilize all CPUs");
    }

    doing(config, "Setting up the scoring function");
    let forcefield = scoring_function(config)?;
    debug!("Scoring function {}:\n{}", forcefield.name(), forcefield.describe().join("\n"));

    let search_box = if config.needs_search_box() {
        let search_box = resolve_search_box(config)?;
        debug!(
            "Search box center ({:.3}, {:.3}, {:.3}) size ({:.3}, {:.3}, {:.3})",
            search_box.center.x,
            search_box.center.y,
            search_box.center.z,
            search_box.size.x,
            search_box.size.y,
            search_box.size.z
        );
        Some(search_box)
    } else {
        None
    };

    let receptor = match &config.receptor {
        Some(path) => {
            doing(config, "Reading receptor");
            io::parse_pdbqt(path)?.atoms
        }
        None => Vec::new(),
    };
    let mut scorer = Scorer::new(Box::new(forcefield), &receptor);
    if let Some(path) = &config.user_grid {
        scorer.set_user_grid(Grid::from_map_file(path)?, user_grid_scale(config));
    }

    // every file is read before any work so that a bad path fails fast
    doing(config, "Reading input");
    let mut ligands = Vec::new();
    for path in &config.ligands {
        for molecule in io::parse_pdbqt_models(path)? {
            ligands.push(PreparedLigand::new(molecule));
        }
    }

    let mode = config.mode();
    if let Some(search_box) = search_box {
        scorer.set_search_box(search_box);
    }
    if mode == Mode::Dock {
        doing(config, "Analyzing the binding site");
        let probes: BTreeSet<ProbeType> = ligands.iter().flat_map(|l| l.heavy_types()).collect();
        let probes: Vec<ProbeType> = probes.into_iter().collect();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.cpu)
            .build()
            .map_err(|e| GridError::ThreadPool(e.to_string()))?;
        pool.install(|| scorer.build_cache(&probes))?;
    }

    if mode == Mode::ScoreOnly {
        let forcefield = scorer.forcefield();
        let mut header = String::from("## Name");
        for name in forcefield.term_names() {
            header.push(' ');
            header.push_str(&name);
        }
        for (name, _) in forcefield.conf_independent_values(&LigandDescriptors::default()) {
            header.push(' ');
            header.push_str(&name);
        }
        log.line(header);
    }

    let mut sdf = Vec::new();
    let mut results = Vec::new();
    for ligand in &ligands {
        let poses = match mode {
            Mode::Dock => dock(&scorer, ligand, config, seed, &mut log)?,
            Mode::ScoreOnly => score_only(&scorer, ligand, config, &mut log)?,
            Mode::LocalOnly => local_only(&mut scorer, ligand, config, &mut log)?,
            Mode::RandomizeOnly => randomize_only(&scorer, ligand, config, seed, &mut log)?,
        };
        io::write_sdf(&poses, &mut sdf)?;
        results.extend(poses);
    }

    if let Some(path) = &config.out {
        write_output(path, &results)?;
    }
    if let Some(path) = &config.atom_terms {
        write_atom_terms(path, &results)?;
    }
    if let Some(path) = &config.log {
        let mut file = io::create_for_writing(path)?;
        file.write_all(log.text.as_bytes()).map_err(IoError::from)?;
    }

    String::from_utf8(sdf).map_err(|e| Error::Io(IoError::InvalidFormat(e.to_string())))
}

/// Custom file first, then the named builtin
fn scoring_function(config: &DockingConfig) -> Result<ScoringFunction> {
    let mut function = match &config.custom_scoring {
        Some(path) => {
            let mut text = String::new();
            io::open_for_reading(path)?
                .read_to_string(&mut text)
                .map_err(IoError::from)?;
            let name = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("custom");
            ScoringFunction::from_custom_str(name, &text)?
        }
        None => ScoringFunction::builtin(&config.scoring)?,
    };
    if config.user_grid_lambda != -1.0 {
        function.set_scaling_factor(config.user_grid_lambda);
    }
    Ok(function)
}

fn user_grid_scale(config: &DockingConfig) -> f64 {
    if config.user_grid_lambda != -1.0 {
        1.0 - config.user_grid_lambda
    } else {
        1.0
    }
}

/// The explicit box, or one fitted around every model of `autobox_ligand`
fn resolve_search_box(config: &DockingConfig) -> Result<SearchBox> {
    match &config.autobox_ligand {
        Some(path) => {
            let mut merged = Molecule::new("autobox");
            for model in io::parse_pdbqt_models(path)? {
                for atom in model.atoms {
                    merged.add_atom(atom);
                }
            }
            Ok(SearchBox::autobox(&merged, config.autobox_add, config.size)?)
        }
        None => Ok(SearchBox::new(config.center, config.size)?),
    }
}

fn line_search(config: &DockingConfig) -> LineSearch {
    if config.accurate_line {
        LineSearch::Accurate
    } else {
        LineSearch::Backtracking
    }
}

fn local_optimizer(config: &DockingConfig, ligand: &PreparedLigand) -> LocalOptimizer {
    let max_iterations = match config.minimize_iters {
        0 => heuristic_local_steps(ligand),
        n => n,
    };
    LocalOptimizer::with_params(LocalOptimizerParams {
        max_iterations,
        force_cap: config.force_cap,
        line_search: line_search(config),
        ..LocalOptimizerParams::default()
    })
}

/// Minimize with a box penalty, steepening it until every heavy atom is inside.
/// Also returns whether that succeeded.
fn refine(
    scorer: &Scorer,
    ligand: &PreparedLigand,
    optimizer: &LocalOptimizer,
    conf: &Conformation,
) -> Result<(Pose, bool)> {
    let search_box = *scorer
        .search_box()
        .ok_or(OptimizationError::MissingSearchBox("refinement"))?;
    let mut slope = REFINE_SLOPE;
    let mut pose = optimizer.minimize(scorer, ligand, conf, slope)?;
    for _ in 1..REFINE_TRIES {
        if pose.heavy.iter().all(|c| search_box.contains(c)) {
            return Ok((pose, true));
        }
        slope *= 10.0;
        pose = optimizer.minimize(scorer, ligand, &pose.conf, slope)?;
    }
    let inside = pose.heavy.iter().all(|c| search_box.contains(c));
    Ok((pose, inside))
}

fn to_result(
    scorer: &Scorer,
    ligand: &PreparedLigand,
    config: &DockingConfig,
    pose: &Pose,
    energy: f64,
) -> DockingResult {
    let atom_terms = if config.atom_term_data || config.atom_terms.is_some() {
        Some(scorer.atom_terms(ligand, &pose.coords))
    } else {
        None
    };
    DockingResult {
        energy,
        molecule: ligand.molecule.with_coords(&pose.coords),
        energy_components: scorer.energy_components(ligand, &pose.coords),
        intramolecular: pose.eval.intra,
        rmsd: None,
        rmsd_lb: None,
        rmsd_ub: None,
        atom_terms,
    }
}

fn input_coords(ligand: &PreparedLigand) -> Vec<Vector3<f64>> {
    ligand.molecule.atoms.iter().map(|a| a.coordinates).collect()
}

/// Global search, refinement, clustering and the mode table
fn dock(
    scorer: &Scorer,
    ligand: &PreparedLigand,
    config: &DockingConfig,
    seed: u64,
    log: &mut RunLog,
) -> Result<Vec<DockingResult>> {
    let name = &ligand.molecule.name;
    let search = MonteCarlo::with_params(MonteCarloParams {
        num_steps: config.mc_steps,
        local_steps: config.minimize_iters,
        num_saved_mins: config.num_modes.max(20),
        force_cap: config.force_cap,
        line_search: line_search(config),
        exhaustiveness: config.exhaustiveness,
        cpu: config.cpu,
        ..MonteCarloParams::default()
    });

    doing(config, "Performing search");
    let candidates = search.generate_poses(scorer, ligand, seed)?;
    debug!("{}: {} candidate poses", name, candidates.len());

    doing(config, "Refining results");
    let optimizer = local_optimizer(config, ligand);
    let mut poses = Vec::with_capacity(candidates.len());
    for candidate in &candidates {
        let (pose, inside) = refine(scorer, ligand, &optimizer, &candidate.conf)?;
        if inside {
            poses.push(pose);
        }
    }

    sort_poses(&mut poses);
    if let Some(best_intra) = poses.first().map(|p| p.eval.intra) {
        for pose in poses.iter_mut() {
            pose.energy = scorer.affinity(ligand, &pose.eval, best_intra);
        }
        sort_poses(&mut poses);
    }
    let poses = remove_redundant(poses, config.min_rmsd_filter);

    let best = match poses.first() {
        Some(best) => best.clone(),
        None => {
            warn!("Could not find any conformations completely within the search space for {}", name);
            warn!("Check that it is large enough for all movable atoms");
            return Err(Error::NoPoses(name.clone()));
        }
    };

    log.line("mode |   affinity | dist from best mode");
    log.line("     | (kcal/mol) | rmsd l.b.| rmsd u.b.");
    log.line("-----+------------+----------+----------");

    let types = ligand.heavy_types();
    let mut results = Vec::new();
    for pose in &poses {
        if results.len() >= config.num_modes || pose.energy > best.energy + config.energy_range {
            break;
        }
        let lb = math::rmsd_lower_bound(&pose.heavy, &types, &best.heavy, &types);
        let ub = math::rmsd(&pose.heavy, &best.heavy);
        log.line(format!(
            "{:>4}    {:>9.1}  {:>9.3}  {:>9.3}",
            results.len() + 1,
            pose.energy,
            lb,
            ub
        ));

        let mut result = to_result(scorer, ligand, config, pose, pose.energy);
        result.rmsd_lb = Some(lb);
        result.rmsd_ub = Some(ub);
        results.push(result);
    }
    Ok(results)
}

/// Affinity and term breakdown of the input pose
fn score_only(
    scorer: &Scorer,
    ligand: &PreparedLigand,
    config: &DockingConfig,
    log: &mut RunLog,
) -> Result<Vec<DockingResult>> {
    let coords = input_coords(ligand);
    let eval = scorer.evaluate_coords(ligand, &coords, 0.0);
    let affinity = scorer.affinity(ligand, &eval, eval.intra);

    log.line(format!("Affinity: {:.5} (kcal/mol)", affinity));
    log.line(format!("Intramolecular energy: {:.5}", eval.intra));
    log.line("Term values, before weighting:");
    let mut row = format!("## {}", ligand.molecule.name.replace(' ', "_"));
    for value in scorer.term_values(ligand, &coords) {
        row.push_str(&format!(" {:.5}", value));
    }
    for (_, value) in scorer.forcefield().conf_independent_values(&ligand.descriptors) {
        row.push_str(&format!(" {:.5}", value));
    }
    log.line(row);

    let pose = Pose::new(ligand, Conformation::initial(&ligand.molecule)?, coords, eval);
    Ok(vec![to_result(scorer, ligand, config, &pose, affinity)])
}

/// Refine the input pose inside a box fitted around it
fn local_only(
    scorer: &mut Scorer,
    ligand: &PreparedLigand,
    config: &DockingConfig,
    log: &mut RunLog,
) -> Result<Vec<DockingResult>> {
    scorer.set_search_box(SearchBox::autobox(&ligand.molecule, config.autobox_add, Vector3::zeros())?);
    let scorer = &*scorer;

    doing(config, "Performing local search");
    let start = Conformation::initial(&ligand.molecule)?;
    let (pose, inside) = refine(scorer, ligand, &local_optimizer(config, ligand), &start)?;

    let eval = scorer.evaluate_coords(ligand, &pose.coords, 0.0);
    let affinity = scorer.affinity(ligand, &eval, eval.intra);
    let rmsd = math::rmsd(&pose.heavy, &ligand.heavy_coords(&input_coords(ligand)));

    log.line(format!("Affinity: {:.5}  {:.5} (kcal/mol)", affinity, eval.intra));
    log.line(format!("RMSD: {:.5}", rmsd));
    if !inside {
        warn!("Not all movable atoms of {} are within the search space", ligand.molecule.name);
    }

    let pose = Pose::new(ligand, pose.conf, pose.coords, eval);
    let mut result = to_result(scorer, ligand, config, &pose, affinity);
    result.rmsd = Some(rmsd);
    Ok(vec![result])
}

/// The least clashing of many random placements; its energy is the clash penalty
fn randomize_only(
    scorer: &Scorer,
    ligand: &PreparedLigand,
    config: &DockingConfig,
    seed: u64,
    log: &mut RunLog,
) -> Result<Vec<DockingResult>> {
    let search_box = *scorer
        .search_box()
        .ok_or(OptimizationError::MissingSearchBox("randomization"))?;
    let (pose, penalty) = MonteCarlo::new().random_pose(scorer, ligand, &search_box, seed)?;
    if config.verbosity > 1 {
        log.line(format!("Clash penalty: {:.5}", penalty));
    }
    Ok(vec![to_result(scorer, ligand, config, &pose, penalty)])
}

/// PDBQT models for a `.pdbqt` path, SDF records otherwise
fn write_output(path: &Path, results: &[DockingResult]) -> Result<()> {
    let mut file = io::create_for_writing(path)?;
    let is_pdbqt = path
        .extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| e.eq_ignore_ascii_case("pdbqt"));
    if is_pdbqt {
        io::write_docking_results(results, &mut file)?;
    } else {
        io::write_sdf(results, &mut file)?;
    }
    Ok(())
}

/// Per-atom term values, one block per pose
fn write_atom_terms(path: &Path, results: &[DockingResult]) -> Result<()> {
    let mut file = io::create_for_writing(path)?;
    let mut text = String::new();
    for result in results {
        let Some(terms) = &result.atom_terms else {
            continue;
        };
        text.push_str(&format!("## {}\n", result.molecule.name.replace(' ', "_")));
        for atom_terms in terms {
            let atom = &result.molecule.atoms[atom_terms.atom];
            text.push_str(&format!(
                "{} {:.3} {:.3} {:.3}",
                atom.atom_type.element(),
                atom.coordinates.x,
                atom.coordinates.y,
                atom.coordinates.z
            ));
            for value in &atom_terms.values {
                text.push_str(&format!(" {:.5}", value));
            }
            text.push('\n');
        }
    }
    file.write_all(text.as_bytes()).map_err(IoError::from)?;
    Ok(())
}
