//! Monte Carlo search algorithm for molecular docking

use log::{debug, trace};
use nalgebra::{UnitQuaternion, Vector3};
use rand::prelude::*;
use rayon::prelude::*;
use std::f64::consts::PI;

use crate::math;
use crate::molecule::Conformation;
use crate::optimization::{
    LineSearch, LocalOptimizer, LocalOptimizerParams, OptimizationError, Optimizer, OutputContainer, Pose,
};
use crate::scoring::{PreparedLigand, Scorer};
use crate::search_space::SearchBox;

/// Attempts made when placing a ligand at random
const RANDOMIZE_TRIES: usize = 10_000;

/// Parameters for Monte Carlo search
#[derive(Debug, Clone)]
pub struct MonteCarloParams {
    /// Temperature parameter for Metropolis criterion
    pub temperature: f64,

    /// Steps per task; 0 derives the count from the ligand size
    pub num_steps: usize,

    /// Scale of translation and rotation mutations
    pub amplitude: f64,

    /// Distinct minima each task keeps
    pub num_saved_mins: usize,

    /// Poses closer than this (heavy-atom RMSD) count as the same minimum
    pub min_rmsd: f64,

    /// Iterations of each local optimization; 0 derives the count from the ligand size
    pub local_steps: usize,

    /// Force cap while hunting for minima
    pub hunt_force_cap: f64,

    /// Force cap when refining an accepted minimum
    pub force_cap: f64,

    pub line_search: LineSearch,

    /// Energy penalty per Angstrom an atom strays outside the search box
    pub box_slope: f64,

    /// Number of independent tasks
    pub exhaustiveness: usize,

    /// Worker threads; 0 lets rayon decide
    pub cpu: usize,
}

impl Default for MonteCarloParams {
    fn default() -> Self {
        Self {
            temperature: 1.2,
            num_steps: 0,
            amplitude: 2.0,
            num_saved_mins: 20,
            min_rmsd: 1.0,
            local_steps: 0,
            hunt_force_cap: 10.0,
            force_cap: 1000.0,
            line_search: LineSearch::Backtracking,
            box_slope: 1e6,
            exhaustiveness: 8,
            cpu: 0,
        }
    }
}

/// Implementation of Monte Carlo search for molecular docking
#[derive(Debug, Clone, Default)]
pub struct MonteCarlo {
    pub params: MonteCarloParams,
}

/// Monte Carlo steps scaled to the ligand: movable atoms plus ten per degree of freedom
pub fn heuristic_steps(ligand: &PreparedLigand) -> usize {
    let heuristic = ligand.num_heavy_atoms() + 10 * (6 + ligand.num_torsions());
    70 * 3 * (50 + heuristic) / 2
}

/// Local optimization iterations scaled to the ligand
pub fn heuristic_local_steps(ligand: &PreparedLigand) -> usize {
    (25 + ligand.num_heavy_atoms()) / 3
}

/// Metropolis criterion: downhill is always accepted
fn metropolis_accept<R: Rng>(old: f64, new: f64, temperature: f64, rng: &mut R) -> bool {
    if new < old {
        return true;
    }
    let acceptance = ((old - new) / temperature).exp();
    rng.gen::<f64>() < acceptance
}

impl MonteCarlo {
    /// Create a new Monte Carlo optimizer with default parameters
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new Monte Carlo optimizer with custom parameters
    pub fn with_params(params: MonteCarloParams) -> Self {
        Self { params }
    }

    fn num_steps(&self, ligand: &PreparedLigand) -> usize {
        match self.params.num_steps {
            0 => heuristic_steps(ligand),
            n => n,
        }
    }

    fn local_optimizer(&self, ligand: &PreparedLigand, force_cap: f64) -> LocalOptimizer {
        let max_iterations = match self.params.local_steps {
            0 => heuristic_local_steps(ligand),
            n => n,
        };
        LocalOptimizer::with_params(LocalOptimizerParams {
            max_iterations,
            force_cap,
            line_search: self.params.line_search,
            ..LocalOptimizerParams::default()
        })
    }

    /// Change one degree of freedom: position, orientation or a single torsion
    fn mutate<R: Rng>(&self, conf: &Conformation, gyration_radius: f64, rng: &mut R) -> Conformation {
        let mut mutated = conf.clone();
        let which = rng.gen_range(0..2 + conf.torsions.len());
        match which {
            0 => {
                mutated.position += self.params.amplitude * math::random_in_unit_sphere(rng);
            }
            1 => {
                let rotation: Vector3<f64> = if gyration_radius > 1e-6 {
                    self.params.amplitude / gyration_radius * math::random_in_unit_sphere(rng)
                } else {
                    math::random_in_unit_sphere(rng)
                };
                mutated.orientation = UnitQuaternion::from_scaled_axis(rotation) * conf.orientation;
            }
            k => {
                mutated.torsions[k - 2] = rng.gen_range(-PI..PI);
            }
        }
        mutated
    }

    /// One independent Monte Carlo trajectory from a random start
    pub fn run_task(
        &self,
        scorer: &Scorer,
        ligand: &PreparedLigand,
        search_box: &SearchBox,
        seed: u64,
    ) -> Result<OutputContainer, OptimizationError> {
        let mut rng = StdRng::seed_from_u64(seed);
        let slope = self.params.box_slope;
        let num_saved_mins = self.params.num_saved_mins.max(1);
        let hunt = self.local_optimizer(ligand, self.params.hunt_force_cap);
        let authentic = self.local_optimizer(ligand, self.params.force_cap);
        let gyration_radius = ligand.molecule.gyration_radius();

        let start = Conformation::randomize(
            ligand.num_torsions(),
            &search_box.min(),
            &search_box.max(),
            &mut rng,
        );
        let mut current = Pose::evaluate(scorer, ligand, start, slope)?;
        let mut best_energy = f64::INFINITY;
        let mut out = OutputContainer::new(self.params.min_rmsd, num_saved_mins);

        for step in 0..self.num_steps(ligand) {
            let candidate = self.mutate(&current.conf, gyration_radius, &mut rng);
            let candidate = hunt.minimize(scorer, ligand, &candidate, slope)?;

            if step == 0 || metropolis_accept(current.energy, candidate.energy, self.params.temperature, &mut rng) {
                current = candidate;
                if current.energy < best_energy || out.len() < num_saved_mins {
                    current = authentic.minimize(scorer, ligand, &current.conf, slope)?;
                    if current.energy < best_energy {
                        trace!("Task {} step {}: new best {:.3}", seed, step, current.energy);
                        best_energy = current.energy;
                    }
                    out.add(current.clone());
                }
            }
        }

        Ok(out)
    }

    /// Run `exhaustiveness` tasks in parallel and merge their minima
    pub fn parallel_search(
        &self,
        scorer: &Scorer,
        ligand: &PreparedLigand,
        search_box: &SearchBox,
        seed: u64,
    ) -> Result<Vec<Pose>, OptimizationError> {
        let tasks = self.params.exhaustiveness.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.params.cpu)
            .build()
            .map_err(|e| OptimizationError::ThreadPool(e.to_string()))?;

        debug!(
            "Monte Carlo: {} tasks of {} steps on {} threads",
            tasks,
            self.num_steps(ligand),
            pool.current_num_threads()
        );

        let containers = pool.install(|| {
            (0..tasks)
                .into_par_iter()
                .map(|task| self.run_task(scorer, ligand, search_box, seed.wrapping_add(task as u64)))
                .collect::<Result<Vec<_>, _>>()
        })?;

        let mut merged = OutputContainer::new(self.params.min_rmsd, self.params.num_saved_mins.max(1));
        for container in containers {
            for pose in container.into_sorted() {
                merged.add(pose);
            }
        }
        Ok(merged.into_sorted())
    }

    /// Random placement inside the box with the least steric clash, and its clash penalty
    pub fn random_pose(
        &self,
        scorer: &Scorer,
        ligand: &PreparedLigand,
        search_box: &SearchBox,
        seed: u64,
    ) -> Result<(Pose, f64), OptimizationError> {
        let mut rng = StdRng::seed_from_u64(seed);
        let (min, max) = (search_box.min(), search_box.max());
        let mut best: Option<(f64, Conformation)> = None;

        for _ in 0..RANDOMIZE_TRIES {
            let conf = Conformation::randomize(ligand.num_torsions(), &min, &max, &mut rng);
            let coords = ligand.molecule.conformation_coords(&conf)?;
            let penalty = scorer.clash_penalty(ligand, &coords);
            if best.as_ref().map_or(true, |(p, _)| penalty < *p) {
                best = Some((penalty, conf));
            }
        }

        let (penalty, conf) = best.ok_or_else(|| {
            OptimizationError::InvalidInitialState("no random placement was generated".to_string())
        })?;
        debug!("Clash penalty: {:.3}", penalty);
        Ok((Pose::evaluate(scorer, ligand, conf, 0.0)?, penalty))
    }
}

impl Optimizer for MonteCarlo {
    fn generate_poses(
        &self,
        scorer: &Scorer,
        ligand: &PreparedLigand,
        seed: u64,
    ) -> Result<Vec<Pose>, OptimizationError> {
        let search_box = *scorer
            .search_box()
            .ok_or(OptimizationError::MissingSearchBox("Monte Carlo search"))?;
        self.parallel_search(scorer, ligand, &search_box, seed)
    }
}
