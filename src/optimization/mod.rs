//! Optimization algorithms for molecular docking

pub mod local;
pub mod monte_carlo;

pub use local::{LineSearch, LocalOptimizer, LocalOptimizerParams};
pub use monte_carlo::{MonteCarlo, MonteCarloParams};

use crate::math;
use crate::molecule::{Conformation, Molecule, MoleculeError};
use crate::scoring::{AtomTerms, Evaluation, PreparedLigand, Scorer};
use nalgebra::Vector3;
use thiserror::Error;

/// Errors that can occur during optimization
#[derive(Error, Debug)]
pub enum OptimizationError {
    #[error("Invalid initial state: {0}")]
    InvalidInitialState(String),

    #[error("A search box is required for {0}")]
    MissingSearchBox(&'static str),

    #[error("Could not start worker threads: {0}")]
    ThreadPool(String),

    #[error(transparent)]
    Molecule(#[from] MoleculeError),
}

/// Represents a docking result
#[derive(Debug, Clone)]
pub struct DockingResult {
    /// Binding affinity in kcal/mol
    pub energy: f64,

    /// Docked ligand conformation
    pub molecule: Molecule,

    /// Unweighted value of each scoring term
    pub energy_components: Vec<(String, f64)>,

    /// Intramolecular energy of the pose
    pub intramolecular: f64,

    /// RMSD from the input coordinates (local optimization only)
    pub rmsd: Option<f64>,

    /// RMSD lower bound from the best mode
    pub rmsd_lb: Option<f64>,

    /// RMSD upper bound from the best mode
    pub rmsd_ub: Option<f64>,

    /// Per-atom term values, when requested
    pub atom_terms: Option<Vec<AtomTerms>>,
}

/// A scored ligand conformation produced by a search
#[derive(Debug, Clone)]
pub struct Pose {
    pub conf: Conformation,
    pub coords: Vec<Vector3<f64>>,
    /// Heavy-atom coordinates used for RMSD comparisons
    pub heavy: Vec<Vector3<f64>>,
    pub eval: Evaluation,
    /// Objective value the search minimized
    pub energy: f64,
}

impl Pose {
    pub fn new(ligand: &PreparedLigand, conf: Conformation, coords: Vec<Vector3<f64>>, eval: Evaluation) -> Self {
        let heavy = ligand.heavy_coords(&coords);
        Self {
            conf,
            coords,
            heavy,
            eval,
            energy: eval.total(),
        }
    }

    /// Score a conformation and wrap it as a pose
    pub fn evaluate(
        scorer: &Scorer,
        ligand: &PreparedLigand,
        conf: Conformation,
        slope: f64,
    ) -> Result<Self, OptimizationError> {
        let coords = ligand.molecule.conformation_coords(&conf)?;
        let eval = scorer.evaluate_coords(ligand, &coords, slope);
        Ok(Self::new(ligand, conf, coords, eval))
    }

    pub fn rmsd(&self, other: &Pose) -> f64 {
        math::rmsd(&self.heavy, &other.heavy)
    }
}

/// Keeps the best distinct poses seen so far, at most `capacity` of them
#[derive(Debug, Clone)]
pub struct OutputContainer {
    poses: Vec<Pose>,
    min_rmsd: f64,
    capacity: usize,
}

impl OutputContainer {
    pub fn new(min_rmsd: f64, capacity: usize) -> Self {
        Self {
            poses: Vec::new(),
            min_rmsd,
            capacity: capacity.max(1),
        }
    }

    /// A pose within `min_rmsd` of a stored one replaces it only when better;
    /// otherwise it is appended, evicting the worst pose when full.
    pub fn add(&mut self, pose: Pose) {
        let closest = self
            .poses
            .iter()
            .enumerate()
            .map(|(i, p)| (i, p.rmsd(&pose)))
            .filter(|&(_, r)| r < self.min_rmsd)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i);

        match closest {
            Some(i) => {
                if pose.energy < self.poses[i].energy {
                    self.poses[i] = pose;
                }
            }
            None if self.poses.len() < self.capacity => self.poses.push(pose),
            None => {
                let worst = self
                    .poses
                    .iter()
                    .enumerate()
                    .max_by(|a, b| a.1.energy.total_cmp(&b.1.energy))
                    .map(|(i, _)| i);
                if let Some(w) = worst {
                    if pose.energy < self.poses[w].energy {
                        self.poses[w] = pose;
                    }
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.poses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }

    /// Poses sorted by energy, best first
    pub fn into_sorted(mut self) -> Vec<Pose> {
        sort_poses(&mut self.poses);
        self.poses
    }
}

pub fn sort_poses(poses: &mut [Pose]) {
    poses.sort_by(|a, b| a.energy.total_cmp(&b.energy));
}

/// Drop every pose within `min_rmsd` of a better one; input must be sorted
pub fn remove_redundant(poses: Vec<Pose>, min_rmsd: f64) -> Vec<Pose> {
    let mut kept: Vec<Pose> = Vec::with_capacity(poses.len());
    for pose in poses {
        if kept.iter().all(|k| k.rmsd(&pose) >= min_rmsd) {
            kept.push(pose);
        }
    }
    kept
}

/// Trait for optimization algorithms
pub trait Optimizer {
    /// Generate candidate poses for a ligand, best first
    fn generate_poses(
        &self,
        scorer: &Scorer,
        ligand: &PreparedLigand,
        seed: u64,
    ) -> Result<Vec<Pose>, OptimizationError>;
}
