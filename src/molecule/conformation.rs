//! Ligand degrees of freedom

use super::{Molecule, MoleculeError};
use crate::math;
use nalgebra::{DVector, UnitQuaternion, Vector3};
use rand::Rng;
use std::f64::consts::PI;

/// Rigid-body placement plus one angle per torsion
#[derive(Debug, Clone, PartialEq)]
pub struct Conformation {
    /// Position of the root center
    pub position: Vector3<f64>,

    /// Orientation about the root center
    pub orientation: UnitQuaternion<f64>,

    /// Torsion angles in radians, in the molecule's torsion order
    pub torsions: Vec<f64>,
}

impl Conformation {
    /// The conformation that reproduces the input coordinates
    pub fn initial(molecule: &Molecule) -> Result<Self, MoleculeError> {
        Ok(Self {
            position: molecule.root_center()?,
            orientation: UnitQuaternion::identity(),
            torsions: vec![0.0; molecule.torsions.len()],
        })
    }

    /// Uniformly random placement inside `[min, max]` with random orientation and torsions
    pub fn randomize<R: Rng + ?Sized>(
        num_torsions: usize,
        min: &Vector3<f64>,
        max: &Vector3<f64>,
        rng: &mut R,
    ) -> Self {
        Self {
            position: math::random_in_box(rng, min, max),
            orientation: math::random_orientation(rng),
            torsions: (0..num_torsions).map(|_| rng.gen_range(-PI..PI)).collect(),
        }
    }

    /// Number of degrees of freedom: 3 translations, 3 rotations, torsions
    pub fn dof(&self) -> usize {
        6 + self.torsions.len()
    }

    /// Move along `step` scaled by `alpha`.
    ///
    /// Layout of `step`: translation, rotation vector, torsion deltas.
    pub fn apply_step(&self, step: &DVector<f64>, alpha: f64) -> Conformation {
        let translation = Vector3::new(step[0], step[1], step[2]) * alpha;
        let rotation = Vector3::new(step[3], step[4], step[5]) * alpha;

        let torsions = self
            .torsions
            .iter()
            .enumerate()
            .map(|(i, t)| math::normalize_angle(t + alpha * step[6 + i]))
            .collect();

        Conformation {
            position: self.position + translation,
            orientation: UnitQuaternion::from_scaled_axis(rotation) * self.orientation,
            torsions,
        }
    }
}
