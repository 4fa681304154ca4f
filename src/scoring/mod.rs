//! Energy evaluation of ligand poses against a rigid receptor

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::atom::Atom;
use crate::forcefield::{ForceField, ProbeType};
use crate::grid::cache::receptor_energy;
use crate::grid::{CellList, Grid, GridCache, GridError};
use crate::molecule::{Conformation, LigandDescriptors, Molecule, MoleculeError};
use crate::search_space::SearchBox;

/// Neighbor reach for the clash penalty; larger than any pair of XS radii
const CLASH_REACH: f64 = 4.5;

/// Unweighted term values felt by one ligand atom
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtomTerms {
    /// Index of the atom in the ligand
    pub atom: usize,
    pub values: Vec<f64>,
}

/// Inter- and intramolecular parts of a pose energy
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Evaluation {
    pub inter: f64,
    pub intra: f64,
}

impl Evaluation {
    pub fn total(&self) -> f64 {
        self.inter + self.intra
    }
}

/// A ligand with the per-atom data that scoring needs, computed once
#[derive(Debug, Clone)]
pub struct PreparedLigand {
    pub molecule: Molecule,
    /// Scored atoms and their probe types
    pub scored: Vec<(usize, ProbeType)>,
    pub intra_pairs: Vec<(usize, usize)>,
    pub descriptors: LigandDescriptors,
}

impl PreparedLigand {
    pub fn new(molecule: Molecule) -> Self {
        let scored = molecule
            .atoms
            .iter()
            .enumerate()
            .filter_map(|(i, a)| ProbeType::of(a).map(|p| (i, p)))
            .collect();
        let intra_pairs = molecule.intramolecular_pairs();
        let descriptors = molecule.descriptors();
        Self {
            molecule,
            scored,
            intra_pairs,
            descriptors,
        }
    }

    pub fn num_heavy_atoms(&self) -> usize {
        self.scored.len()
    }

    pub fn num_torsions(&self) -> usize {
        self.molecule.torsions.len()
    }

    /// Heavy-atom coordinates, the set RMSDs are measured on
    pub fn heavy_coords(&self, coords: &[Vector3<f64>]) -> Vec<Vector3<f64>> {
        self.scored.iter().map(|&(i, _)| coords[i]).collect()
    }

    pub fn heavy_types(&self) -> Vec<ProbeType> {
        self.scored.iter().map(|&(_, p)| p).collect()
    }
}

/// Scores ligand coordinates against a receptor with a given force field
pub struct Scorer {
    forcefield: Box<dyn ForceField>,
    receptor: Vec<Atom>,
    cells: CellList,
    cache: Option<GridCache>,
    user_grid: Option<Grid>,
    search_box: Option<SearchBox>,
}

impl Scorer {
    /// Only the scored (heavy) receptor atoms are kept
    pub fn new(forcefield: Box<dyn ForceField>, receptor: &[Atom]) -> Self {
        let receptor: Vec<Atom> = receptor.iter().filter(|a| a.is_scored()).cloned().collect();
        let cells = CellList::new(
            receptor.iter().map(|a| a.coordinates).collect(),
            forcefield.cutoff(),
        );
        Self {
            forcefield,
            receptor,
            cells,
            cache: None,
            user_grid: None,
            search_box: None,
        }
    }

    pub fn forcefield(&self) -> &dyn ForceField {
        self.forcefield.as_ref()
    }

    pub fn num_receptor_atoms(&self) -> usize {
        self.receptor.len()
    }

    pub fn search_box(&self) -> Option<&SearchBox> {
        self.search_box.as_ref()
    }

    /// Confine scoring to a box; any cached grid for another box is dropped
    pub fn set_search_box(&mut self, search_box: SearchBox) {
        if self.search_box != Some(search_box) {
            self.cache = None;
        }
        self.search_box = Some(search_box);
    }

    /// Add a user grid whose values are multiplied by `scale`
    pub fn set_user_grid(&mut self, mut grid: Grid, scale: f64) {
        if scale != 1.0 {
            grid.data.iter_mut().for_each(|v| *v *= scale);
        }
        self.user_grid = Some(grid);
    }

    /// Precompute receptor grids over the search box for the given probe types
    pub fn build_cache(&mut self, probes: &[ProbeType]) -> Result<(), GridError> {
        let search_box = self
            .search_box
            .ok_or_else(|| GridError::InvalidDimension("no search box to cache".to_string()))?;
        let cache = GridCache::populate(
            self.forcefield.as_ref(),
            &self.receptor,
            &self.cells,
            &search_box.grid_dims(),
            probes,
        )?;
        self.cache = Some(cache);
        Ok(())
    }

    pub fn cache(&self) -> Option<&GridCache> {
        self.cache.as_ref()
    }

    /// Energy of one ligand atom: receptor terms, box penalty and user grid
    fn atom_energy(&self, probe: ProbeType, charge: f64, position: &Vector3<f64>, slope: f64) -> f64 {
        let cached = self
            .cache
            .as_ref()
            .and_then(|c| c.energy(&probe, charge, position));
        let mut energy = match cached {
            Some(e) => e,
            None => receptor_energy(self.forcefield(), &self.receptor, &self.cells, probe, position)
                .total(charge),
        };

        if slope != 0.0 {
            if let Some(search_box) = &self.search_box {
                energy += slope * search_box.outside_distance(position);
            }
        }
        if let Some(grid) = &self.user_grid {
            if let Ok(value) = grid.get_value(position) {
                energy += value;
            }
        }
        energy
    }

    /// Ligand-receptor energy; `slope` penalizes atoms outside the search box
    pub fn intermolecular(&self, ligand: &PreparedLigand, coords: &[Vector3<f64>], slope: f64) -> f64 {
        ligand
            .scored
            .iter()
            .map(|&(i, probe)| {
                self.atom_energy(probe, ligand.molecule.atoms[i].charge, &coords[i], slope)
            })
            .sum()
    }

    /// Energy between ligand atoms that can move relative to each other
    pub fn intramolecular(&self, ligand: &PreparedLigand, coords: &[Vector3<f64>]) -> f64 {
        let atoms = &ligand.molecule.atoms;
        ligand
            .intra_pairs
            .iter()
            .filter_map(|&(i, j)| {
                let probe = ProbeType::of(&atoms[i])?;
                let r = (coords[i] - coords[j]).norm();
                Some(self.forcefield.pair_energy(probe, &atoms[j], r).total(atoms[i].charge))
            })
            .sum()
    }

    pub fn evaluate_coords(&self, ligand: &PreparedLigand, coords: &[Vector3<f64>], slope: f64) -> Evaluation {
        Evaluation {
            inter: self.intermolecular(ligand, coords, slope),
            intra: self.intramolecular(ligand, coords),
        }
    }

    pub fn evaluate(
        &self,
        ligand: &PreparedLigand,
        conf: &Conformation,
        slope: f64,
    ) -> Result<Evaluation, MoleculeError> {
        let coords = ligand.molecule.conformation_coords(conf)?;
        Ok(self.evaluate_coords(ligand, &coords, slope))
    }

    /// Reported binding affinity: `inter + intra - intra_reference`, adjusted by the
    /// conformation-independent terms
    pub fn affinity(&self, ligand: &PreparedLigand, eval: &Evaluation, intra_reference: f64) -> f64 {
        self.forcefield
            .apply_conf_independent(eval.inter + eval.intra - intra_reference, &ligand.descriptors)
    }

    /// Sum of squared overlaps of XS spheres, with the receptor and within the ligand
    pub fn clash_penalty(&self, ligand: &PreparedLigand, coords: &[Vector3<f64>]) -> f64 {
        let mut penalty = 0.0;
        for &(i, probe) in &ligand.scored {
            self.cells.for_each_within(&coords[i], CLASH_REACH, |j, r| {
                let overlap = probe.xs.radius() + self.receptor[j].xs_radius() - r;
                if overlap > 0.0 {
                    penalty += overlap * overlap;
                }
            });
        }
        let atoms = &ligand.molecule.atoms;
        for &(i, j) in &ligand.intra_pairs {
            let overlap = atoms[i].xs_radius() + atoms[j].xs_radius() - (coords[i] - coords[j]).norm();
            if overlap > 0.0 {
                penalty += overlap * overlap;
            }
        }
        penalty
    }

    /// Per-atom unweighted receptor term values
    pub fn atom_terms(&self, ligand: &PreparedLigand, coords: &[Vector3<f64>]) -> Vec<AtomTerms> {
        let num_terms = self.forcefield.term_names().len();
        ligand
            .scored
            .iter()
            .map(|&(i, probe)| {
                let charge = ligand.molecule.atoms[i].charge;
                let mut values = vec![0.0; num_terms];
                self.cells
                    .for_each_within(&coords[i], self.forcefield.cutoff(), |j, r| {
                        let terms = self.forcefield.unweighted_terms(probe, charge, &self.receptor[j], r);
                        for (v, t) in values.iter_mut().zip(terms) {
                            *v += t;
                        }
                    });
                AtomTerms { atom: i, values }
            })
            .collect()
    }

    /// Unweighted term totals over the whole ligand
    pub fn term_values(&self, ligand: &PreparedLigand, coords: &[Vector3<f64>]) -> Vec<f64> {
        let mut totals = vec![0.0; self.forcefield.term_names().len()];
        for atom_terms in self.atom_terms(ligand, coords) {
            for (t, v) in totals.iter_mut().zip(atom_terms.values) {
                *t += v;
            }
        }
        totals
    }

    /// Term names paired with their unweighted totals
    pub fn energy_components(&self, ligand: &PreparedLigand, coords: &[Vector3<f64>]) -> Vec<(String, f64)> {
        self.forcefield
            .term_names()
            .into_iter()
            .zip(self.term_values(ligand, coords))
            .collect()
    }
}
