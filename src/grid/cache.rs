//! Receptor interaction energies precomputed on the search box lattice

use std::collections::HashMap;

use log::debug;
use nalgebra::Vector3;
use rayon::prelude::*;

use super::{CellList, Grid, GridError};
use crate::atom::Atom;
use crate::forcefield::{ForceField, PairEnergy, ProbeType};
use crate::search_space::GridDims;

/// One grid per ligand probe type, plus the probe-independent charge grids
#[derive(Debug, Clone)]
pub struct GridCache {
    dims: GridDims,
    grids: HashMap<ProbeType, Grid>,
    charge: Option<Grid>,
    abs_charge: Option<Grid>,
}

/// Summed receptor energy felt by `probe` at `point`
pub fn receptor_energy(
    forcefield: &dyn ForceField,
    receptor: &[Atom],
    cells: &CellList,
    probe: ProbeType,
    point: &Vector3<f64>,
) -> PairEnergy {
    let mut energy = PairEnergy::default();
    cells.for_each_within(point, forcefield.cutoff(), |i, r| {
        energy += forcefield.pair_energy(probe, &receptor[i], r);
    });
    energy
}

impl GridCache {
    /// Evaluate every probe type at every lattice point, in parallel.
    ///
    /// Run inside a rayon pool to bound the number of threads.
    pub fn populate(
        forcefield: &dyn ForceField,
        receptor: &[Atom],
        cells: &CellList,
        dims: &GridDims,
        probes: &[ProbeType],
    ) -> Result<Self, GridError> {
        let template = Grid::from_dims(dims)?;
        let mut grids = HashMap::new();
        let mut charge = None;
        let mut abs_charge = None;

        for (n, &probe) in probes.iter().enumerate() {
            let values: Vec<PairEnergy> = (0..template.data.len())
                .into_par_iter()
                .map(|idx| receptor_energy(forcefield, receptor, cells, probe, &template.point_at(idx)))
                .collect();

            let mut grid = template.clone();
            grid.data = values.iter().map(|e| e.base).collect();
            grids.insert(probe, grid);

            // the charge-dependent parts do not depend on the probe
            if n == 0 && forcefield.uses_charge() {
                let mut q = template.clone();
                q.data = values.iter().map(|e| e.charge).collect();
                charge = Some(q);
                let mut aq = template.clone();
                aq.data = values.iter().map(|e| e.abs_charge).collect();
                abs_charge = Some(aq);
            }
            debug!("Populated grid for {} ({})", probe.xs.name(), probe.ad.to_pdbqt_string());
        }

        Ok(Self {
            dims: *dims,
            grids,
            charge,
            abs_charge,
        })
    }

    pub fn dims(&self) -> &GridDims {
        &self.dims
    }

    pub fn num_grids(&self) -> usize {
        self.grids.len()
    }

    pub fn has_probe(&self, probe: &ProbeType) -> bool {
        self.grids.contains_key(probe)
    }

    /// Interpolated energy of a ligand atom, `None` outside the lattice or for unknown probes
    pub fn energy(&self, probe: &ProbeType, ligand_charge: f64, point: &Vector3<f64>) -> Option<f64> {
        let grid = self.grids.get(probe)?;
        if !grid.contains(point) {
            return None;
        }
        let mut e = grid.get_value(point).ok()?;
        if let (Some(q), Some(aq)) = (&self.charge, &self.abs_charge) {
            e += ligand_charge * q.get_value(point).ok()? + ligand_charge.abs() * aq.get_value(point).ok()?;
        }
        Some(e)
    }
}
