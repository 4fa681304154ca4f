//! Search box definition and its grid layout

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::grid::GridError;
use crate::molecule::Molecule;

/// Grid spacing used for the receptor cache, in Angstroms
pub const GRANULARITY: f64 = 0.375;

/// Axis-aligned box the ligand is confined to
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchBox {
    pub center: Vector3<f64>,
    pub size: Vector3<f64>,
}

/// Grid layout covering a search box: `n` intervals per axis starting at `begin`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridDims {
    pub begin: Vector3<f64>,
    pub n: Vector3<usize>,
    pub spacing: f64,
}

impl GridDims {
    /// Number of lattice points per axis
    pub fn points(&self) -> Vector3<usize> {
        self.n.map(|n| n + 1)
    }

    pub fn end(&self) -> Vector3<f64> {
        self.begin + self.n.map(|n| n as f64) * self.spacing
    }
}

impl SearchBox {
    /// Create a box; every size must be positive and finite
    pub fn new(center: Vector3<f64>, size: Vector3<f64>) -> Result<Self, GridError> {
        if !center.iter().all(|c| c.is_finite()) {
            return Err(GridError::InvalidDimension(format!(
                "box center must be finite, got {:?}",
                center.as_slice()
            )));
        }
        if !size.iter().all(|s| s.is_finite() && *s > 0.0) {
            return Err(GridError::InvalidDimension(format!(
                "box size must be positive, got {:?}",
                size.as_slice()
            )));
        }
        Ok(Self { center, size })
    }

    /// Box around a reference ligand.
    ///
    /// The center is the midpoint of the ligand's bounding box. Any axis whose
    /// `size` is zero gets the ligand's extent plus `padding` on both sides.
    pub fn autobox(ligand: &Molecule, padding: f64, size: Vector3<f64>) -> Result<Self, GridError> {
        let (min, max) = ligand
            .bounding_box()
            .map_err(|e| GridError::InvalidDimension(e.to_string()))?;
        let center = (min + max) / 2.0;
        let span = max - min;
        let size = Vector3::from_fn(|k, _| {
            if size[k] == 0.0 {
                span[k] + 2.0 * padding
            } else {
                size[k]
            }
        });
        Self::new(center, size)
    }

    pub fn min(&self) -> Vector3<f64> {
        self.center - self.size / 2.0
    }

    pub fn max(&self) -> Vector3<f64> {
        self.center + self.size / 2.0
    }

    /// Lattice with `n = ceil(size / GRANULARITY)` intervals, centered on the box
    pub fn grid_dims(&self) -> GridDims {
        let n = self.size.map(|s| (s / GRANULARITY).ceil().max(1.0) as usize);
        let real_span = n.map(|n| n as f64 * GRANULARITY);
        GridDims {
            begin: self.center - real_span / 2.0,
            n,
            spacing: GRANULARITY,
        }
    }

    pub fn contains(&self, point: &Vector3<f64>) -> bool {
        self.outside_distance(point) == 0.0
    }

    /// Euclidean distance from `point` to the box, zero inside
    pub fn outside_distance(&self, point: &Vector3<f64>) -> f64 {
        let min = self.min();
        let max = self.max();
        let excess = Vector3::from_fn(|k, _| {
            if point[k] < min[k] {
                min[k] - point[k]
            } else if point[k] > max[k] {
                point[k] - max[k]
            } else {
                0.0
            }
        });
        excess.norm()
    }

    pub fn volume(&self) -> f64 {
        self.size.x * self.size.y * self.size.z
    }
}
