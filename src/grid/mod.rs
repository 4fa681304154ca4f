//! Grid representation for efficient force field evaluation

pub mod cache;
pub mod cell_list;

pub use cache::GridCache;
pub use cell_list::CellList;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::io::{BufRead, Write};
use std::path::Path;
use thiserror::Error;

use crate::io::{create_for_writing, open_for_reading, IoError};
use crate::search_space::GridDims;

/// Errors that can occur when working with grids
#[derive(Error, Debug)]
pub enum GridError {
    #[error("Invalid grid dimension: {0}")]
    InvalidDimension(String),

    #[error("Point {0:?} is outside grid bounds")]
    OutOfBounds(Vector3<f64>),

    #[error(transparent)]
    Io(#[from] IoError),

    #[error("Map file {file}: {message}")]
    Parse { file: String, message: String },

    #[error("Grid computation failed: {0}")]
    ThreadPool(String),
}

/// A 3D grid for storing precomputed potentials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grid {
    /// Origin of the grid (minimum corner) in Angstroms
    pub origin: Vector3<f64>,

    /// Grid point spacing in Angstroms
    pub spacing: f64,

    /// Number of grid points in each dimension
    pub dimensions: Vector3<usize>,

    /// Grid data, x varying fastest as in AutoDock maps
    pub data: Vec<f64>,
}

impl Grid {
    /// Create a new grid with the specified dimensions and initialize all values to zero
    pub fn new(
        origin: Vector3<f64>,
        spacing: f64,
        dimensions: Vector3<usize>,
    ) -> Result<Self, GridError> {
        if dimensions.iter().any(|&d| d < 2) {
            return Err(GridError::InvalidDimension(format!(
                "need at least 2 points per axis, got {:?}",
                dimensions.as_slice()
            )));
        }
        if !(spacing > 0.0 && spacing.is_finite()) {
            return Err(GridError::InvalidDimension(format!("spacing {}", spacing)));
        }

        let total_points = dimensions.x * dimensions.y * dimensions.z;

        Ok(Self {
            origin,
            spacing,
            dimensions,
            data: vec![0.0; total_points],
        })
    }

    /// Empty grid covering a search box layout
    pub fn from_dims(dims: &GridDims) -> Result<Self, GridError> {
        Self::new(dims.begin, dims.spacing, dims.points())
    }

    /// Linear index of a lattice point, x fastest
    fn index(&self, x: usize, y: usize, z: usize) -> usize {
        x + self.dimensions.x * (y + self.dimensions.y * z)
    }

    /// Real-space position of a lattice point
    pub fn point(&self, x: usize, y: usize, z: usize) -> Vector3<f64> {
        self.origin + Vector3::new(x as f64, y as f64, z as f64) * self.spacing
    }

    /// Real-space position of the point stored at a linear index
    pub fn point_at(&self, idx: usize) -> Vector3<f64> {
        let x = idx % self.dimensions.x;
        let y = (idx / self.dimensions.x) % self.dimensions.y;
        let z = idx / (self.dimensions.x * self.dimensions.y);
        self.point(x, y, z)
    }

    /// Maximum corner
    pub fn end(&self) -> Vector3<f64> {
        self.origin + self.dimensions.map(|d| (d - 1) as f64) * self.spacing
    }

    pub fn contains(&self, position: &Vector3<f64>) -> bool {
        let end = self.end();
        (0..3).all(|k| position[k] >= self.origin[k] && position[k] <= end[k])
    }

    /// Trilinear interpolation at a point known to be inside the grid
    fn interpolate(&self, position: &Vector3<f64>) -> f64 {
        let f = (position - self.origin) / self.spacing;

        let mut lower = [0usize; 3];
        let mut frac = [0.0f64; 3];
        for k in 0..3 {
            let max_cell = self.dimensions[k] - 2;
            let cell = (f[k].floor().max(0.0) as usize).min(max_cell);
            lower[k] = cell;
            frac[k] = (f[k] - cell as f64).clamp(0.0, 1.0);
        }
        let [x0, y0, z0] = lower;
        let (x1, y1, z1) = (x0 + 1, y0 + 1, z0 + 1);
        let [dx, dy, dz] = frac;

        let v = |x: usize, y: usize, z: usize| self.data[self.index(x, y, z)];

        let c00 = v(x0, y0, z0) * (1.0 - dx) + v(x1, y0, z0) * dx;
        let c01 = v(x0, y0, z1) * (1.0 - dx) + v(x1, y0, z1) * dx;
        let c10 = v(x0, y1, z0) * (1.0 - dx) + v(x1, y1, z0) * dx;
        let c11 = v(x0, y1, z1) * (1.0 - dx) + v(x1, y1, z1) * dx;

        let c0 = c00 * (1.0 - dy) + c10 * dy;
        let c1 = c01 * (1.0 - dy) + c11 * dy;

        c0 * (1.0 - dz) + c1 * dz
    }

    /// Get a value from the grid at real-space coordinates with trilinear interpolation
    pub fn get_value(&self, position: &Vector3<f64>) -> Result<f64, GridError> {
        if !self.contains(position) {
            return Err(GridError::OutOfBounds(*position));
        }
        Ok(self.interpolate(position))
    }

    /// Load a grid from an AutoDock map file
    pub fn from_map_file<P: AsRef<Path>>(path: P) -> Result<Self, GridError> {
        let path = path.as_ref();
        let reader = open_for_reading(path)?;
        let file = path.display().to_string();
        let parse_error = |message: String| GridError::Parse {
            file: file.clone(),
            message,
        };

        let mut spacing = None;
        let mut elements = None;
        let mut center = None;
        let mut data = Vec::new();

        for line in reader.lines() {
            let line = line.map_err(IoError::from)?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let mut fields = line.split_whitespace();
            let keyword = fields.next().unwrap_or("");
            let numbers = |fields: std::str::SplitWhitespace<'_>| -> Result<Vec<f64>, GridError> {
                fields
                    .map(|s| {
                        s.parse::<f64>()
                            .map_err(|_| parse_error(format!("invalid number '{}' after {}", s, keyword)))
                    })
                    .collect()
            };

            match keyword {
                "SPACING" => spacing = numbers(fields)?.first().copied(),
                "NELEMENTS" => {
                    let n = numbers(fields)?;
                    if n.len() != 3 || n.iter().any(|&v| v < 1.0) {
                        return Err(parse_error(format!("bad NELEMENTS line '{}'", line)));
                    }
                    elements = Some(Vector3::new(n[0] as usize, n[1] as usize, n[2] as usize));
                }
                "CENTER" => {
                    let c = numbers(fields)?;
                    if c.len() != 3 {
                        return Err(parse_error(format!("bad CENTER line '{}'", line)));
                    }
                    center = Some(Vector3::new(c[0], c[1], c[2]));
                }
                _ => match keyword.parse::<f64>() {
                    Ok(value) => data.push(value),
                    // other header records (GRID_PARAMETER_FILE, MACROMOLECULE, ...)
                    Err(_) if data.is_empty() => {}
                    Err(_) => return Err(parse_error(format!("unexpected line '{}'", line))),
                },
            }
        }

        let spacing = spacing.ok_or_else(|| parse_error("missing SPACING".to_string()))?;
        let elements = elements.ok_or_else(|| parse_error("missing NELEMENTS".to_string()))?;
        let center = center.ok_or_else(|| parse_error("missing CENTER".to_string()))?;

        let origin = center - elements.map(|n| n as f64) * spacing / 2.0;
        let mut grid = Grid::new(origin, spacing, elements.map(|n| n + 1))?;
        if data.len() != grid.data.len() {
            return Err(parse_error(format!(
                "expected {} values, found {}",
                grid.data.len(),
                data.len()
            )));
        }
        grid.data = data;
        Ok(grid)
    }

    /// Save grid to an AutoDock map file
    pub fn to_map_file<P: AsRef<Path>>(&self, path: P) -> Result<(), GridError> {
        let path = path.as_ref();
        let mut file = create_for_writing(path)?;
        let elements = self.dimensions.map(|d| d - 1);
        let center = self.origin + elements.map(|n| n as f64) * self.spacing / 2.0;

        let mut write = || -> std::io::Result<()> {
            writeln!(file, "GRID_PARAMETER_FILE none")?;
            writeln!(file, "GRID_DATA_FILE none")?;
            writeln!(file, "MACROMOLECULE none")?;
            writeln!(file, "SPACING {}", self.spacing)?;
            writeln!(file, "NELEMENTS {} {} {}", elements.x, elements.y, elements.z)?;
            writeln!(file, "CENTER {:.3} {:.3} {:.3}", center.x, center.y, center.z)?;
            for value in &self.data {
                writeln!(file, "{:.3}", value)?;
            }
            Ok(())
        };
        write().map_err(IoError::from)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn linear_grid() -> Grid {
        // f(x, y, z) = x + 2y + 3z is reproduced exactly by trilinear interpolation
        let mut grid = Grid::new(Vector3::new(-1.0, -1.0, -1.0), 0.5, Vector3::new(5, 5, 5)).unwrap();
        for idx in 0..grid.data.len() {
            let p = grid.point_at(idx);
            grid.data[idx] = p.x + 2.0 * p.y + 3.0 * p.z;
        }
        grid
    }

    #[test]
    fn test_grid_creation() {
        let grid = Grid::new(Vector3::zeros(), 0.375, Vector3::new(10, 10, 10)).unwrap();
        assert_eq!(grid.data.len(), 1000);
        assert!(Grid::new(Vector3::zeros(), 0.375, Vector3::new(1, 10, 10)).is_err());
        assert!(Grid::new(Vector3::zeros(), 0.0, Vector3::new(10, 10, 10)).is_err());
    }

    #[test]
    fn test_x_fastest_layout() {
        let grid = linear_grid();
        assert_eq!(grid.index(1, 0, 0), 1);
        assert_eq!(grid.index(0, 1, 0), 5);
        assert_eq!(grid.index(0, 0, 1), 25);
        assert_eq!(grid.point_at(31), grid.point(1, 1, 1));
    }

    #[test]
    fn test_trilinear_interpolation() {
        let grid = linear_grid();
        let p = Vector3::new(0.1, -0.3, 0.7);
        assert_approx_eq!(grid.get_value(&p).unwrap(), 0.1 - 0.6 + 2.1);
        assert_approx_eq!(grid.get_value(&grid.end()).unwrap(), 6.0);
        assert!(grid.get_value(&Vector3::new(2.0, 0.0, 0.0)).is_err());
    }

    #[test]
    fn test_map_file_round_trip() {
        let grid = linear_grid();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("user.map");
        grid.to_map_file(&path).unwrap();

        let loaded = Grid::from_map_file(&path).unwrap();
        assert_eq!(loaded.dimensions, grid.dimensions);
        assert_approx_eq!(loaded.origin.x, -1.0);
        assert_approx_eq!(loaded.spacing, 0.5);
        let p = Vector3::new(0.25, 0.5, -0.5);
        assert_approx_eq!(loaded.get_value(&p).unwrap(), grid.get_value(&p).unwrap(), 1e-3);
    }

    #[test]
    fn test_map_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.map");
        std::fs::write(&path, "SPACING 0.375\nNELEMENTS 2 2 2\nCENTER 0 0 0\n1.0\n2.0\n").unwrap();
        assert!(matches!(Grid::from_map_file(&path), Err(GridError::Parse { .. })));
        assert!(matches!(
            Grid::from_map_file(dir.path().join("missing.map")),
            Err(GridError::Io(IoError::Open { .. }))
        ));
    }
}
