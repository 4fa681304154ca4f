//! Molecule representation and related functionality

pub mod conformation;

pub use conformation::Conformation;

use crate::atom::{Atom, AtomType, XsType};
use nalgebra::{Unit, UnitQuaternion, Vector3};
use std::collections::VecDeque;
use thiserror::Error;

/// Bonds are perceived when the distance is below this multiple of the covalent radii sum
const BOND_TOLERANCE: f64 = 1.15;

/// Errors that can occur when working with molecules
#[derive(Error, Debug)]
pub enum MoleculeError {
    #[error("Invalid bond: atoms {0} and {1} not found")]
    InvalidBond(usize, usize),

    #[error("No atoms in molecule {0}")]
    EmptyMolecule(String),

    #[error("Conformation has {found} torsions but molecule {name} has {expected}")]
    TorsionMismatch {
        name: String,
        expected: usize,
        found: usize,
    },
}

/// Represents a chemical bond between two atoms
#[derive(Debug, Clone)]
pub struct Bond {
    /// Index of the first atom
    pub atom1_idx: usize,

    /// Index of the second atom
    pub atom2_idx: usize,

    /// Is this bond rotatable?
    pub rotatable: bool,
}

/// Represents a molecular torsion (rotatable bond and the atoms affected by rotation).
///
/// Torsions are stored children-first, so applying them in order and
/// rotating each subtree around its current axis yields a consistent pose.
#[derive(Debug, Clone)]
pub struct Torsion {
    /// Index of the rotatable bond; `atom1_idx` is on the parent side
    pub bond_idx: usize,

    /// Indices of atoms that move when this bond rotates (the whole subtree)
    pub moving_atoms: Vec<usize>,

    /// Nesting depth in the torsion tree, 1 for branches of the root
    pub depth: usize,
}

/// Counts used by conformation-independent scoring terms
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LigandDescriptors {
    pub num_torsions: usize,
    pub num_heavy_atoms: usize,
    pub num_hydrophobic_atoms: usize,
}

/// Represents a molecule (ligand or receptor)
#[derive(Debug, Clone)]
pub struct Molecule {
    /// Name of the molecule
    pub name: String,

    /// List of atoms in the molecule
    pub atoms: Vec<Atom>,

    /// List of bonds between atoms
    pub bonds: Vec<Bond>,

    /// List of rotatable bonds (torsions)
    pub torsions: Vec<Torsion>,

    /// Torsional degrees of freedom declared by the file (TORSDOF)
    pub torsdof: Option<usize>,
}

impl Molecule {
    /// Create a new empty molecule
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            atoms: Vec::new(),
            bonds: Vec::new(),
            torsions: Vec::new(),
            torsdof: None,
        }
    }

    /// Add an atom to the molecule
    pub fn add_atom(&mut self, atom: Atom) -> usize {
        let idx = self.atoms.len();
        self.atoms.push(atom);
        idx
    }

    /// Add a bond between two atoms
    pub fn add_bond(
        &mut self,
        atom1_idx: usize,
        atom2_idx: usize,
        rotatable: bool,
    ) -> Result<usize, MoleculeError> {
        if atom1_idx >= self.atoms.len() || atom2_idx >= self.atoms.len() {
            return Err(MoleculeError::InvalidBond(atom1_idx, atom2_idx));
        }

        let bond = Bond {
            atom1_idx,
            atom2_idx,
            rotatable,
        };

        let idx = self.bonds.len();
        self.bonds.push(bond);
        Ok(idx)
    }

    /// Index of the bond joining two atoms, in either direction
    pub fn find_bond(&self, a: usize, b: usize) -> Option<usize> {
        self.bonds.iter().position(|bond| {
            (bond.atom1_idx == a && bond.atom2_idx == b)
                || (bond.atom1_idx == b && bond.atom2_idx == a)
        })
    }

    /// Get the center of the molecule
    pub fn center(&self) -> Result<Vector3<f64>, MoleculeError> {
        if self.atoms.is_empty() {
            return Err(MoleculeError::EmptyMolecule(self.name.clone()));
        }

        let sum = self
            .atoms
            .iter()
            .fold(Vector3::zeros(), |acc, atom| acc + atom.coordinates);

        Ok(sum / self.atoms.len() as f64)
    }

    /// Get the bounding box of the molecule
    pub fn bounding_box(&self) -> Result<(Vector3<f64>, Vector3<f64>), MoleculeError> {
        if self.atoms.is_empty() {
            return Err(MoleculeError::EmptyMolecule(self.name.clone()));
        }

        let mut min = Vector3::repeat(f64::MAX);
        let mut max = Vector3::repeat(f64::MIN);
        for atom in &self.atoms {
            min = min.inf(&atom.coordinates);
            max = max.sup(&atom.coordinates);
        }
        Ok((min, max))
    }

    /// Perceive covalent bonds from interatomic distances.
    ///
    /// Bonds already present (e.g. torsion bonds from the file) are kept.
    pub fn infer_bonds(&mut self) {
        let mut order: Vec<usize> = (0..self.atoms.len()).collect();
        order.sort_by(|&a, &b| {
            self.atoms[a]
                .coordinates
                .x
                .total_cmp(&self.atoms[b].coordinates.x)
        });

        let max_reach = 2.0 * 1.74 * BOND_TOLERANCE;
        let mut found = Vec::new();
        for (pos, &i) in order.iter().enumerate() {
            let atom1 = &self.atoms[i];
            for &j in &order[pos + 1..] {
                let atom2 = &self.atoms[j];
                if atom2.coordinates.x - atom1.coordinates.x > max_reach {
                    break;
                }
                if atom1.is_hydrogen() && atom2.is_hydrogen() {
                    continue;
                }
                let limit = (atom1.atom_type.covalent_radius() + atom2.atom_type.covalent_radius())
                    * BOND_TOLERANCE;
                if atom1.distance(atom2) < limit {
                    found.push((i.min(j), i.max(j)));
                }
            }
        }

        found.sort_unstable();
        for (i, j) in found {
            if self.find_bond(i, j).is_none() {
                self.bonds.push(Bond {
                    atom1_idx: i,
                    atom2_idx: j,
                    rotatable: false,
                });
            }
        }
    }

    /// Adjacency lists of the bond graph
    pub fn neighbors(&self) -> Vec<Vec<usize>> {
        let mut adjacency = vec![Vec::new(); self.atoms.len()];
        for bond in &self.bonds {
            adjacency[bond.atom1_idx].push(bond.atom2_idx);
            adjacency[bond.atom2_idx].push(bond.atom1_idx);
        }
        adjacency
    }

    /// Assign X-Score types to every heavy atom from its bonding context
    pub fn assign_xs_types(&mut self) {
        let adjacency = self.neighbors();
        for i in 0..self.atoms.len() {
            let bonded_to_heteroatom = adjacency[i]
                .iter()
                .any(|&j| self.atoms[j].atom_type.is_heteroatom());
            let bonded_to_donor_hydrogen = adjacency[i]
                .iter()
                .any(|&j| self.atoms[j].atom_type == AtomType::HydrogenD);
            self.atoms[i].xs = XsType::classify(
                self.atoms[i].atom_type,
                bonded_to_heteroatom,
                bonded_to_donor_hydrogen,
            );
        }
    }

    /// Indices of atoms that take part in scoring
    pub fn heavy_atom_indices(&self) -> Vec<usize> {
        self.atoms
            .iter()
            .enumerate()
            .filter(|(_, a)| a.is_scored())
            .map(|(i, _)| i)
            .collect()
    }

    /// Rigid segment of each atom: 0 for the root, `t + 1` for atoms owned by torsion `t`
    pub fn atom_segments(&self) -> Vec<usize> {
        let mut segments = vec![0; self.atoms.len()];
        let mut assigned = vec![false; self.atoms.len()];
        // children come first, so the deepest torsion claims an atom
        for (t, torsion) in self.torsions.iter().enumerate() {
            for &a in &torsion.moving_atoms {
                if !assigned[a] {
                    segments[a] = t + 1;
                    assigned[a] = true;
                }
            }
        }
        segments
    }

    /// Bond-graph distances from `start`, `usize::MAX` when unreachable
    fn topological_distances(&self, adjacency: &[Vec<usize>], start: usize) -> Vec<usize> {
        let mut dist = vec![usize::MAX; self.atoms.len()];
        dist[start] = 0;
        let mut queue = VecDeque::from([start]);
        while let Some(a) = queue.pop_front() {
            if dist[a] >= 3 {
                continue;
            }
            for &b in &adjacency[a] {
                if dist[b] == usize::MAX {
                    dist[b] = dist[a] + 1;
                    queue.push_back(b);
                }
            }
        }
        dist
    }

    /// Heavy-atom pairs whose distance can change with the torsions:
    /// different rigid segments and more than three bonds apart.
    pub fn intramolecular_pairs(&self) -> Vec<(usize, usize)> {
        let adjacency = self.neighbors();
        let segments = self.atom_segments();
        let heavy = self.heavy_atom_indices();

        let mut pairs = Vec::new();
        for (k, &i) in heavy.iter().enumerate() {
            let dist = self.topological_distances(&adjacency, i);
            for &j in &heavy[k + 1..] {
                if segments[i] != segments[j] && dist[j] > 3 {
                    pairs.push((i, j));
                }
            }
        }
        pairs
    }

    /// Center of the root segment, the pivot for rigid-body rotation
    pub fn root_center(&self) -> Result<Vector3<f64>, MoleculeError> {
        let segments = self.atom_segments();
        let root: Vec<&Atom> = self
            .atoms
            .iter()
            .zip(&segments)
            .filter(|(_, &s)| s == 0)
            .map(|(a, _)| a)
            .collect();
        if root.is_empty() {
            return self.center();
        }
        let sum = root
            .iter()
            .fold(Vector3::zeros(), |acc, atom| acc + atom.coordinates);
        Ok(sum / root.len() as f64)
    }

    /// Radius of gyration of the heavy atoms around the root center
    pub fn gyration_radius(&self) -> f64 {
        let heavy = self.heavy_atom_indices();
        let center = match self.root_center() {
            Ok(c) => c,
            Err(_) => return 1.0,
        };
        if heavy.is_empty() {
            return 1.0;
        }
        let sum: f64 = heavy
            .iter()
            .map(|&i| (self.atoms[i].coordinates - center).norm_squared())
            .sum();
        let radius = (sum / heavy.len() as f64).sqrt();
        if radius > 1e-3 {
            radius
        } else {
            1.0
        }
    }

    /// Coordinates of every atom for the given conformation.
    ///
    /// The reference coordinates correspond to zero torsions, identity
    /// orientation and the root center as position.
    pub fn conformation_coords(
        &self,
        conf: &Conformation,
    ) -> Result<Vec<Vector3<f64>>, MoleculeError> {
        if conf.torsions.len() != self.torsions.len() {
            return Err(MoleculeError::TorsionMismatch {
                name: self.name.clone(),
                expected: self.torsions.len(),
                found: conf.torsions.len(),
            });
        }

        let mut coords: Vec<Vector3<f64>> = self.atoms.iter().map(|a| a.coordinates).collect();

        for (torsion, &angle) in self.torsions.iter().zip(&conf.torsions) {
            if angle == 0.0 {
                continue;
            }
            let bond = &self.bonds[torsion.bond_idx];
            let pivot = coords[bond.atom1_idx];
            let axis = coords[bond.atom2_idx] - pivot;
            if axis.norm_squared() < 1e-12 {
                continue;
            }
            let rotation = UnitQuaternion::from_axis_angle(&Unit::new_normalize(axis), angle);
            for &a in &torsion.moving_atoms {
                coords[a] = rotation.transform_vector(&(coords[a] - pivot)) + pivot;
            }
        }

        let origin = self.root_center()?;
        for c in coords.iter_mut() {
            *c = conf.orientation.transform_vector(&(*c - origin)) + conf.position;
        }
        Ok(coords)
    }

    /// Copy of the molecule with its coordinates replaced
    pub fn with_coords(&self, coords: &[Vector3<f64>]) -> Molecule {
        let mut moved = self.clone();
        for (atom, c) in moved.atoms.iter_mut().zip(coords) {
            atom.coordinates = *c;
        }
        moved
    }

    pub fn descriptors(&self) -> LigandDescriptors {
        let heavy = self.heavy_atom_indices();
        LigandDescriptors {
            num_torsions: self.torsdof.unwrap_or(self.torsions.len()),
            num_heavy_atoms: heavy.len(),
            num_hydrophobic_atoms: heavy
                .iter()
                .filter(|&&i| self.atoms[i].xs.map(|x| x.is_hydrophobic()).unwrap_or(false))
                .count(),
        }
    }
}
