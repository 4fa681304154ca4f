//! Parametric interaction terms in smina's `name(key=value,_key=value)` syntax

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::ForceFieldError;
use crate::atom::{Atom, AtomType, XsType};
use crate::molecule::LigandDescriptors;

/// Ligand-side atom description used by pair evaluation and the grid cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProbeType {
    pub ad: AtomType,
    pub xs: XsType,
}

impl ProbeType {
    /// The probe for a scored atom, `None` for hydrogens
    pub fn of(atom: &Atom) -> Option<Self> {
        atom.xs.map(|xs| Self {
            ad: atom.atom_type,
            xs,
        })
    }
}

/// Energy of one pair split by its dependence on the ligand atom's charge
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PairEnergy {
    pub base: f64,
    pub charge: f64,
    pub abs_charge: f64,
}

impl PairEnergy {
    pub fn total(&self, ligand_charge: f64) -> f64 {
        self.base + ligand_charge * self.charge + ligand_charge.abs() * self.abs_charge
    }

    pub fn scaled(&self, factor: f64) -> PairEnergy {
        PairEnergy {
            base: self.base * factor,
            charge: self.charge * factor,
            abs_charge: self.abs_charge * factor,
        }
    }
}

impl std::ops::AddAssign for PairEnergy {
    fn add_assign(&mut self, other: PairEnergy) {
        self.base += other.base;
        self.charge += other.charge;
        self.abs_charge += other.abs_charge;
    }
}

/// A distance-dependent pair term
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Term {
    Gauss {
        offset: f64,
        width: f64,
        cutoff: f64,
    },
    Repulsion {
        offset: f64,
        cutoff: f64,
    },
    Hydrophobic {
        good: f64,
        bad: f64,
        cutoff: f64,
    },
    NonDirHBond {
        good: f64,
        bad: f64,
        cutoff: f64,
    },
    Vdw {
        i: i32,
        j: i32,
        smoothing: f64,
        cap: f64,
        cutoff: f64,
    },
    NonDirHBondLj {
        offset: f64,
        cap: f64,
        cutoff: f64,
    },
    Ad4Solvation {
        desolvation_sigma: f64,
        solvation_q: f64,
        charge_dependent: bool,
        cutoff: f64,
    },
    Electrostatic {
        i: i32,
        cap: f64,
        distance_dependent: bool,
        cutoff: f64,
    },
}

/// Linear ramp from 1 at `good` to 0 at `bad`
fn slope_step(bad: f64, good: f64, x: f64) -> f64 {
    if bad < good {
        if x <= bad {
            return 0.0;
        }
        if x >= good {
            return 1.0;
        }
    } else {
        if x >= bad {
            return 0.0;
        }
        if x <= good {
            return 1.0;
        }
    }
    (x - bad) / (good - bad)
}

/// Generalized Lennard-Jones with minimum `-depth` at `r0`
fn lennard_jones(i: i32, j: i32, depth: f64, r0: f64, r: f64) -> f64 {
    let ratio = r0 / r;
    let (i, j) = (i as f64, j as f64);
    depth / (j - i) * (i * ratio.powf(j) - j * ratio.powf(i))
}

impl Term {
    pub fn name(&self) -> &'static str {
        match self {
            Term::Gauss { .. } => "gauss",
            Term::Repulsion { .. } => "repulsion",
            Term::Hydrophobic { .. } => "hydrophobic",
            Term::NonDirHBond { .. } => "non_dir_h_bond",
            Term::Vdw { .. } => "vdw",
            Term::NonDirHBondLj { .. } => "non_dir_h_bond_lj",
            Term::Ad4Solvation { .. } => "ad4_solvation",
            Term::Electrostatic { .. } => "electrostatic",
        }
    }

    pub fn cutoff(&self) -> f64 {
        match *self {
            Term::Gauss { cutoff, .. }
            | Term::Repulsion { cutoff, .. }
            | Term::Hydrophobic { cutoff, .. }
            | Term::NonDirHBond { cutoff, .. }
            | Term::Vdw { cutoff, .. }
            | Term::NonDirHBondLj { cutoff, .. }
            | Term::Ad4Solvation { cutoff, .. }
            | Term::Electrostatic { cutoff, .. } => cutoff,
        }
    }

    /// Whether the value depends on the ligand atom's partial charge
    pub fn uses_charge(&self) -> bool {
        matches!(
            self,
            Term::Electrostatic { .. }
                | Term::Ad4Solvation {
                    charge_dependent: true,
                    ..
                }
        )
    }

    /// Unweighted value for a ligand probe against a receptor (or other ligand) atom at distance `r`
    pub fn eval(&self, probe: ProbeType, other: &Atom, r: f64) -> PairEnergy {
        if r >= self.cutoff() {
            return PairEnergy::default();
        }
        let other_xs = match other.xs {
            Some(xs) => xs,
            None => return PairEnergy::default(),
        };
        let surface = r - probe.xs.radius() - other_xs.radius();

        let base = |value: f64| PairEnergy {
            base: value,
            ..PairEnergy::default()
        };

        match *self {
            Term::Gauss { offset, width, .. } => base((-((surface - offset) / width).powi(2)).exp()),
            Term::Repulsion { offset, .. } => {
                let d = surface - offset;
                base(if d < 0.0 { d * d } else { 0.0 })
            }
            Term::Hydrophobic { good, bad, .. } => {
                if probe.xs.is_hydrophobic() && other_xs.is_hydrophobic() {
                    base(slope_step(bad, good, surface))
                } else {
                    PairEnergy::default()
                }
            }
            Term::NonDirHBond { good, bad, .. } => {
                if probe.xs.h_bond_possible(other_xs) {
                    base(slope_step(bad, good, surface))
                } else {
                    PairEnergy::default()
                }
            }
            Term::Vdw {
                i,
                j,
                smoothing,
                cap,
                ..
            } => {
                let r0 = probe.ad.radius() + other.atom_type.radius();
                let depth = (probe.ad.depth() * other.atom_type.depth()).sqrt();
                let r_eff = if r > r0 + smoothing {
                    r - smoothing
                } else if r < r0 - smoothing {
                    r + smoothing
                } else {
                    r0
                };
                if r_eff <= 0.0 {
                    return base(cap);
                }
                base(lennard_jones(i, j, depth, r0, r_eff).min(cap))
            }
            Term::NonDirHBondLj { offset, cap, .. } => {
                if !probe.xs.h_bond_possible(other_xs) || r <= 0.0 {
                    return PairEnergy::default();
                }
                let r0 = probe.xs.radius() + other_xs.radius() + offset;
                base(lennard_jones(10, 12, 1.0, r0, r).min(cap))
            }
            Term::Ad4Solvation {
                desolvation_sigma,
                solvation_q,
                charge_dependent,
                ..
            } => {
                let gaussian = (-(r * r) / (2.0 * desolvation_sigma * desolvation_sigma)).exp();
                let other_solvation = if charge_dependent {
                    other.atom_type.solvation() + solvation_q * other.charge.abs()
                } else {
                    other.atom_type.solvation()
                };
                PairEnergy {
                    base: (probe.ad.solvation() * other.atom_type.volume()
                        + other_solvation * probe.ad.volume())
                        * gaussian,
                    charge: 0.0,
                    abs_charge: if charge_dependent {
                        solvation_q * other.atom_type.volume() * gaussian
                    } else {
                        0.0
                    },
                }
            }
            Term::Electrostatic {
                i,
                cap,
                distance_dependent,
                ..
            } => {
                if r <= 0.0 {
                    return PairEnergy {
                        charge: other.charge * cap,
                        ..PairEnergy::default()
                    };
                }
                let mut value = r.powi(-i);
                if distance_dependent {
                    value /= r;
                }
                PairEnergy {
                    charge: other.charge * value.min(cap),
                    ..PairEnergy::default()
                }
            }
        }
    }
}

fn flag(value: bool) -> u8 {
    u8::from(value)
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Term::Gauss {
                offset,
                width,
                cutoff,
            } => write!(f, "gauss(o={},_w={},_c={})", offset, width, cutoff),
            Term::Repulsion { offset, cutoff } => write!(f, "repulsion(o={},_c={})", offset, cutoff),
            Term::Hydrophobic { good, bad, cutoff } => {
                write!(f, "hydrophobic(g={},_b={},_c={})", good, bad, cutoff)
            }
            Term::NonDirHBond { good, bad, cutoff } => {
                write!(f, "non_dir_h_bond(g={},_b={},_c={})", good, bad, cutoff)
            }
            Term::Vdw {
                i,
                j,
                smoothing,
                cap,
                cutoff,
            } => write!(f, "vdw(i={},_j={},_s={},_^={},_c={})", i, j, smoothing, cap, cutoff),
            Term::NonDirHBondLj { offset, cap, cutoff } => {
                write!(f, "non_dir_h_bond_lj(o={},_^={},_c={})", offset, cap, cutoff)
            }
            Term::Ad4Solvation {
                desolvation_sigma,
                solvation_q,
                charge_dependent,
                cutoff,
            } => write!(
                f,
                "ad4_solvation(d-sigma={},_s/q={},_q={},_c={})",
                desolvation_sigma,
                solvation_q,
                flag(charge_dependent),
                cutoff
            ),
            Term::Electrostatic {
                i,
                cap,
                distance_dependent,
                cutoff,
            } => write!(
                f,
                "electrostatic(i={},_^={},_d={},_c={})",
                i,
                cap,
                flag(distance_dependent),
                cutoff
            ),
        }
    }
}

/// Split `name(k=v,_k=v)` into the name and its values, checking the keys
fn parse_parameters<'a>(s: &'a str, keys: &[&str]) -> Result<Vec<f64>, ForceFieldError> {
    let invalid = |reason: String| ForceFieldError::InvalidTerm {
        term: s.to_string(),
        reason,
    };

    let open = s.find('(').ok_or_else(|| invalid("missing parameter list".to_string()))?;
    let inner = s[open + 1..]
        .strip_suffix(')')
        .ok_or_else(|| invalid("missing closing parenthesis".to_string()))?;

    let parts: Vec<&'a str> = inner.split(',').collect();
    if parts.len() != keys.len() {
        return Err(invalid(format!(
            "expected {} parameters, found {}",
            keys.len(),
            parts.len()
        )));
    }

    parts
        .iter()
        .zip(keys)
        .map(|(part, key)| {
            let part = part.trim().trim_start_matches('_');
            let (name, value) = part
                .split_once('=')
                .ok_or_else(|| invalid(format!("parameter '{}' has no value", part)))?;
            if name != *key {
                return Err(invalid(format!("expected parameter '{}', found '{}'", key, name)));
            }
            value
                .parse::<f64>()
                .map_err(|_| invalid(format!("invalid value '{}' for '{}'", value, key)))
        })
        .collect()
}

impl FromStr for Term {
    type Err = ForceFieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let name = s.split('(').next().unwrap_or("");
        let term = match name {
            "gauss" => {
                let p = parse_parameters(s, &["o", "w", "c"])?;
                Term::Gauss {
                    offset: p[0],
                    width: p[1],
                    cutoff: p[2],
                }
            }
            "repulsion" => {
                let p = parse_parameters(s, &["o", "c"])?;
                Term::Repulsion {
                    offset: p[0],
                    cutoff: p[1],
                }
            }
            "hydrophobic" => {
                let p = parse_parameters(s, &["g", "b", "c"])?;
                Term::Hydrophobic {
                    good: p[0],
                    bad: p[1],
                    cutoff: p[2],
                }
            }
            "non_dir_h_bond" => {
                let p = parse_parameters(s, &["g", "b", "c"])?;
                Term::NonDirHBond {
                    good: p[0],
                    bad: p[1],
                    cutoff: p[2],
                }
            }
            "vdw" => {
                let p = parse_parameters(s, &["i", "j", "s", "^", "c"])?;
                Term::Vdw {
                    i: p[0] as i32,
                    j: p[1] as i32,
                    smoothing: p[2],
                    cap: p[3],
                    cutoff: p[4],
                }
            }
            "non_dir_h_bond_lj" => {
                let p = parse_parameters(s, &["o", "^", "c"])?;
                Term::NonDirHBondLj {
                    offset: p[0],
                    cap: p[1],
                    cutoff: p[2],
                }
            }
            "ad4_solvation" => {
                let p = parse_parameters(s, &["d-sigma", "s/q", "q", "c"])?;
                Term::Ad4Solvation {
                    desolvation_sigma: p[0],
                    solvation_q: p[1],
                    charge_dependent: p[2] != 0.0,
                    cutoff: p[3],
                }
            }
            "electrostatic" => {
                let p = parse_parameters(s, &["i", "^", "d", "c"])?;
                Term::Electrostatic {
                    i: p[0] as i32,
                    cap: p[1],
                    distance_dependent: p[2] != 0.0,
                    cutoff: p[3],
                }
            }
            _ => return Err(ForceFieldError::UnknownTerm(s.to_string())),
        };

        if let Term::Vdw { i, j, .. } = term {
            if i == j {
                return Err(ForceFieldError::InvalidTerm {
                    term: s.to_string(),
                    reason: "vdw exponents must differ".to_string(),
                });
            }
        }
        if term.cutoff() <= 0.0 {
            return Err(ForceFieldError::InvalidTerm {
                term: s.to_string(),
                reason: "cutoff must be positive".to_string(),
            });
        }
        Ok(term)
    }
}

/// Terms that depend only on the ligand's topology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfIndependentTerm {
    NumTorsDiv,
    NumTorsAdd,
    NumTorsSqr,
    NumTorsSqrt,
    NumHeavyAtoms,
    NumHydrophobicAtoms,
}

impl ConfIndependentTerm {
    pub const ALL: [ConfIndependentTerm; 6] = [
        ConfIndependentTerm::NumTorsDiv,
        ConfIndependentTerm::NumTorsAdd,
        ConfIndependentTerm::NumTorsSqr,
        ConfIndependentTerm::NumTorsSqrt,
        ConfIndependentTerm::NumHeavyAtoms,
        ConfIndependentTerm::NumHydrophobicAtoms,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ConfIndependentTerm::NumTorsDiv => "num_tors_div",
            ConfIndependentTerm::NumTorsAdd => "num_tors_add",
            ConfIndependentTerm::NumTorsSqr => "num_tors_sqr",
            ConfIndependentTerm::NumTorsSqrt => "num_tors_sqrt",
            ConfIndependentTerm::NumHeavyAtoms => "num_heavy_atoms",
            ConfIndependentTerm::NumHydrophobicAtoms => "num_hydrophobic_atoms",
        }
    }

    /// Adjust an energy `x` given this term's `weight`
    pub fn apply(&self, x: f64, weight: f64, ligand: &LigandDescriptors) -> f64 {
        let torsions = ligand.num_torsions as f64;
        match self {
            ConfIndependentTerm::NumTorsDiv => {
                let smina_weight = 0.1 * (weight + 1.0);
                x / (1.0 + smina_weight * torsions / 5.0)
            }
            ConfIndependentTerm::NumTorsAdd => x + weight * torsions,
            ConfIndependentTerm::NumTorsSqr => x + weight * torsions * torsions / 5.0,
            ConfIndependentTerm::NumTorsSqrt => x + weight * torsions.sqrt() / 5f64.sqrt(),
            ConfIndependentTerm::NumHeavyAtoms => x + weight * ligand.num_heavy_atoms as f64,
            ConfIndependentTerm::NumHydrophobicAtoms => {
                x + weight * ligand.num_hydrophobic_atoms as f64
            }
        }
    }
}

impl fmt::Display for ConfIndependentTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ConfIndependentTerm {
    type Err = ForceFieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        ConfIndependentTerm::ALL
            .iter()
            .copied()
            .find(|t| t.name() == s)
            .ok_or_else(|| ForceFieldError::UnknownTerm(s.to_string()))
    }
}
