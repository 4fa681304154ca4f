//! Atom representation and related functionality

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::fmt;

/// AutoDock atom types as they appear in the last column of a PDBQT record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AtomType {
    // Non-hydrogen types
    Carbon,       // C
    Aromatic,     // A (aromatic carbon)
    Nitrogen,     // N
    NitrogenH,    // NA (hydrogen bond acceptor)
    Oxygen,       // O
    OxygenH,      // OA (hydrogen bond acceptor)
    Sulfur,       // S
    SulfurH,      // SA (hydrogen bond acceptor)
    Phosphorus,   // P
    Fluorine,     // F
    Chlorine,     // Cl
    Bromine,      // Br
    Iodine,       // I

    // Hydrogen types
    Hydrogen,     // H
    HydrogenD,    // HD (hydrogen bond donor)

    // Metal types
    Zinc,         // Zn
    Calcium,      // Ca
    Manganese,    // Mn
    Magnesium,    // Mg
    Iron,         // Fe

    // For atoms that don't match any of the above
    Unknown,
}

/// AutoDock 4.1 per-type parameters: (Rii / 2, epsii, volume, solvation parameter)
const fn ad4_parameters(t: AtomType) -> (f64, f64, f64, f64) {
    match t {
        AtomType::Carbon => (2.00, 0.150, 33.5103, -0.00143),
        AtomType::Aromatic => (2.00, 0.150, 33.5103, -0.00052),
        AtomType::Nitrogen | AtomType::NitrogenH => (1.75, 0.160, 22.4493, -0.00162),
        AtomType::Oxygen | AtomType::OxygenH => (1.60, 0.200, 17.1573, -0.00251),
        AtomType::Sulfur | AtomType::SulfurH => (2.00, 0.200, 33.5103, -0.00214),
        AtomType::Phosphorus => (2.10, 0.200, 38.7924, -0.00110),
        AtomType::Fluorine => (1.545, 0.080, 15.4480, -0.00110),
        AtomType::Chlorine => (2.045, 0.276, 35.8235, -0.00110),
        AtomType::Bromine => (2.165, 0.389, 42.5661, -0.00110),
        AtomType::Iodine => (2.36, 0.550, 55.0585, -0.00110),
        AtomType::Hydrogen | AtomType::HydrogenD => (1.00, 0.020, 0.0, 0.00051),
        AtomType::Zinc => (0.74, 0.550, 1.70, -0.00110),
        AtomType::Calcium => (0.99, 0.550, 2.77, -0.00110),
        AtomType::Manganese => (0.65, 0.875, 2.14, -0.00110),
        AtomType::Magnesium => (0.65, 0.875, 1.56, -0.00110),
        AtomType::Iron => (0.65, 0.010, 1.84, -0.00110),
        AtomType::Unknown => (2.00, 0.150, 0.0, 0.0),
    }
}

impl AtomType {
    /// Every known type, in the order used by the atom type table
    pub const ALL: [AtomType; 21] = [
        AtomType::Carbon,
        AtomType::Aromatic,
        AtomType::Nitrogen,
        AtomType::NitrogenH,
        AtomType::Oxygen,
        AtomType::OxygenH,
        AtomType::Sulfur,
        AtomType::SulfurH,
        AtomType::Phosphorus,
        AtomType::Fluorine,
        AtomType::Chlorine,
        AtomType::Bromine,
        AtomType::Iodine,
        AtomType::Hydrogen,
        AtomType::HydrogenD,
        AtomType::Zinc,
        AtomType::Calcium,
        AtomType::Manganese,
        AtomType::Magnesium,
        AtomType::Iron,
        AtomType::Unknown,
    ];

    /// Returns the AutoDock van der Waals radius of the atom type in Angstroms
    pub fn radius(&self) -> f64 {
        ad4_parameters(*self).0
    }

    /// AutoDock well depth (kcal/mol)
    pub fn depth(&self) -> f64 {
        ad4_parameters(*self).1
    }

    /// AutoDock atomic fragmental volume
    pub fn volume(&self) -> f64 {
        ad4_parameters(*self).2
    }

    /// AutoDock atomic solvation parameter
    pub fn solvation(&self) -> f64 {
        ad4_parameters(*self).3
    }

    /// Covalent radius used for bond perception
    pub fn covalent_radius(&self) -> f64 {
        match self {
            AtomType::Carbon | AtomType::Aromatic => 0.77,
            AtomType::Nitrogen | AtomType::NitrogenH => 0.75,
            AtomType::Oxygen | AtomType::OxygenH => 0.73,
            AtomType::Sulfur | AtomType::SulfurH => 1.02,
            AtomType::Phosphorus => 1.06,
            AtomType::Fluorine => 0.71,
            AtomType::Chlorine => 0.99,
            AtomType::Bromine => 1.14,
            AtomType::Iodine => 1.33,
            AtomType::Hydrogen | AtomType::HydrogenD => 0.37,
            AtomType::Zinc => 1.31,
            AtomType::Calcium => 1.74,
            AtomType::Manganese => 1.39,
            AtomType::Magnesium => 1.30,
            AtomType::Iron => 1.25,
            AtomType::Unknown => 0.77,
        }
    }

    /// Element symbol, as written to SDF atom blocks
    pub fn element(&self) -> &'static str {
        match self {
            AtomType::Carbon | AtomType::Aromatic => "C",
            AtomType::Nitrogen | AtomType::NitrogenH => "N",
            AtomType::Oxygen | AtomType::OxygenH => "O",
            AtomType::Sulfur | AtomType::SulfurH => "S",
            AtomType::Phosphorus => "P",
            AtomType::Fluorine => "F",
            AtomType::Chlorine => "Cl",
            AtomType::Bromine => "Br",
            AtomType::Iodine => "I",
            AtomType::Hydrogen | AtomType::HydrogenD => "H",
            AtomType::Zinc => "Zn",
            AtomType::Calcium => "Ca",
            AtomType::Manganese => "Mn",
            AtomType::Magnesium => "Mg",
            AtomType::Iron => "Fe",
            AtomType::Unknown => "*",
        }
    }

    pub fn is_hydrogen(&self) -> bool {
        matches!(self, AtomType::Hydrogen | AtomType::HydrogenD)
    }

    /// Anything that is neither carbon nor hydrogen
    pub fn is_heteroatom(&self) -> bool {
        !matches!(
            self,
            AtomType::Carbon | AtomType::Aromatic | AtomType::Hydrogen | AtomType::HydrogenD
        )
    }

    /// Parse atom type from string representation in PDBQT format
    pub fn from_pdbqt_string(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "C" => AtomType::Carbon,
            "A" => AtomType::Aromatic,
            "N" => AtomType::Nitrogen,
            "NA" => AtomType::NitrogenH,
            "O" => AtomType::Oxygen,
            "OA" => AtomType::OxygenH,
            "S" => AtomType::Sulfur,
            "SA" => AtomType::SulfurH,
            "P" => AtomType::Phosphorus,
            "F" => AtomType::Fluorine,
            "CL" => AtomType::Chlorine,
            "BR" => AtomType::Bromine,
            "I" => AtomType::Iodine,
            "H" => AtomType::Hydrogen,
            "HD" => AtomType::HydrogenD,
            "ZN" => AtomType::Zinc,
            "CA" => AtomType::Calcium,
            "MN" => AtomType::Manganese,
            "MG" => AtomType::Magnesium,
            "FE" => AtomType::Iron,
            _ => AtomType::Unknown,
        }
    }

    /// Convert atom type to PDBQT string
    pub fn to_pdbqt_string(&self) -> &'static str {
        match self {
            AtomType::Carbon => "C",
            AtomType::Aromatic => "A",
            AtomType::Nitrogen => "N",
            AtomType::NitrogenH => "NA",
            AtomType::Oxygen => "O",
            AtomType::OxygenH => "OA",
            AtomType::Sulfur => "S",
            AtomType::SulfurH => "SA",
            AtomType::Phosphorus => "P",
            AtomType::Fluorine => "F",
            AtomType::Chlorine => "Cl",
            AtomType::Bromine => "Br",
            AtomType::Iodine => "I",
            AtomType::Hydrogen => "H",
            AtomType::HydrogenD => "HD",
            AtomType::Zinc => "Zn",
            AtomType::Calcium => "Ca",
            AtomType::Manganese => "Mn",
            AtomType::Magnesium => "Mg",
            AtomType::Iron => "Fe",
            AtomType::Unknown => "X",
        }
    }
}

/// X-Score atom types used by the Vina family of scoring functions.
///
/// The suffix encodes the chemistry: `H` hydrophobic, `P` polar without
/// hydrogen bonding, `D` donor, `A` acceptor, `DA` both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum XsType {
    CH,
    CP,
    NP,
    ND,
    NA,
    NDA,
    OP,
    OD,
    OA,
    ODA,
    SP,
    PP,
    FH,
    ClH,
    BrH,
    IH,
    MetD,
}

impl XsType {
    /// Vina van der Waals radius in Angstroms
    pub fn radius(&self) -> f64 {
        match self {
            XsType::CH | XsType::CP => 1.9,
            XsType::NP | XsType::ND | XsType::NA | XsType::NDA => 1.8,
            XsType::OP | XsType::OD | XsType::OA | XsType::ODA => 1.7,
            XsType::SP => 2.0,
            XsType::PP => 2.1,
            XsType::FH => 1.5,
            XsType::ClH => 1.8,
            XsType::BrH => 2.0,
            XsType::IH => 2.2,
            XsType::MetD => 1.2,
        }
    }

    pub fn is_hydrophobic(&self) -> bool {
        matches!(
            self,
            XsType::CH | XsType::FH | XsType::ClH | XsType::BrH | XsType::IH
        )
    }

    pub fn is_donor(&self) -> bool {
        matches!(
            self,
            XsType::ND | XsType::NDA | XsType::OD | XsType::ODA | XsType::MetD
        )
    }

    pub fn is_acceptor(&self) -> bool {
        matches!(self, XsType::NA | XsType::NDA | XsType::OA | XsType::ODA)
    }

    /// True when one side can donate and the other accept
    pub fn h_bond_possible(&self, other: XsType) -> bool {
        (self.is_donor() && other.is_acceptor()) || (self.is_acceptor() && other.is_donor())
    }

    /// Derive the X-Score type from the AutoDock type and bonding context.
    /// Returns `None` for hydrogens and unknown atoms, which do not take part in scoring.
    pub fn classify(
        atom_type: AtomType,
        bonded_to_heteroatom: bool,
        bonded_to_donor_hydrogen: bool,
    ) -> Option<XsType> {
        let xs = match atom_type {
            AtomType::Carbon | AtomType::Aromatic => {
                if bonded_to_heteroatom {
                    XsType::CP
                } else {
                    XsType::CH
                }
            }
            AtomType::Nitrogen => {
                if bonded_to_donor_hydrogen {
                    XsType::ND
                } else {
                    XsType::NP
                }
            }
            AtomType::NitrogenH => {
                if bonded_to_donor_hydrogen {
                    XsType::NDA
                } else {
                    XsType::NA
                }
            }
            AtomType::Oxygen => {
                if bonded_to_donor_hydrogen {
                    XsType::OD
                } else {
                    XsType::OP
                }
            }
            AtomType::OxygenH => {
                if bonded_to_donor_hydrogen {
                    XsType::ODA
                } else {
                    XsType::OA
                }
            }
            AtomType::Sulfur | AtomType::SulfurH => XsType::SP,
            AtomType::Phosphorus => XsType::PP,
            AtomType::Fluorine => XsType::FH,
            AtomType::Chlorine => XsType::ClH,
            AtomType::Bromine => XsType::BrH,
            AtomType::Iodine => XsType::IH,
            AtomType::Zinc
            | AtomType::Calcium
            | AtomType::Manganese
            | AtomType::Magnesium
            | AtomType::Iron => XsType::MetD,
            AtomType::Hydrogen | AtomType::HydrogenD | AtomType::Unknown => return None,
        };
        Some(xs)
    }

    pub fn name(&self) -> &'static str {
        match self {
            XsType::CH => "C_H",
            XsType::CP => "C_P",
            XsType::NP => "N_P",
            XsType::ND => "N_D",
            XsType::NA => "N_A",
            XsType::NDA => "N_DA",
            XsType::OP => "O_P",
            XsType::OD => "O_D",
            XsType::OA => "O_A",
            XsType::ODA => "O_DA",
            XsType::SP => "S_P",
            XsType::PP => "P_P",
            XsType::FH => "F_H",
            XsType::ClH => "Cl_H",
            XsType::BrH => "Br_H",
            XsType::IH => "I_H",
            XsType::MetD => "Met_D",
        }
    }
}

/// Represents an atom in 3D space
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Atom {
    /// Atom type
    pub atom_type: AtomType,

    /// X-Score type, assigned once bonds are known
    pub xs: Option<XsType>,

    /// 3D coordinates (in Angstroms)
    pub coordinates: Vector3<f64>,

    /// Atom name from PDB format (e.g., "CA", "N", "O")
    pub name: String,

    /// Atom serial number from PDB
    pub serial: u32,

    /// Residue name this atom belongs to
    pub residue_name: String,

    /// Residue number this atom belongs to
    pub residue_num: i32,

    /// Chain identifier
    pub chain_id: char,

    /// Partial charge
    pub charge: f64,
}

impl Atom {
    /// Create a new atom
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        atom_type: AtomType,
        coordinates: Vector3<f64>,
        name: String,
        serial: u32,
        residue_name: String,
        residue_num: i32,
        chain_id: char,
        charge: f64,
    ) -> Self {
        Self {
            atom_type,
            xs: None,
            coordinates,
            name,
            serial,
            residue_name,
            residue_num,
            chain_id,
            charge,
        }
    }

    /// Calculate distance to another atom
    pub fn distance(&self, other: &Atom) -> f64 {
        (self.coordinates - other.coordinates).norm()
    }

    pub fn is_hydrogen(&self) -> bool {
        self.atom_type.is_hydrogen()
    }

    /// Heavy atoms with an X-Score type are the only ones that are scored
    pub fn is_scored(&self) -> bool {
        self.xs.is_some()
    }

    /// Vina radius, falling back to the AutoDock radius for untyped atoms
    pub fn xs_radius(&self) -> f64 {
        self.xs.map(|x| x.radius()).unwrap_or_else(|| self.atom_type.radius())
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({}, {}, {}) [{}]",
            self.atom_type.to_pdbqt_string(),
            self.coordinates.x,
            self.coordinates.y,
            self.coordinates.z,
            self.charge
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    fn atom(atom_type: AtomType, x: f64) -> Atom {
        Atom::new(
            atom_type,
            Vector3::new(x, 0.0, 0.0),
            "X".to_string(),
            1,
            "UNL".to_string(),
            1,
            'A',
            0.0,
        )
    }

    #[test]
    fn test_atom_type_radius() {
        assert_eq!(AtomType::Carbon.radius(), 2.0);
        assert_eq!(AtomType::Nitrogen.radius(), 1.75);
        assert_eq!(AtomType::Oxygen.radius(), 1.6);
        assert_eq!(AtomType::Hydrogen.radius(), 1.0);
    }

    #[test]
    fn test_atom_type_from_pdbqt_string() {
        assert_eq!(AtomType::from_pdbqt_string("C"), AtomType::Carbon);
        assert_eq!(AtomType::from_pdbqt_string("A"), AtomType::Aromatic);
        assert_eq!(AtomType::from_pdbqt_string("NA"), AtomType::NitrogenH);
        assert_eq!(AtomType::from_pdbqt_string("OA"), AtomType::OxygenH);
        assert_eq!(AtomType::from_pdbqt_string("HD"), AtomType::HydrogenD);
        assert_eq!(AtomType::from_pdbqt_string(" Cl "), AtomType::Chlorine);
        assert_eq!(AtomType::from_pdbqt_string("UNKNOWN"), AtomType::Unknown);
    }

    #[test]
    fn test_pdbqt_string_round_trip() {
        for t in AtomType::ALL {
            if t != AtomType::Unknown {
                assert_eq!(AtomType::from_pdbqt_string(t.to_pdbqt_string()), t);
            }
        }
    }

    #[test]
    fn test_xs_classification() {
        assert_eq!(
            XsType::classify(AtomType::Carbon, false, false),
            Some(XsType::CH)
        );
        assert_eq!(
            XsType::classify(AtomType::Aromatic, true, false),
            Some(XsType::CP)
        );
        assert_eq!(
            XsType::classify(AtomType::Nitrogen, false, true),
            Some(XsType::ND)
        );
        assert_eq!(
            XsType::classify(AtomType::OxygenH, false, true),
            Some(XsType::ODA)
        );
        assert_eq!(
            XsType::classify(AtomType::Zinc, false, false),
            Some(XsType::MetD)
        );
        assert_eq!(XsType::classify(AtomType::HydrogenD, false, false), None);
    }

    #[test]
    fn test_h_bond_possible() {
        assert!(XsType::ND.h_bond_possible(XsType::OA));
        assert!(XsType::OA.h_bond_possible(XsType::ODA));
        assert!(XsType::MetD.h_bond_possible(XsType::NA));
        assert!(!XsType::CH.h_bond_possible(XsType::OA));
        assert!(!XsType::OA.h_bond_possible(XsType::OA));
    }

    #[test]
    fn test_atom_distance() {
        let atom1 = atom(AtomType::Carbon, 0.0);
        let mut atom2 = atom(AtomType::Carbon, 0.0);
        atom2.coordinates = Vector3::new(1.0, 1.0, 1.0);

        // Distance should be sqrt(3)
        assert!((atom1.distance(&atom2) - 1.732).abs() < 0.001);
    }

    #[test]
    fn test_xs_radius_fallback() {
        let mut carbon = atom(AtomType::Carbon, 0.0);
        assert_eq!(carbon.xs_radius(), 2.0);
        carbon.xs = Some(XsType::CH);
        assert_eq!(carbon.xs_radius(), 1.9);
        assert!(carbon.is_scored());
    }

    #[test]
    fn test_atom_display() {
        let mut a = atom(AtomType::Carbon, 1.0);
        a.coordinates = Vector3::new(1.0, 2.0, 3.0);
        a.charge = 0.5;
        assert_eq!(format!("{}", a), "C(1, 2, 3) [0.5]");
    }
}
