//! Input/output functionality for molecular docking

pub mod sdf;

pub use sdf::{write_sdf, write_sdf_record};

use nalgebra::Vector3;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::atom::{Atom, AtomType};
use crate::molecule::{Molecule, Torsion};
use crate::optimization::DockingResult;

/// Errors that can occur during file I/O operations
#[derive(Error, Debug)]
pub enum IoError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not open {} for {mode}: {source}", path.display())]
    Open {
        path: PathBuf,
        mode: &'static str,
        source: std::io::Error,
    },

    #[error("Parse error in {file} at line {line}: {message}")]
    Parse {
        file: String,
        line: usize,
        message: String,
    },

    #[error("Invalid file format: {0}")]
    InvalidFormat(String),

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),
}

/// Open a file for reading, keeping the path in the error
pub fn open_for_reading(path: &Path) -> Result<BufReader<File>, IoError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| IoError::Open {
            path: path.to_path_buf(),
            mode: "reading",
            source,
        })
}

/// Create a file for writing, keeping the path in the error
pub fn create_for_writing(path: &Path) -> Result<File, IoError> {
    File::create(path).map_err(|source| IoError::Open {
        path: path.to_path_buf(),
        mode: "writing",
        source,
    })
}

fn molecule_name(path: &Path) -> &str {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown")
}

/// Parse the first model of a PDBQT file into a Molecule
pub fn parse_pdbqt<P: AsRef<Path>>(path: P) -> Result<Molecule, IoError> {
    let mut models = parse_pdbqt_models(path.as_ref())?;
    Ok(models.remove(0))
}

/// Parse every `MODEL` of a PDBQT file. A file without `MODEL` records is one model.
pub fn parse_pdbqt_models<P: AsRef<Path>>(path: P) -> Result<Vec<Molecule>, IoError> {
    let path = path.as_ref();
    let reader = open_for_reading(path)?;
    let name = molecule_name(path);
    let mut lines = Vec::new();
    for line in reader.lines() {
        lines.push(line?);
    }
    parse_lines(name, lines.iter().map(String::as_str))
}

/// Parse PDBQT text held in memory
pub fn parse_pdbqt_str(name: &str, text: &str) -> Result<Vec<Molecule>, IoError> {
    parse_lines(name, text.lines())
}

/// A BRANCH record whose ENDBRANCH has not been seen yet
struct OpenBranch {
    from_serial: u32,
    to_serial: u32,
    atoms: Vec<usize>,
}

/// Builds one molecule from the records between MODEL and ENDMDL
struct ModelBuilder {
    molecule: Molecule,
    serials: HashMap<u32, usize>,
    branches: Vec<OpenBranch>,
}

impl ModelBuilder {
    fn new(name: &str) -> Self {
        Self {
            molecule: Molecule::new(name),
            serials: HashMap::new(),
            branches: Vec::new(),
        }
    }

    fn is_empty(&self) -> bool {
        self.molecule.atoms.is_empty()
    }

    fn add_atom(&mut self, atom: Atom) {
        let serial = atom.serial;
        let idx = self.molecule.add_atom(atom);
        self.serials.insert(serial, idx);
        if let Some(branch) = self.branches.last_mut() {
            branch.atoms.push(idx);
        }
    }

    fn close_branch(&mut self, file: &str, line: usize) -> Result<(), IoError> {
        let branch = self.branches.pop().ok_or_else(|| IoError::Parse {
            file: file.to_string(),
            line,
            message: "ENDBRANCH without matching BRANCH".to_string(),
        })?;

        let lookup = |serial: u32| {
            self.serials.get(&serial).copied().ok_or_else(|| IoError::Parse {
                file: file.to_string(),
                line,
                message: format!("BRANCH refers to unknown atom serial {}", serial),
            })
        };
        let from = lookup(branch.from_serial)?;
        let to = lookup(branch.to_serial)?;

        let bond_idx = match self.molecule.find_bond(from, to) {
            Some(idx) => {
                self.molecule.bonds[idx].rotatable = true;
                idx
            }
            None => self
                .molecule
                .add_bond(from, to, true)
                .map_err(|e| IoError::InvalidFormat(e.to_string()))?,
        };

        self.molecule.torsions.push(Torsion {
            bond_idx,
            moving_atoms: branch.atoms.clone(),
            depth: self.branches.len() + 1,
        });

        if let Some(parent) = self.branches.last_mut() {
            parent.atoms.extend(branch.atoms);
        }
        Ok(())
    }

    fn finish(mut self, file: &str) -> Result<Molecule, IoError> {
        if !self.branches.is_empty() {
            return Err(IoError::InvalidFormat(format!(
                "{}: {} BRANCH record(s) never closed",
                file,
                self.branches.len()
            )));
        }
        self.molecule.infer_bonds();
        self.molecule.assign_xs_types();
        Ok(self.molecule)
    }
}

fn parse_lines<'a, I>(name: &str, lines: I) -> Result<Vec<Molecule>, IoError>
where
    I: Iterator<Item = &'a str>,
{
    let mut models = Vec::new();
    let mut current = ModelBuilder::new(name);

    for (i, line) in lines.enumerate() {
        let line_number = i + 1;

        // Skip empty lines and comments
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }

        if line.starts_with("ATOM") || line.starts_with("HETATM") {
            let atom = parse_pdbqt_atom(line, name, line_number)?;
            current.add_atom(atom);
        } else if line.starts_with("ENDMDL") {
            let finished = std::mem::replace(&mut current, ModelBuilder::new(name));
            if !finished.is_empty() {
                models.push(finished.finish(name)?);
            }
        } else if line.starts_with("ENDBRANCH") {
            current.close_branch(name, line_number)?;
        } else if line.starts_with("BRANCH") {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() != 3 {
                return Err(IoError::Parse {
                    file: name.to_string(),
                    line: line_number,
                    message: format!("Invalid BRANCH record: {}", line),
                });
            }
            let serial = |s: &str| {
                s.parse::<u32>().map_err(|_| IoError::Parse {
                    file: name.to_string(),
                    line: line_number,
                    message: format!("Invalid BRANCH atom serial: {}", s),
                })
            };
            current.branches.push(OpenBranch {
                from_serial: serial(parts[1])?,
                to_serial: serial(parts[2])?,
                atoms: Vec::new(),
            });
        } else if line.starts_with("TORSDOF") {
            current.molecule.torsdof = line
                .split_whitespace()
                .nth(1)
                .and_then(|s| s.parse::<usize>().ok());
        }
        // MODEL, ROOT, ENDROOT, REMARK and anything else carry no atoms
    }

    if !current.is_empty() {
        models.push(current.finish(name)?);
    }

    if models.is_empty() {
        return Err(IoError::InvalidFormat(format!("{}: no atoms found", name)));
    }
    Ok(models)
}

/// Fixed-column field, empty when the line is too short
fn column(line: &str, start: usize, end: usize) -> &str {
    let end = end.min(line.len());
    if start >= end {
        return "";
    }
    line.get(start..end).unwrap_or("").trim()
}

/// Parse an atom record from a PDBQT file
fn parse_pdbqt_atom(line: &str, file: &str, line_number: usize) -> Result<Atom, IoError> {
    let parse_error = |message: String| IoError::Parse {
        file: file.to_string(),
        line: line_number,
        message,
    };

    if line.len() < 54 {
        return Err(parse_error(format!("Line too short for atom record: {}", line)));
    }

    let serial = column(line, 6, 11)
        .parse::<u32>()
        .map_err(|_| parse_error(format!("Invalid atom serial number: {}", column(line, 6, 11))))?;

    let name = column(line, 12, 16).to_string();
    let residue_name = column(line, 17, 20).to_string();
    let chain_id = column(line, 21, 22).chars().next().unwrap_or(' ');
    let residue_num = column(line, 22, 26).parse::<i32>().unwrap_or(0);

    let coordinate = |start: usize, axis: &str| {
        column(line, start, start + 8)
            .parse::<f64>()
            .map_err(|_| parse_error(format!("Invalid {} coordinate: {}", axis, column(line, start, start + 8))))
    };
    let x = coordinate(30, "x")?;
    let y = coordinate(38, "y")?;
    let z = coordinate(46, "z")?;

    let charge = column(line, 68, 76).parse::<f64>().unwrap_or(0.0);

    let type_field = column(line, 77, 79);
    let atom_type = if type_field.is_empty() {
        // fall back to the leading letters of the atom name
        let element: String = name.chars().take_while(|c| c.is_ascii_alphabetic()).take(1).collect();
        AtomType::from_pdbqt_string(&element)
    } else {
        AtomType::from_pdbqt_string(type_field)
    };

    if atom_type == AtomType::Unknown {
        log::debug!("{}:{}: unknown atom type '{}'", file, line_number, type_field);
    }

    Ok(Atom::new(
        atom_type,
        Vector3::new(x, y, z),
        name,
        serial,
        residue_name,
        residue_num,
        chain_id,
        charge,
    ))
}

fn truncated(s: &str, width: usize) -> String {
    s.chars().take(width).collect()
}

/// Format one PDBQT atom record
pub fn pdbqt_atom_line(serial: usize, atom: &Atom, coordinates: &Vector3<f64>) -> String {
    format!(
        "{:<6}{:>5} {:<4} {:>3} {:1}{:>4}    {:>8.3}{:>8.3}{:>8.3}{:>6.2}{:>6.2}    {:>6.3} {:<2}",
        "ATOM",
        serial,
        truncated(&atom.name, 4),
        truncated(&atom.residue_name, 3),
        atom.chain_id,
        atom.residue_num,
        coordinates.x,
        coordinates.y,
        coordinates.z,
        1.0,
        0.0,
        atom.charge,
        atom.atom_type.to_pdbqt_string()
    )
}

/// Write docking results as PDBQT models
pub fn write_docking_results<W: Write>(
    results: &[DockingResult],
    writer: &mut W,
) -> Result<(), IoError> {
    for (i, result) in results.iter().enumerate() {
        writeln!(writer, "MODEL {}", i + 1)?;
        writeln!(
            writer,
            "REMARK VINA RESULT: {:>9.1}  {:>9.3}  {:>9.3}",
            result.energy,
            result.rmsd_lb.unwrap_or(0.0),
            result.rmsd_ub.unwrap_or(0.0)
        )?;
        if let Some(rmsd) = result.rmsd {
            writeln!(writer, "REMARK MINIMIZED RMSD: {:.3}", rmsd)?;
        }
        writeln!(writer, "REMARK  Name = {}", result.molecule.name)?;

        for (j, atom) in result.molecule.atoms.iter().enumerate() {
            writeln!(writer, "{}", pdbqt_atom_line(j + 1, atom, &atom.coordinates))?;
        }
        if let Some(torsdof) = result.molecule.torsdof {
            writeln!(writer, "TORSDOF {}", torsdof)?;
        }

        writeln!(writer, "ENDMDL")?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::XsType;

    const ETHANOL: &str = "\
REMARK  test ligand
ROOT
ATOM      1  C1  UNL     1       0.000   0.000   0.000  0.00  0.00     0.040 C
ATOM      2  C2  UNL     1       1.500   0.000   0.000  0.00  0.00     0.200 C
ENDROOT
BRANCH   2   3
ATOM      3  O1  UNL     1       2.000   1.400   0.000  0.00  0.00    -0.390 OA
ATOM      4  H1  UNL     1       2.900   1.500   0.000  0.00  0.00     0.210 HD
ENDBRANCH   2   3
TORSDOF 1
";

    #[test]
    fn test_parse_branches_by_serial() {
        let models = parse_pdbqt_str("ethanol", ETHANOL).unwrap();
        assert_eq!(models.len(), 1);
        let mol = &models[0];
        assert_eq!(mol.atoms.len(), 4);
        assert_eq!(mol.torsions.len(), 1);
        assert_eq!(mol.torsions[0].moving_atoms, vec![2, 3]);
        let bond = &mol.bonds[mol.torsions[0].bond_idx];
        assert_eq!((bond.atom1_idx, bond.atom2_idx), (1, 2));
        assert!(bond.rotatable);
        assert_eq!(mol.torsdof, Some(1));
        assert_eq!(mol.atoms[2].xs, Some(XsType::ODA));
        assert!((mol.atoms[2].charge + 0.39).abs() < 1e-9);
    }

    #[test]
    fn test_parse_multiple_models() {
        let text = format!("MODEL 1\n{}ENDMDL\nMODEL 2\n{}ENDMDL\n", ETHANOL, ETHANOL);
        let models = parse_pdbqt_str("ethanol", &text).unwrap();
        assert_eq!(models.len(), 2);
        assert_eq!(models[1].atoms.len(), 4);
    }

    #[test]
    fn test_parse_errors() {
        let unclosed = "BRANCH 1 2\nATOM      1  C1  UNL     1       0.000   0.000   0.000  0.00  0.00     0.000 C \n";
        assert!(matches!(
            parse_pdbqt_str("bad", unclosed),
            Err(IoError::InvalidFormat(_))
        ));

        let bad_coord = "ATOM      1  C1  UNL     1       abc     0.000   0.000  0.00  0.00     0.000 C \n";
        match parse_pdbqt_str("bad", bad_coord) {
            Err(IoError::Parse { line, .. }) => assert_eq!(line, 1),
            other => panic!("unexpected result: {:?}", other.map(|m| m.len())),
        }

        assert!(parse_pdbqt_str("empty", "REMARK nothing\n").is_err());
        assert!(matches!(
            parse_pdbqt("/nonexistent/ligand.pdbqt"),
            Err(IoError::Open { .. })
        ));
    }

    #[test]
    fn test_atom_line_columns() {
        let models = parse_pdbqt_str("ethanol", ETHANOL).unwrap();
        let atom = &models[0].atoms[2];
        let line = pdbqt_atom_line(3, atom, &atom.coordinates);
        assert_eq!(&line[0..6], "ATOM  ");
        assert_eq!(line[6..11].trim(), "3");
        assert_eq!(line[30..38].trim(), "2.000");
        assert_eq!(line[70..76].trim(), "-0.390");
        assert_eq!(line[77..].trim(), "OA");

        // what we write, we can read back
        let reparsed = parse_pdbqt_atom(&line, "line", 1).unwrap();
        assert_eq!(reparsed.atom_type, AtomType::OxygenH);
        assert!((reparsed.coordinates - atom.coordinates).norm() < 1e-6);
    }
}
