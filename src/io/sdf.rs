//! MDL SDF (V2000) output for docked poses

use std::io::Write;

use super::IoError;
use crate::optimization::DockingResult;

/// The V2000 counts line has three columns for atoms and bonds
const V2000_MAX_ENTRIES: usize = 999;

/// Write one pose as an SDF record terminated by `$$$$`
pub fn write_sdf_record<W: Write>(writer: &mut W, result: &DockingResult) -> Result<(), IoError> {
    let molecule = &result.molecule;
    if molecule.atoms.len() > V2000_MAX_ENTRIES || molecule.bonds.len() > V2000_MAX_ENTRIES {
        return Err(IoError::UnsupportedFormat(format!(
            "{} has too many atoms or bonds for a V2000 molfile",
            molecule.name
        )));
    }

    // header block
    writeln!(writer, "{}", molecule.name)?;
    writeln!(writer, "  sminalib          3D")?;
    writeln!(writer)?;
    writeln!(
        writer,
        "{:>3}{:>3}  0  0  0  0  0  0  0  0999 V2000",
        molecule.atoms.len(),
        molecule.bonds.len()
    )?;

    for atom in &molecule.atoms {
        writeln!(
            writer,
            "{:>10.4}{:>10.4}{:>10.4} {:<3} 0  0  0  0  0  0  0  0  0  0  0  0",
            atom.coordinates.x,
            atom.coordinates.y,
            atom.coordinates.z,
            atom.atom_type.element()
        )?;
    }

    for bond in &molecule.bonds {
        writeln!(
            writer,
            "{:>3}{:>3}  1  0  0  0  0",
            bond.atom1_idx + 1,
            bond.atom2_idx + 1
        )?;
    }
    writeln!(writer, "M  END")?;

    writeln!(writer, "> <minimizedAffinity>")?;
    writeln!(writer, "{:.5}", result.energy)?;
    writeln!(writer)?;

    if let Some(rmsd) = result.rmsd {
        writeln!(writer, "> <minimizedRMSD>")?;
        writeln!(writer, "{:.5}", rmsd)?;
        writeln!(writer)?;
    }

    if let Some(terms) = &result.atom_terms {
        writeln!(writer, "> <atomic_interaction_terms>")?;
        for atom_terms in terms {
            let values: Vec<String> = atom_terms.values.iter().map(|v| format!("{:.5}", v)).collect();
            writeln!(writer, "{} {}", atom_terms.atom + 1, values.join(" "))?;
        }
        writeln!(writer)?;
    }

    writeln!(writer, "$$$$")?;
    Ok(())
}

/// Write all poses, one record each
pub fn write_sdf<W: Write>(results: &[DockingResult], writer: &mut W) -> Result<(), IoError> {
    for result in results {
        write_sdf_record(writer, result)?;
    }
    Ok(())
}
