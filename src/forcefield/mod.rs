//! Scoring functions assembled from weighted interaction terms

pub mod ad4;
pub mod terms;
pub mod vina;

pub use terms::{ConfIndependentTerm, PairEnergy, ProbeType, Term};

use crate::atom::Atom;
use crate::molecule::LigandDescriptors;
use thiserror::Error;

/// Names accepted by the `scoring` option
pub const BUILTIN_SCORING_FUNCTIONS: [&str; 3] = ["vina", "vinardo", "ad4_scoring"];

/// Errors that can occur in forcefields
#[derive(Error, Debug)]
pub enum ForceFieldError {
    #[error("Invalid builtin scoring function: {name}. Options are: {}", BUILTIN_SCORING_FUNCTIONS.join(", "))]
    UnknownScoringFunction { name: String },

    #[error("Unknown term: {0}")]
    UnknownTerm(String),

    #[error("Invalid term {term}: {reason}")]
    InvalidTerm { term: String, reason: String },

    #[error("Custom scoring line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Scoring function has no terms")]
    Empty,
}

/// Trait representing a forcefield that can calculate interaction energies
/// The Send + Sync bounds enable parallel docking with rayon
pub trait ForceField: Send + Sync {
    /// Get the name of the forcefield
    fn name(&self) -> &str;

    /// Distance beyond which every pair term vanishes
    fn cutoff(&self) -> f64;

    /// Whether any term depends on ligand partial charges
    fn uses_charge(&self) -> bool;

    /// Weighted energy between a ligand probe and another atom at distance `r`
    fn pair_energy(&self, probe: ProbeType, other: &Atom, r: f64) -> PairEnergy;

    /// Names of the pair terms, in evaluation order
    fn term_names(&self) -> Vec<String>;

    /// Unweighted value of every pair term, with the ligand charge applied
    fn unweighted_terms(&self, probe: ProbeType, ligand_charge: f64, other: &Atom, r: f64) -> Vec<f64>;

    /// Apply the conformation-independent terms to an energy to get an affinity.
    /// Default implementation returns the energy unchanged
    fn apply_conf_independent(&self, energy: f64, _ligand: &LigandDescriptors) -> f64 {
        energy
    }

    /// Unweighted value of each conformation-independent term for a ligand
    fn conf_independent_values(&self, _ligand: &LigandDescriptors) -> Vec<(String, f64)> {
        Vec::new()
    }
}

/// Weighted list of terms, the runtime form of a builtin or custom scoring function
#[derive(Debug, Clone)]
pub struct ScoringFunction {
    name: String,
    terms: Vec<(f64, Term)>,
    conf_independent: Vec<(f64, ConfIndependentTerm)>,
    scale: f64,
}

impl ScoringFunction {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            terms: Vec::new(),
            conf_independent: Vec::new(),
            scale: 1.0,
        }
    }

    pub fn add_term(&mut self, weight: f64, term: Term) -> &mut Self {
        self.terms.push((weight, term));
        self
    }

    pub fn add_conf_independent(&mut self, weight: f64, term: ConfIndependentTerm) -> &mut Self {
        self.conf_independent.push((weight, term));
        self
    }

    /// Add a term given in smina syntax, pair or conformation-independent
    pub fn add(&mut self, weight: f64, term: &str) -> Result<&mut Self, ForceFieldError> {
        if let Ok(conf_independent) = term.parse::<ConfIndependentTerm>() {
            return Ok(self.add_conf_independent(weight, conf_independent));
        }
        let term = term.parse::<Term>()?;
        Ok(self.add_term(weight, term))
    }

    /// One of `BUILTIN_SCORING_FUNCTIONS`
    pub fn builtin(name: &str) -> Result<Self, ForceFieldError> {
        match name {
            "vina" => Ok(vina::VinaParams::default().scoring_function("vina")),
            "vinardo" => Ok(vina::VinaParams::vinardo().scoring_function("vinardo")),
            "ad4_scoring" => Ok(ad4::AD4Params::default().scoring_function()),
            _ => Err(ForceFieldError::UnknownScoringFunction {
                name: name.to_string(),
            }),
        }
    }

    /// Parse a custom scoring file: one `weight term` per line, `#` starts a comment
    pub fn from_custom_str(name: &str, text: &str) -> Result<Self, ForceFieldError> {
        let mut function = ScoringFunction::new(name);

        for (i, raw) in text.lines().enumerate() {
            let line = raw.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let mut fields = line.split_whitespace();
            let (weight, term) = match (fields.next(), fields.next()) {
                (Some(weight), Some(term)) => (weight, term),
                _ => {
                    return Err(ForceFieldError::Parse {
                        line: i + 1,
                        message: format!("expected 'weight term', found '{}'", line),
                    })
                }
            };
            let weight = weight.parse::<f64>().map_err(|_| ForceFieldError::Parse {
                line: i + 1,
                message: format!("invalid weight '{}'", weight),
            })?;
            function.add(weight, term).map_err(|e| ForceFieldError::Parse {
                line: i + 1,
                message: e.to_string(),
            })?;
        }

        if function.terms.is_empty() && function.conf_independent.is_empty() {
            return Err(ForceFieldError::Empty);
        }
        Ok(function)
    }

    /// Multiply all pair-term weights, used to mix with a user grid
    pub fn set_scaling_factor(&mut self, scale: f64) {
        self.scale = scale;
    }

    pub fn terms(&self) -> &[(f64, Term)] {
        &self.terms
    }

    pub fn conf_independent_terms(&self) -> &[(f64, ConfIndependentTerm)] {
        &self.conf_independent
    }

    /// Lines in custom scoring file syntax
    pub fn describe(&self) -> Vec<String> {
        self.terms
            .iter()
            .map(|(w, t)| format!("{:.6}  {}", w, t))
            .chain(
                self.conf_independent
                    .iter()
                    .map(|(w, t)| format!("{:.6}  {}", w, t)),
            )
            .collect()
    }
}

impl ForceField for ScoringFunction {
    fn name(&self) -> &str {
        &self.name
    }

    fn cutoff(&self) -> f64 {
        self.terms
            .iter()
            .map(|(_, t)| t.cutoff())
            .fold(0.0, f64::max)
    }

    fn uses_charge(&self) -> bool {
        self.terms.iter().any(|(_, t)| t.uses_charge())
    }

    fn pair_energy(&self, probe: ProbeType, other: &Atom, r: f64) -> PairEnergy {
        let mut energy = PairEnergy::default();
        for (weight, term) in &self.terms {
            energy += term.eval(probe, other, r).scaled(*weight);
        }
        energy.scaled(self.scale)
    }

    fn term_names(&self) -> Vec<String> {
        self.terms.iter().map(|(_, t)| t.to_string()).collect()
    }

    fn unweighted_terms(&self, probe: ProbeType, ligand_charge: f64, other: &Atom, r: f64) -> Vec<f64> {
        self.terms
            .iter()
            .map(|(_, t)| t.eval(probe, other, r).total(ligand_charge))
            .collect()
    }

    fn apply_conf_independent(&self, energy: f64, ligand: &LigandDescriptors) -> f64 {
        self.conf_independent
            .iter()
            .fold(energy, |x, (weight, term)| term.apply(x, *weight, ligand))
    }

    fn conf_independent_values(&self, ligand: &LigandDescriptors) -> Vec<(String, f64)> {
        self.conf_independent
            .iter()
            .map(|(_, term)| (term.name().to_string(), term.apply(0.0, 1.0, ligand)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::{AtomType, XsType};
    use assert_approx_eq::assert_approx_eq;
    use nalgebra::Vector3;

    #[test]
    fn test_builtins() {
        for name in BUILTIN_SCORING_FUNCTIONS {
            let sf = ScoringFunction::builtin(name).unwrap();
            assert_eq!(sf.name(), name);
            assert!(!sf.terms().is_empty());
            assert_eq!(sf.cutoff(), 8.0);
        }
        assert!(!ScoringFunction::builtin("vina").unwrap().uses_charge());
        assert!(ScoringFunction::builtin("ad4_scoring").unwrap().uses_charge());
        let err = ScoringFunction::builtin("dkoes").unwrap_err();
        assert!(err.to_string().contains("vinardo"));
    }

    #[test]
    fn test_custom_file() {
        let text = "\
# vina without the second gaussian
-0.035579    gauss(o=0,_w=0.5,_c=8)
0.840245     repulsion(o=0,_c=8)   # steric clash

1.923        num_tors_div
";
        let sf = ScoringFunction::from_custom_str("custom", text).unwrap();
        assert_eq!(sf.terms().len(), 2);
        assert_eq!(sf.conf_independent_terms().len(), 1);
        assert_eq!(sf.term_names()[1], "repulsion(o=0,_c=8)");
        assert_eq!(sf.describe().len(), 3);

        match ScoringFunction::from_custom_str("bad", "1.0 gauss(o=0,_w=0.5,_c=8)\nabc repulsion(o=0,_c=8)\n") {
            Err(ForceFieldError::Parse { line, .. }) => assert_eq!(line, 2),
            other => panic!("unexpected: {:?}", other),
        }
        assert!(matches!(
            ScoringFunction::from_custom_str("empty", "# nothing\n"),
            Err(ForceFieldError::Empty)
        ));
    }

    #[test]
    fn test_scaling_factor() {
        let mut sf = ScoringFunction::builtin("vina").unwrap();
        let probe = ProbeType {
            ad: AtomType::Carbon,
            xs: XsType::CH,
        };
        let mut other = Atom::new(
            AtomType::Carbon,
            Vector3::zeros(),
            "C".to_string(),
            1,
            "UNL".to_string(),
            1,
            'A',
            0.0,
        );
        other.xs = Some(XsType::CH);
        let full = sf.pair_energy(probe, &other, 4.0).base;
        sf.set_scaling_factor(0.25);
        assert_approx_eq!(sf.pair_energy(probe, &other, 4.0).base, full * 0.25);
        assert_eq!(sf.unweighted_terms(probe, 0.0, &other, 4.0).len(), 5);
    }
}
