//! Parameters of the Vina and Vinardo scoring functions

use crate::forcefield::{ConfIndependentTerm, ScoringFunction, Term};

/// Weights and shapes of the Vina family of terms
#[derive(Debug, Clone)]
pub struct VinaParams {
    // Weights for each component of the scoring function
    pub weight_gauss1: f64,
    pub weight_gauss2: f64,
    pub weight_repulsion: f64,
    pub weight_hydrophobic: f64,
    pub weight_hydrogen: f64,
    /// Weight of `num_tors_div`, in smina's convention
    pub weight_rot: f64,

    // Gaussian function parameters; `gauss2` is absent when its weight is zero
    pub gauss1_width: f64,
    pub gauss2_offset: f64,
    pub gauss2_width: f64,

    // Piecewise linear terms, on surface distance
    pub hydrophobic_good: f64,
    pub hydrophobic_bad: f64,
    pub hydrogen_good: f64,
    pub hydrogen_bad: f64,

    pub cutoff: f64,
}

impl Default for VinaParams {
    fn default() -> Self {
        // Default parameters from the Vina paper
        Self {
            weight_gauss1: -0.035579,
            weight_gauss2: -0.005156,
            weight_repulsion: 0.840245,
            weight_hydrophobic: -0.035069,
            weight_hydrogen: -0.587439,
            weight_rot: 5.0 * 0.05846 / 0.1 - 1.0,

            gauss1_width: 0.5,
            gauss2_offset: 3.0,
            gauss2_width: 2.0,

            hydrophobic_good: 0.5,
            hydrophobic_bad: 1.5,
            hydrogen_good: -0.7,
            hydrogen_bad: 0.0,

            cutoff: 8.0,
        }
    }
}

impl VinaParams {
    /// Vinardo: a single wider gaussian and retuned linear terms
    pub fn vinardo() -> Self {
        Self {
            weight_gauss1: -0.045,
            weight_gauss2: 0.0,
            weight_repulsion: 0.8,
            weight_hydrophobic: -0.035,
            weight_hydrogen: -0.6,
            gauss1_width: 0.8,
            hydrophobic_good: 0.0,
            hydrophobic_bad: 2.5,
            hydrogen_good: -0.6,
            hydrogen_bad: 0.0,
            ..Self::default()
        }
    }

    pub fn scoring_function(&self, name: &str) -> ScoringFunction {
        let mut function = ScoringFunction::new(name);
        function.add_term(
            self.weight_gauss1,
            Term::Gauss {
                offset: 0.0,
                width: self.gauss1_width,
                cutoff: self.cutoff,
            },
        );
        if self.weight_gauss2 != 0.0 {
            function.add_term(
                self.weight_gauss2,
                Term::Gauss {
                    offset: self.gauss2_offset,
                    width: self.gauss2_width,
                    cutoff: self.cutoff,
                },
            );
        }
        function
            .add_term(
                self.weight_repulsion,
                Term::Repulsion {
                    offset: 0.0,
                    cutoff: self.cutoff,
                },
            )
            .add_term(
                self.weight_hydrophobic,
                Term::Hydrophobic {
                    good: self.hydrophobic_good,
                    bad: self.hydrophobic_bad,
                    cutoff: self.cutoff,
                },
            )
            .add_term(
                self.weight_hydrogen,
                Term::NonDirHBond {
                    good: self.hydrogen_good,
                    bad: self.hydrogen_bad,
                    cutoff: self.cutoff,
                },
            )
            .add_conf_independent(self.weight_rot, ConfIndependentTerm::NumTorsDiv);
        function
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forcefield::ForceField;

    #[test]
    fn test_vina_matches_smina_term_list() {
        let sf = VinaParams::default().scoring_function("vina");
        assert_eq!(
            sf.term_names(),
            vec![
                "gauss(o=0,_w=0.5,_c=8)",
                "gauss(o=3,_w=2,_c=8)",
                "repulsion(o=0,_c=8)",
                "hydrophobic(g=0.5,_b=1.5,_c=8)",
                "non_dir_h_bond(g=-0.7,_b=0,_c=8)",
            ]
        );
        assert_eq!(sf.conf_independent_terms().len(), 1);
    }

    #[test]
    fn test_vinardo_drops_second_gaussian() {
        let sf = VinaParams::vinardo().scoring_function("vinardo");
        assert_eq!(sf.terms().len(), 4);
        assert_eq!(sf.term_names()[0], "gauss(o=0,_w=0.8,_c=8)");
        assert_eq!(sf.term_names()[2], "hydrophobic(g=0,_b=2.5,_c=8)");
    }
}
