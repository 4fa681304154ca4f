//! Parameters of the AutoDock4 scoring function

use crate::forcefield::{ConfIndependentTerm, ScoringFunction, Term};

/// Parameters for AutoDock4 forcefield
#[derive(Debug, Clone)]
pub struct AD4Params {
    // Weights for each component of the scoring function
    pub weight_vdw: f64,
    pub weight_hbond: f64,
    pub weight_desolv: f64,
    pub weight_elec: f64,
    pub weight_tors: f64,

    // Desolvation parameters
    pub desolvation_sigma: f64,
    pub solvation_q: f64,

    /// Energy cap shared by the singular terms
    pub cap: f64,
    pub cutoff: f64,
}

impl Default for AD4Params {
    fn default() -> Self {
        Self {
            weight_vdw: 0.156,
            weight_hbond: -0.0974,
            weight_desolv: 0.1159,
            weight_elec: 0.1465,
            weight_tors: 0.2744,

            desolvation_sigma: 3.6,
            solvation_q: 0.01097,

            cap: 100.0,
            cutoff: 8.0,
        }
    }
}

impl AD4Params {
    pub fn scoring_function(&self) -> ScoringFunction {
        let mut function = ScoringFunction::new("ad4_scoring");
        function
            .add_term(
                self.weight_vdw,
                Term::Vdw {
                    i: 6,
                    j: 12,
                    smoothing: 0.0,
                    cap: self.cap,
                    cutoff: self.cutoff,
                },
            )
            .add_term(
                self.weight_hbond,
                Term::NonDirHBondLj {
                    offset: -0.7,
                    cap: self.cap,
                    cutoff: self.cutoff,
                },
            )
            .add_term(
                self.weight_desolv,
                Term::Ad4Solvation {
                    desolvation_sigma: self.desolvation_sigma,
                    solvation_q: self.solvation_q,
                    charge_dependent: true,
                    cutoff: self.cutoff,
                },
            )
            .add_term(
                self.weight_elec,
                Term::Electrostatic {
                    i: 1,
                    cap: self.cap,
                    distance_dependent: false,
                    cutoff: self.cutoff,
                },
            )
            .add_conf_independent(self.weight_tors, ConfIndependentTerm::NumTorsAdd);
        function
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forcefield::ForceField;

    #[test]
    fn test_ad4_term_list() {
        let sf = AD4Params::default().scoring_function();
        assert_eq!(sf.name(), "ad4_scoring");
        assert_eq!(
            sf.term_names(),
            vec![
                "vdw(i=6,_j=12,_s=0,_^=100,_c=8)",
                "non_dir_h_bond_lj(o=-0.7,_^=100,_c=8)",
                "ad4_solvation(d-sigma=3.6,_s/q=0.01097,_q=1,_c=8)",
                "electrostatic(i=1,_^=100,_d=0,_c=8)",
            ]
        );
        assert_eq!(
            sf.conf_independent_terms()[0].1,
            ConfIndependentTerm::NumTorsAdd
        );
    }
}
