//! Local optimization module using gradient-based methods
//!
//! This module implements L-BFGS local optimization over the ligand's
//! position, orientation and torsions for refining docking poses.

use nalgebra::DVector;

use crate::molecule::Conformation;
use crate::optimization::{OptimizationError, Pose};
use crate::scoring::{PreparedLigand, Scorer};

/// Line search used by the local optimizer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineSearch {
    /// Armijo backtracking, cheap and used during the global search
    Backtracking,
    /// Strong Wolfe conditions, used for minimization
    Accurate,
}

/// Parameters for local optimization
#[derive(Debug, Clone)]
pub struct LocalOptimizerParams {
    /// Step size for finite difference gradient computation
    pub gradient_step: f64,

    /// Initial step size for line search
    pub initial_step: f64,

    /// Convergence tolerance for energy
    pub energy_tolerance: f64,

    /// Convergence tolerance for gradient
    pub gradient_tolerance: f64,

    /// Maximum number of iterations
    pub max_iterations: usize,

    /// Armijo parameter for line search (c1)
    pub armijo_c1: f64,

    /// Wolfe parameter for line search (c2)
    pub wolfe_c2: f64,

    /// Every gradient component is clamped to this magnitude
    pub force_cap: f64,

    pub line_search: LineSearch,
}

impl Default for LocalOptimizerParams {
    fn default() -> Self {
        Self {
            gradient_step: 1e-4,      // Angstroms for translation, radians for rotation
            initial_step: 1.0,        // Initial step size
            energy_tolerance: 1e-6,   // kcal/mol
            gradient_tolerance: 1e-4, // Gradient norm threshold
            max_iterations: 100,      // Max BFGS iterations
            armijo_c1: 1e-4,          // Armijo condition parameter
            wolfe_c2: 0.9,            // Wolfe condition parameter
            force_cap: 1000.0,
            line_search: LineSearch::Backtracking,
        }
    }
}

/// Local optimizer using L-BFGS method
#[derive(Debug, Clone, Default)]
pub struct LocalOptimizer {
    pub params: LocalOptimizerParams,
}

/// Outcome of a successful line search
struct Step {
    alpha: f64,
    conf: Conformation,
    energy: f64,
    gradient: Option<DVector<f64>>,
}

impl LocalOptimizer {
    /// Create a new local optimizer with default parameters
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new local optimizer with custom parameters
    pub fn with_params(params: LocalOptimizerParams) -> Self {
        Self { params }
    }

    /// Minimize the energy of `conf`; `slope` penalizes atoms leaving the search box
    pub fn minimize(
        &self,
        scorer: &Scorer,
        ligand: &PreparedLigand,
        conf: &Conformation,
        slope: f64,
    ) -> Result<Pose, OptimizationError> {
        let m = 10; // Number of corrections to store
        let mut s_history: Vec<DVector<f64>> = Vec::with_capacity(m);
        let mut y_history: Vec<DVector<f64>> = Vec::with_capacity(m);
        let mut rho_history: Vec<f64> = Vec::with_capacity(m);

        let mut current = conf.clone();
        let mut energy = self.energy(scorer, ligand, &current, slope)?;
        let mut grad = self.compute_gradient(scorer, ligand, &current, energy, slope)?;

        for _ in 0..self.params.max_iterations {
            if grad.norm() < self.params.gradient_tolerance {
                break;
            }

            let direction = self.lbfgs_direction(&grad, &s_history, &y_history, &rho_history);

            let step = match self.params.line_search {
                LineSearch::Backtracking => {
                    self.backtracking(scorer, ligand, &current, &direction, energy, &grad, slope)?
                }
                LineSearch::Accurate => {
                    self.accurate(scorer, ligand, &current, &direction, energy, &grad, slope)?
                }
            };
            let step = match step {
                Some(step) => step,
                // Line search failed, stop optimization
                None => break,
            };

            let new_grad = match step.gradient {
                Some(g) => g,
                None => self.compute_gradient(scorer, ligand, &step.conf, step.energy, slope)?,
            };

            // Update L-BFGS history
            let s = step.alpha * &direction;
            let y = &new_grad - &grad;
            let sy = s.dot(&y);
            if sy > 1e-10 {
                // Only add to history if curvature condition is satisfied
                if s_history.len() >= m {
                    s_history.remove(0);
                    y_history.remove(0);
                    rho_history.remove(0);
                }
                s_history.push(s);
                y_history.push(y);
                rho_history.push(1.0 / sy);
            }

            let energy_change = (energy - step.energy).abs();
            current = step.conf;
            energy = step.energy;
            grad = new_grad;

            if energy_change < self.params.energy_tolerance {
                break;
            }
        }

        Pose::evaluate(scorer, ligand, current, slope)
    }

    fn energy(
        &self,
        scorer: &Scorer,
        ligand: &PreparedLigand,
        conf: &Conformation,
        slope: f64,
    ) -> Result<f64, OptimizationError> {
        Ok(scorer.evaluate(ligand, conf, slope)?.total())
    }

    /// Compute gradient using forward finite differences, capped per component
    fn compute_gradient(
        &self,
        scorer: &Scorer,
        ligand: &PreparedLigand,
        conf: &Conformation,
        base_energy: f64,
        slope: f64,
    ) -> Result<DVector<f64>, OptimizationError> {
        let n_dof = conf.dof();
        let h = self.params.gradient_step;
        let cap = self.params.force_cap;
        let mut grad = DVector::zeros(n_dof);
        let mut unit = DVector::zeros(n_dof);

        for k in 0..n_dof {
            unit[k] = 1.0;
            let energy_plus = self.energy(scorer, ligand, &conf.apply_step(&unit, h), slope)?;
            unit[k] = 0.0;
            grad[k] = ((energy_plus - base_energy) / h).clamp(-cap, cap);
        }

        Ok(grad)
    }

    /// L-BFGS two-loop recursion to compute search direction
    fn lbfgs_direction(
        &self,
        grad: &DVector<f64>,
        s_history: &[DVector<f64>],
        y_history: &[DVector<f64>],
        rho_history: &[f64],
    ) -> DVector<f64> {
        if s_history.is_empty() {
            // If no history, use steepest descent with a unit-length first step
            let norm = grad.norm();
            return if norm > 1.0 { -grad / norm } else { -grad.clone() };
        }

        let k = s_history.len();
        let mut q = grad.clone();
        let mut alpha = vec![0.0; k];

        // First loop (backward)
        for i in (0..k).rev() {
            alpha[i] = rho_history[i] * s_history[i].dot(&q);
            q = &q - alpha[i] * &y_history[i];
        }

        // Initial Hessian approximation (scaled identity)
        let gamma =
            s_history[k - 1].dot(&y_history[k - 1]) / y_history[k - 1].dot(&y_history[k - 1]);
        let mut r = gamma * q;

        // Second loop (forward)
        for i in 0..k {
            let beta = rho_history[i] * y_history[i].dot(&r);
            r = &r + (alpha[i] - beta) * &s_history[i];
        }

        -r
    }

    /// Backtracking line search with Armijo condition
    #[allow(clippy::too_many_arguments)]
    fn backtracking(
        &self,
        scorer: &Scorer,
        ligand: &PreparedLigand,
        conf: &Conformation,
        direction: &DVector<f64>,
        current_energy: f64,
        grad: &DVector<f64>,
        slope: f64,
    ) -> Result<Option<Step>, OptimizationError> {
        let mut alpha = self.params.initial_step;
        let c1 = self.params.armijo_c1;
        let rho = 0.5; // Step reduction factor

        let directional_derivative = grad.dot(direction);

        // If direction is not a descent direction, return failure
        if directional_derivative >= 0.0 {
            return Ok(None);
        }

        for _ in 0..20 {
            let trial = conf.apply_step(direction, alpha);
            let energy = self.energy(scorer, ligand, &trial, slope)?;

            if energy <= current_energy + c1 * alpha * directional_derivative {
                return Ok(Some(Step {
                    alpha,
                    conf: trial,
                    energy,
                    gradient: None,
                }));
            }

            alpha *= rho;
        }

        Ok(None)
    }

    /// Bisection search for a step satisfying the strong Wolfe conditions.
    /// Falls back to the best sufficient-decrease step seen.
    #[allow(clippy::too_many_arguments)]
    fn accurate(
        &self,
        scorer: &Scorer,
        ligand: &PreparedLigand,
        conf: &Conformation,
        direction: &DVector<f64>,
        current_energy: f64,
        grad: &DVector<f64>,
        slope: f64,
    ) -> Result<Option<Step>, OptimizationError> {
        let c1 = self.params.armijo_c1;
        let c2 = self.params.wolfe_c2;
        let directional_derivative = grad.dot(direction);
        if directional_derivative >= 0.0 {
            return Ok(None);
        }

        let mut lo = 0.0;
        let mut hi = f64::INFINITY;
        let mut alpha = self.params.initial_step;
        let mut fallback: Option<Step> = None;

        for _ in 0..30 {
            let trial = conf.apply_step(direction, alpha);
            let energy = self.energy(scorer, ligand, &trial, slope)?;

            if energy > current_energy + c1 * alpha * directional_derivative {
                hi = alpha;
            } else {
                let trial_grad = self.compute_gradient(scorer, ligand, &trial, energy, slope)?;
                let trial_slope = trial_grad.dot(direction);
                let step = Step {
                    alpha,
                    conf: trial,
                    energy,
                    gradient: Some(trial_grad),
                };
                if trial_slope.abs() <= -c2 * directional_derivative {
                    return Ok(Some(step));
                }
                if trial_slope > 0.0 {
                    hi = alpha;
                } else {
                    lo = alpha;
                }
                if fallback.as_ref().map_or(true, |f| energy < f.energy) {
                    fallback = Some(step);
                }
            }

            alpha = if hi.is_finite() { 0.5 * (lo + hi) } else { 2.0 * alpha };
            if hi.is_finite() && hi - lo < 1e-10 {
                break;
            }
        }

        Ok(fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forcefield::ScoringFunction;
    use crate::io::parse_pdbqt_str;
    use crate::search_space::SearchBox;
    use nalgebra::Vector3;

    const RECEPTOR: &str = "\
ATOM      1  C1  RES A   1       3.000   0.000   0.000  0.00  0.00     0.000 C
ATOM      2  C2  RES A   1      -3.000   0.000   0.000  0.00  0.00     0.000 C
ATOM      3  C3  RES A   1       0.000   3.000   0.000  0.00  0.00     0.000 C
ATOM      4  C4  RES A   1       0.000  -3.000   0.000  0.00  0.00     0.000 C
";

    const LIGAND: &str = "\
ATOM      1  C1  UNL     1       0.600   0.400   0.000  0.00  0.00     0.000 C
ATOM      2  C2  UNL     1       0.600   0.400   1.500  0.00  0.00     0.000 C
";

    fn setup() -> (Scorer, PreparedLigand) {
        let receptor = parse_pdbqt_str("rec", RECEPTOR).unwrap().remove(0);
        let ligand = parse_pdbqt_str("lig", LIGAND).unwrap().remove(0);
        let mut scorer = Scorer::new(Box::new(ScoringFunction::builtin("vina").unwrap()), &receptor.atoms);
        scorer.set_search_box(SearchBox::new(Vector3::zeros(), Vector3::new(10.0, 10.0, 10.0)).unwrap());
        (scorer, PreparedLigand::new(ligand))
    }

    #[test]
    fn test_minimize_never_increases_energy() {
        let (scorer, ligand) = setup();
        let start = Conformation::initial(&ligand.molecule).unwrap();
        let before = scorer.evaluate(&ligand, &start, 10.0).unwrap().total();

        for line_search in [LineSearch::Backtracking, LineSearch::Accurate] {
            let optimizer = LocalOptimizer::with_params(LocalOptimizerParams {
                line_search,
                max_iterations: 50,
                ..LocalOptimizerParams::default()
            });
            let pose = optimizer.minimize(&scorer, &ligand, &start, 10.0).unwrap();
            assert!(pose.energy <= before + 1e-9);
            assert_eq!(pose.coords.len(), 2);
            // rigid motion keeps the bond length
            assert!(((pose.coords[0] - pose.coords[1]).norm() - 1.5).abs() < 1e-6);
        }
    }

    #[test]
    fn test_zero_iterations_returns_start() {
        let (scorer, ligand) = setup();
        let start = Conformation::initial(&ligand.molecule).unwrap();
        let optimizer = LocalOptimizer::with_params(LocalOptimizerParams {
            max_iterations: 0,
            ..LocalOptimizerParams::default()
        });
        let pose = optimizer.minimize(&scorer, &ligand, &start, 0.0).unwrap();
        assert!((pose.coords[0] - ligand.molecule.atoms[0].coordinates).norm() < 1e-9);
    }

    #[test]
    fn test_gradient_is_capped() {
        let (scorer, ligand) = setup();
        // deep clash with the first receptor atom
        let mut start = Conformation::initial(&ligand.molecule).unwrap();
        start.position = Vector3::new(2.9, 0.0, 0.75);
        let optimizer = LocalOptimizer::with_params(LocalOptimizerParams {
            force_cap: 10.0,
            ..LocalOptimizerParams::default()
        });
        let e = scorer.evaluate(&ligand, &start, 0.0).unwrap().total();
        let grad = optimizer.compute_gradient(&scorer, &ligand, &start, e, 0.0).unwrap();
        assert!(grad.iter().all(|g| g.abs() <= 10.0));
    }

    #[test]
    fn test_accurate_step_keeps_gradient() {
        let (scorer, ligand) = setup();
        let mut start = Conformation::initial(&ligand.molecule).unwrap();
        start.position += Vector3::new(0.3, -0.2, 0.1);
        let optimizer = LocalOptimizer::with_params(LocalOptimizerParams {
            line_search: LineSearch::Accurate,
            ..LocalOptimizerParams::default()
        });
        let energy = optimizer.energy(&scorer, &ligand, &start, 10.0).unwrap();
        let grad = optimizer.compute_gradient(&scorer, &ligand, &start, energy, 10.0).unwrap();
        assert!(grad.norm() > 0.0);
        let direction = -&grad;

        let step = optimizer
            .accurate(&scorer, &ligand, &start, &direction, energy, &grad, 10.0)
            .unwrap()
            .expect("no step along steepest descent");
        let derivative = grad.dot(&direction);
        assert!(step.energy <= energy + optimizer.params.armijo_c1 * step.alpha * derivative);
        let step_grad = step.gradient.expect("accurate steps carry their gradient");
        assert_eq!(step_grad.len(), grad.len());

        let step = optimizer
            .backtracking(&scorer, &ligand, &start, &direction, energy, &grad, 10.0)
            .unwrap()
            .expect("no step along steepest descent");
        assert!(step.gradient.is_none());
    }
}
