//! Random sampling helpers and RMSD measures

use nalgebra::{UnitQuaternion, Vector3};
use rand::Rng;
use std::f64::consts::PI;

/// Uniform random point in the axis-aligned box `[min, max]`
pub fn random_in_box<R: Rng + ?Sized>(rng: &mut R, min: &Vector3<f64>, max: &Vector3<f64>) -> Vector3<f64> {
    Vector3::from_fn(|k, _| {
        if max[k] > min[k] {
            rng.gen_range(min[k]..=max[k])
        } else {
            min[k]
        }
    })
}

/// Uniform random point inside the unit ball
pub fn random_in_unit_sphere<R: Rng + ?Sized>(rng: &mut R) -> Vector3<f64> {
    loop {
        let v = Vector3::new(
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
        );
        if v.norm_squared() < 1.0 {
            return v;
        }
    }
}

/// Uniformly distributed rotation (Shoemake's method)
pub fn random_orientation<R: Rng + ?Sized>(rng: &mut R) -> UnitQuaternion<f64> {
    let u1: f64 = rng.gen();
    let u2: f64 = rng.gen_range(0.0..2.0 * PI);
    let u3: f64 = rng.gen_range(0.0..2.0 * PI);
    let a = (1.0 - u1).sqrt();
    let b = u1.sqrt();
    UnitQuaternion::from_quaternion(nalgebra::Quaternion::new(
        a * u2.sin(),
        a * u2.cos(),
        b * u3.sin(),
        b * u3.cos(),
    ))
}

/// Wrap an angle into `[-pi, pi)`
pub fn normalize_angle(angle: f64) -> f64 {
    let wrapped = (angle + PI).rem_euclid(2.0 * PI) - PI;
    if wrapped >= PI {
        wrapped - 2.0 * PI
    } else {
        wrapped
    }
}

/// Root mean square deviation of two equally ordered coordinate sets
pub fn rmsd(a: &[Vector3<f64>], b: &[Vector3<f64>]) -> f64 {
    let n = a.len().min(b.len());
    if n == 0 {
        return 0.0;
    }
    let sum: f64 = a
        .iter()
        .zip(b)
        .map(|(p, q)| (p - q).norm_squared())
        .sum();
    (sum / n as f64).sqrt()
}

/// Symmetry-tolerant lower bound on RMSD: every atom is matched to the
/// nearest atom of the same type in the other set, in both directions.
pub fn rmsd_lower_bound<T: PartialEq>(
    a: &[Vector3<f64>],
    a_types: &[T],
    b: &[Vector3<f64>],
    b_types: &[T],
) -> f64 {
    one_sided_lower_bound(a, a_types, b, b_types).max(one_sided_lower_bound(b, b_types, a, a_types))
}

fn one_sided_lower_bound<T: PartialEq>(
    a: &[Vector3<f64>],
    a_types: &[T],
    b: &[Vector3<f64>],
    b_types: &[T],
) -> f64 {
    if a.is_empty() {
        return 0.0;
    }
    let sum: f64 = a
        .iter()
        .zip(a_types)
        .map(|(p, ta)| {
            b.iter()
                .zip(b_types)
                .filter(|(_, tb)| *tb == ta)
                .map(|(q, _)| (p - q).norm_squared())
                .fold(f64::INFINITY, f64::min)
        })
        .map(|d| if d.is_finite() { d } else { 0.0 })
        .sum();
    (sum / a.len() as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_normalize_angle() {
        assert!((normalize_angle(0.5) - 0.5).abs() < 1e-12);
        assert!((normalize_angle(3.0 * PI / 2.0) + PI / 2.0).abs() < 1e-12);
        assert!((normalize_angle(-3.0 * PI / 2.0) - PI / 2.0).abs() < 1e-12);
        assert!((normalize_angle(PI) + PI).abs() < 1e-12);
    }

    #[test]
    fn test_random_orientation_is_unit() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..50 {
            let q = random_orientation(&mut rng);
            assert!((q.quaternion().norm() - 1.0).abs() < 1e-9);
            assert!(random_in_unit_sphere(&mut rng).norm() < 1.0);
        }
    }

    #[test]
    fn test_rmsd() {
        let a = vec![Vector3::new(0.0, 0.0, 0.0), Vector3::new(1.0, 0.0, 0.0)];
        let b = vec![Vector3::new(0.0, 1.0, 0.0), Vector3::new(1.0, 1.0, 0.0)];
        assert!((rmsd(&a, &b) - 1.0).abs() < 1e-12);
        assert_eq!(rmsd(&a, &a), 0.0);
    }

    #[test]
    fn test_rmsd_lower_bound_handles_swapped_atoms() {
        let a = vec![Vector3::new(0.0, 0.0, 0.0), Vector3::new(2.0, 0.0, 0.0)];
        let b = vec![Vector3::new(2.0, 0.0, 0.0), Vector3::new(0.0, 0.0, 0.0)];
        let types = ["C", "C"];
        assert!((rmsd(&a, &b) - 2.0).abs() < 1e-12);
        assert!(rmsd_lower_bound(&a, &types, &b, &types) < 1e-12);
    }
}
