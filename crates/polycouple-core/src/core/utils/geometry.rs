use crate::core::models::frame::PeriodicBox;
use nalgebra::{DMatrix, Point3, Vector3};

/// Mass-weighted center of a point set. Returns `None` for empty input or zero total mass.
pub fn center_of_mass(positions: &[Point3<f64>], masses: &[f64]) -> Option<Point3<f64>> {
    if positions.is_empty() || positions.len() != masses.len() {
        return None;
    }
    let total: f64 = masses.iter().sum();
    if total <= 0.0 {
        return None;
    }
    let weighted: Vector3<f64> = positions
        .iter()
        .zip(masses)
        .map(|(p, &m)| p.coords * m)
        .sum();
    Some(Point3::from(weighted / total))
}

/// Unweighted centroid of a point set. Returns `None` for empty input.
pub fn center_of_geometry(positions: &[Point3<f64>]) -> Option<Point3<f64>> {
    if positions.is_empty() {
        return None;
    }
    let sum: Vector3<f64> = positions.iter().map(|p| p.coords).sum();
    Some(Point3::from(sum / positions.len() as f64))
}

/// Root-mean-square deviation between two equally sized point sets.
pub fn calculate_rmsd(coords1: &[Point3<f64>], coords2: &[Point3<f64>]) -> Option<f64> {
    if coords1.len() != coords2.len() || coords1.is_empty() {
        return None;
    }
    let n = coords1.len() as f64;
    let squared_dist_sum: f64 = coords1
        .iter()
        .zip(coords2.iter())
        .map(|(p1, p2)| (p1 - p2).norm_squared())
        .sum();
    Some((squared_dist_sum / n).sqrt())
}

/// Weighted RMSD: `sqrt(sum w_i |a_i - b_i|^2 / sum w_i)`.
pub fn calculate_weighted_rmsd(
    coords1: &[Point3<f64>],
    coords2: &[Point3<f64>],
    weights: &[f64],
) -> Option<f64> {
    if coords1.len() != coords2.len() || coords1.len() != weights.len() || coords1.is_empty() {
        return None;
    }
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return None;
    }
    let squared_dist_sum: f64 = coords1
        .iter()
        .zip(coords2)
        .zip(weights)
        .map(|((p1, p2), &w)| w * (p1 - p2).norm_squared())
        .sum();
    Some((squared_dist_sum / total).sqrt())
}

/// Dense `len(a) x len(b)` Euclidean distance matrix, honoring periodic boundaries when a cell is given.
pub fn distance_array(
    a: &[Point3<f64>],
    b: &[Point3<f64>],
    periodic_box: Option<&PeriodicBox>,
) -> DMatrix<f64> {
    DMatrix::from_fn(a.len(), b.len(), |i, j| match periodic_box {
        Some(pbc) => pbc.distance(&a[i], &b[j]),
        None => (b[j] - a[i]).norm(),
    })
}

/// Symmetric self-distance matrix of one point set with an exactly zero diagonal.
pub fn self_distance_array(
    points: &[Point3<f64>],
    periodic_box: Option<&PeriodicBox>,
) -> DMatrix<f64> {
    let n = points.len();
    let mut matrix = DMatrix::zeros(n, n);
    for i in 0..n {
        for j in (i + 1)..n {
            let d = match periodic_box {
                Some(pbc) => pbc.distance(&points[i], &points[j]),
                None => (points[j] - points[i]).norm(),
            };
            matrix[(i, j)] = d;
            matrix[(j, i)] = d;
        }
    }
    matrix
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn center_of_mass_weights_by_mass() {
        let positions = [Point3::new(0.0, 0.0, 0.0), Point3::new(4.0, 0.0, 0.0)];
        let com = center_of_mass(&positions, &[3.0, 1.0]).unwrap();
        assert!((com - Point3::new(1.0, 0.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn center_of_mass_rejects_empty_or_massless_input() {
        assert!(center_of_mass(&[], &[]).is_none());
        assert!(center_of_mass(&[Point3::origin()], &[0.0]).is_none());
        assert!(center_of_mass(&[Point3::origin()], &[1.0, 2.0]).is_none());
    }

    #[test]
    fn center_of_geometry_ignores_masses() {
        let positions = [Point3::new(0.0, 0.0, 0.0), Point3::new(2.0, 2.0, 2.0)];
        let cog = center_of_geometry(&positions).unwrap();
        assert!((cog - Point3::new(1.0, 1.0, 1.0)).norm() < 1e-12);
        assert!(center_of_geometry(&[]).is_none());
    }

    #[test]
    fn weighted_rmsd_reduces_to_plain_rmsd_for_uniform_weights() {
        let a = [Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0)];
        let b = [Point3::new(0.0, 1.0, 0.0), Point3::new(1.0, 0.0, 3.0)];
        let plain = calculate_rmsd(&a, &b).unwrap();
        let weighted = calculate_weighted_rmsd(&a, &b, &[2.0, 2.0]).unwrap();
        assert!((plain - weighted).abs() < 1e-12);
        assert!((plain - 5.0f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn distance_array_has_expected_shape_and_values() {
        let a = [Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0)];
        let b = [
            Point3::new(3.0, 0.0, 0.0),
            Point3::new(4.0, 0.0, 0.0),
            Point3::new(0.0, 0.0, 0.0),
        ];
        let d = distance_array(&a, &b, None);
        assert_eq!(d.shape(), (2, 3));
        assert_eq!(d[(0, 0)], 3.0);
        assert_eq!(d[(1, 1)], 3.0);
        assert_eq!(d[(0, 2)], 0.0);
    }

    #[test]
    fn distance_array_uses_minimum_image() {
        let pbc = PeriodicBox::orthorhombic(10.0, 10.0, 10.0).unwrap();
        let a = [Point3::new(1.0, 0.0, 0.0)];
        let b = [Point3::new(9.0, 0.0, 0.0)];
        let d = distance_array(&a, &b, Some(&pbc));
        assert!((d[(0, 0)] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn self_distance_array_is_symmetric_with_zero_diagonal() {
        let points = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(3.0, 4.0, 0.0),
            Point3::new(1.0, 1.0, 1.0),
        ];
        let d = self_distance_array(&points, None);
        for i in 0..3 {
            assert_eq!(d[(i, i)], 0.0);
            for j in 0..3 {
                assert_eq!(d[(i, j)], d[(j, i)]);
            }
        }
        assert!((d[(0, 1)] - 5.0).abs() < 1e-12);
    }
}
