use nalgebra::{Matrix3, Point3, Vector3};

/// Periodic simulation cell, stored as a matrix whose columns are the box vectors (Å).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeriodicBox {
    vectors: Matrix3<f64>,
    inverse: Matrix3<f64>,
    orthorhombic: bool,
}

impl PeriodicBox {
    /// Builds a rectangular cell. Returns `None` if any edge is not strictly positive.
    pub fn orthorhombic(lx: f64, ly: f64, lz: f64) -> Option<Self> {
        if lx <= 0.0 || ly <= 0.0 || lz <= 0.0 {
            return None;
        }
        Self::from_vectors(
            Vector3::new(lx, 0.0, 0.0),
            Vector3::new(0.0, ly, 0.0),
            Vector3::new(0.0, 0.0, lz),
        )
    }

    /// Builds a general (triclinic) cell from its three box vectors.
    ///
    /// Returns `None` for a degenerate cell, which callers treat as "no periodicity".
    pub fn from_vectors(a: Vector3<f64>, b: Vector3<f64>, c: Vector3<f64>) -> Option<Self> {
        let vectors = Matrix3::from_columns(&[a, b, c]);
        if vectors.determinant().abs() < 1e-12 {
            return None;
        }
        let inverse = vectors.try_inverse()?;
        let off_diagonal = [
            vectors[(1, 0)],
            vectors[(2, 0)],
            vectors[(0, 1)],
            vectors[(2, 1)],
            vectors[(0, 2)],
            vectors[(1, 2)],
        ];
        Some(Self {
            vectors,
            inverse,
            orthorhombic: off_diagonal.iter().all(|v| v.abs() < 1e-12),
        })
    }

    pub fn vectors(&self) -> &Matrix3<f64> {
        &self.vectors
    }

    pub fn is_orthorhombic(&self) -> bool {
        self.orthorhombic
    }

    /// Edge lengths `(|a|, |b|, |c|)` in Å.
    pub fn lengths(&self) -> [f64; 3] {
        [
            self.vectors.column(0).norm(),
            self.vectors.column(1).norm(),
            self.vectors.column(2).norm(),
        ]
    }

    /// Applies the minimum-image convention to a displacement vector.
    pub fn minimum_image(&self, delta: Vector3<f64>) -> Vector3<f64> {
        if self.orthorhombic {
            let mut d = delta;
            for axis in 0..3 {
                let l = self.vectors[(axis, axis)];
                d[axis] -= (d[axis] / l).round() * l;
            }
            return d;
        }

        let mut fractional = self.inverse * delta;
        fractional.apply(|s| {
            let nearest = s.round();
            *s -= nearest;
        });
        let wrapped = self.vectors * fractional;

        // Fractional rounding is not always the shortest image in a skewed cell.
        let mut best = wrapped;
        let mut best_norm = wrapped.norm_squared();
        for i in -1..=1 {
            for j in -1..=1 {
                for k in -1..=1 {
                    if i == 0 && j == 0 && k == 0 {
                        continue;
                    }
                    let shift = self.vectors * Vector3::new(i as f64, j as f64, k as f64);
                    let candidate = wrapped + shift;
                    let norm = candidate.norm_squared();
                    if norm < best_norm {
                        best = candidate;
                        best_norm = norm;
                    }
                }
            }
        }
        best
    }

    /// Minimum-image distance between two points.
    pub fn distance(&self, a: &Point3<f64>, b: &Point3<f64>) -> f64 {
        self.minimum_image(b - a).norm()
    }
}

/// One trajectory snapshot. Immutable once read.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Zero-based position of the frame in the trajectory file.
    pub index: usize,
    /// Simulation time in ps.
    pub time: f64,
    /// Per-atom coordinates in Å, indexed like the topology atoms.
    pub positions: Vec<Point3<f64>>,
    /// Periodic cell, `None` for non-periodic systems.
    pub periodic_box: Option<PeriodicBox>,
}

impl Frame {
    pub fn new(
        index: usize,
        time: f64,
        positions: Vec<Point3<f64>>,
        periodic_box: Option<PeriodicBox>,
    ) -> Self {
        Self {
            index,
            time,
            positions,
            periodic_box,
        }
    }

    /// Returns the positions of `atom_indices`, made whole across periodic boundaries.
    ///
    /// Every atom is placed at the minimum image of its displacement from the
    /// first atom, so a monomer split by the cell boundary comes back as one
    /// contiguous group. Without a periodic box the positions are returned as-is.
    pub fn unwrapped_positions(&self, atom_indices: &[usize]) -> Vec<Point3<f64>> {
        let Some(&first) = atom_indices.first() else {
            return Vec::new();
        };
        let anchor = self.positions[first];
        atom_indices
            .iter()
            .map(|&idx| {
                let p = self.positions[idx];
                match &self.periodic_box {
                    Some(pbc) => anchor + pbc.minimum_image(p - anchor),
                    None => p,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orthorhombic_rejects_non_positive_edges() {
        assert!(PeriodicBox::orthorhombic(10.0, 0.0, 10.0).is_none());
        assert!(PeriodicBox::orthorhombic(10.0, 10.0, -1.0).is_none());
        assert!(PeriodicBox::orthorhombic(10.0, 10.0, 10.0).is_some());
    }

    #[test]
    fn minimum_image_wraps_long_displacements() {
        let pbc = PeriodicBox::orthorhombic(10.0, 10.0, 10.0).unwrap();
        let d = pbc.minimum_image(Vector3::new(9.0, -6.0, 3.0));
        assert!((d - Vector3::new(-1.0, 4.0, 3.0)).norm() < 1e-12);
    }

    #[test]
    fn distance_across_boundary_is_short() {
        let pbc = PeriodicBox::orthorhombic(20.0, 20.0, 20.0).unwrap();
        let a = Point3::new(0.5, 10.0, 10.0);
        let b = Point3::new(19.5, 10.0, 10.0);
        assert!((pbc.distance(&a, &b) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn triclinic_minimum_image_matches_brute_force() {
        let pbc = PeriodicBox::from_vectors(
            Vector3::new(10.0, 0.0, 0.0),
            Vector3::new(5.0, 9.0, 0.0),
            Vector3::new(3.0, 2.0, 8.0),
        )
        .unwrap();
        assert!(!pbc.is_orthorhombic());

        let delta = Vector3::new(8.7, 7.9, 6.5);
        let wrapped = pbc.minimum_image(delta);

        let mut brute = f64::INFINITY;
        for i in -3..=3 {
            for j in -3..=3 {
                for k in -3..=3 {
                    let shift = pbc.vectors() * Vector3::new(i as f64, j as f64, k as f64);
                    brute = brute.min((delta + shift).norm());
                }
            }
        }
        assert!((wrapped.norm() - brute).abs() < 1e-9);
    }

    #[test]
    fn degenerate_box_is_rejected() {
        let pbc = PeriodicBox::from_vectors(
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(2.0, 0.0, 0.0),
            Vector3::new(0.0, 0.0, 1.0),
        );
        assert!(pbc.is_none());
    }

    #[test]
    fn unwrapped_positions_rejoin_split_residue() {
        let pbc = PeriodicBox::orthorhombic(10.0, 10.0, 10.0);
        let frame = Frame::new(
            0,
            0.0,
            vec![Point3::new(9.5, 5.0, 5.0), Point3::new(0.5, 5.0, 5.0)],
            pbc,
        );
        let unwrapped = frame.unwrapped_positions(&[0, 1]);
        assert!((unwrapped[1] - Point3::new(10.5, 5.0, 5.0)).norm() < 1e-12);
    }

    #[test]
    fn unwrapped_positions_without_box_is_identity() {
        let frame = Frame::new(0, 0.0, vec![Point3::new(9.5, 5.0, 5.0)], None);
        assert_eq!(frame.unwrapped_positions(&[0]), frame.positions);
        assert!(frame.unwrapped_positions(&[]).is_empty());
    }
}
