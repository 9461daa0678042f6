use super::error::EngineError;
use crate::core::mapping::{Resolution, ResolutionKind};
use crate::core::models::frame::PeriodicBox;
use crate::core::models::structure::Structure;
use crate::core::utils::geometry::{center_of_geometry, distance_array};
use nalgebra::{DMatrix, Point3};

/// Element-wise `1 / d` of the distance matrix between `a` and `b`.
///
/// Coincident points (only possible when a monomer is paired with itself)
/// produce the sentinel `0.0` instead of infinity.
pub fn reciprocal_distance_matrix(
    a: &[Point3<f64>],
    b: &[Point3<f64>],
    periodic_box: Option<&PeriodicBox>,
) -> DMatrix<f64> {
    distance_array(a, b, periodic_box).map(|d| if d == 0.0 { 0.0 } else { 1.0 / d })
}

/// Inter-molecular Coulomb block `C[i, j] = q_i * q_j / d_ij`.
///
/// Both point sets are indexed positionally against `charges`. No diagonal
/// self-energy term is added; coincident points are an error.
pub fn coulomb_matrix(
    a: &[Point3<f64>],
    b: &[Point3<f64>],
    charges: &[f64],
    periodic_box: Option<&PeriodicBox>,
) -> Result<DMatrix<f64>, EngineError> {
    if a.len() != charges.len() || b.len() != charges.len() {
        return Err(EngineError::Configuration(format!(
            "charge table has {} entries, point sets have {} and {}",
            charges.len(),
            a.len(),
            b.len()
        )));
    }
    let distances = distance_array(a, b, periodic_box);
    if let Some((i, j)) = first_zero(&distances) {
        return Err(EngineError::Data(format!(
            "coincident atoms {} and {} in Coulomb block",
            i, j
        )));
    }
    Ok(DMatrix::from_fn(a.len(), b.len(), |i, j| {
        charges[i] * charges[j] / distances[(i, j)]
    }))
}

fn first_zero(matrix: &DMatrix<f64>) -> Option<(usize, usize)> {
    (0..matrix.nrows())
        .flat_map(|i| (0..matrix.ncols()).map(move |j| (i, j)))
        .find(|&ij| matrix[ij] == 0.0)
}

/// Reduces aligned reference coordinates to the points a resolution describes.
///
/// `positions` must be indexed like the atoms of `structure`. Explicit
/// resolutions keep the selected atoms in topology order; bead resolutions
/// place one point at the centroid of each bead's atoms.
pub fn resolution_points(
    structure: &Structure,
    positions: &[Point3<f64>],
    resolution: &Resolution,
) -> Result<Vec<Point3<f64>>, EngineError> {
    let topology = structure.topology();
    match &resolution.kind {
        ResolutionKind::Explicit(selection) => {
            let atoms = selection.select_all(topology);
            if atoms.is_empty() {
                return Err(EngineError::Configuration(format!(
                    "resolution '{}': selection '{}' matches no atoms of the reference",
                    resolution.name, selection
                )));
            }
            Ok(atoms.iter().map(|&k| positions[k]).collect())
        }
        ResolutionKind::BeadCentroid(beads) => beads
            .iter()
            .map(|bead| {
                let members: Vec<Point3<f64>> = bead
                    .select_all(topology)
                    .iter()
                    .map(|&k| positions[k])
                    .collect();
                center_of_geometry(&members).ok_or_else(|| {
                    EngineError::Configuration(format!(
                        "resolution '{}': bead '{}' matches no atoms of the reference",
                        resolution.name, bead
                    ))
                })
            })
            .collect(),
    }
}

/// Atom names picked by an explicit resolution, in the order its points are built.
pub fn resolution_atom_names(structure: &Structure, resolution: &Resolution) -> Option<Vec<String>> {
    match &resolution.kind {
        ResolutionKind::Explicit(selection) => {
            let names = structure.atom_names();
            Some(
                selection
                    .select_all(structure.topology())
                    .iter()
                    .map(|&k| names[k].to_string())
                    .collect(),
            )
        }
        ResolutionKind::BeadCentroid(_) => None,
    }
}

/// Keeps the top-left `rows x cols` block of `matrix`.
pub fn truncate(matrix: &DMatrix<f64>, (rows, cols): (usize, usize)) -> DMatrix<f64> {
    matrix.view((0, 0), (rows, cols)).into_owned()
}

/// Row-major flattening of `matrix`.
pub fn flatten_row_major(matrix: &DMatrix<f64>) -> Vec<f64> {
    matrix.transpose().as_slice().to_vec()
}
