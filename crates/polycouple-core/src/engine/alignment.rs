use super::config::ElectronicState;
use super::pairs::Monomer;
use crate::core::models::structure::Structure;
use crate::core::selection::Selection;
use crate::core::utils::geometry::{calculate_weighted_rmsd, center_of_mass};
use nalgebra::{Matrix3, Point3, Rotation3, Vector3};
use thiserror::Error;
use tracing::trace;

/// Largest RMSD increase an alignment may produce before it is rejected (Å).
pub const RMSD_TOLERANCE: f64 = 0.1;

/// Largest mass difference tolerated between paired fit atoms (u).
pub const MASS_TOLERANCE: f64 = 0.1;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AlignmentError {
    #[error("Residue '{found}' is not of the expected type '{expected}'")]
    ResidueMismatch { expected: String, found: String },
    #[error("Fit selection picks {reference} reference atoms but {mobile} trajectory atoms")]
    SelectionSize { reference: usize, mobile: usize },
    #[error(
        "Fit atom {slot} does not correspond: reference atom '{name}' has mass {reference_mass:.3}, trajectory atom has {mobile_mass:.3}"
    )]
    AtomMismatch {
        slot: usize,
        name: String,
        reference_mass: f64,
        mobile_mass: f64,
    },
    #[error("Fit selection '{selection}' picks no atoms of the {state} reference")]
    EmptySelection {
        selection: String,
        state: ElectronicState,
    },
    #[error("Fit atoms of the {state} reference have zero total mass")]
    ZeroMass { state: ElectronicState },
    #[error("Alignment made the fit worse: centered RMSD {before:.4}, fitted RMSD {after:.4}")]
    RmsdIncrease { before: f64, after: f64 },
    #[error("Superposition is numerically degenerate")]
    Degenerate,
}

/// A reference copy superimposed onto one trajectory monomer.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedMonomer {
    /// All reference atoms after the fit, indexed like the reference structure.
    pub positions: Vec<Point3<f64>>,
    /// Weighted RMSD once both fit sets share their center of mass, before rotation.
    pub rmsd_centered: f64,
    /// Weighted RMSD after the optimal rotation.
    pub rmsd_after: f64,
}

/// Superimposes a reference structure onto trajectory monomers.
///
/// The reference is borrowed immutably and every call returns a fresh,
/// caller-owned copy, so one aligner can serve any number of threads.
/// The fit is weighted by the reference atom masses and uses the atoms picked
/// by the fit selection on both sides, which must line up one-to-one: paired
/// atoms may differ in mass by less than [`MASS_TOLERANCE`].
#[derive(Debug, Clone)]
pub struct MonomerAligner<'a> {
    reference: &'a Structure,
    state: ElectronicState,
    expected_residue: String,
    fit_names: Vec<String>,
    weights: Vec<f64>,
    reference_center: Point3<f64>,
    centered_fit: Vec<Vector3<f64>>,
}

impl<'a> MonomerAligner<'a> {
    pub fn new(
        reference: &'a Structure,
        state: ElectronicState,
        expected_residue: &str,
        fit_selection: &Selection,
    ) -> Result<Self, AlignmentError> {
        let fit_atoms = fit_selection.select_all(reference.topology());
        if fit_atoms.is_empty() {
            return Err(AlignmentError::EmptySelection {
                selection: fit_selection.to_string(),
                state,
            });
        }
        let masses = reference.masses();
        let weights: Vec<f64> = fit_atoms.iter().map(|&k| masses[k]).collect();
        let names = reference.atom_names();
        let fit_names = fit_atoms.iter().map(|&k| names[k].to_string()).collect();
        let fit_positions: Vec<Point3<f64>> = fit_atoms
            .iter()
            .map(|&k| reference.positions()[k])
            .collect();
        let reference_center =
            center_of_mass(&fit_positions, &weights).ok_or(AlignmentError::ZeroMass { state })?;
        let centered_fit = fit_positions
            .iter()
            .map(|p| p - reference_center)
            .collect();

        Ok(Self {
            reference,
            state,
            expected_residue: expected_residue.to_string(),
            fit_names,
            weights,
            reference_center,
            centered_fit,
        })
    }

    pub fn state(&self) -> ElectronicState {
        self.state
    }

    pub fn reference(&self) -> &Structure {
        self.reference
    }

    /// Aligns the reference onto `monomer`, whose whole-molecule coordinates are `positions`.
    ///
    /// # Errors
    ///
    /// Fails if `residue_name` is not the expected type, if the fit atoms do
    /// not correspond in count or mass, or if the RMSD grows by
    /// [`RMSD_TOLERANCE`] or more.
    pub fn align(
        &self,
        residue_name: &str,
        monomer: &Monomer,
        positions: &[Point3<f64>],
    ) -> Result<AlignedMonomer, AlignmentError> {
        if residue_name != self.expected_residue {
            return Err(AlignmentError::ResidueMismatch {
                expected: self.expected_residue.clone(),
                found: residue_name.to_string(),
            });
        }
        if monomer.group.len() != self.centered_fit.len() {
            return Err(AlignmentError::SelectionSize {
                reference: self.centered_fit.len(),
                mobile: monomer.group.len(),
            });
        }
        self.check_correspondence(&monomer.group_masses)?;

        let target = monomer.group_positions(positions);
        let target_center = center_of_mass(&target, &self.weights)
            .ok_or(AlignmentError::ZeroMass { state: self.state })?;
        let centered_target: Vec<Vector3<f64>> =
            target.iter().map(|p| p - target_center).collect();

        let rotation = weighted_kabsch(&self.centered_fit, &centered_target, &self.weights)?;

        let as_points = |v: &[Vector3<f64>]| -> Vec<Point3<f64>> {
            v.iter().map(|c| Point3::from(*c)).collect()
        };
        let mobile = as_points(&self.centered_fit);
        let fixed = as_points(&centered_target);
        let rotated: Vec<Point3<f64>> = self
            .centered_fit
            .iter()
            .map(|c| Point3::from(rotation * c))
            .collect();

        let rmsd_centered = calculate_weighted_rmsd(&mobile, &fixed, &self.weights)
            .ok_or(AlignmentError::Degenerate)?;
        let rmsd_after = calculate_weighted_rmsd(&rotated, &fixed, &self.weights)
            .ok_or(AlignmentError::Degenerate)?;
        trace!(
            state = %self.state,
            rmsd_centered,
            rmsd_after,
            "Reference aligned onto residue"
        );
        check_rmsd(rmsd_centered, rmsd_after)?;

        let positions = self
            .reference
            .positions()
            .iter()
            .map(|p| target_center + rotation * (p - self.reference_center))
            .collect();

        Ok(AlignedMonomer {
            positions,
            rmsd_centered,
            rmsd_after,
        })
    }

    fn check_correspondence(&self, mobile_masses: &[f64]) -> Result<(), AlignmentError> {
        let mismatch = self
            .weights
            .iter()
            .zip(mobile_masses)
            .position(|(reference, mobile)| (reference - mobile).abs() >= MASS_TOLERANCE);
        match mismatch {
            Some(slot) => Err(AlignmentError::AtomMismatch {
                slot,
                name: self.fit_names[slot].clone(),
                reference_mass: self.weights[slot],
                mobile_mass: mobile_masses[slot],
            }),
            None => Ok(()),
        }
    }
}

/// Rejects a fit whose RMSD grew by [`RMSD_TOLERANCE`] or more.
fn check_rmsd(before: f64, after: f64) -> Result<(), AlignmentError> {
    if after - before >= RMSD_TOLERANCE {
        return Err(AlignmentError::RmsdIncrease { before, after });
    }
    Ok(())
}

/// Rotation minimizing the weighted RMSD between two centered point sets (`to ≈ R * from`).
fn weighted_kabsch(
    from: &[Vector3<f64>],
    to: &[Vector3<f64>],
    weights: &[f64],
) -> Result<Rotation3<f64>, AlignmentError> {
    let h = from
        .iter()
        .zip(to)
        .zip(weights)
        .fold(Matrix3::zeros(), |acc, ((f, t), &w)| acc + (t * f.transpose()) * w);

    let svd = h.svd(true, true);
    let (Some(u), Some(v_t)) = (svd.u, svd.v_t) else {
        return Err(AlignmentError::Degenerate);
    };

    let d = (u * v_t).determinant();
    let mut correction = Matrix3::identity();
    if d < 0.0 {
        correction[(2, 2)] = -1.0;
    }

    let rotation_matrix = u * correction * v_t;
    if !rotation_matrix.iter().all(|x| x.is_finite()) {
        return Err(AlignmentError::Degenerate);
    }
    Ok(Rotation3::from_matrix_unchecked(rotation_matrix))
}
