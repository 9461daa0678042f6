//! # Workflows Module
//!
//! Complete procedures over a trajectory, from loading the run's inputs to
//! writing its outputs.
//!
//! ## Overview
//!
//! Workflows are the top-level entry points of the library. Each one loads the
//! mapping table and reference structures, validates every shape before the
//! first frame is read, streams the trajectory frame by frame, and reports
//! progress through a [`ProgressReporter`](crate::engine::progress::ProgressReporter).
//! Any error aborts the whole run.
//!
//! - **Prediction Workflow** ([`predict`]) - Admitted pairs to predicted overlaps,
//!   with the pair log and the overlap CSV as outputs.
//! - **Featurization Workflow** ([`featurize`]) - Feature matrices of monomers or
//!   pairs stored as `.npy` arrays.

pub mod featurize;
pub mod predict;

use crate::core::io::gro::GroFile;
use crate::core::io::pdb::PdbFile;
use crate::core::io::traits::{StructureFile, TrajectorySource};
use crate::core::models::frame::Frame;
use crate::core::models::structure::Structure;
use crate::engine::error::EngineError;
use std::path::Path;
use tracing::info;

/// Reads a reference structure, picking the format from the file extension (GRO or PDB).
pub fn read_structure(path: &Path) -> Result<Structure, EngineError> {
    let is_gro = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("gro"));
    let structure = if is_gro {
        GroFile::read_from_path(path)?
    } else {
        PdbFile::read_from_path(path)?
    };
    info!(
        path = %path.display(),
        atoms = structure.atom_count(),
        "Reference structure loaded."
    );
    Ok(structure)
}

/// Every `step`-th frame of a trajectory source, starting with the first.
pub(crate) struct SampledFrames<'s, T: TrajectorySource> {
    source: &'s mut T,
    step: usize,
    read: usize,
}

impl<'s, T: TrajectorySource> SampledFrames<'s, T> {
    pub(crate) fn new(source: &'s mut T, step: usize) -> Self {
        Self {
            source,
            step: step.max(1),
            read: 0,
        }
    }
}

impl<T: TrajectorySource> Iterator for SampledFrames<'_, T> {
    type Item = Result<Frame, EngineError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let frame = self.source.next_frame()?;
            let position = self.read;
            self.read += 1;
            if position % self.step == 0 {
                return Some(frame.map_err(|e| EngineError::Data(format!("trajectory: {}", e))));
            }
        }
    }
}
