//! # polycouple
//!
//! Pairwise geometric featurization of polymer monomers sampled from
//! molecular-dynamics trajectories, and prediction of their orbital overlaps
//! with a pre-trained surrogate model.
//!
//! ## Architectural Philosophy
//!
//! The library keeps a strict three-layer architecture so that each concern can
//! be tested on its own.
//!
//! - **[`core`]: The Foundation.** Stateless data models (`Topology`, `Frame`,
//!   `Structure`), file formats (GRO, PDB, NPY), atom selections, the
//!   resolution mapping table, charge tables, and the surrogate model files.
//!
//! - **[`engine`]: The Logic Core.** The pipeline stages: pair selection with
//!   periodic center-of-mass distances, mass-weighted monomer alignment,
//!   reciprocal-distance and Coulomb matrix builders, feature assembly, and the
//!   inference driver, plus the error taxonomy, configuration and progress
//!   reporting they share.
//!
//! - **[`workflows`]: The Public API.** Complete procedures over a trajectory:
//!   [`workflows::predict`] turns admitted pairs into predicted overlaps, and
//!   [`workflows::featurize`] stores feature matrices for monomers or pairs.

pub mod core;
pub mod engine;
pub mod workflows;
