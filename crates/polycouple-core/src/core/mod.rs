//! # Core Module
//!
//! Stateless building blocks of the featurization pipeline: molecular data
//! models, file formats, atom selections, resolution mappings, partial-charge
//! tables, and the file-backed surrogate model.
//!
//! ## Architecture
//!
//! - **Molecular Representation** ([`models`]) - Atoms, residues, topology, trajectory frames,
//!   periodic cells, reference structures, and pair records
//! - **File I/O** ([`io`]) - GRO/PDB readers, NPY arrays, pair log and overlap CSV writers
//! - **Atom Selection** ([`selection`]) - A small selection language over atom and residue names
//! - **Resolutions** ([`mapping`]) - The mapping table of coarse-graining resolutions and
//!   declared output shapes
//! - **Charges** ([`charges`]) - Per-resolution partial-charge tables with identity checks
//! - **Surrogate Model** ([`surrogate`]) - Standard scalers and a dense feed-forward network
//! - **Utilities** ([`utils`]) - Geometry (centers, RMSD, periodic distance arrays) and element data
//!
//! Nothing in this layer keeps state across frames or pairs; the [`crate::engine`]
//! layer composes these pieces into the pipeline.

pub mod charges;
pub mod io;
pub mod mapping;
pub mod models;
pub mod selection;
pub mod surrogate;
pub mod utils;
