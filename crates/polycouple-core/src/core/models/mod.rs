//! # Core Models Module
//!
//! Data structures describing the molecular system that the featurization
//! pipeline reads: a static [`topology`] shared by all frames, per-frame
//! coordinates and periodic cells in [`frame`], and single-frame reference
//! geometries in [`structure`].
//!
//! ## Key Components
//!
//! - [`atom`] - Atom name, residue membership, element, and mass
//! - [`residue`] - Monomer (residue) identity and atom membership
//! - [`topology`] - Ordered atoms and residues, plus an incremental builder
//! - [`frame`] - Trajectory snapshot and the periodic cell with minimum-image helpers
//! - [`pair`] - Record of one admitted monomer pair
//! - [`structure`] - Reference geometry (topology + coordinates)
//!
//! ## Usage
//!
//! ```ignore
//! use polycouple::core::models::topology::TopologyBuilder;
//!
//! let mut builder = TopologyBuilder::new();
//! builder.add_atom(1, "PTMA", "C1", None);
//! let topology = builder.build();
//! ```

pub mod atom;
pub mod frame;
pub mod pair;
pub mod residue;
pub mod structure;
pub mod topology;
