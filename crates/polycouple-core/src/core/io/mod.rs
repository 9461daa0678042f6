//! Provides input/output functionality for the featurization pipeline.
//!
//! This module reads GROMACS trajectories and reference structures (GRO, PDB)
//! through a unified trait-based interface, stores and loads numeric arrays in
//! NumPy `.npy` format, and writes the run's record outputs (pair log and
//! predicted-overlap CSV).

pub mod gro;
pub mod memory;
pub mod npy;
pub mod pdb;
pub mod records;
pub mod traits;
