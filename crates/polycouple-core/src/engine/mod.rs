//! # Engine Module
//!
//! The pipeline stages that turn trajectory frames into feature vectors and
//! predictions.
//!
//! ## Overview
//!
//! For every frame the [`pairs`] stage computes periodic center-of-mass
//! distances between monomers and admits the pairs within the cutoff. Each
//! admitted pair is handed to the [`features`] stage, which superimposes the
//! reference structures onto both monomers ([`alignment`]), reduces the aligned
//! copies to the points of a resolution and builds reciprocal-distance or
//! Coulomb matrices ([`matrices`]). The [`inference`] stage feeds the flattened
//! matrices through the surrogate model.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Run parameters and their builders
//! - **Pair Selection** ([`pairs`]) - Monomers, COM distances, pair admission and numbering
//! - **Alignment** ([`alignment`]) - Mass-weighted superposition with an RMSD check
//! - **Matrix Builders** ([`matrices`]) - Reciprocal-distance and Coulomb blocks
//! - **Feature Assembly** ([`features`]) - Per-resolution matrices for pairs and monomers
//! - **Inference** ([`inference`]) - Scaler, regressor and inverse scaler behind traits
//! - **Progress Monitoring** ([`progress`]) - Callback-based progress events
//! - **Error Handling** ([`error`]) - The fatal error taxonomy shared by every stage

pub mod alignment;
pub mod config;
pub mod error;
pub mod features;
pub mod inference;
pub mod matrices;
pub mod pairs;
pub mod progress;
