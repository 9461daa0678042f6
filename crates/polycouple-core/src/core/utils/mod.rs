//! Element lookup tables and coordinate geometry shared by the featurization pipeline.

pub mod elements;
pub mod geometry;
