pub mod featurize;
pub mod predict;
