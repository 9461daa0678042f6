use crate::core::io::npy::{self, NpyError};
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChargeError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("NPY error for '{path}': {source}")]
    Npy { path: String, source: NpyError },
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
    #[error("No charge table for resolution '{resolution}' in '{dir}' (expected {stem}.toml or {stem}.npy)")]
    NotFound {
        resolution: String,
        dir: String,
        stem: String,
    },
    #[error("Charge table '{resolution}' has {found} entries, selection has {expected} atoms")]
    LengthMismatch {
        resolution: String,
        expected: usize,
        found: usize,
    },
    #[error("Charge table '{resolution}' names '{found}' at position {position}, selection has '{expected}'")]
    NameMismatch {
        resolution: String,
        position: usize,
        expected: String,
        found: String,
    },
    #[error("Charge table '{resolution}' lists {names} names for {charges} charges")]
    Inconsistent {
        resolution: String,
        names: usize,
        charges: usize,
    },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct ChargeFile {
    names: Option<Vec<String>>,
    charges: Vec<f64>,
}

/// Partial charges of one resolution, indexed positionally like its atom selection.
///
/// Tables read from `.npy` carry no atom names and can only be length-checked;
/// tables read from `.toml` may list names and are then checked atom by atom.
#[derive(Debug, Clone, PartialEq)]
pub struct ChargeTable {
    resolution: String,
    charges: Vec<f64>,
    names: Option<Vec<String>>,
}

impl ChargeTable {
    pub fn new(
        resolution: &str,
        charges: Vec<f64>,
        names: Option<Vec<String>>,
    ) -> Result<Self, ChargeError> {
        if let Some(names) = &names {
            if names.len() != charges.len() {
                return Err(ChargeError::Inconsistent {
                    resolution: resolution.to_string(),
                    names: names.len(),
                    charges: charges.len(),
                });
            }
        }
        Ok(Self {
            resolution: resolution.to_string(),
            charges,
            names,
        })
    }

    pub fn file_stem(resolution: &str) -> String {
        format!("charges_MOL_{}", resolution)
    }

    /// Loads `charges_MOL_{resolution}.toml`, or `.npy` when no TOML table exists.
    pub fn load(dir: &Path, resolution: &str) -> Result<Self, ChargeError> {
        let stem = Self::file_stem(resolution);
        let toml_path = dir.join(format!("{}.toml", stem));
        let npy_path = dir.join(format!("{}.npy", stem));

        if toml_path.is_file() {
            let content = std::fs::read_to_string(&toml_path).map_err(|e| ChargeError::Io {
                path: toml_path.to_string_lossy().to_string(),
                source: e,
            })?;
            let file: ChargeFile = toml::from_str(&content).map_err(|e| ChargeError::Toml {
                path: toml_path.to_string_lossy().to_string(),
                source: e,
            })?;
            Self::new(resolution, file.charges, file.names)
        } else if npy_path.is_file() {
            let charges = npy::read_vector_from_path(&npy_path).map_err(|e| ChargeError::Npy {
                path: npy_path.to_string_lossy().to_string(),
                source: e,
            })?;
            Self::new(resolution, charges, None)
        } else {
            Err(ChargeError::NotFound {
                resolution: resolution.to_string(),
                dir: dir.to_string_lossy().to_string(),
                stem,
            })
        }
    }

    pub fn resolution(&self) -> &str {
        &self.resolution
    }

    pub fn charges(&self) -> &[f64] {
        &self.charges
    }

    pub fn names(&self) -> Option<&[String]> {
        self.names.as_deref()
    }

    pub fn len(&self) -> usize {
        self.charges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.charges.is_empty()
    }

    /// Verifies that the table lines up with the atoms of a selection, in order.
    pub fn check_against<S: AsRef<str>>(&self, atom_names: &[S]) -> Result<(), ChargeError> {
        if atom_names.len() != self.charges.len() {
            return Err(ChargeError::LengthMismatch {
                resolution: self.resolution.clone(),
                expected: atom_names.len(),
                found: self.charges.len(),
            });
        }
        if let Some(names) = &self.names {
            for (position, (expected, found)) in atom_names.iter().zip(names).enumerate() {
                if expected.as_ref() != found {
                    return Err(ChargeError::NameMismatch {
                        resolution: self.resolution.clone(),
                        position,
                        expected: expected.as_ref().to_string(),
                        found: found.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}
