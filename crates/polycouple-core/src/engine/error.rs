use thiserror::Error;

use super::alignment::AlignmentError;
use super::config::ConfigError;
use crate::core::charges::ChargeError;
use crate::core::io::gro::GroError;
use crate::core::io::pdb::PdbError;
use crate::core::mapping::MappingError;
use crate::core::selection::SelectionError;
use crate::core::surrogate::ModelError;

/// Every failure of the pipeline is fatal; variants only classify the cause.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Consistency error: {0}")]
    Consistency(String),

    #[error("Data error: {0}")]
    Data(String),

    #[error("Output error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}

impl EngineError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_string_lossy().to_string(),
            source,
        }
    }
}

impl From<ConfigError> for EngineError {
    fn from(e: ConfigError) -> Self {
        Self::Configuration(e.to_string())
    }
}

impl From<MappingError> for EngineError {
    fn from(e: MappingError) -> Self {
        Self::Configuration(e.to_string())
    }
}

impl From<SelectionError> for EngineError {
    fn from(e: SelectionError) -> Self {
        Self::Configuration(e.to_string())
    }
}

impl From<ChargeError> for EngineError {
    fn from(e: ChargeError) -> Self {
        Self::Configuration(e.to_string())
    }
}

impl From<ModelError> for EngineError {
    fn from(e: ModelError) -> Self {
        Self::Configuration(format!("surrogate model: {}", e))
    }
}

impl From<GroError> for EngineError {
    fn from(e: GroError) -> Self {
        Self::Data(format!("GRO input: {}", e))
    }
}

impl From<PdbError> for EngineError {
    fn from(e: PdbError) -> Self {
        Self::Data(format!("PDB input: {}", e))
    }
}

impl From<AlignmentError> for EngineError {
    fn from(e: AlignmentError) -> Self {
        match e {
            AlignmentError::ResidueMismatch { .. }
            | AlignmentError::SelectionSize { .. }
            | AlignmentError::AtomMismatch { .. } => Self::Validation(e.to_string()),
            AlignmentError::RmsdIncrease { .. } => Self::Consistency(e.to_string()),
            AlignmentError::EmptySelection { .. } | AlignmentError::ZeroMass { .. } => {
                Self::Configuration(e.to_string())
            }
            AlignmentError::Degenerate => Self::Data(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alignment_errors_map_onto_taxonomy() {
        let mismatch = AlignmentError::ResidueMismatch {
            expected: "PTMA".to_string(),
            found: "END".to_string(),
        };
        assert!(matches!(
            EngineError::from(mismatch),
            EngineError::Validation(_)
        ));

        let worse = AlignmentError::RmsdIncrease {
            before: 0.1,
            after: 0.5,
        };
        assert!(matches!(
            EngineError::from(worse),
            EngineError::Consistency(_)
        ));
    }

    #[test]
    fn input_and_setup_errors_map_onto_taxonomy() {
        let gro = GroError::MissingRecord("atoms".to_string());
        assert!(matches!(EngineError::from(gro), EngineError::Data(_)));

        let mapping = MappingError::Empty;
        assert!(matches!(
            EngineError::from(mapping),
            EngineError::Configuration(_)
        ));

        let missing = ConfigError::MissingParameter("model_dir");
        let message = EngineError::from(missing).to_string();
        assert!(message.contains("model_dir"));
    }
}
