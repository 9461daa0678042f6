use super::error::EngineError;
use crate::core::io::records::RunLabel;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for '{parameter}': {reason}")]
    InvalidValue {
        parameter: &'static str,
        reason: String,
    },
}

/// Matrix type fed to the surrogate model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeatureKind {
    #[default]
    DistanceMatrix,
    CoulombMatrix,
}

impl FromStr for FeatureKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "distmat" => Ok(Self::DistanceMatrix),
            "coulmat" => Ok(Self::CoulombMatrix),
            other => Err(EngineError::Validation(format!(
                "unsupported feature kind '{}' (expected 'distmat' or 'coulmat')",
                other
            ))),
        }
    }
}

impl fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::DistanceMatrix => "distmat",
            Self::CoulombMatrix => "coulmat",
        })
    }
}

/// Whether features describe single monomers or monomer pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleMode {
    Monomer,
    Pair,
}

impl SampleMode {
    /// Prefix of stored feature file names.
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Monomer => "mon",
            Self::Pair => "pair",
        }
    }
}

impl FromStr for SampleMode {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mon" => Ok(Self::Monomer),
            "pair" => Ok(Self::Pair),
            other => Err(EngineError::Validation(format!(
                "unsupported mode '{}' (only 'mon' and 'pair' are accepted)",
                other
            ))),
        }
    }
}

impl fmt::Display for SampleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Electronic state of a reference structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ElectronicState {
    #[default]
    Neutral,
    Anion,
}

impl FromStr for ElectronicState {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "neutral" => Ok(Self::Neutral),
            "anion" | "radical_anion" => Ok(Self::Anion),
            other => Err(EngineError::Validation(format!(
                "unsupported electronic state '{}' (expected 'neutral' or 'anion')",
                other
            ))),
        }
    }
}

impl fmt::Display for ElectronicState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Neutral => "neutral",
            Self::Anion => "anion",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReferencePaths {
    pub neutral: PathBuf,
    pub anion: PathBuf,
}

impl ReferencePaths {
    pub fn for_state(&self, state: ElectronicState) -> &PathBuf {
        match state {
            ElectronicState::Neutral => &self.neutral,
            ElectronicState::Anion => &self.anion,
        }
    }
}

/// Which monomers are considered and which frames are read.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingConfig {
    pub residue_name: String,
    /// COM-COM cutoff in Å; a value ≤ 0 admits no pairs.
    pub cutoff: f64,
    /// Every n-th frame is processed.
    pub trajectory_step: usize,
    /// Only the first K monomers start pairs (smoke testing).
    pub test_limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PredictionConfig {
    pub mapping_path: PathBuf,
    pub references: ReferencePaths,
    pub sampling: SamplingConfig,
    pub model_dir: PathBuf,
    pub feature_kind: FeatureKind,
    /// Resolution fed to the model; the last one in the mapping table when `None`.
    pub resolution: Option<String>,
    pub charges_dir: Option<PathBuf>,
    /// Conformation tags appended to the flattened feature vector.
    pub conformation_tags: Option<(i32, i32)>,
    pub output_root: PathBuf,
    pub run_label: RunLabel,
}

#[derive(Default)]
pub struct PredictionConfigBuilder {
    mapping_path: Option<PathBuf>,
    neutral_reference: Option<PathBuf>,
    anion_reference: Option<PathBuf>,
    residue_name: Option<String>,
    cutoff: Option<f64>,
    trajectory_step: Option<usize>,
    test_limit: Option<usize>,
    model_dir: Option<PathBuf>,
    feature_kind: Option<FeatureKind>,
    resolution: Option<String>,
    charges_dir: Option<PathBuf>,
    conformation_tags: Option<(i32, i32)>,
    output_root: Option<PathBuf>,
    run_label: Option<RunLabel>,
}

impl PredictionConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mapping_path(mut self, path: PathBuf) -> Self {
        self.mapping_path = Some(path);
        self
    }
    pub fn neutral_reference(mut self, path: PathBuf) -> Self {
        self.neutral_reference = Some(path);
        self
    }
    pub fn anion_reference(mut self, path: PathBuf) -> Self {
        self.anion_reference = Some(path);
        self
    }
    pub fn residue_name(mut self, name: String) -> Self {
        self.residue_name = Some(name);
        self
    }
    pub fn cutoff(mut self, cutoff: f64) -> Self {
        self.cutoff = Some(cutoff);
        self
    }
    pub fn trajectory_step(mut self, step: usize) -> Self {
        self.trajectory_step = Some(step);
        self
    }
    pub fn test_limit(mut self, limit: Option<usize>) -> Self {
        self.test_limit = limit;
        self
    }
    pub fn model_dir(mut self, path: PathBuf) -> Self {
        self.model_dir = Some(path);
        self
    }
    pub fn feature_kind(mut self, kind: FeatureKind) -> Self {
        self.feature_kind = Some(kind);
        self
    }
    pub fn resolution(mut self, resolution: Option<String>) -> Self {
        self.resolution = resolution;
        self
    }
    pub fn charges_dir(mut self, path: Option<PathBuf>) -> Self {
        self.charges_dir = path;
        self
    }
    pub fn conformation_tags(mut self, tags: Option<(i32, i32)>) -> Self {
        self.conformation_tags = tags;
        self
    }
    pub fn output_root(mut self, path: PathBuf) -> Self {
        self.output_root = Some(path);
        self
    }
    pub fn run_label(mut self, label: RunLabel) -> Self {
        self.run_label = Some(label);
        self
    }

    pub fn build(self) -> Result<PredictionConfig, ConfigError> {
        let sampling = build_sampling(
            self.residue_name,
            Some(self.cutoff.ok_or(ConfigError::MissingParameter("cutoff"))?),
            self.trajectory_step,
            self.test_limit,
        )?;
        let feature_kind = self.feature_kind.unwrap_or_default();
        if feature_kind == FeatureKind::CoulombMatrix && self.charges_dir.is_none() {
            return Err(ConfigError::MissingParameter("charges_dir"));
        }
        Ok(PredictionConfig {
            mapping_path: self
                .mapping_path
                .ok_or(ConfigError::MissingParameter("mapping_path"))?,
            references: build_references(self.neutral_reference, self.anion_reference)?,
            sampling,
            model_dir: self
                .model_dir
                .ok_or(ConfigError::MissingParameter("model_dir"))?,
            feature_kind,
            resolution: self.resolution,
            charges_dir: self.charges_dir,
            conformation_tags: self.conformation_tags,
            output_root: self
                .output_root
                .ok_or(ConfigError::MissingParameter("output_root"))?,
            run_label: self
                .run_label
                .ok_or(ConfigError::MissingParameter("run_label"))?,
        })
    }
}

/// Stored feature variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeatureVariants {
    /// Also store Coulomb matrices (`_CM`).
    pub coulomb: bool,
    /// Also store flattened, tagged vectors (`_1D`).
    pub flattened: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeaturizeConfig {
    pub mapping_path: PathBuf,
    pub references: ReferencePaths,
    pub sampling: SamplingConfig,
    pub mode: SampleMode,
    /// Reference state monomers are aligned to in monomer mode.
    pub state: ElectronicState,
    pub variants: FeatureVariants,
    pub conformation_tags: (i32, i32),
    pub charges_dir: Option<PathBuf>,
    pub output_dir: PathBuf,
}

#[derive(Default)]
pub struct FeaturizeConfigBuilder {
    mapping_path: Option<PathBuf>,
    neutral_reference: Option<PathBuf>,
    anion_reference: Option<PathBuf>,
    residue_name: Option<String>,
    cutoff: Option<f64>,
    trajectory_step: Option<usize>,
    test_limit: Option<usize>,
    mode: Option<SampleMode>,
    state: Option<ElectronicState>,
    variants: FeatureVariants,
    conformation_tags: Option<(i32, i32)>,
    charges_dir: Option<PathBuf>,
    output_dir: Option<PathBuf>,
}

impl FeaturizeConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mapping_path(mut self, path: PathBuf) -> Self {
        self.mapping_path = Some(path);
        self
    }
    pub fn neutral_reference(mut self, path: PathBuf) -> Self {
        self.neutral_reference = Some(path);
        self
    }
    pub fn anion_reference(mut self, path: PathBuf) -> Self {
        self.anion_reference = Some(path);
        self
    }
    pub fn residue_name(mut self, name: String) -> Self {
        self.residue_name = Some(name);
        self
    }
    pub fn cutoff(mut self, cutoff: Option<f64>) -> Self {
        self.cutoff = cutoff;
        self
    }
    pub fn trajectory_step(mut self, step: usize) -> Self {
        self.trajectory_step = Some(step);
        self
    }
    pub fn test_limit(mut self, limit: Option<usize>) -> Self {
        self.test_limit = limit;
        self
    }
    pub fn mode(mut self, mode: SampleMode) -> Self {
        self.mode = Some(mode);
        self
    }
    pub fn state(mut self, state: ElectronicState) -> Self {
        self.state = Some(state);
        self
    }
    pub fn variants(mut self, variants: FeatureVariants) -> Self {
        self.variants = variants;
        self
    }
    pub fn conformation_tags(mut self, tags: (i32, i32)) -> Self {
        self.conformation_tags = Some(tags);
        self
    }
    pub fn charges_dir(mut self, path: Option<PathBuf>) -> Self {
        self.charges_dir = path;
        self
    }
    pub fn output_dir(mut self, path: PathBuf) -> Self {
        self.output_dir = Some(path);
        self
    }

    pub fn build(self) -> Result<FeaturizeConfig, ConfigError> {
        let mode = self.mode.ok_or(ConfigError::MissingParameter("mode"))?;
        let cutoff = match mode {
            SampleMode::Pair => Some(self.cutoff.ok_or(ConfigError::MissingParameter("cutoff"))?),
            SampleMode::Monomer => self.cutoff,
        };
        if self.variants.coulomb {
            if mode == SampleMode::Monomer {
                return Err(ConfigError::InvalidValue {
                    parameter: "coulomb",
                    reason: "Coulomb matrices are only defined for pairs".to_string(),
                });
            }
            if self.charges_dir.is_none() {
                return Err(ConfigError::MissingParameter("charges_dir"));
            }
        }
        Ok(FeaturizeConfig {
            mapping_path: self
                .mapping_path
                .ok_or(ConfigError::MissingParameter("mapping_path"))?,
            references: build_references(self.neutral_reference, self.anion_reference)?,
            sampling: build_sampling(
                self.residue_name,
                cutoff,
                self.trajectory_step,
                self.test_limit,
            )?,
            mode,
            state: self.state.unwrap_or_default(),
            variants: self.variants,
            conformation_tags: self.conformation_tags.unwrap_or((0, 0)),
            charges_dir: self.charges_dir,
            output_dir: self
                .output_dir
                .ok_or(ConfigError::MissingParameter("output_dir"))?,
        })
    }
}

fn build_references(
    neutral: Option<PathBuf>,
    anion: Option<PathBuf>,
) -> Result<ReferencePaths, ConfigError> {
    Ok(ReferencePaths {
        neutral: neutral.ok_or(ConfigError::MissingParameter("neutral_reference"))?,
        anion: anion.ok_or(ConfigError::MissingParameter("anion_reference"))?,
    })
}

fn build_sampling(
    residue_name: Option<String>,
    cutoff: Option<f64>,
    trajectory_step: Option<usize>,
    test_limit: Option<usize>,
) -> Result<SamplingConfig, ConfigError> {
    let cutoff = cutoff.unwrap_or(0.0);
    if !cutoff.is_finite() {
        return Err(ConfigError::InvalidValue {
            parameter: "cutoff",
            reason: format!("{} is not a finite distance", cutoff),
        });
    }
    let trajectory_step = trajectory_step.unwrap_or(1);
    if trajectory_step == 0 {
        return Err(ConfigError::InvalidValue {
            parameter: "trajectory_step",
            reason: "must be at least 1".to_string(),
        });
    }
    Ok(SamplingConfig {
        residue_name: residue_name.ok_or(ConfigError::MissingParameter("residue_name"))?,
        cutoff,
        trajectory_step,
        test_limit,
    })
}
