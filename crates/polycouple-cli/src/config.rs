use crate::cli::{FeaturizeArgs, PredictArgs, RunInputs};
use crate::error::{CliError, Result};
use polycouple::core::io::records::RunLabel;
use polycouple::engine::config::{
    self as core_config, ElectronicState, FeatureKind, FeatureVariants, SampleMode,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

const DEFAULT_FEATURE_DIR: &str = "features";

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct PartialSystemConfig {
    residue: Option<String>,
    mapping: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct PartialReferencesConfig {
    neutral: Option<PathBuf>,
    anion: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct PartialSelectionConfig {
    cutoff: Option<f64>,
    #[serde(rename = "trajectory-step")]
    trajectory_step: Option<usize>,
    #[serde(rename = "test-limit")]
    test_limit: Option<usize>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct PartialFeaturesConfig {
    kind: Option<String>,
    resolution: Option<String>,
    #[serde(rename = "charges-dir")]
    charges_dir: Option<PathBuf>,
    tags: Option<[i32; 2]>,
    mode: Option<String>,
    state: Option<String>,
    coulomb: Option<bool>,
    flattened: Option<bool>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct PartialModelConfig {
    dir: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct PartialOutputConfig {
    root: Option<PathBuf>,
    dir: Option<PathBuf>,
    temperature: Option<String>,
    label: Option<String>,
    snapshot: Option<String>,
}

/// Run configuration as read from TOML, before CLI overrides are applied.
#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct PartialRunConfig {
    #[serde(default)]
    system: PartialSystemConfig,
    #[serde(default)]
    references: PartialReferencesConfig,
    #[serde(default)]
    selection: PartialSelectionConfig,
    #[serde(default)]
    features: PartialFeaturesConfig,
    #[serde(default)]
    model: PartialModelConfig,
    #[serde(default)]
    output: PartialOutputConfig,
}

/// Values shared by both workflows after the file, `--set` and the CLI are merged.
struct MergedInputs {
    mapping_path: PathBuf,
    neutral_reference: PathBuf,
    anion_reference: PathBuf,
    residue_name: String,
    cutoff: Option<f64>,
    trajectory_step: usize,
    test_limit: Option<usize>,
    charges_dir: Option<PathBuf>,
    conformation_tags: Option<(i32, i32)>,
}

impl PartialRunConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    /// Reads the file named by `--config`, or starts empty when none is given.
    pub fn load(inputs: &RunInputs) -> Result<Self> {
        match &inputs.config {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn merge_for_prediction(
        mut self,
        args: &PredictArgs,
    ) -> Result<core_config::PredictionConfig> {
        self.apply_set_values(&args.inputs.set_values)?;
        let inputs = self.merge_inputs(&args.inputs)?;

        let feature_kind = match args.feature.as_ref().or(self.features.kind.as_ref()) {
            Some(kind) => parse_keyword::<FeatureKind>(kind)?,
            None => FeatureKind::default(),
        };
        let cutoff = inputs
            .cutoff
            .ok_or_else(|| required("selection.cutoff", "--cutoff"))?;
        let model_dir = args
            .model_dir
            .clone()
            .or(self.model.dir.take())
            .ok_or_else(|| required("model.dir", "--model-dir"))?;
        let output_root = args
            .output_root
            .clone()
            .or(self.output.root.take())
            .unwrap_or_else(|| PathBuf::from("."));
        let run_label = RunLabel {
            temperature: args
                .temperature
                .clone()
                .or(self.output.temperature.take())
                .ok_or_else(|| required("output.temperature", "--temperature"))?,
            label: args
                .label
                .clone()
                .or(self.output.label.take())
                .ok_or_else(|| required("output.label", "--label"))?,
            snapshot: args
                .snapshot
                .clone()
                .or(self.output.snapshot.take())
                .ok_or_else(|| required("output.snapshot", "--snapshot"))?,
        };

        core_config::PredictionConfigBuilder::new()
            .mapping_path(inputs.mapping_path)
            .neutral_reference(inputs.neutral_reference)
            .anion_reference(inputs.anion_reference)
            .residue_name(inputs.residue_name)
            .cutoff(cutoff)
            .trajectory_step(inputs.trajectory_step)
            .test_limit(inputs.test_limit)
            .model_dir(model_dir)
            .feature_kind(feature_kind)
            .resolution(args.resolution.clone().or(self.features.resolution.take()))
            .charges_dir(inputs.charges_dir)
            .conformation_tags(inputs.conformation_tags)
            .output_root(output_root)
            .run_label(run_label)
            .build()
            .map_err(|e| CliError::Config(e.to_string()))
    }

    pub fn merge_for_featurization(
        mut self,
        args: &FeaturizeArgs,
    ) -> Result<core_config::FeaturizeConfig> {
        self.apply_set_values(&args.inputs.set_values)?;
        let inputs = self.merge_inputs(&args.inputs)?;

        let mode = args
            .mode
            .as_ref()
            .or(self.features.mode.as_ref())
            .ok_or_else(|| required("features.mode", "--mode"))
            .and_then(|m| parse_keyword::<SampleMode>(m))?;
        let state = match args.state.as_ref().or(self.features.state.as_ref()) {
            Some(state) => parse_keyword::<ElectronicState>(state)?,
            None => ElectronicState::default(),
        };
        let variants = FeatureVariants {
            coulomb: args.coulomb || self.features.coulomb.unwrap_or(false),
            flattened: args.flat || self.features.flattened.unwrap_or(false),
        };
        let output_dir = args
            .output_dir
            .clone()
            .or(self.output.dir.take())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_FEATURE_DIR));

        let mut builder = core_config::FeaturizeConfigBuilder::new()
            .mapping_path(inputs.mapping_path)
            .neutral_reference(inputs.neutral_reference)
            .anion_reference(inputs.anion_reference)
            .residue_name(inputs.residue_name)
            .cutoff(inputs.cutoff)
            .trajectory_step(inputs.trajectory_step)
            .test_limit(inputs.test_limit)
            .mode(mode)
            .state(state)
            .variants(variants)
            .charges_dir(inputs.charges_dir)
            .output_dir(output_dir);
        if let Some(tags) = inputs.conformation_tags {
            builder = builder.conformation_tags(tags);
        }
        builder.build().map_err(|e| CliError::Config(e.to_string()))
    }

    fn merge_inputs(&mut self, inputs: &RunInputs) -> Result<MergedInputs> {
        Ok(MergedInputs {
            mapping_path: inputs
                .mapping
                .clone()
                .or(self.system.mapping.take())
                .ok_or_else(|| required("system.mapping", "--mapping"))?,
            neutral_reference: inputs
                .neutral_ref
                .clone()
                .or(self.references.neutral.take())
                .ok_or_else(|| required("references.neutral", "--neutral-ref"))?,
            anion_reference: inputs
                .anion_ref
                .clone()
                .or(self.references.anion.take())
                .ok_or_else(|| required("references.anion", "--anion-ref"))?,
            residue_name: inputs
                .residue
                .clone()
                .or(self.system.residue.take())
                .ok_or_else(|| required("system.residue", "--residue"))?,
            cutoff: inputs.cutoff.or(self.selection.cutoff),
            trajectory_step: inputs
                .step
                .or(self.selection.trajectory_step)
                .unwrap_or(1),
            test_limit: inputs.test.or(self.selection.test_limit),
            charges_dir: inputs
                .charges_dir
                .clone()
                .or(self.features.charges_dir.take()),
            conformation_tags: inputs
                .tags
                .or(self.features.tags.map(|[i, j]| (i, j))),
        })
    }

    fn apply_set_values(&mut self, set_values: &[String]) -> Result<()> {
        for kv_pair in set_values {
            let (key, value) = kv_pair.split_once('=').ok_or_else(|| {
                CliError::Config(format!(
                    "Invalid --set format: '{}'. Expected KEY=VALUE.",
                    kv_pair
                ))
            })?;

            match key {
                "system.residue" => self.system.residue = Some(parse_set(key, value)?),
                "system.mapping" => self.system.mapping = Some(parse_set(key, value)?),
                "references.neutral" => self.references.neutral = Some(parse_set(key, value)?),
                "references.anion" => self.references.anion = Some(parse_set(key, value)?),
                "selection.cutoff" => self.selection.cutoff = Some(parse_set(key, value)?),
                "selection.trajectory-step" => {
                    self.selection.trajectory_step = Some(parse_set(key, value)?)
                }
                "selection.test-limit" => self.selection.test_limit = Some(parse_set(key, value)?),
                "features.kind" => self.features.kind = Some(parse_set(key, value)?),
                "features.resolution" => self.features.resolution = Some(parse_set(key, value)?),
                "features.charges-dir" => self.features.charges_dir = Some(parse_set(key, value)?),
                "features.mode" => self.features.mode = Some(parse_set(key, value)?),
                "features.state" => self.features.state = Some(parse_set(key, value)?),
                "features.coulomb" => self.features.coulomb = Some(parse_set(key, value)?),
                "features.flattened" => self.features.flattened = Some(parse_set(key, value)?),
                "model.dir" => self.model.dir = Some(parse_set(key, value)?),
                "output.root" => self.output.root = Some(parse_set(key, value)?),
                "output.dir" => self.output.dir = Some(parse_set(key, value)?),
                "output.temperature" => self.output.temperature = Some(parse_set(key, value)?),
                "output.label" => self.output.label = Some(parse_set(key, value)?),
                "output.snapshot" => self.output.snapshot = Some(parse_set(key, value)?),
                _ => {
                    return Err(CliError::Config(format!(
                        "Unsupported configuration key for --set: '{}'",
                        key
                    )));
                }
            }
        }
        Ok(())
    }
}

fn parse_set<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| {
        CliError::Config(format!(
            "Invalid {} value for {}: {}",
            std::any::type_name::<T>(),
            key,
            value
        ))
    })
}

fn parse_keyword<T>(value: &str) -> Result<T>
where
    T: FromStr<Err = polycouple::engine::error::EngineError>,
{
    value.parse().map_err(CliError::Core)
}

fn required(key: &str, flag: &str) -> CliError {
    CliError::Config(format!(
        "A value for '{}' is required either in the config file or via '{}'.",
        key, flag
    ))
}
