use super::{SampledFrames, read_structure};
use crate::core::io::records::{PairLogWriter, write_overlaps_to_path};
use crate::core::io::traits::TrajectorySource;
use crate::core::mapping::MappingTable;
use crate::core::models::frame::Frame;
use crate::core::surrogate::SurrogateModel;
use crate::engine::config::{FeatureKind, PredictionConfig};
use crate::engine::error::EngineError;
use crate::engine::features::{FeatureAssembler, ResolutionPlan, feature_vector};
use crate::engine::inference::InferenceDriver;
use crate::engine::pairs::{FrameSelection, MonomerSet, PairSelector, validate_frame};
use crate::engine::progress::{Progress, ProgressReporter};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

#[derive(Debug, Clone)]
pub struct PredictionResult {
    pub frames_processed: usize,
    /// `(pair_index, predicted_overlap)` in admission order.
    pub predictions: Vec<(usize, f64)>,
    pub pair_log_path: PathBuf,
    pub overlaps_path: PathBuf,
    pub elapsed: Duration,
}

impl PredictionResult {
    pub fn pairs_admitted(&self) -> usize {
        self.predictions.len()
    }
}

/// Predicts the overlap of every admitted pair of the trajectory.
///
/// The pair log is written as pairs are admitted; the overlap CSV is written
/// once the trajectory is exhausted, one row per pair in admission order.
#[instrument(skip_all, name = "prediction_workflow")]
pub fn run<T: TrajectorySource>(
    source: &mut T,
    config: &PredictionConfig,
    reporter: &ProgressReporter,
) -> Result<PredictionResult, EngineError> {
    let started = Instant::now();

    // === Phase 0: Load inputs and validate shapes ===
    reporter.report(Progress::PhaseStart { name: "Setup" });
    info!(
        residue = %config.sampling.residue_name,
        cutoff = config.sampling.cutoff,
        step = config.sampling.trajectory_step,
        feature = %config.feature_kind,
        "Starting prediction workflow setup."
    );
    if let Some(limit) = config.sampling.test_limit {
        info!(limit, "Test mode: pairs are only started from the first monomers.");
    }

    let mapping = MappingTable::load(&config.mapping_path)?;
    let resolution = match &config.resolution {
        Some(name) => mapping.require(name)?,
        None => mapping.last(),
    };
    if config.feature_kind == FeatureKind::CoulombMatrix && !resolution.is_explicit() {
        return Err(EngineError::Configuration(format!(
            "Coulomb features need an explicit resolution, '{}' is bead-based",
            resolution.name
        )));
    }
    let neutral = read_structure(&config.references.neutral)?;
    let anion = read_structure(&config.references.anion)?;
    let charges_dir = match config.feature_kind {
        FeatureKind::CoulombMatrix => config.charges_dir.as_deref(),
        FeatureKind::DistanceMatrix => None,
    };
    let assembler = FeatureAssembler::new(
        &mapping,
        &config.sampling.residue_name,
        &neutral,
        &anion,
        vec![resolution],
        charges_dir,
    )?;
    let plan = &assembler.plans()[0];

    let model = SurrogateModel::load(&config.model_dir)?;
    let driver = InferenceDriver::from_surrogate(&model)?;
    driver.check_input_len(
        plan.feature_len(config.conformation_tags.is_some()),
        plan.name(),
    )?;
    info!(
        resolution = plan.name(),
        shape = ?plan.output_shape,
        features = driver.input_dim(),
        "Feature layout matches the surrogate model."
    );

    let monomers = MonomerSet::from_topology(
        source.topology(),
        &config.sampling.residue_name,
        mapping.group_selection(),
    )?;
    info!(monomers = monomers.len(), "Monomers of the analysed type found.");

    let pair_log_path = config
        .run_label
        .pair_log_path(&config.output_root, config.sampling.cutoff);
    let overlaps_path = config
        .run_label
        .overlaps_path(&config.output_root, config.sampling.cutoff);
    let mut pair_log =
        PairLogWriter::create(&pair_log_path).map_err(|e| EngineError::io(&pair_log_path, e))?;
    reporter.report(Progress::PhaseFinish);

    // === Phase 1: Stream frames, admit pairs, predict ===
    reporter.report(Progress::PhaseStart { name: "Prediction" });
    let atom_count = source.topology().atom_count();
    let mut selector = PairSelector::new(config.sampling.cutoff, config.sampling.test_limit);
    let mut predictions = Vec::new();
    let mut frames_processed = 0;

    for frame in SampledFrames::new(source, config.sampling.trajectory_step) {
        let frame = frame?;
        validate_frame(&frame, atom_count)?;
        let selection = selector.admit(&frame, &monomers)?;
        for record in &selection.records {
            pair_log
                .write_record(record)
                .map_err(|e| EngineError::io(&pair_log_path, e))?;
        }

        let values = predict_frame(
            &frame,
            &monomers,
            &selection,
            &assembler,
            plan,
            &driver,
            config,
        )?;
        info!(
            frame = frame.index,
            time = frame.time,
            pairs = values.len(),
            "Frame processed."
        );
        predictions.extend(values);
        frames_processed += 1;
        reporter.report(Progress::FrameFinished {
            index: frame.index,
            time: frame.time,
            items: selection.records.len(),
        });
    }
    pair_log
        .finish()
        .map_err(|e| EngineError::io(&pair_log_path, e))?;
    reporter.report(Progress::PhaseFinish);

    // === Phase 2: Write predictions ===
    write_overlaps_to_path(&overlaps_path, &predictions)
        .map_err(|e| EngineError::io(&overlaps_path, e.into()))?;

    let result = PredictionResult {
        frames_processed,
        predictions,
        pair_log_path,
        overlaps_path,
        elapsed: started.elapsed(),
    };
    info!(
        frames = result.frames_processed,
        pairs = result.pairs_admitted(),
        seconds = result.elapsed.as_secs_f64(),
        "Prediction completed: {} COM-COM distances are within the cutoff.",
        result.pairs_admitted()
    );
    Ok(result)
}

fn predict_frame(
    frame: &Frame,
    monomers: &MonomerSet,
    selection: &FrameSelection,
    assembler: &FeatureAssembler<'_>,
    plan: &ResolutionPlan<'_>,
    driver: &InferenceDriver<'_>,
    config: &PredictionConfig,
) -> Result<Vec<(usize, f64)>, EngineError> {
    #[cfg(not(feature = "parallel"))]
    let iterator = selection.records.iter().zip(selection.members.iter());

    #[cfg(feature = "parallel")]
    let iterator = selection
        .records
        .par_iter()
        .zip(selection.members.par_iter());

    let residue_name = monomers.residue_name();
    let monomers = monomers.monomers();
    let results: Vec<Result<(usize, f64), EngineError>> = iterator
        .map(|(record, &(i, j))| {
            let pair = assembler.align_pair(
                frame,
                residue_name,
                &monomers[i],
                &monomers[j],
            )?;
            let matrix = assembler.pair_matrix(plan, &pair, config.feature_kind, frame)?;
            let matrix = assembler.shape_for_model(plan, matrix);
            let features = feature_vector(&matrix, config.conformation_tags);
            let overlap = driver.predict(&features)?;
            debug!(
                pair_index = record.pair_index,
                rmsd_i = pair.i.rmsd_after,
                rmsd_j = pair.j.rmsd_after,
                overlap,
                "Pair predicted"
            );
            Ok((record.pair_index, overlap))
        })
        .collect();

    results.into_iter().collect()
}
