use super::{SampledFrames, read_structure};
use crate::core::io::npy;
use crate::core::io::records::{PairLogWriter, feature_file_name};
use crate::core::io::traits::TrajectorySource;
use crate::core::mapping::MappingTable;
use crate::core::models::frame::Frame;
use crate::engine::config::{FeatureKind, FeaturizeConfig, SampleMode};
use crate::engine::error::EngineError;
use crate::engine::features::{FeatureAssembler, feature_vector};
use crate::engine::pairs::{Monomer, MonomerSet, PairSelector, validate_frame};
use crate::engine::progress::{Progress, ProgressReporter};
use nalgebra::DMatrix;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Name of the pair log written next to pair features.
pub const PAIR_LOG_FILE: &str = "pairs_info.dat";

#[derive(Debug, Clone)]
pub struct FeaturizeResult {
    pub frames_processed: usize,
    /// Monomers or pairs featurized.
    pub samples: usize,
    pub files_written: usize,
    pub output_dir: PathBuf,
    pub elapsed: Duration,
}

/// Stores feature matrices of every monomer or admitted pair for all resolutions.
///
/// Monomers are numbered from 1 in the order they are visited; pairs carry
/// their run-wide pair index. Stored matrices are not truncated.
#[instrument(skip_all, name = "featurize_workflow")]
pub fn run<T: TrajectorySource>(
    source: &mut T,
    config: &FeaturizeConfig,
    reporter: &ProgressReporter,
) -> Result<FeaturizeResult, EngineError> {
    let started = Instant::now();

    // === Phase 0: Load inputs ===
    reporter.report(Progress::PhaseStart { name: "Setup" });
    info!(
        mode = %config.mode,
        residue = %config.sampling.residue_name,
        coulomb = config.variants.coulomb,
        flattened = config.variants.flattened,
        "Starting featurization workflow setup."
    );

    let mapping = MappingTable::load(&config.mapping_path)?;
    let neutral = read_structure(&config.references.neutral)?;
    let anion = read_structure(&config.references.anion)?;
    let charges_dir = if config.variants.coulomb {
        config.charges_dir.as_deref()
    } else {
        None
    };
    let assembler = FeatureAssembler::new(
        &mapping,
        &config.sampling.residue_name,
        &neutral,
        &anion,
        mapping.resolutions().iter().collect(),
        charges_dir,
    )?;
    let monomers = MonomerSet::from_topology(
        source.topology(),
        &config.sampling.residue_name,
        mapping.group_selection(),
    )?;
    std::fs::create_dir_all(&config.output_dir)
        .map_err(|e| EngineError::io(&config.output_dir, e))?;
    info!(
        monomers = monomers.len(),
        resolutions = assembler.plans().len(),
        output = %config.output_dir.display(),
        "Featurization inputs ready."
    );
    reporter.report(Progress::PhaseFinish);

    // === Phase 1: Stream frames and store features ===
    reporter.report(Progress::PhaseStart {
        name: "Featurization",
    });
    let atom_count = source.topology().atom_count();
    let writer = FeatureWriter {
        assembler: &assembler,
        config,
        residue_name: monomers.residue_name(),
    };
    let mut frames_processed = 0;
    let mut samples = 0;
    let mut files_written = 0;

    match config.mode {
        SampleMode::Monomer => {
            let limit = config.sampling.test_limit.unwrap_or(monomers.len());
            let visited = &monomers.monomers()[..limit.min(monomers.len())];
            for frame in SampledFrames::new(source, config.sampling.trajectory_step) {
                let frame = frame?;
                validate_frame(&frame, atom_count)?;
                let jobs: Vec<(usize, &Monomer)> = visited
                    .iter()
                    .enumerate()
                    .map(|(k, m)| (samples + k + 1, m))
                    .collect();
                files_written += writer.monomers(&frame, &jobs)?;
                samples += jobs.len();
                frames_processed += 1;
                reporter.report(Progress::FrameFinished {
                    index: frame.index,
                    time: frame.time,
                    items: jobs.len(),
                });
            }
        }
        SampleMode::Pair => {
            let log_path = config.output_dir.join(PAIR_LOG_FILE);
            let mut pair_log =
                PairLogWriter::create(&log_path).map_err(|e| EngineError::io(&log_path, e))?;
            let mut selector =
                PairSelector::new(config.sampling.cutoff, config.sampling.test_limit);
            for frame in SampledFrames::new(source, config.sampling.trajectory_step) {
                let frame = frame?;
                validate_frame(&frame, atom_count)?;
                let selection = selector.admit(&frame, &monomers)?;
                for record in &selection.records {
                    pair_log
                        .write_record(record)
                        .map_err(|e| EngineError::io(&log_path, e))?;
                }
                let jobs: Vec<(usize, &Monomer, &Monomer)> = selection
                    .records
                    .iter()
                    .zip(&selection.members)
                    .map(|(record, &(i, j))| {
                        (
                            record.pair_index,
                            &monomers.monomers()[i],
                            &monomers.monomers()[j],
                        )
                    })
                    .collect();
                files_written += writer.pairs(&frame, &jobs)?;
                samples += jobs.len();
                frames_processed += 1;
                reporter.report(Progress::FrameFinished {
                    index: frame.index,
                    time: frame.time,
                    items: jobs.len(),
                });
            }
            pair_log
                .finish()
                .map_err(|e| EngineError::io(&log_path, e))?;
        }
    }
    reporter.report(Progress::PhaseFinish);

    let result = FeaturizeResult {
        frames_processed,
        samples,
        files_written,
        output_dir: config.output_dir.clone(),
        elapsed: started.elapsed(),
    };
    info!(
        frames = result.frames_processed,
        samples = result.samples,
        files = result.files_written,
        seconds = result.elapsed.as_secs_f64(),
        "Featurization completed."
    );
    Ok(result)
}

struct FeatureWriter<'w, 'a> {
    assembler: &'w FeatureAssembler<'a>,
    config: &'w FeaturizeConfig,
    residue_name: &'w str,
}

impl FeatureWriter<'_, '_> {
    fn monomers(&self, frame: &Frame, jobs: &[(usize, &Monomer)]) -> Result<usize, EngineError> {
        #[cfg(not(feature = "parallel"))]
        let iterator = jobs.iter();

        #[cfg(feature = "parallel")]
        let iterator = jobs.par_iter();

        let results: Vec<Result<usize, EngineError>> = iterator
            .map(|&(index, monomer)| {
                let state = self.config.state;
                let aligned =
                    self.assembler
                        .align_monomer(state, frame, self.residue_name, monomer)?;
                let mut written = 0;
                for plan in self.assembler.plans() {
                    let matrix = self.assembler.monomer_matrix(
                        plan,
                        state,
                        &aligned,
                        FeatureKind::DistanceMatrix,
                        frame,
                    )?;
                    written += self.store(index, plan.name(), false, &matrix)?;
                }
                debug!(index, residue = monomer.residue_id, "Monomer featurized");
                Ok(written)
            })
            .collect();
        results.into_iter().sum()
    }

    fn pairs(
        &self,
        frame: &Frame,
        jobs: &[(usize, &Monomer, &Monomer)],
    ) -> Result<usize, EngineError> {
        #[cfg(not(feature = "parallel"))]
        let iterator = jobs.iter();

        #[cfg(feature = "parallel")]
        let iterator = jobs.par_iter();

        let results: Vec<Result<usize, EngineError>> = iterator
            .map(|&(index, i, j)| {
                let pair = self.assembler.align_pair(frame, self.residue_name, i, j)?;
                let mut written = 0;
                for plan in self.assembler.plans() {
                    let matrix = self.assembler.pair_matrix(
                        plan,
                        &pair,
                        FeatureKind::DistanceMatrix,
                        frame,
                    )?;
                    written += self.store(index, plan.name(), false, &matrix)?;
                    if self.config.variants.coulomb && plan.charges.is_some() {
                        let coulomb = self.assembler.pair_matrix(
                            plan,
                            &pair,
                            FeatureKind::CoulombMatrix,
                            frame,
                        )?;
                        written += self.store(index, plan.name(), true, &coulomb)?;
                    }
                }
                debug!(
                    pair_index = index,
                    i = i.residue_id,
                    j = j.residue_id,
                    "Pair featurized"
                );
                Ok(written)
            })
            .collect();
        results.into_iter().sum()
    }

    /// Writes the matrix and, when requested, its tagged 1-D form. Returns the file count.
    fn store(
        &self,
        index: usize,
        resolution: &str,
        coulomb: bool,
        matrix: &DMatrix<f64>,
    ) -> Result<usize, EngineError> {
        let prefix = self.config.mode.prefix();
        let dir = &self.config.output_dir;
        write_array(
            &dir.join(feature_file_name(prefix, index, resolution, coulomb, false)),
            |path| npy::write_matrix_to_path(path, matrix),
        )?;
        if !self.config.variants.flattened {
            return Ok(1);
        }
        let vector = feature_vector(matrix, Some(self.config.conformation_tags));
        write_array(
            &dir.join(feature_file_name(prefix, index, resolution, coulomb, true)),
            |path| npy::write_vector_to_path(path, &vector),
        )?;
        Ok(2)
    }
}

fn write_array(
    path: &Path,
    write: impl FnOnce(&Path) -> std::io::Result<()>,
) -> Result<(), EngineError> {
    write(path).map_err(|e| EngineError::io(path, e))
}
