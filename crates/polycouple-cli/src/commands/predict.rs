use crate::cli::PredictArgs;
use crate::config::PartialRunConfig;
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use polycouple::{
    core::io::gro::GroTrajectory, engine::progress::ProgressReporter, workflows,
};
use tracing::{info, warn};

pub fn run(args: PredictArgs) -> Result<()> {
    let partial_config = PartialRunConfig::load(&args.inputs)?;
    info!("Merging configuration from file and CLI arguments...");
    let final_config = partial_config.merge_for_prediction(&args)?;

    info!("Opening trajectory {:?}", &args.inputs.trajectory);
    let mut trajectory =
        GroTrajectory::open(&args.inputs.trajectory).map_err(|e| CliError::FileParsing {
            path: args.inputs.trajectory.clone(),
            source: e.into(),
        })?;

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!("Starting overlap prediction...");
    let result = workflows::predict::run(&mut trajectory, &final_config, &reporter)?;

    if result.pairs_admitted() == 0 {
        warn!("No monomer pairs were within the cutoff.");
        println!(
            "Warning: no pairs within {:.2} Å in {} frame(s).",
            final_config.sampling.cutoff, result.frames_processed
        );
    } else {
        println!(
            "✓ {} pair(s) predicted over {} frame(s) in {:.1} s.",
            result.pairs_admitted(),
            result.frames_processed,
            result.elapsed.as_secs_f64()
        );
    }
    println!("  Pair log:    {}", result.pair_log_path.display());
    println!("  Predictions: {}", result.overlaps_path.display());

    Ok(())
}
