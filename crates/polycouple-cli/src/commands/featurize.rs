use crate::cli::FeaturizeArgs;
use crate::config::PartialRunConfig;
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use polycouple::{
    core::io::gro::GroTrajectory, engine::progress::ProgressReporter, workflows,
};
use tracing::info;

pub fn run(args: FeaturizeArgs) -> Result<()> {
    let partial_config = PartialRunConfig::load(&args.inputs)?;
    info!("Merging configuration from file and CLI arguments...");
    let final_config = partial_config.merge_for_featurization(&args)?;

    info!("Opening trajectory {:?}", &args.inputs.trajectory);
    let mut trajectory =
        GroTrajectory::open(&args.inputs.trajectory).map_err(|e| CliError::FileParsing {
            path: args.inputs.trajectory.clone(),
            source: e.into(),
        })?;

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!("Starting {} featurization...", final_config.mode);
    let result = workflows::featurize::run(&mut trajectory, &final_config, &reporter)?;

    println!(
        "✓ {} sample(s) from {} frame(s), {} file(s) written to {} in {:.1} s.",
        result.samples,
        result.frames_processed,
        result.files_written,
        result.output_dir.display(),
        result.elapsed.as_secs_f64()
    );

    Ok(())
}
