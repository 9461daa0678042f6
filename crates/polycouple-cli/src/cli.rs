use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    version,
    about = "polycouple - pairwise geometric featurization of polymer monomers in MD trajectories and surrogate prediction of electronic overlaps.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output (errors are still printed)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Set the number of threads for parallel featurization.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Predict the electronic overlap of every monomer pair within the cutoff.
    Predict(PredictArgs),
    /// Store feature matrices of monomers or monomer pairs as .npy arrays.
    Featurize(FeaturizeArgs),
}

/// Inputs and sampling options shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct RunInputs {
    /// Path to the trajectory (GROMACS .gro, one or more frames).
    #[arg(short, long, required = true, value_name = "PATH")]
    pub trajectory: PathBuf,

    /// Path to the run configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Override the mapping table (TOML).
    #[arg(short, long, value_name = "PATH")]
    pub mapping: Option<PathBuf>,

    /// Override the neutral reference structure (PDB or GRO).
    #[arg(long, value_name = "PATH")]
    pub neutral_ref: Option<PathBuf>,

    /// Override the radical-anion reference structure (PDB or GRO).
    #[arg(long, value_name = "PATH")]
    pub anion_ref: Option<PathBuf>,

    /// Override the residue name of the analysed monomers.
    #[arg(short, long, value_name = "NAME")]
    pub residue: Option<String>,

    /// Override the COM-COM cutoff in angstrom.
    #[arg(long, value_name = "FLOAT", allow_negative_numbers = true)]
    pub cutoff: Option<f64>,

    /// Override the trajectory stride (every n-th frame is processed).
    #[arg(long, value_name = "INT")]
    pub step: Option<usize>,

    /// Test mode: only the first K monomers start pairs (2 when no value is given).
    #[arg(long, value_name = "K", num_args(0..=1), default_missing_value = "2")]
    pub test: Option<usize>,

    /// Override the directory holding per-resolution charge tables.
    #[arg(long, value_name = "PATH")]
    pub charges_dir: Option<PathBuf>,

    /// Conformation tags appended to flattened feature vectors.
    #[arg(long, value_name = "I,J", value_parser = parse_tags)]
    pub tags: Option<(i32, i32)>,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S selection.cutoff=12.5
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `predict` subcommand.
#[derive(Args, Debug)]
pub struct PredictArgs {
    #[command(flatten)]
    pub inputs: RunInputs,

    // --- Model Overrides ---
    /// Override the surrogate model directory.
    #[arg(long, value_name = "PATH")]
    pub model_dir: Option<PathBuf>,

    /// Override the feature kind fed to the model ('distmat' or 'coulmat').
    #[arg(short, long, value_name = "KIND")]
    pub feature: Option<String>,

    /// Override the resolution fed to the model (the last one in the mapping table by default).
    #[arg(long, value_name = "NAME")]
    pub resolution: Option<String>,

    // --- Output Overrides ---
    /// Override the root directory of the pair log and the prediction CSV.
    #[arg(short, long, value_name = "PATH")]
    pub output_root: Option<PathBuf>,

    /// Override the temperature label of the run (K).
    #[arg(long, value_name = "TEXT")]
    pub temperature: Option<String>,

    /// Override the system label of the run.
    #[arg(long, value_name = "TEXT")]
    pub label: Option<String>,

    /// Override the snapshot label of the run.
    #[arg(long, value_name = "TEXT")]
    pub snapshot: Option<String>,
}

/// Arguments for the `featurize` subcommand.
#[derive(Args, Debug)]
pub struct FeaturizeArgs {
    #[command(flatten)]
    pub inputs: RunInputs,

    /// Override what is featurized ('mon' or 'pair').
    #[arg(long, value_name = "MODE")]
    pub mode: Option<String>,

    /// Override the reference state monomers are aligned to in 'mon' mode ('neutral' or 'anion').
    #[arg(long, value_name = "STATE")]
    pub state: Option<String>,

    /// Also store Coulomb matrices of explicit resolutions.
    #[arg(long)]
    pub coulomb: bool,

    /// Also store flattened, tagged feature vectors.
    #[arg(long)]
    pub flat: bool,

    /// Override the directory feature arrays are written to.
    #[arg(short, long, value_name = "PATH")]
    pub output_dir: Option<PathBuf>,
}

fn parse_tags(value: &str) -> Result<(i32, i32), String> {
    let (i, j) = value
        .split_once(',')
        .ok_or_else(|| format!("expected two comma-separated integers, got '{}'", value))?;
    let parse = |s: &str| {
        s.trim()
            .parse::<i32>()
            .map_err(|_| format!("invalid conformation tag '{}'", s.trim()))
    };
    Ok((parse(i)?, parse(j)?))
}
